//! Synthetic healthy-operation data.
//!
//! Each feature is drawn independently from its own normal distribution;
//! no cross-feature correlation is modelled.

use chargewatch_core::{Feature, SensorReading};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::corpus::TrainingCorpus;
use crate::error::TrainingDataError;

/// Default corpus size.
pub const DEFAULT_ROWS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureDistribution {
    pub mean: f64,
    pub std_dev: f64,
}

impl FeatureDistribution {
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }
}

/// Expected healthy operating ranges, one distribution per feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthyProfile {
    pub voltage_output: FeatureDistribution,
    pub current_draw: FeatureDistribution,
    pub internal_coolant_temp: FeatureDistribution,
    pub coolant_pump_rpm: FeatureDistribution,
}

impl Default for HealthyProfile {
    fn default() -> Self {
        Self {
            voltage_output: FeatureDistribution::new(480.0, 2.5),
            current_draw: FeatureDistribution::new(30.0, 1.5),
            internal_coolant_temp: FeatureDistribution::new(70.0, 2.0),
            coolant_pump_rpm: FeatureDistribution::new(1500.0, 50.0),
        }
    }
}

impl HealthyProfile {
    pub fn distribution(&self, feature: Feature) -> FeatureDistribution {
        match feature {
            Feature::VoltageOutput => self.voltage_output,
            Feature::CurrentDraw => self.current_draw,
            Feature::InternalCoolantTemp => self.internal_coolant_temp,
            Feature::CoolantPumpRpm => self.coolant_pump_rpm,
        }
    }

    fn normal(&self, feature: Feature) -> Result<Normal<f64>, TrainingDataError> {
        let d = self.distribution(feature);
        let invalid = || TrainingDataError::InvalidDistribution {
            feature: feature.name().to_string(),
            mean: d.mean,
            std_dev: d.std_dev,
        };
        if !d.mean.is_finite() || !d.std_dev.is_finite() || d.std_dev <= 0.0 {
            return Err(invalid());
        }
        Normal::new(d.mean, d.std_dev).map_err(|_| invalid())
    }
}

/// Draw `rows` readings from `profile`, column by column.
pub fn generate<R: Rng + ?Sized>(
    rows: usize,
    profile: &HealthyProfile,
    rng: &mut R,
) -> Result<TrainingCorpus, TrainingDataError> {
    if rows == 0 {
        return Err(TrainingDataError::Empty);
    }

    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(Feature::ALL.len());
    for feature in Feature::ALL {
        let normal = profile.normal(feature)?;
        columns.push((0..rows).map(|_| normal.sample(rng)).collect());
    }

    let readings = (0..rows)
        .map(|i| SensorReading::new(columns[0][i], columns[1][i], columns[2][i], columns[3][i]))
        .collect();

    TrainingCorpus::from_readings(readings)
}

/// [`generate`] with a fixed seed, or fresh entropy when `seed` is `None`.
pub fn generate_seeded(
    rows: usize,
    profile: &HealthyProfile,
    seed: Option<u64>,
) -> Result<TrainingCorpus, TrainingDataError> {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let corpus = generate(rows, profile, &mut rng)?;
    info!(rows, seeded = seed.is_some(), "generated healthy corpus");
    Ok(corpus)
}
