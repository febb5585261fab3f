//! Offline training: corpus in, model artifact out.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::algorithms::isolation_forest::{Contamination, ForestParams, IsolationForest, MaxSamples};
use crate::artifact::ModelArtifact;
use crate::corpus::{read_corpus, TrainingCorpus};
use crate::error::{TrainError, TrainingDataError};

/// Hyperparameters for a training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub n_estimators: usize,
    pub max_samples: MaxSamples,
    pub contamination: Contamination,
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        let params = ForestParams::default();
        Self {
            n_estimators: params.n_estimators,
            max_samples: params.max_samples,
            contamination: params.contamination,
            seed: params.seed,
        }
    }
}

impl From<TrainerConfig> for ForestParams {
    fn from(c: TrainerConfig) -> Self {
        ForestParams {
            n_estimators: c.n_estimators,
            max_samples: c.max_samples,
            contamination: c.contamination,
            seed: c.seed,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub rows: usize,
    pub n_estimators: usize,
    pub threshold: f64,
    /// Share of training rows the fitted model itself flags.
    pub training_anomaly_rate: f64,
    pub model_path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Fit a forest on `corpus`.
    pub fn train(&self, corpus: &TrainingCorpus) -> Result<ModelArtifact, TrainingDataError> {
        let start = Instant::now();
        let forest = IsolationForest::fit(&corpus.feature_matrix(), self.config.into())?;
        info!(
            rows = corpus.len(),
            trees = forest.n_estimators(),
            max_samples = forest.max_samples(),
            threshold = forest.threshold(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "isolation forest fitted"
        );
        Ok(ModelArtifact::new(forest, corpus.len()))
    }

    /// Read the corpus at `corpus_path`, train, and save to `model_path`.
    pub fn run(&self, corpus_path: &Path, model_path: &Path) -> Result<TrainingReport, TrainError> {
        let corpus = read_corpus(corpus_path)?;
        let artifact = self.train(&corpus)?;

        let flagged = corpus
            .rows()
            .iter()
            .filter(|r| artifact.forest.is_anomaly(&r.to_array()))
            .count();
        let training_anomaly_rate = flagged as f64 / corpus.len() as f64;
        if training_anomaly_rate > 0.25 {
            warn!(
                rate = training_anomaly_rate,
                "model flags a large share of its own training data"
            );
        }

        artifact.save(model_path)?;

        let report = TrainingReport {
            rows: corpus.len(),
            n_estimators: artifact.forest.n_estimators(),
            threshold: artifact.forest.threshold(),
            training_anomaly_rate,
            model_path: model_path.to_path_buf(),
        };
        info!(
            rows = report.rows,
            anomaly_rate = report.training_anomaly_rate,
            path = %model_path.display(),
            "training complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::write_corpus;
    use crate::error::ModelError;
    use crate::synth::{generate_seeded, HealthyProfile};

    fn quick() -> Trainer {
        Trainer::new(TrainerConfig {
            n_estimators: 20,
            ..TrainerConfig::default()
        })
    }

    #[test]
    fn default_config_matches_forest_defaults() {
        assert_eq!(ForestParams::from(TrainerConfig::default()), ForestParams::default());
        assert_eq!(TrainerConfig::default().n_estimators, 100);
        assert_eq!(TrainerConfig::default().seed, 42);
    }

    #[test]
    fn run_writes_a_loadable_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let corpus_path = dir.path().join("corpus.csv");
        let model_path = dir.path().join("model.msgpack");
        let corpus = generate_seeded(500, &HealthyProfile::default(), Some(3)).unwrap();
        write_corpus(&corpus_path, &corpus).unwrap();

        let report = quick().run(&corpus_path, &model_path).unwrap();
        assert_eq!(report.rows, 500);
        assert_eq!(report.n_estimators, 20);
        assert_eq!(report.threshold, 0.5);
        assert!(report.training_anomaly_rate < 0.5);

        let artifact = ModelArtifact::load(&model_path).unwrap();
        assert_eq!(artifact.training_rows, 500);
    }

    #[test]
    fn missing_corpus_fails_before_writing_anything() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.msgpack");
        let err = quick()
            .run(&dir.path().join("nope.csv"), &model_path)
            .unwrap_err();
        assert!(matches!(err, TrainError::Data(TrainingDataError::NotFound(_))));
        assert!(!model_path.exists());
    }

    #[test]
    fn unwritable_model_path_is_a_model_error() {
        let dir = tempfile::tempdir().unwrap();
        let corpus_path = dir.path().join("corpus.csv");
        let corpus = generate_seeded(50, &HealthyProfile::default(), Some(3)).unwrap();
        write_corpus(&corpus_path, &corpus).unwrap();

        // A directory where the file should go.
        let model_path = dir.path().join("taken");
        std::fs::create_dir(&model_path).unwrap();
        let err = quick().run(&corpus_path, &model_path).unwrap_err();
        assert!(matches!(err, TrainError::Model(ModelError::Io(_))));
    }

    #[test]
    fn fraction_contamination_moves_the_threshold() {
        let corpus = generate_seeded(400, &HealthyProfile::default(), Some(5)).unwrap();
        let trainer = Trainer::new(TrainerConfig {
            n_estimators: 20,
            contamination: Contamination::Fraction(0.1),
            ..TrainerConfig::default()
        });
        let artifact = trainer.train(&corpus).unwrap();
        let flagged = corpus
            .rows()
            .iter()
            .filter(|r| artifact.forest.is_anomaly(&r.to_array()))
            .count();
        // Strictly-above on a (1 - c) percentile leaves roughly c flagged.
        assert!((20..=60).contains(&flagged), "flagged {flagged}");
    }
}
