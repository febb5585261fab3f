//! Simulated live telemetry.
//!
//! Healthy cycles draw uniformly from the normal operating band. Fault
//! cycles push coolant temperature and pump speed far above it, the
//! signature of a failing coolant pump.

use std::ops::Range;

use chargewatch_core::config::MonitorConfig;
use chargewatch_core::{FieldMap, SensorReading};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const VOLTAGE: Range<f64> = 478.0..482.0;
const CURRENT: Range<f64> = 28.0..32.0;
const HEALTHY_TEMP: Range<f64> = 68.0..75.0;
const HEALTHY_RPM: Range<f64> = 1450.0..1550.0;
const FAULT_TEMP: Range<f64> = 88.0..95.0;
const FAULT_RPM: Range<f64> = 1800.0..2000.0;

/// Where the loop gets its readings from.
pub trait ReadingSource: Send {
    /// The reading for `cycle` (0-based), as it would arrive off the wire.
    fn next_reading(&mut self, cycle: u64) -> FieldMap;
}

pub struct Simulator {
    rng: StdRng,
    warmup_cycles: u64,
    every: u64,
}

impl Simulator {
    /// `every` must be non-zero.
    pub fn new(warmup_cycles: u64, every: u64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            warmup_cycles,
            every: every.max(1),
        }
    }

    pub fn from_config(config: &MonitorConfig, seed: Option<u64>) -> Self {
        Self::new(config.anomaly_warmup_cycles, config.anomaly_every, seed)
    }

    /// Whether `cycle` gets an injected fault.
    pub fn is_fault_cycle(&self, cycle: u64) -> bool {
        cycle > self.warmup_cycles && cycle % self.every == 0
    }

    pub fn healthy(&mut self) -> SensorReading {
        SensorReading::new(
            self.rng.gen_range(VOLTAGE),
            self.rng.gen_range(CURRENT),
            self.rng.gen_range(HEALTHY_TEMP),
            self.rng.gen_range(HEALTHY_RPM),
        )
    }

    pub fn faulty(&mut self) -> SensorReading {
        SensorReading::new(
            self.rng.gen_range(VOLTAGE),
            self.rng.gen_range(CURRENT),
            self.rng.gen_range(FAULT_TEMP),
            self.rng.gen_range(FAULT_RPM),
        )
    }
}

impl ReadingSource for Simulator {
    fn next_reading(&mut self, cycle: u64) -> FieldMap {
        let reading = if self.is_fault_cycle(cycle) {
            tracing::debug!(cycle, "injecting simulated fault");
            self.faulty()
        } else {
            self.healthy()
        };
        reading.to_fields()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cadence_faults_every_tenth_cycle_after_warmup() {
        let sim = Simulator::from_config(&MonitorConfig::default(), Some(1));
        let faults: Vec<u64> = (0..45).filter(|c| sim.is_fault_cycle(*c)).collect();
        assert_eq!(faults, vec![10, 20, 30, 40]);
    }

    #[test]
    fn warmup_is_strict() {
        let sim = Simulator::new(10, 5, Some(1));
        assert!(!sim.is_fault_cycle(10));
        assert!(sim.is_fault_cycle(15));
        assert!(!Simulator::new(0, 3, Some(1)).is_fault_cycle(0));
    }

    #[test]
    fn readings_stay_in_their_bands() {
        let mut sim = Simulator::new(5, 10, Some(7));
        for _ in 0..200 {
            let h = sim.healthy();
            assert!(HEALTHY_TEMP.contains(&h.internal_coolant_temp));
            assert!(HEALTHY_RPM.contains(&h.coolant_pump_rpm));
            let f = sim.faulty();
            assert!(FAULT_TEMP.contains(&f.internal_coolant_temp));
            assert!(FAULT_RPM.contains(&f.coolant_pump_rpm));
            assert!(VOLTAGE.contains(&f.voltage_output));
            assert!(CURRENT.contains(&f.current_draw));
        }
    }

    #[test]
    fn field_maps_are_complete_and_ordered() {
        let mut sim = Simulator::new(5, 10, Some(7));
        let fields = sim.next_reading(20);
        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(names, chargewatch_core::FEATURES);
        assert!(fields["internal_coolant_temp"] >= 88.0);
    }
}
