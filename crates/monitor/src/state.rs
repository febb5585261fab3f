use chargewatch_compute::Assessment;
use chargewatch_core::{SensorReading, TicketSlot};
use serde::Serialize;

/// Everything the loop carries between cycles.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitoringState {
    /// Last ticket. Survives normal cycles.
    pub slot: TicketSlot,
    /// Completed cycles.
    pub cycle: u64,
    pub total_anomalies: u64,
    pub total_failures: u64,
    pub consecutive_failures: u64,
    pub last_reading: Option<SensorReading>,
    pub last_assessment: Option<Assessment>,
}

impl MonitoringState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, reading: SensorReading, assessment: Assessment) {
        self.last_reading = Some(reading);
        self.last_assessment = Some(assessment);
        if assessment.decision.is_anomalous() {
            self.total_anomalies += 1;
        }
    }

    /// Store the outcome of a dispatch and update failure counters.
    pub fn record_ticket(&mut self, slot: TicketSlot) {
        if slot.is_failed() {
            self.total_failures += 1;
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 0;
        }
        self.slot = slot;
    }

    pub fn advance(&mut self) {
        self.cycle += 1;
    }
}
