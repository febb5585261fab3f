//! The monitoring loop: read, score, maybe dispatch, render, pause.

use std::future::Future;
use std::io;
use std::task::Poll;

use chargewatch_compute::{AnomalyDetector, Decision};
use chargewatch_core::config::{MonitorConfig, StationConfig};
use chargewatch_core::SensorReading;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dashboard::Dashboard;
use crate::dispatcher::AlertDispatcher;
use crate::simulator::ReadingSource;
use crate::state::MonitoringState;

/// What happened in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    /// `None` when the reading failed schema validation.
    pub decision: Option<Decision>,
    pub dispatched: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub cycles: u64,
    pub anomalies: u64,
    pub ticket_failures: u64,
    pub interrupted: bool,
}

pub struct Monitor<S: ReadingSource, D: Dashboard> {
    detector: Box<dyn AnomalyDetector>,
    dispatcher: AlertDispatcher,
    source: S,
    dashboard: D,
    station: StationConfig,
    config: MonitorConfig,
    state: MonitoringState,
}

impl<S: ReadingSource, D: Dashboard> Monitor<S, D> {
    pub fn new(
        detector: Box<dyn AnomalyDetector>,
        dispatcher: AlertDispatcher,
        source: S,
        dashboard: D,
        station: StationConfig,
        config: MonitorConfig,
    ) -> Self {
        Self {
            detector,
            dispatcher,
            source,
            dashboard,
            station,
            config,
            state: MonitoringState::new(),
        }
    }

    pub fn state(&self) -> &MonitoringState {
        &self.state
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    pub fn dashboard(&self) -> &D {
        &self.dashboard
    }

    /// Run exactly one cycle.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let cycle = self.state.cycle;
        let fields = self.source.next_reading(cycle);

        let mut report = CycleReport {
            cycle,
            decision: None,
            dispatched: false,
        };

        match SensorReading::from_fields(&fields) {
            Ok(reading) => {
                let assessment = self.detector.assess(&reading);
                self.state.observe(reading, assessment);
                report.decision = Some(assessment.decision);
                debug!(
                    cycle,
                    decision = %assessment.decision,
                    score = assessment.score,
                    "reading scored"
                );

                if assessment.decision.is_anomalous() {
                    info!(
                        cycle,
                        temp = reading.internal_coolant_temp,
                        rpm = reading.coolant_pump_rpm,
                        score = assessment.score,
                        "Anomaly detected, requesting service ticket"
                    );
                }
                if let Some(slot) = self.dispatcher.on_decision(assessment.decision, &reading).await {
                    self.state.record_ticket(slot);
                    report.dispatched = true;
                    if self.state.consecutive_failures > 1 {
                        warn!(
                            consecutive = self.state.consecutive_failures,
                            total = self.state.total_failures,
                            "Ticket service keeps failing"
                        );
                    }
                }
            }
            Err(e) => {
                warn!(cycle, error = %e, "Reading rejected, skipping scoring this cycle");
                self.state.last_reading = None;
                self.state.last_assessment = None;
            }
        }

        if let Err(e) = self.dashboard.render(&self.station, &self.state) {
            warn!(error = %e, "Dashboard render failed");
        }

        self.state.advance();
        report
    }

    fn limit_reached(&self) -> bool {
        self.config
            .max_cycles
            .is_some_and(|max| self.state.cycle >= max)
    }

    /// Run until the cycle limit or Ctrl-C.
    pub async fn run(&mut self) -> RunSummary {
        self.run_with_signal(tokio::signal::ctrl_c()).await
    }

    /// Run until the cycle limit or until `signal` fires. `signal` is polled
    /// once before the first cycle so a handler it installs is in place
    /// while that cycle runs; it is then checked between cycles.
    pub async fn run_with_signal<F>(&mut self, signal: F) -> RunSummary
    where
        F: Future<Output = io::Result<()>>,
    {
        let mut signal = Box::pin(signal);
        let early = std::future::poll_fn(|cx| Poll::Ready(signal.as_mut().poll(cx))).await;

        let shutdown = async move {
            let result = match early {
                Poll::Ready(result) => result,
                Poll::Pending => signal.await,
            };
            match result {
                Ok(()) => info!("Shutdown requested, stopping after the current cycle"),
                Err(e) => {
                    warn!(error = %e, "Shutdown signal unavailable");
                    std::future::pending::<()>().await;
                }
            }
        };
        self.run_until(shutdown).await
    }

    /// Run until the cycle limit or until `shutdown` completes. A shutdown
    /// that fires mid-cycle takes effect once that cycle has finished.
    pub async fn run_until<F>(&mut self, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let pause = self.config.interval();
        let mut interrupted = false;

        info!(
            station = %self.station.id,
            interval_ms = self.config.interval_ms,
            max_cycles = ?self.config.max_cycles,
            "Monitoring started"
        );

        while !self.limit_reached() {
            self.run_cycle().await;

            if self.limit_reached() {
                break;
            }

            // Shutdown is polled before the pause.
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    interrupted = true;
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }

        let summary = RunSummary {
            cycles: self.state.cycle,
            anomalies: self.state.total_anomalies,
            ticket_failures: self.state.total_failures,
            interrupted,
        };
        info!(
            cycles = summary.cycles,
            anomalies = summary.anomalies,
            ticket_failures = summary.ticket_failures,
            interrupted,
            "Monitoring stopped"
        );
        summary
    }
}
