//! Turns anomalous decisions into service tickets.
//!
//! One anomaly, one request. The request is awaited inline and bounded by
//! the drafter's timeout. Every failure is folded into an [`ErrorTicket`] so
//! the loop never sees an error from here.

use std::time::Instant;

use chargewatch_compute::Decision;
use chargewatch_core::config::StationConfig;
use chargewatch_core::{ErrorTicket, SensorReading, TicketSlot};
use chargewatch_llm::{AlertContext, TicketDrafter};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Idle,
    AwaitingResponse,
    TicketReady,
    TicketFailed,
}

pub struct AlertDispatcher {
    drafter: TicketDrafter,
    station: StationConfig,
    state: DispatchState,
    last_outcome: Option<DispatchState>,
}

impl AlertDispatcher {
    pub fn new(drafter: TicketDrafter, station: StationConfig) -> Self {
        Self {
            drafter,
            station,
            state: DispatchState::Idle,
            last_outcome: None,
        }
    }

    /// Current state. `Idle` between dispatches.
    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// How the most recent dispatch ended, if there was one.
    pub fn last_outcome_state(&self) -> Option<DispatchState> {
        self.last_outcome
    }

    /// React to one decision. `Anomalous` runs a dispatch and returns the
    /// replacement for the last ticket; `Normal` returns `None` so the
    /// current ticket stays on screen.
    pub async fn on_decision(
        &mut self,
        decision: Decision,
        reading: &SensorReading,
    ) -> Option<TicketSlot> {
        if !decision.is_anomalous() {
            return None;
        }
        Some(self.dispatch(reading).await)
    }

    /// Run one request/response cycle for `reading`.
    pub async fn dispatch(&mut self, reading: &SensorReading) -> TicketSlot {
        let context = AlertContext::new(reading, &self.station);
        self.transition(DispatchState::AwaitingResponse);

        let start = Instant::now();
        let result = self.drafter.draft(&context).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (outcome, slot) = match result {
            Ok(ticket) => {
                tracing::info!(
                    ticket_id = ticket.ticket_id_or_na(),
                    duration_ms,
                    "Service ticket ready"
                );
                (DispatchState::TicketReady, TicketSlot::Ready(ticket))
            }
            Err(e) => {
                tracing::warn!(
                    provider = self.drafter.provider_name(),
                    error = %e,
                    duration_ms,
                    "Service ticket request failed"
                );
                let message = format!("{} API error: {e}", self.drafter.provider_name());
                (DispatchState::TicketFailed, TicketSlot::Failed(ErrorTicket::new(message)))
            }
        };

        self.transition(outcome);
        self.last_outcome = Some(outcome);
        self.transition(DispatchState::Idle);
        slot
    }

    fn transition(&mut self, next: DispatchState) {
        tracing::debug!(from = ?self.state, to = ?next, "dispatcher transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chargewatch_llm::{LlmError, LlmProvider, Message, ResponseFormat};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CannedProvider {
        reply: Option<String>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn complete(
            &self,
            _messages: Vec<Message>,
            _temperature: f32,
            _max_tokens: u32,
            _format: ResponseFormat,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .clone()
                .ok_or_else(|| LlmError::NotConfigured("offline".into()))
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn dispatcher(reply: Option<&str>) -> (AlertDispatcher, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CannedProvider {
            reply: reply.map(str::to_string),
            calls: calls.clone(),
        };
        let drafter = TicketDrafter::new(Box::new(provider), 0.2, 256, Duration::from_secs(5));
        (AlertDispatcher::new(drafter, StationConfig::default()), calls)
    }

    fn hot() -> SensorReading {
        SensorReading::new(480.0, 30.0, 91.0, 1900.0)
    }

    #[tokio::test]
    async fn normal_decision_does_not_dispatch() {
        let (mut d, calls) = dispatcher(Some(r#"{"ticket_id": "T-1"}"#));
        let replacement = d.on_decision(Decision::Normal, &hot()).await;

        assert!(replacement.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(d.last_outcome_state(), None);
    }

    #[tokio::test]
    async fn anomaly_produces_ticket() {
        let (mut d, calls) = dispatcher(Some(r#"{"ticket_id": "T-1", "urgency_level": "High"}"#));
        let slot = d.on_decision(Decision::Anomalous, &hot()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(slot.ticket().unwrap().ticket_id.as_deref(), Some("T-1"));
        assert_eq!(d.state(), DispatchState::Idle);
        assert_eq!(d.last_outcome_state(), Some(DispatchState::TicketReady));
    }

    #[tokio::test]
    async fn provider_failure_becomes_error_ticket() {
        let (mut d, _) = dispatcher(None);
        let slot = d.dispatch(&hot()).await;

        match slot {
            TicketSlot::Failed(e) => {
                assert!(e.error.starts_with("canned API error"), "{}", e.error);
                assert!(e.error.contains("offline"));
            }
            other => panic!("expected error ticket, got {other:?}"),
        }
        assert_eq!(d.last_outcome_state(), Some(DispatchState::TicketFailed));
        assert_eq!(d.state(), DispatchState::Idle);
    }

    #[tokio::test]
    async fn non_object_response_becomes_error_ticket() {
        let (mut d, _) = dispatcher(Some("The station looks fine to me."));
        assert!(d.dispatch(&hot()).await.is_failed());
    }
}
