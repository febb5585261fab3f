//! Drafting service tickets from anomaly alerts.
//!
//! The model is asked for one JSON object with a fixed key set. Whatever comes
//! back is parsed leniently: fences and prose around the object are stripped,
//! missing keys become `None`. Anything that is not a JSON object is an error.

use std::time::Duration;

use chargewatch_core::config::{LlmConfig, OllamaConfig, StationConfig};
use chargewatch_core::{SensorReading, ServiceTicket};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::provider::{LlmError, LlmProvider, Message, ResponseFormat};

/// Keys the ticket object must carry.
pub const TICKET_KEYS: [&str; 7] = [
    "ticket_id",
    "station_id",
    "urgency_level",
    "predicted_failure_mode",
    "required_parts",
    "service_instructions",
    "technician_notes",
];

const SYSTEM_PROMPT: &str = "You are a service dispatcher for a network of DC fast-charging \
stations. You turn predictive-maintenance alerts into work orders for field technicians. \
You always answer with a single valid JSON object and nothing else.";

/// The facts an alert prompt is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertContext {
    pub timestamp: DateTime<Utc>,
    pub voltage: f64,
    pub current: f64,
    pub coolant_temp: f64,
    pub pump_rpm: f64,
    pub station_id: String,
    pub station_location: String,
}

impl AlertContext {
    /// Context for `reading`, stamped with the current time.
    pub fn new(reading: &SensorReading, station: &StationConfig) -> Self {
        Self::at(Utc::now(), reading, station)
    }

    pub fn at(timestamp: DateTime<Utc>, reading: &SensorReading, station: &StationConfig) -> Self {
        Self {
            timestamp,
            voltage: reading.voltage_output,
            current: reading.current_draw,
            coolant_temp: reading.internal_coolant_temp,
            pump_rpm: reading.coolant_pump_rpm,
            station_id: station.id.clone(),
            station_location: station.location.clone(),
        }
    }

    /// The user turn of the request.
    pub fn prompt(&self) -> String {
        let keys = TICKET_KEYS
            .iter()
            .map(|k| match *k {
                "required_parts" => format!("\"{k}\" (an array of objects)"),
                "service_instructions" => format!("\"{k}\" (an array of strings)"),
                _ => format!("\"{k}\""),
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "A predictive failure alert has been raised for charging station {id} in {location}. \
             The monitoring model expects a critical failure within the next 72 hours.\n\n\
             LIVE DATA AT THE TIME OF THE ALERT:\n\
             - Timestamp: {ts}\n\
             - Voltage Output: {voltage:.2} V (stable)\n\
             - Current Draw: {current:.2} A\n\
             - Internal Coolant Temp: {temp:.2} °C (trending upwards)\n\
             - Coolant Pump RPM: {rpm:.0} RPM (trending upwards, pump under strain)\n\n\
             TASK:\n\
             Write a complete, structured service ticket so a field technician can fix the \
             station before it fails in public. Respond with a single valid JSON object \
             containing exactly these keys: {keys}.",
            id = self.station_id,
            location = self.station_location,
            ts = self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            voltage = self.voltage,
            current = self.current,
            temp = self.coolant_temp,
            rpm = self.pump_rpm,
        )
    }

    pub fn messages(&self) -> Vec<Message> {
        vec![Message::system(SYSTEM_PROMPT), Message::user(self.prompt())]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("LLM error: {0}")]
    Provider(#[from] LlmError),
    #[error("no response within {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("response is not valid JSON: {reason}")]
    InvalidJson {
        reason: String,
        raw_response: String,
    },
    #[error("response is JSON but not an object (got {found})")]
    NotAnObject {
        found: &'static str,
        raw_response: String,
    },
}

/// Turns alert contexts into service tickets via an [`LlmProvider`].
pub struct TicketDrafter {
    provider: Box<dyn LlmProvider>,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl TicketDrafter {
    pub fn new(
        provider: Box<dyn LlmProvider>,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
            timeout,
        }
    }

    /// Build from config, creating the appropriate provider.
    pub fn from_config(
        llm_config: &LlmConfig,
        ollama_config: &OllamaConfig,
    ) -> Result<Self, LlmError> {
        let provider = crate::providers::create_provider(llm_config, ollama_config)?;
        Ok(Self::new(
            provider,
            llm_config.temperature,
            llm_config.max_tokens,
            llm_config.timeout(),
        ))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One request/response cycle. Never retries.
    pub async fn draft(&self, context: &AlertContext) -> Result<ServiceTicket, TicketError> {
        let request_id = Uuid::new_v4();
        info!(
            %request_id,
            provider = self.provider.name(),
            station = %context.station_id,
            "requesting service ticket"
        );

        let call = self.provider.complete(
            context.messages(),
            self.temperature,
            self.max_tokens,
            ResponseFormat::Json,
        );
        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| TicketError::Timeout(self.timeout))??;

        debug!(%request_id, response = %response, "LLM response");

        let ticket = parse_ticket(&response)?;
        info!(
            %request_id,
            ticket_id = ticket.ticket_id_or_na(),
            urgency = ticket.urgency_or_na(),
            "service ticket drafted"
        );
        Ok(ticket)
    }
}

/// Parse a model response into a ticket.
pub fn parse_ticket(response: &str) -> Result<ServiceTicket, TicketError> {
    let json_str = extract_json(response);
    let value: Value = serde_json::from_str(json_str).map_err(|e| TicketError::InvalidJson {
        reason: e.to_string(),
        raw_response: response.to_string(),
    })?;

    match value {
        Value::Object(object) => Ok(ServiceTicket::from_object(object)),
        other => Err(TicketError::NotAnObject {
            found: json_kind(&other),
            raw_response: response.to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Extract JSON from an LLM response, handling markdown code blocks.
pub fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    // ```json ... ``` blocks
    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    // ``` ... ``` blocks, skipping any language tag on the fence line
    if let Some(start) = trimmed.find("```") {
        let after_tick = &trimmed[start + 3..];
        let content_start = after_tick.find('\n').map_or(0, |n| n + 1);
        if let Some(end) = after_tick[content_start..].find("```") {
            return after_tick[content_start..content_start + end].trim();
        }
    }

    // Raw object with prose around it
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                return &trimmed[start..=end];
            }
        }
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const FULL_TICKET: &str = r#"{
        "ticket_id": "SRV-1138-0001",
        "station_id": "MDS-EV-1138",
        "urgency_level": "Critical",
        "predicted_failure_mode": "Coolant pump bearing failure",
        "required_parts": [{"part_name": "Coolant pump", "quantity": 1}],
        "service_instructions": ["Isolate station", "Replace pump"],
        "technician_notes": "Temperature and RPM rising together."
    }"#;

    struct MockProvider {
        response: Result<String, u16>,
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl MockProvider {
        fn replying(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                calls: Arc::new(AtomicUsize::new(0)),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockProvider {
        async fn complete(
            &self,
            messages: Vec<Message>,
            _temperature: f32,
            _max_tokens: u32,
            format: ResponseFormat,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(format, ResponseFormat::Json);
            assert_eq!(messages.len(), 2);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(LlmError::ApiError {
                    status: *status,
                    body: "quota exceeded".into(),
                }),
            }
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn context() -> AlertContext {
        let station = StationConfig::default();
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
        AlertContext::at(at, &SensorReading::new(480.4, 30.1, 91.2, 1903.0), &station)
    }

    fn drafter(provider: MockProvider) -> TicketDrafter {
        TicketDrafter::new(Box::new(provider), 0.2, 2048, Duration::from_secs(5))
    }

    #[test]
    fn prompt_carries_reading_station_and_keys() {
        let prompt = context().prompt();
        assert!(prompt.contains("MDS-EV-1138"));
        assert!(prompt.contains("Shizuoka"));
        assert!(prompt.contains("2026-10-18T09:30:00Z"));
        assert!(prompt.contains("480.40 V"));
        assert!(prompt.contains("91.20 °C"));
        assert!(prompt.contains("1903 RPM"));
        for key in TICKET_KEYS {
            assert!(prompt.contains(&format!("\"{key}\"")), "prompt lacks {key}");
        }
    }

    #[test]
    fn extract_json_raw() {
        let input = r#"{"ticket_id": "T-1"}"#;
        assert_eq!(extract_json(input), r#"{"ticket_id": "T-1"}"#);
    }

    #[test]
    fn extract_json_code_block() {
        let input = "Here is the ticket:\n```json\n{\"ticket_id\": \"T-1\"}\n```\nDone.";
        assert_eq!(extract_json(input), r#"{"ticket_id": "T-1"}"#);
    }

    #[test]
    fn extract_json_bare_fence() {
        let input = "```\n{\"ticket_id\": \"T-1\"}\n```";
        assert_eq!(extract_json(input), r#"{"ticket_id": "T-1"}"#);
    }

    #[test]
    fn extract_json_with_prefix() {
        let input = "Sure! Here's the ticket: {\"ticket_id\": \"T-1\"}";
        assert_eq!(extract_json(input), r#"{"ticket_id": "T-1"}"#);
    }

    #[test]
    fn parse_ticket_rejects_non_objects() {
        assert!(matches!(
            parse_ticket("[1, 2, 3]"),
            Err(TicketError::NotAnObject { found: "an array", .. })
        ));
        assert!(matches!(
            parse_ticket("I cannot help with that."),
            Err(TicketError::InvalidJson { .. })
        ));
        assert!(matches!(
            parse_ticket("{\"ticket_id\": "),
            Err(TicketError::InvalidJson { .. })
        ));
    }

    #[test]
    fn parse_ticket_tolerates_missing_keys() {
        let ticket = parse_ticket(r#"{"urgency_level": "Low"}"#).unwrap();
        assert_eq!(ticket.urgency_or_na(), "Low");
        assert_eq!(ticket.ticket_id_or_na(), "N/A");
    }

    #[tokio::test]
    async fn draft_returns_parsed_ticket() {
        let provider = MockProvider::replying(&format!("```json\n{FULL_TICKET}\n```"));
        let calls = provider.calls.clone();
        let ticket = drafter(provider).draft(&context()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ticket.ticket_id.as_deref(), Some("SRV-1138-0001"));
        assert_eq!(ticket.urgency_or_na(), "Critical");
        assert_eq!(ticket.service_instructions.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn provider_error_is_surfaced() {
        let provider = MockProvider {
            response: Err(429),
            ..MockProvider::replying("")
        };
        let err = drafter(provider).draft(&context()).await.unwrap_err();
        assert!(matches!(
            err,
            TicketError::Provider(LlmError::ApiError { status: 429, .. })
        ));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let provider = MockProvider {
            delay: Duration::from_secs(10),
            ..MockProvider::replying(FULL_TICKET)
        };
        let drafter = TicketDrafter::new(Box::new(provider), 0.2, 2048, Duration::from_millis(50));
        let err = drafter.draft(&context()).await.unwrap_err();
        assert!(matches!(err, TicketError::Timeout(d) if d == Duration::from_millis(50)));
    }
}
