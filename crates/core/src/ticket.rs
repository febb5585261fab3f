//! Maintenance ticket model.
//!
//! Tickets come back from a text-generation service, so every field is
//! optional: `None` means the service omitted the key, `Some("")` means it
//! sent an empty value. Rendering decides what a missing field looks like.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder shown for fields the service did not return.
pub const MISSING_FIELD: &str = "N/A";

/// A structured service ticket drafted by the reasoning service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTicket {
    pub ticket_id: Option<String>,
    pub station_id: Option<String>,
    pub urgency_level: Option<String>,
    pub predicted_failure_mode: Option<String>,
    pub required_parts: Option<Vec<RequiredPart>>,
    pub service_instructions: Option<Vec<String>>,
    pub technician_notes: Option<String>,
    /// The object exactly as returned.
    pub raw: Value,
}

impl ServiceTicket {
    /// Best-effort extraction from a JSON object. Never fails: unknown or
    /// oddly-typed keys degrade to `None` or to their JSON text.
    pub fn from_object(object: Map<String, Value>) -> Self {
        let ticket_id = text_field(&object, "ticket_id");
        let station_id = text_field(&object, "station_id");
        let urgency_level = text_field(&object, "urgency_level");
        let predicted_failure_mode = text_field(&object, "predicted_failure_mode");
        let technician_notes = text_field(&object, "technician_notes");

        let required_parts = match object.get("required_parts") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => {
                Some(items.iter().cloned().map(RequiredPart).collect())
            }
            Some(single) => Some(vec![RequiredPart(single.clone())]),
        };

        let service_instructions = match object.get("service_instructions") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(items.iter().map(value_text).collect()),
            Some(single) => Some(vec![value_text(single)]),
        };

        Self {
            ticket_id,
            station_id,
            urgency_level,
            predicted_failure_mode,
            required_parts,
            service_instructions,
            technician_notes,
            raw: Value::Object(object),
        }
    }

    pub fn ticket_id_or_na(&self) -> &str {
        self.ticket_id.as_deref().unwrap_or(MISSING_FIELD)
    }

    pub fn urgency_or_na(&self) -> &str {
        self.urgency_level.as_deref().unwrap_or(MISSING_FIELD)
    }

    pub fn failure_mode_or_na(&self) -> &str {
        self.predicted_failure_mode.as_deref().unwrap_or(MISSING_FIELD)
    }

    pub fn notes_or_na(&self) -> &str {
        self.technician_notes.as_deref().unwrap_or(MISSING_FIELD)
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        None | Some(Value::Null) => None,
        Some(v) => Some(value_text(v)),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(" "),
        other => other.to_string(),
    }
}

/// One entry of `required_parts`. The service decides the object shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequiredPart(pub Value);

/// Keys tried, in order, for a part's display name.
const PART_NAME_KEYS: &[&str] = &["part_name", "name", "description", "part", "item"];

impl RequiredPart {
    /// One-line description, e.g. `Coolant pump assembly x1 [MDS-CP-220]`.
    pub fn describe(&self) -> String {
        let object = match &self.0 {
            Value::Object(o) => o,
            other => return value_text(other),
        };

        let name = PART_NAME_KEYS
            .iter()
            .find_map(|k| object.get(*k).filter(|v| !v.is_null()).map(value_text))
            .unwrap_or_else(|| MISSING_FIELD.to_string());

        let mut line = name;
        if let Some(qty) = object.get("quantity").filter(|v| !v.is_null()) {
            line.push_str(&format!(" x{}", value_text(qty)));
        }
        if let Some(pn) = object.get("part_number").filter(|v| !v.is_null()) {
            line.push_str(&format!(" [{}]", value_text(pn)));
        }
        line
    }
}

/// Stand-in ticket produced when drafting fails. Carries the cause only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorTicket {
    pub error: String,
    pub produced_at: DateTime<Utc>,
}

impl ErrorTicket {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            produced_at: Utc::now(),
        }
    }
}

/// The "last ticket" shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TicketSlot {
    /// Nothing dispatched yet.
    #[default]
    Initializing,
    Ready(ServiceTicket),
    Failed(ErrorTicket),
}

impl TicketSlot {
    pub const INITIALIZING_MESSAGE: &'static str = "System is initializing...";

    pub fn ticket(&self) -> Option<&ServiceTicket> {
        match self {
            TicketSlot::Ready(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TicketSlot::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(o) => o,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn full_ticket_is_extracted() {
        let ticket = ServiceTicket::from_object(object(json!({
            "ticket_id": "SRV-20261018-001",
            "station_id": "MDS-EV-1138",
            "urgency_level": "High",
            "predicted_failure_mode": "Coolant pump bearing wear",
            "required_parts": [
                {"part_name": "Coolant pump assembly", "part_number": "CP-220", "quantity": 1},
                {"name": "Coolant (5L)", "quantity": "2"}
            ],
            "service_instructions": ["Isolate power", "Replace pump", "Bleed coolant loop"],
            "technician_notes": "Pump RPM trending up with coolant temp."
        })));

        assert_eq!(ticket.ticket_id.as_deref(), Some("SRV-20261018-001"));
        assert_eq!(ticket.urgency_or_na(), "High");
        let parts = ticket.required_parts.as_ref().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].describe(), "Coolant pump assembly x1 [CP-220]");
        assert_eq!(parts[1].describe(), "Coolant (5L) x2");
        assert_eq!(ticket.service_instructions.as_ref().unwrap().len(), 3);
        assert_eq!(ticket.raw["station_id"], "MDS-EV-1138");
    }

    #[test]
    fn missing_keys_are_none_and_render_as_na() {
        let ticket = ServiceTicket::from_object(object(json!({ "ticket_id": "T-1" })));
        assert!(ticket.urgency_level.is_none());
        assert!(ticket.required_parts.is_none());
        assert!(ticket.service_instructions.is_none());
        assert_eq!(ticket.urgency_or_na(), MISSING_FIELD);
        assert_eq!(ticket.failure_mode_or_na(), MISSING_FIELD);
        assert_eq!(ticket.notes_or_na(), MISSING_FIELD);
    }

    #[test]
    fn empty_values_are_distinct_from_missing() {
        let ticket = ServiceTicket::from_object(object(json!({
            "technician_notes": "",
            "required_parts": [],
            "urgency_level": null
        })));
        assert_eq!(ticket.technician_notes.as_deref(), Some(""));
        assert_eq!(ticket.required_parts, Some(vec![]));
        assert!(ticket.urgency_level.is_none());
    }

    #[test]
    fn odd_types_degrade_to_text() {
        let ticket = ServiceTicket::from_object(object(json!({
            "ticket_id": 4711,
            "service_instructions": "Replace the pump",
            "technician_notes": ["check", "seals"],
            "required_parts": {"part": "Seal kit"}
        })));
        assert_eq!(ticket.ticket_id.as_deref(), Some("4711"));
        assert_eq!(
            ticket.service_instructions,
            Some(vec!["Replace the pump".to_string()])
        );
        assert_eq!(ticket.technician_notes.as_deref(), Some("check seals"));
        assert_eq!(ticket.required_parts.unwrap()[0].describe(), "Seal kit");
    }

    #[test]
    fn part_without_name_uses_placeholder() {
        let part = RequiredPart(json!({"quantity": 3}));
        assert_eq!(part.describe(), "N/A x3");
        assert_eq!(RequiredPart(json!("Fuse 40A")).describe(), "Fuse 40A");
    }

    #[test]
    fn slot_defaults_to_initializing() {
        let slot = TicketSlot::default();
        assert_eq!(slot, TicketSlot::Initializing);
        assert!(slot.ticket().is_none());
        assert!(!slot.is_failed());
        assert!(TicketSlot::Failed(ErrorTicket::new("boom")).is_failed());
    }
}
