pub mod provider;
pub mod providers;
pub mod ticket;

pub use provider::{LlmError, LlmProvider, Message, ResponseFormat, Role};
pub use providers::create_provider;
pub use ticket::{extract_json, parse_ticket, AlertContext, TicketDrafter, TicketError, TICKET_KEYS};
