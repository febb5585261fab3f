pub mod config;
pub mod error;
pub mod reading;
pub mod ticket;

pub use config::{Config, MonitoringSettings};
pub use error::*;
pub use reading::{Feature, FieldMap, SensorReading, FEATURES};
pub use ticket::{ErrorTicket, RequiredPart, ServiceTicket, TicketSlot};
