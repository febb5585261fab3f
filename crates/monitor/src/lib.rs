//! Live monitoring: simulated readings in, scored decisions and service
//! tickets out, rendered once per cycle.

pub mod dashboard;
pub mod dispatcher;
pub mod monitor;
pub mod simulator;
pub mod state;

pub use dashboard::{ConsoleDashboard, Dashboard};
pub use dispatcher::{AlertDispatcher, DispatchState};
pub use monitor::{CycleReport, Monitor, RunSummary};
pub use simulator::{ReadingSource, Simulator};
pub use state::MonitoringState;
