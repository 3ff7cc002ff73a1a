//! State Module
//!
//! The reconciled dashboard state and its read-only snapshot.

mod dashboard;
mod view;

pub use dashboard::Dashboard;
pub use view::{AuxiliaryPanels, CompletedScenario, ControlState, DashboardView, SimulationStatus};
