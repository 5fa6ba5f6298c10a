//! Coordinator runtime: the owner task, its handle, and simulated collaborators.

mod coordinator;
mod error;
pub mod notifier;
pub mod protocol;
mod runtime;
pub mod sim;

pub use coordinator::{CoordinatorParts, SessionCoordinator};
pub use error::RuntimeError;
pub use notifier::{RecordingNotifier, TracingNotifier};
pub use protocol::{
    CoordinatorState, CoordinatorStatus, CoordinatorUpdate, Event, LoadReport, LoadRequest,
    SaveReport,
};
pub use runtime::{
    anchor_error, event_channel, init_json_tracing, init_tracing, spawn, CoordinatorHandle,
    EventQueue, EventSink,
};
pub use sim::{
    SessionControl, SimulatedCloud, SimulatedDevice, SimulatedHostingService, SimulatedSession,
};
