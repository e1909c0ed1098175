pub mod orchestrator;
pub mod state;

pub use orchestrator::{Orchestrator, OrchestratorHandle, OrchestratorSettings};
pub use state::{Action, ConnectionEvent, ConnectionState, Role, Target, transition};

/// Status surface consumed by the presentation layer (dialog/notification
/// rendering and display refreshes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// A user-initiated connection attempt has started.
    ConnectionStarted { label: String },
    /// The attempt failed; `reason` is the manager's message.
    ConnectionFailed { reason: String },
    /// The attempt completed and the device is the new default.
    ConnectionSucceeded,
    /// Device state changed in a way the presentation layer should re-read.
    DisplayRefresh,
}
