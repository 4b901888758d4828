pub mod backend;
pub mod error;
pub mod launch;
pub mod signal;
pub mod state;

pub use backend::{BackendStatus, BackendSupervisor, ExitReport, StartOutcome};
pub use error::SupervisorError;
pub use state::State;
