//! Guided workout sessions

pub mod host;
pub mod machine;

pub use host::{CommitOutcome, HostError, HostEvent, SessionHost};
pub use machine::{SessionEvent, SessionMachine, SessionState, FINISH_LABEL};
