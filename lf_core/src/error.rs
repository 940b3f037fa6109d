use thiserror::Error;

/// Collaborator faults as seen by the control loop.
///
/// None of these leave the loop; they are logged, counted and kept as the
/// snapshot's `last_fault`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("bus error: {0}")]
    Bus(String),
    #[error("timeout waiting for device")]
    Timeout,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("drive enable failed: {0}")]
    DriveEnable(ControlError),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
