#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Line follower control core (hardware-agnostic).
//!
//! Everything the loop touches on the platform side goes through the traits in
//! `lf_traits`: `LineSensor`, `DriveMotors`, `Buttons`, `RemoteReceiver` and
//! `Clock`.
//!
//! ## Architecture
//!
//! - **Scheduling**: drift-free periodic tasks with bounded catch-up (`scheduler`)
//! - **Estimation**: contrast, edge and signal-floor gated centroid (`estimator`)
//! - **Control**: PID with anti-windup and output limits (`pid`)
//! - **Orchestration**: one estimate, control, actuate chain per due tick (`control`)
//! - **Inputs**: button edges and remote codes dispatched through an injected
//!   handler (`input`)
//! - **Tuning**: live get/set of gains, base speed and log flags (`tuning`)
//! - **Telemetry**: per-cycle snapshot replaced whole (`telemetry`)
//!
//! ## Units
//!
//! Time is whole milliseconds since the loop's epoch (`u64`). Positions are
//! signed integers in `[-127, 127]`; negative means the line is to the left.

pub mod builder;
pub mod config;
pub mod control;
pub mod conversions;
pub mod error;
pub mod estimator;
pub mod hw_error;
pub mod input;
pub mod pid;
pub mod scheduler;
pub mod telemetry;
pub mod tuning;
pub mod util;

pub use builder::{LoopBuilder, Missing};
pub use config::{DriveCfg, EstimatorCfg, PidCfg, ScheduleCfg};
pub use control::{ControlLoop, PollOutcome};
pub use error::{BuildError, ControlError, Report, Result};
pub use estimator::{Estimate, EstimateSource, LineEstimator, POSITION_LIMIT};
pub use input::{ButtonEdges, DriveAction, InputEvent, InputHandler, Keymap};
pub use pid::{Gains, OutputLimits, Pid};
pub use scheduler::PeriodicTask;
pub use telemetry::{FaultCounters, LogChannel, LogFlags, Snapshot};
pub use tuning::{Gain, TuningCommand, TuningReply};
