//! Sensor, motor and input backends for the line follower.
//!
//! The simulated backends are always available; the Raspberry Pi drivers
//! are compiled with the `hardware` feature.

pub mod error;
pub mod sim;
pub mod util;

#[cfg(feature = "hardware")]
pub mod buttons;
#[cfg(feature = "hardware")]
pub mod hbridge;
#[cfg(feature = "hardware")]
pub mod mcp3008;

pub use error::HwError;
pub use sim::{FrameReplay, SimButtons, SimDrive, SimRemote, SimTrack, TrackParams, sim_pair};

#[cfg(feature = "hardware")]
pub use buttons::GpioButtons;
#[cfg(feature = "hardware")]
pub use hbridge::{HBridge, HBridgePins};
#[cfg(feature = "hardware")]
pub use mcp3008::Mcp3008Array;
