//! Live tuning commands.
//!
//! These are the typed form of what the operator console sends. Text parsing
//! lives with the console; by the time a `TuningCommand` exists it is valid.

use crate::telemetry::LogChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gain {
    P,
    I,
    D,
}

impl Gain {
    pub fn letter(self) -> char {
        match self {
            Gain::P => 'p',
            Gain::I => 'i',
            Gain::D => 'd',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TuningCommand {
    GetGain(Gain),
    SetGain(Gain, f64),
    GetBaseSpeed,
    SetBaseSpeed(i16),
    StartDrive,
    StopDrive,
    SetLog(LogChannel, bool),
    /// Feed a remote code through the input handler as if it was received.
    InjectRemote(u8),
}

/// State after a command was applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TuningReply {
    Gain(Gain, f64),
    BaseSpeed(i16),
    Drive { enabled: bool },
    Log(LogChannel, bool),
}
