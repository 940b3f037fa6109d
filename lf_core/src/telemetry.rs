//! Per-cycle diagnostics exposed to the logging surface.
//!
//! The loop replaces its `Snapshot` as a whole at the end of each control
//! cycle, so a reader always sees values from one cycle. Formatting and
//! throttling belong to the reader.

use std::str::FromStr;

use lf_traits::SensorFrame;

use crate::error::ControlError;
use crate::estimator::Estimate;

/// Diagnostic output categories the operator can switch on and off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogChannel {
    Kp,
    Ki,
    Kd,
    Sensor,
    Line,
    Output,
}

impl LogChannel {
    pub const ALL: [LogChannel; 6] = [
        LogChannel::Kp,
        LogChannel::Ki,
        LogChannel::Kd,
        LogChannel::Sensor,
        LogChannel::Line,
        LogChannel::Output,
    ];

    /// Single-letter console name.
    pub fn letter(self) -> char {
        match self {
            LogChannel::Kp => 'p',
            LogChannel::Ki => 'i',
            LogChannel::Kd => 'd',
            LogChannel::Sensor => 's',
            LogChannel::Line => 'l',
            LogChannel::Output => 'o',
        }
    }
}

impl FromStr for LogChannel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "p" => Ok(LogChannel::Kp),
            "i" => Ok(LogChannel::Ki),
            "d" => Ok(LogChannel::Kd),
            "s" => Ok(LogChannel::Sensor),
            "l" => Ok(LogChannel::Line),
            "o" => Ok(LogChannel::Output),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFlags {
    pub kp: bool,
    pub ki: bool,
    pub kd: bool,
    pub sensor: bool,
    pub line: bool,
    pub output: bool,
}

impl Default for LogFlags {
    fn default() -> Self {
        Self {
            kp: false,
            ki: false,
            kd: false,
            sensor: true,
            line: true,
            output: true,
        }
    }
}

impl LogFlags {
    pub fn get(&self, channel: LogChannel) -> bool {
        match channel {
            LogChannel::Kp => self.kp,
            LogChannel::Ki => self.ki,
            LogChannel::Kd => self.kd,
            LogChannel::Sensor => self.sensor,
            LogChannel::Line => self.line,
            LogChannel::Output => self.output,
        }
    }

    pub fn set(&mut self, channel: LogChannel, on: bool) {
        let slot = match channel {
            LogChannel::Kp => &mut self.kp,
            LogChannel::Ki => &mut self.ki,
            LogChannel::Kd => &mut self.kd,
            LogChannel::Sensor => &mut self.sensor,
            LogChannel::Line => &mut self.line,
            LogChannel::Output => &mut self.output,
        };
        *slot = on;
    }

    pub fn any_gain(&self) -> bool {
        self.kp || self.ki || self.kd
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultCounters {
    pub sensor: u64,
    pub motor: u64,
    pub input: u64,
}

impl FaultCounters {
    pub fn total(&self) -> u64 {
        self.sensor + self.motor + self.input
    }
}

/// What the last control cycle saw and did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Number of completed control cycles; 0 before the first one.
    pub cycle: u64,
    /// Loop time of the cycle, in ms since the loop's epoch.
    pub at_ms: u64,
    /// Last frame acquired successfully; kept across failed acquisitions.
    pub frame: SensorFrame,
    /// Whether `frame` was acquired during this cycle.
    pub fresh_frame: bool,
    pub estimate: Estimate,
    /// Raw controller output before the cast to a wheel correction.
    pub output: f64,
    pub left: i16,
    pub right: i16,
    pub drive_enabled: bool,
    pub faults: FaultCounters,
    pub last_fault: Option<ControlError>,
}
