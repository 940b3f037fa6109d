//! Telemetry lines printed after each control cycle.
//!
//! Text mode keeps the firmware's serial format (`S,...`, `L,...`, `O,...`,
//! `pid p 1.000`); JSON mode emits one object per cycle with the same
//! channels as optional fields.

use lf_core::util::correction_from_output;
use lf_core::{Gains, LogFlags, Snapshot};
use serde_json::{Map, Value, json};

/// Default minimum spacing between PID gain lines.
pub const PID_THROTTLE_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct TelemetryFormatter {
    json: bool,
    pid_throttle_ms: u64,
    last_pid_ms: Option<u64>,
}

impl TelemetryFormatter {
    pub fn new(json: bool, pid_throttle_ms: u64) -> Self {
        Self {
            json,
            pid_throttle_ms,
            last_pid_ms: None,
        }
    }

    /// Gain lines go out when more than the throttle interval has passed
    /// since the last batch.
    fn pid_due(&mut self, now_ms: u64, flags: &LogFlags) -> bool {
        if !flags.any_gain() {
            return false;
        }
        let due = self
            .last_pid_ms
            .is_none_or(|last| now_ms.saturating_sub(last) > self.pid_throttle_ms);
        if due {
            self.last_pid_ms = Some(now_ms);
        }
        due
    }

    /// Lines for one completed control cycle.
    pub fn cycle_lines(&mut self, snap: &Snapshot, flags: &LogFlags, gains: Gains) -> Vec<String> {
        let pid_due = self.pid_due(snap.at_ms, flags);
        if self.json {
            return self.json_line(snap, flags, gains, pid_due).into_iter().collect();
        }

        let mut out = Vec::new();
        if flags.sensor {
            let mut s = String::from("S");
            for v in snap.frame.iter() {
                s.push(',');
                s.push_str(&v.to_string());
            }
            out.push(s);
        }
        if flags.line {
            out.push(format!("L,{}", snap.estimate.position));
        }
        if flags.output {
            out.push(format!("O,{}", correction_from_output(snap.output)));
        }
        if pid_due {
            for (on, letter, v) in [
                (flags.kp, 'p', gains.kp),
                (flags.ki, 'i', gains.ki),
                (flags.kd, 'd', gains.kd),
            ] {
                if on {
                    out.push(format!("pid {letter} {v:.3}"));
                }
            }
        }
        out
    }

    fn json_line(
        &self,
        snap: &Snapshot,
        flags: &LogFlags,
        gains: Gains,
        pid_due: bool,
    ) -> Option<String> {
        let mut obj = Map::new();
        obj.insert("cycle".into(), json!(snap.cycle));
        obj.insert("t_ms".into(), json!(snap.at_ms));
        if flags.sensor {
            obj.insert("sensors".into(), json!(snap.frame.samples()));
        }
        if flags.line {
            obj.insert("line".into(), json!(snap.estimate.position));
            obj.insert("source".into(), json!(snap.estimate.source.as_str()));
        }
        if flags.output {
            obj.insert("output".into(), json!(correction_from_output(snap.output)));
            obj.insert("left".into(), json!(snap.left));
            obj.insert("right".into(), json!(snap.right));
        }
        if pid_due {
            let mut pid = Map::new();
            if flags.kp {
                pid.insert("p".into(), json!(gains.kp));
            }
            if flags.ki {
                pid.insert("i".into(), json!(gains.ki));
            }
            if flags.kd {
                pid.insert("d".into(), json!(gains.kd));
            }
            obj.insert("pid".into(), Value::Object(pid));
        }
        if obj.len() == 2 {
            return None;
        }
        Some(Value::Object(obj).to_string())
    }
}
