//! Operator console: line grammar, replies, and the stdin reader thread.
//!
//! ```text
//! help | ?
//! pid <p|i|d> <value|?>
//! motor speed <value|?>
//! motor start | motor stop
//! log <p|i|d|s|l|o> <on|off>
//! ir <code>            (decimal or 0x-prefixed hex)
//! button <1|2|3>
//! ```

use std::io::BufRead;
use std::thread;

use crossbeam_channel::Sender;
use lf_core::{Gain, LogChannel, TuningCommand, TuningReply};
use lf_traits::ButtonId;
use thiserror::Error;

pub const HELP: &str = "\
Available commands:
  help              - Print this help
  pid p <value>     - Set PID P coefficient
  pid p ?           - Read PID P coefficient
  pid i <value>     - Set PID I coefficient
  pid i ?           - Read PID I coefficient
  pid d <value>     - Set PID D coefficient
  pid d ?           - Read PID D coefficient
  motor speed <val> - Set motor speed
  motor speed ?     - Read motor speed
  motor start       - Start motor
  motor stop        - Stop motor
  log <type> <on|off> - Enable/disable logging
    Types: p, i, d, s, l, o
  ir <code>         - Inject a remote key code
  button <1|2|3>    - Press a board button";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    Help,
    Tune(TuningCommand),
    Press(ButtonId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("Unknown command: {0}\nType 'help' for available commands")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Invalid value '{value}': {reason}")]
    Value { value: String, reason: String },
}

const PID_USAGE: &str = "pid <p|i|d> <value> or pid <p|i|d> ?";
const MOTOR_USAGE: &str = "motor <speed|start|stop> [value|?]";
const SPEED_USAGE: &str = "motor speed <value> or motor speed ?";
const LOG_USAGE: &str = "log <p|i|d|s|l|o> <on|off>";
const IR_USAGE: &str = "ir <code>";
const BUTTON_USAGE: &str = "button <1|2|3>";

/// Parses console lines; base speeds outside `±max_speed` are rejected.
#[derive(Debug, Clone, Copy)]
pub struct Console {
    max_speed: i16,
}

impl Console {
    pub fn new(max_speed: i16) -> Self {
        Self { max_speed }
    }

    /// Parse one line. Blank lines yield `Ok(None)`.
    pub fn parse(&self, line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();
        let cmd = match head {
            "help" | "?" => ConsoleCommand::Help,
            "pid" => ConsoleCommand::Tune(parse_pid(&args)?),
            "motor" => ConsoleCommand::Tune(self.parse_motor(&args)?),
            "log" => ConsoleCommand::Tune(parse_log(&args)?),
            "ir" => ConsoleCommand::Tune(parse_ir(&args)?),
            "button" => ConsoleCommand::Press(parse_button(&args)?),
            other => return Err(ConsoleError::Unknown(other.to_string())),
        };
        Ok(Some(cmd))
    }

    fn parse_motor(&self, args: &[&str]) -> Result<TuningCommand, ConsoleError> {
        match args {
            ["start"] => Ok(TuningCommand::StartDrive),
            ["stop"] => Ok(TuningCommand::StopDrive),
            ["speed", "?"] => Ok(TuningCommand::GetBaseSpeed),
            ["speed", v] => {
                let speed: i16 = v.parse().map_err(|_| ConsoleError::Value {
                    value: (*v).to_string(),
                    reason: "expected an integer speed".into(),
                })?;
                if speed.unsigned_abs() > self.max_speed.unsigned_abs() {
                    return Err(ConsoleError::Value {
                        value: (*v).to_string(),
                        reason: format!("speed must be within +/- {}", self.max_speed),
                    });
                }
                Ok(TuningCommand::SetBaseSpeed(speed))
            }
            ["speed", ..] => Err(ConsoleError::Usage(SPEED_USAGE)),
            _ => Err(ConsoleError::Usage(MOTOR_USAGE)),
        }
    }
}

fn parse_gain(s: &str) -> Option<Gain> {
    match s {
        "p" => Some(Gain::P),
        "i" => Some(Gain::I),
        "d" => Some(Gain::D),
        _ => None,
    }
}

fn parse_pid(args: &[&str]) -> Result<TuningCommand, ConsoleError> {
    let [which, value] = args else {
        return Err(ConsoleError::Usage(PID_USAGE));
    };
    let gain = parse_gain(which).ok_or(ConsoleError::Usage(PID_USAGE))?;
    if *value == "?" {
        return Ok(TuningCommand::GetGain(gain));
    }
    let v: f64 = value.parse().map_err(|_| ConsoleError::Value {
        value: (*value).to_string(),
        reason: "expected a number".into(),
    })?;
    if !v.is_finite() {
        return Err(ConsoleError::Value {
            value: (*value).to_string(),
            reason: "gain must be finite".into(),
        });
    }
    Ok(TuningCommand::SetGain(gain, v))
}

fn parse_log(args: &[&str]) -> Result<TuningCommand, ConsoleError> {
    let [which, state] = args else {
        return Err(ConsoleError::Usage(LOG_USAGE));
    };
    let channel: LogChannel = which.parse().map_err(|()| ConsoleError::Usage(LOG_USAGE))?;
    let on = match *state {
        "on" => true,
        "off" => false,
        _ => return Err(ConsoleError::Usage(LOG_USAGE)),
    };
    Ok(TuningCommand::SetLog(channel, on))
}

fn parse_ir(args: &[&str]) -> Result<TuningCommand, ConsoleError> {
    let [code] = args else {
        return Err(ConsoleError::Usage(IR_USAGE));
    };
    let parsed = match code.strip_prefix("0x").or_else(|| code.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => code.parse::<u8>(),
    };
    parsed
        .map(TuningCommand::InjectRemote)
        .map_err(|_| ConsoleError::Value {
            value: (*code).to_string(),
            reason: "expected a code in 0..=255".into(),
        })
}

fn parse_button(args: &[&str]) -> Result<ButtonId, ConsoleError> {
    match args {
        ["1"] => Ok(ButtonId::One),
        ["2"] => Ok(ButtonId::Two),
        ["3"] => Ok(ButtonId::Three),
        _ => Err(ConsoleError::Usage(BUTTON_USAGE)),
    }
}

/// Text reply for an applied command, in the console's own syntax.
pub fn format_reply(reply: &TuningReply) -> String {
    match reply {
        TuningReply::Gain(g, v) => format!("pid {} {v:.3}", g.letter()),
        TuningReply::BaseSpeed(v) => format!("motor speed {v}"),
        TuningReply::Drive { enabled: true } => "motor started".to_string(),
        TuningReply::Drive { enabled: false } => "motor stopped".to_string(),
        TuningReply::Log(ch, on) => {
            format!("log {} {}", ch.letter(), if *on { "on" } else { "off" })
        }
    }
}

/// Forward stdin lines to `tx` from a background thread. The channel
/// disconnects when stdin reaches EOF.
pub fn spawn_stdin_reader(tx: Sender<String>) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(l) => {
                        if tx.send(l).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "console read failed");
                        break;
                    }
                }
            }
            tracing::debug!("console reader finished");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tune(line: &str) -> TuningCommand {
        match Console::new(255).parse(line) {
            Ok(Some(ConsoleCommand::Tune(c))) => c,
            other => panic!("unexpected parse of {line:?}: {other:?}"),
        }
    }

    #[rstest]
    #[case("pid p ?", TuningCommand::GetGain(Gain::P))]
    #[case("pid d 2.5", TuningCommand::SetGain(Gain::D, 2.5))]
    #[case("  pid   i   -0.25 ", TuningCommand::SetGain(Gain::I, -0.25))]
    #[case("motor speed ?", TuningCommand::GetBaseSpeed)]
    #[case("motor speed -40", TuningCommand::SetBaseSpeed(-40))]
    #[case("motor start", TuningCommand::StartDrive)]
    #[case("motor stop", TuningCommand::StopDrive)]
    #[case("log s off", TuningCommand::SetLog(LogChannel::Sensor, false))]
    #[case("log p on", TuningCommand::SetLog(LogChannel::Kp, true))]
    #[case("ir 0x52", TuningCommand::InjectRemote(0x52))]
    #[case("ir 25", TuningCommand::InjectRemote(25))]
    fn parses_valid_lines(#[case] line: &str, #[case] expected: TuningCommand) {
        assert_eq!(tune(line), expected);
    }

    #[rstest]
    #[case("help")]
    #[case("?")]
    fn help_aliases(#[case] line: &str) {
        assert_eq!(
            Console::new(255).parse(line),
            Ok(Some(ConsoleCommand::Help))
        );
    }

    #[rstest]
    #[case("button 1", ButtonId::One)]
    #[case("button 3", ButtonId::Three)]
    fn parses_button_presses(#[case] line: &str, #[case] id: ButtonId) {
        assert_eq!(
            Console::new(255).parse(line),
            Ok(Some(ConsoleCommand::Press(id)))
        );
    }

    #[test]
    fn blank_line_is_ignored() {
        assert_eq!(Console::new(255).parse("   "), Ok(None));
    }

    #[rstest]
    #[case("pid p", "Usage")]
    #[case("pid x 1.0", "Usage")]
    #[case("pid p abc", "Invalid value 'abc'")]
    #[case("pid p inf", "gain must be finite")]
    #[case("motor", "Usage")]
    #[case("motor speed", "Usage")]
    #[case("motor speed fast", "expected an integer")]
    #[case("motor speed 300", "within +/- 255")]
    #[case("log s maybe", "Usage")]
    #[case("log z on", "Usage")]
    #[case("ir 0x1ff", "0..=255")]
    #[case("button 4", "Usage: button")]
    #[case("button", "Usage: button")]
    #[case("bootloader", "Unknown command: bootloader")]
    fn rejects_malformed_lines(#[case] line: &str, #[case] needle: &str) {
        let err = Console::new(255).parse(line).expect_err("should reject");
        assert!(err.to_string().contains(needle), "got: {err}");
    }

    #[test]
    fn speed_limit_follows_max_speed() {
        let console = Console::new(100);
        assert!(console.parse("motor speed 100").is_ok());
        assert!(console.parse("motor speed -101").is_err());
    }

    #[test]
    fn replies_use_console_syntax() {
        assert_eq!(format_reply(&TuningReply::Gain(Gain::P, 1.0)), "pid p 1.000");
        assert_eq!(format_reply(&TuningReply::BaseSpeed(20)), "motor speed 20");
        assert_eq!(
            format_reply(&TuningReply::Drive { enabled: false }),
            "motor stopped"
        );
        assert_eq!(
            format_reply(&TuningReply::Log(LogChannel::Line, true)),
            "log l on"
        );
    }
}
