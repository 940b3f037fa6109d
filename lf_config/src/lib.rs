#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and recorded-frame parsing for the line follower.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - The frame CSV loader enforces the `s0..s7` header and the ADC range.
use serde::Deserialize;

/// Largest value the 10-bit ADC can produce.
pub const ADC_MAX: u16 = 1023;

/// Number of channels in a recorded frame.
pub const FRAME_WIDTH: usize = 8;

/// Board wiring, BCM numbering. Only needed with real hardware.
#[derive(Debug, Deserialize, Clone)]
pub struct Pins {
    /// Drives the IR emitters of the sensor array.
    pub sensor_enable: u8,
    #[serde(default)]
    pub spi_bus: u8,
    #[serde(default)]
    pub spi_cs: u8,
    #[serde(default = "default_spi_clock_hz")]
    pub spi_clock_hz: u32,
    pub motor_enable: u8,
    pub left_forward: u8,
    pub left_reverse: u8,
    pub right_forward: u8,
    pub right_reverse: u8,
    #[serde(default = "default_pwm_hz")]
    pub pwm_hz: f64,
    /// Active-low push buttons 1..3.
    pub buttons: Option<[u8; 3]>,
}

fn default_spi_clock_hz() -> u32 {
    1_000_000
}

fn default_pwm_hz() -> f64 {
    1_000.0
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SensorCfg {
    pub min_contrast: u16,
    pub edge_diff_threshold: u16,
    pub min_signal_sum: u32,
    /// Emitter settle delay before the ADC reads (µs).
    pub settle_us: u64,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            min_contrast: 200,
            edge_diff_threshold: 100,
            min_signal_sum: 100,
            settle_us: 1_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PidCfg {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Clamp the controller output to `[output_min, output_max]`.
    pub clamp_output: bool,
    pub output_min: f64,
    pub output_max: f64,
}

impl Default for PidCfg {
    fn default() -> Self {
        Self {
            kp: 1.0,
            ki: 0.0,
            kd: 5.0,
            clamp_output: true,
            output_min: -255.0,
            output_max: 255.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DriveCfg {
    pub base_speed: i16,
    /// Per-wheel magnitude bound applied by the motor driver.
    pub max_speed: i16,
    pub start_enabled: bool,
}

impl Default for DriveCfg {
    fn default() -> Self {
        Self {
            base_speed: 20,
            max_speed: 255,
            start_enabled: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScheduleCfg {
    pub control_ms: u64,
    pub housekeeping_ms: u64,
    /// Sleep between polls when nothing ran (µs). 0 spins.
    pub idle_sleep_us: u64,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            control_ms: 10,
            housekeeping_ms: 100,
            idle_sleep_us: 200,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Initial state of the diagnostic telemetry channels.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryCfg {
    pub sensor: bool,
    pub line: bool,
    pub output: bool,
    pub kp: bool,
    pub ki: bool,
    pub kd: bool,
    /// Minimum spacing of PID gain lines (ms).
    pub pid_throttle_ms: u64,
}

impl Default for TelemetryCfg {
    fn default() -> Self {
        Self {
            sensor: true,
            line: true,
            output: true,
            kp: false,
            ki: false,
            kd: false,
            pid_throttle_ms: 100,
        }
    }
}

/// Simulated track used when no hardware is attached.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimCfg {
    /// Reading of bare floor.
    pub background: f64,
    /// Extra reading directly over the line.
    pub amplitude: f64,
    /// Line width in sensor pitches.
    pub sigma: f64,
    /// Starting lateral offset of the line, in sensor pitches (+ is right).
    pub initial_offset: f64,
    /// Offset change per unit of `left - right` wheel command.
    pub steer_gain: f64,
    /// Offset drift per control cycle from track bends.
    pub curvature: f64,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            background: 100.0,
            amplitude: 800.0,
            sigma: 0.8,
            initial_offset: -1.5,
            steer_gain: 0.0005,
            curvature: 0.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemoteAction {
    Stop,
    Start,
    /// Set base speed, then start; needs `speed`.
    Go,
}

/// One IR key binding, e.g. `{ code = 0x19, action = "go", speed = 0 }`.
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteBinding {
    pub code: u8,
    pub action: RemoteAction,
    #[serde(default)]
    pub speed: Option<i16>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub pins: Option<Pins>,
    #[serde(default)]
    pub sensor: SensorCfg,
    #[serde(default)]
    pub pid: PidCfg,
    #[serde(default)]
    pub drive: DriveCfg,
    #[serde(default)]
    pub schedule: ScheduleCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub telemetry: TelemetryCfg,
    #[serde(default)]
    pub sim: SimCfg,
    /// Remote key bindings. When non-empty they replace the built-in map.
    #[serde(default)]
    pub remote: Vec<RemoteBinding>,
}

/// A config value that is out of range or conflicts with another one.
///
/// `Config::validate` reports through this type so callers can tell a bad
/// value apart from a file that failed to load.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InvalidConfig(pub String);

macro_rules! invalid {
    ($($arg:tt)*) => {
        return Err(InvalidConfig(format!($($arg)*)).into())
    };
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// One CSV row of a recorded frame.
///
/// Expected headers:
/// s0,s1,s2,s3,s4,s5,s6,s7
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct FrameRow {
    pub s0: u16,
    pub s1: u16,
    pub s2: u16,
    pub s3: u16,
    pub s4: u16,
    pub s5: u16,
    pub s6: u16,
    pub s7: u16,
}

impl From<FrameRow> for [u16; FRAME_WIDTH] {
    fn from(r: FrameRow) -> Self {
        [r.s0, r.s1, r.s2, r.s3, r.s4, r.s5, r.s6, r.s7]
    }
}

pub fn load_frames_csv(path: &std::path::Path) -> eyre::Result<Vec<[u16; FRAME_WIDTH]>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open frames CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "frames CSV must have headers '{}', got: {}",
            expected.join(","),
            actual.join(",")
        );
    }

    let mut frames = Vec::new();
    for (idx, rec) in rdr.deserialize::<FrameRow>().enumerate() {
        let line = idx + 2;
        let frame: [u16; FRAME_WIDTH] = match rec {
            Ok(row) => row.into(),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", line, e),
        };
        if let Some(v) = frame.iter().find(|v| **v > ADC_MAX) {
            eyre::bail!("CSV row {}: sample {} exceeds ADC range 0..={}", line, v, ADC_MAX);
        }
        frames.push(frame);
    }
    if frames.is_empty() {
        eyre::bail!("frames CSV {:?} has no rows", path);
    }
    Ok(frames)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Sensor
        if self.sensor.min_contrast > ADC_MAX {
            invalid!("sensor.min_contrast must be <= {ADC_MAX}");
        }
        if self.sensor.edge_diff_threshold > ADC_MAX {
            invalid!("sensor.edge_diff_threshold must be <= {ADC_MAX}");
        }
        if self.sensor.settle_us > 100_000 {
            invalid!("sensor.settle_us is unreasonably large (>100ms)");
        }

        // PID
        for (name, v) in [
            ("kp", self.pid.kp),
            ("ki", self.pid.ki),
            ("kd", self.pid.kd),
        ] {
            if !v.is_finite() {
                invalid!("pid.{name} must be finite");
            }
        }
        if self.pid.clamp_output {
            let (lo, hi) = (self.pid.output_min, self.pid.output_max);
            if !(lo.is_finite() && hi.is_finite()) {
                invalid!("pid.output_min and pid.output_max must be finite");
            }
            if lo >= hi {
                invalid!("pid.output_min must be < pid.output_max");
            }
        }

        // Drive
        if !(1..=255).contains(&self.drive.max_speed) {
            invalid!("drive.max_speed must be in [1, 255]");
        }
        if self.drive.base_speed.unsigned_abs() > self.drive.max_speed.unsigned_abs() {
            invalid!("drive.base_speed must be within +/- drive.max_speed");
        }

        // Schedule
        if self.schedule.control_ms == 0 {
            invalid!("schedule.control_ms must be >= 1");
        }
        if self.schedule.housekeeping_ms == 0 {
            invalid!("schedule.housekeeping_ms must be >= 1");
        }
        if self.schedule.idle_sleep_us >= self.schedule.control_ms.saturating_mul(1000) {
            invalid!("schedule.idle_sleep_us must be shorter than schedule.control_ms");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            invalid!("logging.rotation must be one of: never, daily, hourly");
        }

        // Sim
        if !(self.sim.sigma.is_finite() && self.sim.sigma > 0.0) {
            invalid!("sim.sigma must be > 0");
        }
        if !(self.sim.amplitude.is_finite() && self.sim.amplitude >= 0.0) {
            invalid!("sim.amplitude must be >= 0");
        }
        if !(self.sim.background.is_finite() && self.sim.background >= 0.0) {
            invalid!("sim.background must be >= 0");
        }
        if !(self.sim.steer_gain.is_finite()
            && self.sim.curvature.is_finite()
            && self.sim.initial_offset.is_finite())
        {
            invalid!("sim.steer_gain, sim.curvature and sim.initial_offset must be finite");
        }

        // Remote
        let mut seen = std::collections::HashSet::new();
        for b in &self.remote {
            if !seen.insert(b.code) {
                invalid!("remote code 0x{:02X} is bound more than once", b.code);
            }
            match (b.action, b.speed) {
                (RemoteAction::Go, None) => {
                    invalid!("remote code 0x{:02X}: action \"go\" needs a speed", b.code)
                }
                (RemoteAction::Go, Some(s))
                    if s.unsigned_abs() > self.drive.max_speed.unsigned_abs() =>
                {
                    invalid!(
                        "remote code 0x{:02X}: speed must be within +/- drive.max_speed",
                        b.code
                    )
                }
                (RemoteAction::Stop | RemoteAction::Start, Some(_)) => {
                    invalid!(
                        "remote code 0x{:02X}: speed is only valid with action \"go\"",
                        b.code
                    )
                }
                _ => {}
            }
        }

        // Pins
        if let Some(p) = &self.pins {
            let mut outputs = vec![
                p.sensor_enable,
                p.motor_enable,
                p.left_forward,
                p.left_reverse,
                p.right_forward,
                p.right_reverse,
            ];
            outputs.extend(p.buttons.iter().flatten());
            let mut uniq = std::collections::HashSet::new();
            if let Some(dup) = outputs.iter().find(|pin| !uniq.insert(**pin)) {
                invalid!("pins: GPIO {dup} is assigned more than once");
            }
            if !(p.pwm_hz.is_finite() && p.pwm_hz > 0.0) {
                invalid!("pins.pwm_hz must be > 0");
            }
            if p.spi_clock_hz == 0 {
                invalid!("pins.spi_clock_hz must be > 0");
            }
        }

        Ok(())
    }
}
