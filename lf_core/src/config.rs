//! Runtime configuration for the control loop.
//!
//! These are the structs the core consumes. They are separate from the
//! TOML-deserialized schema in `lf_config`; see `conversions` for the bridge.

/// Estimator gate thresholds, on the raw 0..=1023 sample scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimatorCfg {
    /// Frames with `max - min` below this are held.
    pub min_contrast: u16,
    /// Boundary sample must exceed its inward neighbour by at least this to
    /// report an edge.
    pub edge_diff_threshold: u16,
    /// Normalized sample sum below this is held.
    pub min_signal_sum: u32,
}

impl Default for EstimatorCfg {
    fn default() -> Self {
        Self {
            min_contrast: 200,
            edge_diff_threshold: 100,
            min_signal_sum: 100,
        }
    }
}

/// PID gains and optional output limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidCfg {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// `(min, max)`; `None` leaves the output unclamped.
    pub output_limits: Option<(f64, f64)>,
}

impl Default for PidCfg {
    fn default() -> Self {
        Self {
            kp: 1.0,
            ki: 0.0,
            kd: 5.0,
            output_limits: Some((-255.0, 255.0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveCfg {
    /// Forward bias applied to both wheels before steering.
    pub base_speed: i16,
    /// Enable the motor driver as part of `build()`.
    pub start_enabled: bool,
}

impl Default for DriveCfg {
    fn default() -> Self {
        Self {
            base_speed: 20,
            start_enabled: false,
        }
    }
}

/// Task cadences in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleCfg {
    pub control_ms: u64,
    pub housekeeping_ms: u64,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            control_ms: 10,
            housekeeping_ms: 100,
        }
    }
}
