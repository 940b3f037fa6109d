//! `From` implementations bridging `lf_config` types to `lf_core` types.

use crate::config::{DriveCfg, EstimatorCfg, PidCfg, ScheduleCfg};
use crate::input::{DriveAction, Keymap};
use crate::telemetry::LogFlags;

// ── EstimatorCfg ─────────────────────────────────────────────────────────────

impl From<&lf_config::SensorCfg> for EstimatorCfg {
    fn from(c: &lf_config::SensorCfg) -> Self {
        Self {
            min_contrast: c.min_contrast,
            edge_diff_threshold: c.edge_diff_threshold,
            min_signal_sum: c.min_signal_sum,
        }
    }
}

// ── PidCfg ───────────────────────────────────────────────────────────────────

impl From<&lf_config::PidCfg> for PidCfg {
    fn from(c: &lf_config::PidCfg) -> Self {
        Self {
            kp: c.kp,
            ki: c.ki,
            kd: c.kd,
            output_limits: c.clamp_output.then_some((c.output_min, c.output_max)),
        }
    }
}

// ── DriveCfg ─────────────────────────────────────────────────────────────────

impl From<&lf_config::DriveCfg> for DriveCfg {
    fn from(c: &lf_config::DriveCfg) -> Self {
        Self {
            base_speed: c.base_speed,
            start_enabled: c.start_enabled,
        }
    }
}

// ── ScheduleCfg ──────────────────────────────────────────────────────────────

impl From<&lf_config::ScheduleCfg> for ScheduleCfg {
    fn from(c: &lf_config::ScheduleCfg) -> Self {
        Self {
            control_ms: c.control_ms,
            housekeeping_ms: c.housekeeping_ms,
        }
    }
}

// ── LogFlags ─────────────────────────────────────────────────────────────────

impl From<&lf_config::TelemetryCfg> for LogFlags {
    fn from(c: &lf_config::TelemetryCfg) -> Self {
        Self {
            kp: c.kp,
            ki: c.ki,
            kd: c.kd,
            sensor: c.sensor,
            line: c.line,
            output: c.output,
        }
    }
}

// ── Keymap ───────────────────────────────────────────────────────────────────

impl From<&lf_config::RemoteBinding> for DriveAction {
    fn from(b: &lf_config::RemoteBinding) -> Self {
        match b.action {
            lf_config::RemoteAction::Stop => DriveAction::Stop,
            lf_config::RemoteAction::Start => DriveAction::Start,
            lf_config::RemoteAction::Go => DriveAction::Go {
                base_speed: b.speed.unwrap_or(0),
            },
        }
    }
}

/// Default button bindings; remote bindings from the file replace the
/// built-in ones when any are given.
impl From<&[lf_config::RemoteBinding]> for Keymap {
    fn from(bindings: &[lf_config::RemoteBinding]) -> Self {
        let mut map = Keymap::default();
        if !bindings.is_empty() {
            map.clear_remote();
            for b in bindings {
                map.bind_remote(b.code, b.into());
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unclamped_pid_has_no_limits() {
        let c = lf_config::PidCfg {
            clamp_output: false,
            ..lf_config::PidCfg::default()
        };
        assert_eq!(PidCfg::from(&c).output_limits, None);
        assert_eq!(
            PidCfg::from(&lf_config::PidCfg::default()).output_limits,
            Some((-255.0, 255.0))
        );
    }

    #[test]
    fn file_bindings_replace_builtin_remote_map() {
        let cfg = lf_config::load_toml("[[remote]]\ncode = 0x40\naction = \"go\"\nspeed = 60\n")
            .expect("parse");
        let map = Keymap::from(cfg.remote.as_slice());
        assert_eq!(map.remote(0x40), Some(DriveAction::Go { base_speed: 60 }));
        assert_eq!(map.remote(0x52), None);
        assert_eq!(
            map.button(lf_traits::ButtonId::One),
            Some(DriveAction::Start)
        );
    }

    #[test]
    fn no_file_bindings_keeps_builtin_map() {
        let none: &[lf_config::RemoteBinding] = &[];
        let map = Keymap::from(none);
        assert_eq!(map.remote(0x52), Some(DriveAction::Stop));
    }
}
