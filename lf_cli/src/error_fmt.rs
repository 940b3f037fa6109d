//! Human-readable error descriptions and structured JSON error formatting.

use lf_config::InvalidConfig;
use lf_core::{BuildError, ControlError};

/// Raised by `self-check` when the closed-loop check misses its bound.
#[derive(Debug, thiserror::Error)]
#[error("self-check failed: {0}")]
pub struct SelfCheckFailed(pub String);

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in [pid] or [schedule].\nHow to fix: Edit the config file, then rerun."
            ),
            BuildError::DriveEnable(e) => format!(
                "What happened: The motor driver could not be enabled at startup ({e}).\nLikely causes: Wrong motor_enable pin, missing GPIO permissions, or driver not powered.\nHow to fix: Check [pins] and the driver supply, or set [drive] start_enabled = false and start from the console."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<ControlError>() {
        return match ce {
            ControlError::Timeout => "What happened: A device did not answer in time.\nLikely causes: Loose wiring or the device is not powered.\nHow to fix: Check connections and power, then rerun.".to_string(),
            ControlError::Bus(msg) => format!(
                "What happened: SPI transfer failed ({msg}).\nLikely causes: SPI not enabled, wrong bus/chip select, or MCP3008 not wired.\nHow to fix: Enable SPI (raspi-config), check [pins] spi_bus/spi_cs, verify wiring."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(ic) = err.downcast_ref::<InvalidConfig>() {
        return format!(
            "What happened: Configuration is invalid ({ic}).\nLikely causes: Out-of-range or conflicting values in the TOML.\nHow to fix: Edit the config file and try again."
        );
    }

    if let Some(sc) = err.downcast_ref::<SelfCheckFailed>() {
        return format!(
            "What happened: {sc}.\nLikely causes: Gains or schedule that do not converge on the simulated track.\nHow to fix: Review [pid] and [sim] in the config, or tune live with the console."
        );
    }

    // String-based heuristics for errors coming from config loading
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("frames csv must have headers") {
        return "Invalid headers in frames CSV. Expected 's0,s1,s2,s3,s4,s5,s6,s7'.".to_string();
    }

    if lower.contains("read config") || lower.contains("parse config") {
        return format!(
            "What happened: Could not load the config file ({msg}).\nLikely causes: Wrong --config path or a TOML syntax error.\nHow to fix: Pass --config with a valid file; see etc/linefollow.toml."
        );
    }

    format!(
        "Something went wrong.\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per error class; anything unclassified returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(_) => 3,
            BuildError::DriveEnable(_) => 4,
        };
    }
    if err.downcast_ref::<InvalidConfig>().is_some() {
        return 3;
    }
    if err.downcast_ref::<ControlError>().is_some() {
        return 4;
    }
    if err.downcast_ref::<SelfCheckFailed>().is_some() {
        return 5;
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = if let Some(be) = err.downcast_ref::<BuildError>() {
        match be {
            BuildError::InvalidConfig(_) => "InvalidConfig",
            BuildError::DriveEnable(_) => "DriveEnable",
        }
    } else if err.downcast_ref::<InvalidConfig>().is_some() {
        "InvalidConfig"
    } else if err.downcast_ref::<ControlError>().is_some() {
        "Hardware"
    } else if err.downcast_ref::<SelfCheckFailed>().is_some() {
        "SelfCheck"
    } else {
        "Error"
    };
    json!({ "reason": reason, "message": humanize(err), "code": exit_code_for_error(err) })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_errors_map_to_codes() {
        let e = eyre::Report::new(BuildError::InvalidConfig("control_ms must be >= 1"));
        assert_eq!(exit_code_for_error(&e), 3);
        assert!(humanize(&e).contains("control_ms must be >= 1"));

        let e = eyre::Report::new(BuildError::DriveEnable(ControlError::Timeout));
        assert_eq!(exit_code_for_error(&e), 4);
    }

    #[test]
    fn validation_errors_map_to_invalid_config_code() {
        let e = eyre::Report::new(InvalidConfig("drive.max_speed must be in [1, 255]".into()));
        let text = humanize(&e);
        assert!(text.starts_with("What happened: Configuration is invalid"));
        assert!(text.contains("drive.max_speed"));
        assert_eq!(exit_code_for_error(&e), 3);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&e)).expect("json");
        assert_eq!(v["reason"], "InvalidConfig");
        assert_eq!(v["code"], 3);
    }

    #[test]
    fn validate_failure_from_config_is_typed() {
        let cfg = lf_config::load_toml("[drive]\nmax_speed = 0\n").expect("parse");
        let e = cfg.validate().expect_err("invalid");
        assert_eq!(exit_code_for_error(&e), 3);
    }

    #[test]
    fn untyped_errors_fall_back_to_one() {
        let e = eyre::eyre!("something odd");
        assert_eq!(exit_code_for_error(&e), 1);
        assert!(humanize(&e).starts_with("Something went wrong"));
    }

    #[test]
    fn json_error_has_reason_and_code() {
        let e = eyre::Report::new(SelfCheckFailed("offset 0.9".into()));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&e)).expect("json");
        assert_eq!(v["reason"], "SelfCheck");
        assert_eq!(v["code"], 5);
    }
}
