//! Maps `Box<dyn Error>` from trait boundaries to typed `ControlError`.
//!
//! The traits in `lf_traits` return `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed enum, with an optional feature-gated path for
//! `lf_hardware::HwError` downcasting.

use crate::error::ControlError;

/// Map a trait-boundary error to a typed `ControlError`.
///
/// Known hardware error types are downcast first, then the message is
/// inspected as a fallback.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ControlError {
    #[cfg(feature = "hardware-errors")]
    {
        use lf_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => ControlError::Timeout,
                HwError::Spi(msg) => ControlError::Bus(msg.clone()),
                other => ControlError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        ControlError::Timeout
    } else {
        ControlError::Hardware(s)
    }
}
