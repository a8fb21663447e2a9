//! Maps `Box<dyn Error>` from trait boundaries to typed `CoreError`.
//!
//! The traits in `gantry_traits` use `Box<dyn Error + Send + Sync>` for
//! maximum flexibility; this module converts those to our typed error enum,
//! with an optional feature-gated path for `gantry_hardware::HwError`
//! downcasting.

use crate::error::CoreError;

/// Map a trait-boundary error to a typed `CoreError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> CoreError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<gantry_hardware::error::HwError>() {
            return match hw {
                gantry_hardware::error::HwError::Timeout => {
                    CoreError::Io("hardware timeout".into())
                }
                other => CoreError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        CoreError::Io(s)
    } else {
        CoreError::Hardware(s)
    }
}
