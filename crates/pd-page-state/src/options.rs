//! Decoder configuration.

use pd_core::BrowserError;
use pd_core::BrowserResult;

pub const DEFAULT_DEVICE_SCALE_FACTOR: f32 = 1.0;

/// Knobs for [`crate::decode_page_state_with_options`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeOptions {
    /// Device scale factor folded into the page scale of version 11 streams.
    pub device_scale_factor: f32,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            device_scale_factor: DEFAULT_DEVICE_SCALE_FACTOR,
        }
    }
}

impl DecodeOptions {
    pub fn with_device_scale_factor(device_scale_factor: f32) -> BrowserResult<Self> {
        let options = Self {
            device_scale_factor,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> BrowserResult<()> {
        if !self.device_scale_factor.is_finite() || self.device_scale_factor <= 0.0 {
            return Err(BrowserError::new(
                "page_state.device_scale_factor_invalid",
                format!(
                    "device scale factor must be finite and positive, got {}",
                    self.device_scale_factor
                ),
            ));
        }

        Ok(())
    }
}
