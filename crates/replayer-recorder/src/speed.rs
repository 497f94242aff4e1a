//! Replay speed setting
//!
//! Two inputs feed the same value: a continuous control (slider) and a
//! confirmed text field. Whichever was touched last wins.

use replayer_core::{Error, Result};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_DELAY_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedSource {
    Default,
    Control,
    Text,
}

#[derive(Debug, Clone)]
pub struct SpeedController {
    delay_ms: u64,
    source: SpeedSource,
}

impl SpeedController {
    pub fn new() -> Self {
        Self::with_default(DEFAULT_DELAY_MS)
    }

    pub fn with_default(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            source: SpeedSource::Default,
        }
    }

    /// Accept one or more ASCII digits and nothing else.
    ///
    /// Leading zeros are fine. Values too large for `u64` saturate.
    pub fn validate_text(text: &str) -> Result<u64> {
        if text.is_empty() {
            return Err(Error::validation_failed(text, "expected a whole number of milliseconds")
                .with_suggestions(vec!["Enter digits only, e.g. 250".to_string()]));
        }
        if !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::validation_failed(text, "only the digits 0-9 are allowed")
                .with_suggestions(vec!["Enter digits only, e.g. 250".to_string()]));
        }

        let value = text.bytes().fold(0u64, |acc, b| {
            acc.saturating_mul(10).saturating_add(u64::from(b - b'0'))
        });
        Ok(value)
    }

    /// Confirm a text value. On error the previous setting is kept.
    pub fn set_from_text(&mut self, text: &str) -> Result<u64> {
        let value = Self::validate_text(text)?;
        self.delay_ms = value;
        self.source = SpeedSource::Text;
        debug!("Replay delay set to {}ms from text", value);
        Ok(value)
    }

    /// Take a control position. Truncated toward zero, negative and NaN clamp to 0.
    pub fn set_from_control(&mut self, value: f64) -> u64 {
        // `as` saturates and maps NaN to 0
        let ms = value.trunc().max(0.0) as u64;
        self.delay_ms = ms;
        self.source = SpeedSource::Control;
        ms
    }

    pub fn effective_delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn source(&self) -> SpeedSource {
        self.source
    }
}

impl Default for SpeedController {
    fn default() -> Self {
        Self::new()
    }
}
