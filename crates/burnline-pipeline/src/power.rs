//! Grayscale-to-laser-power mapping.

use crate::types::{PixelPower, PowerRange};

/// Linear map from pixel power (`0..=255`) to the machine's `S` range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerMapper {
    range: PowerRange,
}

impl PowerMapper {
    /// Create a mapper over an already narrowed range.
    #[must_use]
    pub const fn new(range: PowerRange) -> Self {
        Self { range }
    }

    /// Map a raw `0.0..=255.0` value: `raw * (max - min) / 255 + min`.
    #[must_use]
    pub fn map_raw(&self, raw: f64) -> f64 {
        raw * (self.range.max - self.range.min) / 255.0 + self.range.min
    }

    /// Map a pixel's power to an `S` value.
    #[must_use]
    pub fn map(&self, power: PixelPower) -> f64 {
        self.map_raw(power.value())
    }
}
