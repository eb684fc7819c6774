//! Shared types for the burnline raster pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so hosts can build tiles without depending on
/// `image` directly.
pub use image::RgbaImage;

/// Default edge length of a pixel tile, in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Largest supported number of decimals for a G-code word.
pub const MAX_PRECISION: u8 = 6;

/// Millimetres per inch, used to relate PPI to PPM.
pub const MM_PER_INCH: f64 = 25.4;

/// Laser power requested by one pixel.
///
/// Stored as the inverted sum of the red, green and blue channels
/// (`765 - (r + g + b)`), i.e. in thirds of a grayscale level, so that
/// white tests and equality between neighbours stay exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PixelPower(u16);

impl PixelPower {
    /// No power: a white pixel.
    pub const WHITE: Self = Self(0);

    /// Full power: a black pixel.
    pub const BLACK: Self = Self(765);

    /// Inverted average of three color channels.
    #[must_use]
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(765 - (u16::from(r) + u16::from(g) + u16::from(b)))
    }

    /// Power on the `0.0..=255.0` scale (`255 - average`).
    #[must_use]
    pub fn value(self) -> f64 {
        f64::from(self.0) / 3.0
    }

    /// Returns `true` for a fully white pixel.
    #[must_use]
    pub const fn is_white(self) -> bool {
        self.0 == 0
    }
}

/// Positional flags carried by a row point.
///
/// `first` and `last` mark the left and right physical ends of a row
/// (they stay attached to the same points when a row is reversed).
/// `entering_burn` marks a colored point preceded by a white one and
/// `exiting_burn` a white point preceded by a colored one.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointFlags {
    pub first: bool,
    pub last: bool,
    pub entering_burn: bool,
    pub exiting_burn: bool,
}

/// A grid point of one raster row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    /// Column, in pixels from the left edge.
    pub x: u32,
    /// Row, in pixels from the bottom edge (machine space).
    pub y: u32,
    /// The pixel's own power.
    pub p: PixelPower,
    /// Power applied to the segment that ends at this point.
    pub s: PixelPower,
    pub flags: PointFlags,
}

impl Point {
    /// Create a point with no flags set.
    #[must_use]
    pub fn new(x: u32, y: u32, p: PixelPower, s: PixelPower) -> Self {
        Self {
            x,
            y,
            p,
            s,
            flags: PointFlags::default(),
        }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// A `[min, max]` pair of raw machine power values (the `S` word).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerRange {
    pub min: f64,
    pub max: f64,
}

impl PowerRange {
    /// Narrow the firmware range to a percentage window of its maximum.
    ///
    /// `[0, 255]` with a `[20, 80]` % window gives `[51, 204]`.
    #[must_use]
    pub fn narrowed(self, window: PowerWindow) -> Self {
        Self {
            min: self.max / 100.0 * window.min,
            max: self.max / 100.0 * window.max,
        }
    }
}

/// A `[min, max]` window in percent of the machine power range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerWindow {
    pub min: f64,
    pub max: f64,
}

impl Default for PowerWindow {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
        }
    }
}

/// Decimal places used when formatting each coordinate word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "UPPERCASE")]
pub struct Precision {
    pub x: u8,
    pub y: u8,
    pub s: u8,
}

/// Order in which raster rows are traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Row by row along the X axis, alternating direction.
    Horizontal,
    /// Along image diagonals. Not supported yet.
    Diagonal,
}

/// Settings for one raster job.
///
/// Deserialized from the host's JSON settings (camelCase field names).
/// [`Settings::validate`] must pass before a job is started; the driver
/// runs it on every `Init` request.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Laser beam diameter in millimetres. One pixel maps to one beam
    /// diameter on the work piece.
    pub beam_size: f64,

    /// Power range configured in the firmware (e.g. `[0, 1]` for
    /// Smoothieware, `[0, 255]` for GRBL).
    pub beam_range: PowerRange,

    /// Power limits in percent of `beam_range.max`.
    #[serde(default)]
    pub beam_power: PowerWindow,

    /// Constant feed rate for the whole job, in mm/min.
    pub feed_rate: f64,

    /// Decimal places for the `X`, `Y` and `S` words.
    #[serde(default)]
    pub precision: Precision,

    /// Source image size in pixels.
    pub image_size: Dimensions,

    /// Edge length of the pixel tiles the image is delivered in.
    #[serde(default = "default_tile_size", alias = "bufferSize")]
    pub tile_size: u32,

    /// Source resolution in pixels per inch. Defaults to one pixel per
    /// beam diameter.
    #[serde(default)]
    pub ppi: Option<f64>,

    /// Drop white pixels at both ends of every row.
    #[serde(default)]
    pub trim_line: bool,

    /// Collapse runs of equal power into a single move.
    #[serde(default)]
    pub join_pixel: bool,

    /// Keep the laser in `G1` at `S0` over white pixels instead of
    /// switching to `G0`.
    #[serde(default)]
    pub burn_white: bool,

    /// Emit every word on every line, even when unchanged.
    #[serde(default)]
    pub verbose_g: bool,

    /// Scan along diagonals instead of rows.
    #[serde(default)]
    pub diagonal: bool,

    /// The upstream image was smoothed. Only reported in the header.
    #[serde(default)]
    pub smoothing: bool,
}

const fn default_tile_size() -> u32 {
    DEFAULT_TILE_SIZE
}

impl Settings {
    /// Settings with the required fields set and every option at its
    /// default.
    #[must_use]
    pub const fn new(
        beam_size: f64,
        beam_range: PowerRange,
        feed_rate: f64,
        image_size: Dimensions,
    ) -> Self {
        Self {
            beam_size,
            beam_range,
            beam_power: PowerWindow {
                min: 0.0,
                max: 100.0,
            },
            feed_rate,
            precision: Precision { x: 0, y: 0, s: 0 },
            image_size,
            tile_size: DEFAULT_TILE_SIZE,
            ppi: None,
            trim_line: false,
            join_pixel: false,
            burn_white: false,
            verbose_g: false,
            diagonal: false,
            smoothing: false,
        }
    }

    /// Check every field, returning the first violation.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidConfig`] describing the offending
    /// field.
    pub fn validate(&self) -> Result<(), RasterError> {
        let invalid = |msg: String| Err(RasterError::InvalidConfig(msg));

        if !(self.beam_size.is_finite() && self.beam_size > 0.0) {
            return invalid(format!("beamSize must be > 0, got {}", self.beam_size));
        }
        if !(self.feed_rate.is_finite() && self.feed_rate > 0.0) {
            return invalid(format!("feedRate must be > 0, got {}", self.feed_rate));
        }
        let range = self.beam_range;
        if !(range.min.is_finite() && range.max.is_finite() && 0.0 <= range.min) {
            return invalid(format!(
                "beamRange must be finite and non-negative, got [{}, {}]",
                range.min, range.max
            ));
        }
        if range.min > range.max {
            return invalid(format!(
                "beamRange.min ({}) exceeds beamRange.max ({})",
                range.min, range.max
            ));
        }
        let window = self.beam_power;
        if !((0.0..=100.0).contains(&window.min) && (0.0..=100.0).contains(&window.max)) {
            return invalid(format!(
                "beamPower must lie within [0, 100] %, got [{}, {}]",
                window.min, window.max
            ));
        }
        if window.min > window.max {
            return invalid(format!(
                "beamPower.min ({}) exceeds beamPower.max ({})",
                window.min, window.max
            ));
        }
        if self.image_size.width == 0 || self.image_size.height == 0 {
            return invalid(format!(
                "imageSize must be non-empty, got {} x {}",
                self.image_size.width, self.image_size.height
            ));
        }
        if self.tile_size == 0 {
            return invalid("tileSize must be > 0".to_string());
        }
        let precision = self.precision;
        if precision.x.max(precision.y).max(precision.s) > MAX_PRECISION {
            return invalid(format!("precision must not exceed {MAX_PRECISION} decimals"));
        }
        if let Some(ppi) = self.ppi
            && !(ppi.is_finite() && ppi > 0.0)
        {
            return invalid(format!("ppi must be > 0, got {ppi}"));
        }
        Ok(())
    }

    /// The firmware range narrowed to the configured power window.
    #[must_use]
    pub fn effective_range(&self) -> PowerRange {
        self.beam_range.narrowed(self.beam_power)
    }

    /// The configured scan mode.
    #[must_use]
    pub const fn scan_mode(&self) -> ScanMode {
        if self.diagonal {
            ScanMode::Diagonal
        } else {
            ScanMode::Horizontal
        }
    }

    /// Source resolution in pixels per inch.
    #[must_use]
    pub fn ppi(&self) -> f64 {
        self.ppi.unwrap_or(MM_PER_INCH / self.beam_size)
    }

    /// Source resolution in pixels per millimetre.
    #[must_use]
    pub fn ppm(&self) -> f64 {
        self.ppi() / MM_PER_INCH
    }

    /// Names of the enabled options, in header order.
    #[must_use]
    pub fn enabled_options(&self) -> Vec<&'static str> {
        [
            ("smoothing", self.smoothing),
            ("trimLine", self.trim_line),
            ("joinPixel", self.join_pixel),
            ("burnWhite", self.burn_white),
            ("verboseG", self.verbose_g),
            ("diagonal", self.diagonal),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect()
    }
}

/// Image axis named in an out-of-range error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::X => "x",
            Self::Y => "y",
        })
    }
}

/// Errors that can occur while loading or rasterizing a job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RasterError {
    /// Job settings are missing, malformed, or out of range.
    #[error("invalid raster configuration: {0}")]
    InvalidConfig(String),

    /// A tile or parse request arrived before `Init`.
    #[error("no job initialized")]
    NotInitialized,

    /// A tile does not fit the image or its buffer has the wrong size.
    #[error("invalid tile ({x}, {y}): {reason}")]
    InvalidTile { x: u32, y: u32, reason: String },

    /// A pixel was read from a tile that was never supplied.
    #[error("missing tile ({x}, {y})")]
    MissingTile { x: u32, y: u32 },

    /// A pixel coordinate lies outside the image.
    #[error("out of range: {axis} = {value} (limit {limit})")]
    OutOfRange { axis: Axis, value: u32, limit: u32 },

    /// Diagonal scanning has no defined traversal.
    #[error("unsupported scan mode: diagonal scanning is not implemented")]
    UnsupportedScanMode,

    /// The host asked the job to stop.
    #[error("raster job cancelled")]
    Cancelled,
}
