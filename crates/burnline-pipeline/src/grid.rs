//! Sparse tile grid holding the source pixels.
//!
//! Hosts deliver the rasterized image as RGBA tiles of `tile_size`
//! pixels square (clipped at the right and bottom image edges). The
//! grid answers per-pixel power queries in machine space: `y = 0` is
//! the bottom image row, while tiles are addressed top-down like the
//! image itself.

use std::collections::HashMap;

use image::GenericImageView;

use crate::protocol::Cell;
use crate::types::{Axis, Dimensions, PixelPower, RasterError, RgbaImage};

/// Pixel storage for one job.
#[derive(Debug, Clone)]
pub struct PixelGrid {
    dimensions: Dimensions,
    tile_size: u32,
    tiles: HashMap<(u32, u32), RgbaImage>,
}

impl PixelGrid {
    /// Create an empty grid for an image of the given size.
    #[must_use]
    pub fn new(dimensions: Dimensions, tile_size: u32) -> Self {
        Self {
            dimensions,
            tile_size,
            tiles: HashMap::new(),
        }
    }

    /// Image dimensions in pixels.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Number of tiles received so far.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Pixel extent of the tile at `(tile_x, tile_y)`, or `None` when
    /// the tile lies entirely outside the image.
    #[must_use]
    pub fn tile_extent(&self, tile_x: u32, tile_y: u32) -> Option<(u32, u32)> {
        let extent = |index: u32, total: u32| {
            let origin = index.checked_mul(self.tile_size)?;
            (origin < total).then(|| (total - origin).min(self.tile_size))
        };
        Some((
            extent(tile_x, self.dimensions.width)?,
            extent(tile_y, self.dimensions.height)?,
        ))
    }

    /// Insert a tile of raw RGBA bytes. A tile sent twice replaces the
    /// previous one.
    ///
    /// The buffer either holds the tile's clipped extent or a full
    /// `tile_size` square; in the latter case pixels past the image edge
    /// are padding and never read.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidTile`] if the tile lies outside the
    /// image or `buffer` matches neither size.
    pub fn add_cell(&mut self, tile_x: u32, tile_y: u32, buffer: Vec<u8>) -> Result<(), RasterError> {
        let invalid = |reason: String| RasterError::InvalidTile {
            x: tile_x,
            y: tile_y,
            reason,
        };

        let (width, height) = self
            .tile_extent(tile_x, tile_y)
            .ok_or_else(|| invalid("tile lies outside the image".to_string()))?;

        let clipped = width as usize * height as usize * 4;
        let full = self.tile_size as usize * self.tile_size as usize * 4;
        let (width, height) = if buffer.len() == clipped {
            (width, height)
        } else if buffer.len() == full {
            (self.tile_size, self.tile_size)
        } else {
            return Err(invalid(format!(
                "expected {clipped} bytes for a {width}x{height} RGBA tile \
                 or {full} for a full tile, got {}",
                buffer.len()
            )));
        };

        let tile = RgbaImage::from_raw(width, height, buffer)
            .ok_or_else(|| invalid("buffer does not match tile dimensions".to_string()))?;
        self.tiles.insert((tile_x, tile_y), tile);
        Ok(())
    }

    /// Power of the pixel at machine coordinates `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::OutOfRange`] if either coordinate lies
    /// outside the image, and [`RasterError::MissingTile`] if the owning
    /// tile was never supplied.
    pub fn pixel_power(&self, x: u32, y: u32) -> Result<PixelPower, RasterError> {
        let Dimensions { width, height } = self.dimensions;
        if x >= width {
            return Err(RasterError::OutOfRange {
                axis: Axis::X,
                value: x,
                limit: width,
            });
        }
        if y >= height {
            return Err(RasterError::OutOfRange {
                axis: Axis::Y,
                value: y,
                limit: height,
            });
        }

        // Tiles use the image's top-left origin.
        let image_y = height - y - 1;

        let tile_x = x / self.tile_size;
        let tile_y = image_y / self.tile_size;
        let missing = RasterError::MissingTile {
            x: tile_x,
            y: tile_y,
        };
        let tile = self.tiles.get(&(tile_x, tile_y)).ok_or(missing.clone())?;

        let local_x = x - tile_x * self.tile_size;
        let local_y = image_y - tile_y * self.tile_size;
        let [r, g, b, _] = tile.get_pixel_checked(local_x, local_y).ok_or(missing)?.0;

        Ok(PixelPower::from_rgb(r, g, b))
    }

    /// Like [`pixel_power`](Self::pixel_power), but returns `default`
    /// for coordinates outside the image.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::MissingTile`] if an in-range pixel belongs
    /// to a tile that was never supplied.
    pub fn pixel_power_or(
        &self,
        x: u32,
        y: u32,
        default: PixelPower,
    ) -> Result<PixelPower, RasterError> {
        match self.pixel_power(x, y) {
            Err(RasterError::OutOfRange { .. }) => Ok(default),
            other => other,
        }
    }
}

/// Split a decoded image into tile messages of `tile_size` pixels.
///
/// Edge tiles are clipped to the image, matching what
/// [`PixelGrid::add_cell`] expects.
#[must_use]
pub fn tile_image(image: &RgbaImage, tile_size: u32) -> Vec<Cell> {
    let tile_size = tile_size.max(1);
    let (width, height) = image.dimensions();
    let columns = width.div_ceil(tile_size);
    let rows = height.div_ceil(tile_size);

    let mut cells = Vec::with_capacity(columns as usize * rows as usize);
    for tile_y in 0..rows {
        for tile_x in 0..columns {
            let x = tile_x * tile_size;
            let y = tile_y * tile_size;
            let w = tile_size.min(width - x);
            let h = tile_size.min(height - y);
            let tile = image.view(x, y, w, h).to_image();
            cells.push(Cell {
                x: tile_x,
                y: tile_y,
                buffer: tile.into_raw(),
            });
        }
    }
    cells
}
