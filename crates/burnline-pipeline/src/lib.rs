//! burnline-pipeline: raster image to laser G-code (sans-IO).
//!
//! A job receives its settings and the source image as RGBA tiles,
//! then streams G-code back one unit at a time:
//!
//! header -> for each row: sample -> trim -> merge -> project -> emit
//! -> done
//!
//! Rows alternate direction (boustrophedon) and the emitter drops words
//! the controller already holds, so output stays compact. This crate
//! has **no I/O dependencies**: messages go out through a [`Sink`], and
//! image decoding, files and browser glue live in the `burnline` CLI
//! and `burnline-worker` crates.

pub mod diagnostics;
pub mod driver;
pub mod emit;
pub mod grid;
pub mod header;
pub mod line;
pub mod power;
pub mod project;
pub mod protocol;
pub mod types;

pub use diagnostics::JobStats;
pub use driver::Rasterizer;
pub use grid::{PixelGrid, tile_image};
pub use protocol::{Cell, ChunkKind, FnSink, GcodeChunk, Request, Response, Sink};
pub use types::{
    Dimensions, PixelPower, Point, PowerRange, PowerWindow, Precision, RasterError, RgbaImage,
    Settings,
};

/// Rasterize a whole job into one G-code program.
///
/// Every chunk is followed by a newline, so the header's trailing blank
/// line separates it from the first row.
///
/// # Errors
///
/// Returns the first error from [`Rasterizer::init`],
/// [`Rasterizer::add_cell`] or [`Rasterizer::parse`].
pub fn rasterize(
    settings: Settings,
    cells: impl IntoIterator<Item = Cell>,
) -> Result<(String, JobStats), RasterError> {
    let mut rasterizer = Rasterizer::new();
    rasterizer.init(settings)?;
    for cell in cells {
        rasterizer.add_cell(cell)?;
    }

    let mut program = String::new();
    let stats = rasterizer.parse(&mut FnSink(|response: Response| {
        if let Response::Gcode(chunk) = response {
            program.push_str(&chunk.text);
            program.push('\n');
        }
    }))?;
    Ok((program, stats))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rasterize_single_black_pixel() {
        let settings = Settings::new(
            1.0,
            PowerRange { min: 0.0, max: 1.0 },
            100.0,
            Dimensions {
                width: 1,
                height: 1,
            },
        );
        let cells = [Cell {
            x: 0,
            y: 0,
            buffer: vec![0, 0, 0, 255],
        }];
        let (program, stats) = rasterize(settings, cells).unwrap();
        // At zero decimals both beam offsets round onto the same X.
        assert!(program.ends_with("G1 F100\n\nG0 X1 Y1 S0\nG1 S1\n"));
        assert_eq!(stats.rows_emitted, 1);
    }
}
