//! Row construction: sample one raster row into an ordered point list.
//!
//! Each point marks the end of a segment the beam travels along the
//! row. On a left-to-right pass the beam burns the pixel it has just
//! crossed, so a point's burn power `s` trails one pixel behind its own
//! power `p`. On a right-to-left pass the pixel crossed is the point's
//! own, so `s = p`.
//!
//! The builder owns one buffer sized for the widest row and exposes the
//! live part of it as a `[start, end)` view. Trimming narrows the view
//! and merging compacts it in place, so no row allocates after the
//! first.

use crate::grid::PixelGrid;
use crate::types::{PixelPower, Point, RasterError};

/// Horizontal travel direction of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

impl ScanDirection {
    /// The opposite direction.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::LeftToRight => Self::RightToLeft,
            Self::RightToLeft => Self::LeftToRight,
        }
    }
}

/// Row options applied after sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineOptions {
    /// Drop white points at both ends of the row.
    pub trim: bool,
    /// Collapse runs of equal power.
    pub merge: bool,
}

/// Reusable row buffer.
#[derive(Debug, Clone)]
pub struct LineBuilder {
    points: Vec<Point>,
    start: usize,
    end: usize,
    options: LineOptions,
}

impl LineBuilder {
    /// Create a builder for rows of up to `width` pixels.
    #[must_use]
    pub fn new(width: u32, options: LineOptions) -> Self {
        Self {
            // One extra slot for the trailing point.
            points: Vec::with_capacity(width as usize + 1),
            start: 0,
            end: 0,
            options,
        }
    }

    /// The current row view.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points[self.start..self.end]
    }

    /// Build row `y` of `grid`, traversed in `direction`.
    ///
    /// Returns `None` when trimming is enabled and the row is entirely
    /// white.
    ///
    /// # Errors
    ///
    /// Propagates pixel lookup failures from [`PixelGrid::pixel_power`].
    pub fn build(
        &mut self,
        grid: &PixelGrid,
        y: u32,
        direction: ScanDirection,
    ) -> Result<Option<&[Point]>, RasterError> {
        self.sample(grid, y, direction)?;

        if self.options.trim && !self.trim() {
            return Ok(None);
        }
        if self.options.merge {
            self.merge();
        }

        self.push_trailing(grid)?;
        self.points[self.start].flags.first = true;

        let row = &mut self.points[self.start..self.end];
        if direction == ScanDirection::RightToLeft {
            row.reverse();
        }
        Ok(Some(&*row))
    }

    /// Fill the buffer with one point per column, left to right.
    fn sample(
        &mut self,
        grid: &PixelGrid,
        y: u32,
        direction: ScanDirection,
    ) -> Result<(), RasterError> {
        self.points.clear();
        let mut previous: Option<PixelPower> = None;

        for x in 0..grid.dimensions().width {
            let p = grid.pixel_power(x, y)?;
            let s = match (direction, previous) {
                (ScanDirection::LeftToRight, Some(prev)) => prev,
                _ => p,
            };

            let mut point = Point::new(x, y, p, s);
            if let Some(prev) = previous {
                point.flags.entering_burn = prev.is_white() && !p.is_white();
                point.flags.exiting_burn = !prev.is_white() && p.is_white();
            }
            self.points.push(point);
            previous = Some(p);
        }

        self.start = 0;
        self.end = self.points.len();
        Ok(())
    }

    /// Narrow the view to the outermost colored points. Returns `false`
    /// if there are none.
    fn trim(&mut self) -> bool {
        let view = &self.points[self.start..self.end];
        let Some(first) = view.iter().position(|pt| !pt.p.is_white()) else {
            return false;
        };
        // A colored point exists, so the reverse search finds one too.
        let last = view.iter().rposition(|pt| !pt.p.is_white()).unwrap_or(first);

        self.end = self.start + last + 1;
        self.start += first;
        true
    }

    /// Keep the first and last points plus every point whose power
    /// differs from its predecessor's.
    fn merge(&mut self) {
        if self.end - self.start < 2 {
            return;
        }

        let mut previous = self.points[self.start].p;
        let mut write = self.start + 1;
        for read in self.start + 1..self.end {
            let point = self.points[read];
            if read + 1 == self.end || point.p != previous {
                self.points[write] = point;
                write += 1;
            }
            previous = point.p;
        }
        self.end = write;
    }

    /// Close the row with a point one pixel past its last point.
    fn push_trailing(&mut self, grid: &PixelGrid) -> Result<(), RasterError> {
        let last = self.points[self.end - 1];
        let x = last.x + 1;
        let mut trailing = Point::new(
            x,
            last.y,
            grid.pixel_power_or(x, last.y, PixelPower::WHITE)?,
            last.s,
        );
        trailing.flags.last = true;

        if self.end < self.points.len() {
            self.points[self.end] = trailing;
        } else {
            self.points.push(trailing);
        }
        self.end += 1;
        Ok(())
    }
}
