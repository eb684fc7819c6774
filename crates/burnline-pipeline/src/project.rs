//! Grid-to-machine projection with beam-width edge compensation.
//!
//! A pixel `x` covers `[x, x + 1) * beam` on the work piece. The beam
//! centre must stop half a beam inside each burned edge, so points on a
//! left edge (row start, white-to-colored transition) move right by
//! half a beam and points on a right edge (row end, colored-to-white
//! transition) move left by the same amount. Every row is raised by
//! half a beam so its burn is centred on the pixel row.

use crate::power::PowerMapper;
use crate::types::{Point, Settings};

/// G-code motion word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    /// `G0`: positioning move, laser off.
    Rapid,
    /// `G1`: linear move at the feed rate, laser at `S`.
    Linear,
}

impl Motion {
    /// The numeric part of the G word.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Rapid => 0,
            Self::Linear => 1,
        }
    }
}

/// A point in machine coordinates, ready for emission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Move {
    pub motion: Motion,
    /// Millimetres.
    pub x: f64,
    /// Millimetres.
    pub y: f64,
    /// Laser power (`S` word).
    pub power: f64,
}

/// Converts row points into machine moves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projector {
    beam_size: f64,
    beam_offset: f64,
    mapper: PowerMapper,
    burn_white: bool,
}

impl Projector {
    /// Build a projector from job settings.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            beam_size: settings.beam_size,
            beam_offset: settings.beam_size / 2.0,
            mapper: PowerMapper::new(settings.effective_range()),
            burn_white: settings.burn_white,
        }
    }

    /// Motion used over white pixels: `G1` when `burn_white` keeps the
    /// laser in linear mode, `G0` otherwise.
    #[must_use]
    pub const fn travel(&self) -> Motion {
        if self.burn_white {
            Motion::Linear
        } else {
            Motion::Rapid
        }
    }

    /// Project one point.
    ///
    /// Points with a white burn power become rapid moves at `S0`, or
    /// `G1 S0` when `burn_white` keeps the laser in linear mode.
    #[must_use]
    pub fn project(&self, point: &Point) -> Move {
        let mut x = f64::from(point.x) * self.beam_size;
        let y = f64::from(point.y).mul_add(self.beam_size, self.beam_offset);

        let flags = point.flags;
        if flags.first || flags.entering_burn {
            x += self.beam_offset;
        } else if flags.last || flags.exiting_burn {
            x -= self.beam_offset;
        }

        let (motion, power) = if point.s.is_white() {
            (self.travel(), 0.0)
        } else {
            (Motion::Linear, self.mapper.map(point.s))
        };

        Move {
            motion,
            x,
            y,
            power,
        }
    }
}
