//! G-code text emission with redundant-word suppression.
//!
//! G-code words are modal: a controller keeps the last `G`, `X`, `Y`
//! and `S` until told otherwise. [`CommandEmitter`] remembers the last
//! formatted value of every word and drops words that would repeat it,
//! and drops whole lines when nothing changed. In verbose mode every
//! word is written every time.

use crate::project::{Motion, Move};
use crate::types::Precision;

/// A G-code word letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Word {
    G,
    X,
    Y,
    S,
}

impl Word {
    const COUNT: usize = 4;

    /// The word's letter.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::G => 'G',
            Self::X => 'X',
            Self::Y => 'Y',
            Self::S => 'S',
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Format `value` with exactly `decimals` fraction digits.
///
/// Ties round away from zero and negative zero prints as `0`.
#[must_use]
pub fn format_fixed(value: f64, decimals: u8) -> String {
    let scale = 10_f64.powi(i32::from(decimals));
    // `+ 0.0` turns a negative zero into a positive one.
    let rounded = (value * scale).round() / scale + 0.0;
    format!("{rounded:.prec$}", prec = usize::from(decimals))
}

/// Stateful word formatter for one job.
#[derive(Debug, Clone)]
pub struct CommandEmitter {
    precision: Precision,
    verbose: bool,
    last: [Option<String>; Word::COUNT],
}

impl CommandEmitter {
    /// Create an emitter with no remembered words.
    #[must_use]
    pub fn new(precision: Precision, verbose: bool) -> Self {
        Self {
            precision,
            verbose,
            last: Default::default(),
        }
    }

    /// Decimal places used for `word`.
    #[must_use]
    pub const fn decimals(&self, word: Word) -> u8 {
        match word {
            Word::X => self.precision.x,
            Word::Y => self.precision.y,
            Word::S => self.precision.s,
            Word::G => 0,
        }
    }

    /// Format one word. Returns `None`, leaving state untouched, when
    /// the formatted value equals the last one emitted and verbose mode
    /// is off.
    pub fn token(&mut self, word: Word, value: f64) -> Option<String> {
        let formatted = format_fixed(value, self.decimals(word));
        let slot = &mut self.last[word.index()];

        if !self.verbose && slot.as_deref() == Some(formatted.as_str()) {
            return None;
        }

        let token = format!("{}{formatted}", word.letter());
        *slot = Some(formatted);
        Some(token)
    }

    /// Format a full line from `(word, value)` pairs, or `None` if every
    /// word was suppressed.
    pub fn line(&mut self, words: &[(Word, f64)]) -> Option<String> {
        let tokens: Vec<String> = words
            .iter()
            .filter_map(|&(word, value)| self.token(word, value))
            .collect();

        (!tokens.is_empty()).then(|| tokens.join(" "))
    }

    /// Line for a single move.
    pub fn move_line(&mut self, m: &Move) -> Option<String> {
        self.line(&[
            (Word::G, f64::from(m.motion.code())),
            (Word::X, m.x),
            (Word::Y, m.y),
            (Word::S, m.power),
        ])
    }

    /// Emit a row of moves: a positioning move at zero power to the first
    /// move using the `travel` motion, then one line per move. Returns
    /// the non-empty lines.
    pub fn row(&mut self, moves: &[Move], travel: Motion) -> Vec<String> {
        let Some(start) = moves.first() else {
            return Vec::new();
        };

        let mut lines = Vec::with_capacity(moves.len() + 1);
        lines.extend(self.line(&[
            (Word::G, f64::from(travel.code())),
            (Word::X, start.x),
            (Word::Y, start.y),
            (Word::S, 0.0),
        ]));
        lines.extend(moves.iter().filter_map(|m| self.move_line(m)));
        lines
    }
}
