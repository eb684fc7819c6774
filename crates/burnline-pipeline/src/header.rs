//! G-code job header.
//!
//! The header is a block of `;` comment lines describing the job
//! followed by feed-rate settings for both motion modes:
//!
//! ```text
//! ; Generated by burnline - 0.1.0
//! ; Size       : 20 x 10 mm
//! ; Resolution : 10 PPM - 254 PPI
//! ; Beam size  : 0.1 mm
//! ; Beam range : 0 to 1
//! ; Beam power : 0 to 100 %
//! ; Feed rate  : 1500 mm/min
//! ; Options    : trimLine, joinPixel
//!
//! G0 F1500
//! G1 F1500
//! ```

use crate::types::Settings;

/// Format a number for comments: at most six decimals, no trailing
/// zeros.
#[must_use]
pub fn display_number(value: f64) -> String {
    let rounded = (value * 1e6).round() / 1e6 + 0.0;
    format!("{rounded}")
}

/// Build the header text for a job.
#[must_use]
pub fn header(settings: &Settings) -> String {
    let n = display_number;
    let width = f64::from(settings.image_size.width) * settings.beam_size;
    let height = f64::from(settings.image_size.height) * settings.beam_size;
    let range = settings.effective_range();
    let window = settings.beam_power;

    let mut lines = vec![
        format!("; Generated by burnline - {}", env!("CARGO_PKG_VERSION")),
        format!("; Size       : {} x {} mm", n(width), n(height)),
        format!(
            "; Resolution : {} PPM - {} PPI",
            n(settings.ppm()),
            n(settings.ppi())
        ),
        format!("; Beam size  : {} mm", n(settings.beam_size)),
        format!("; Beam range : {} to {}", n(range.min), n(range.max)),
        format!("; Beam power : {} to {} %", n(window.min), n(window.max)),
        format!("; Feed rate  : {} mm/min", n(settings.feed_rate)),
    ];

    let options = settings.enabled_options();
    if !options.is_empty() {
        lines.push(format!("; Options    : {}", options.join(", ")));
    }

    let feed = n(settings.feed_rate);
    lines.extend([
        String::new(),
        format!("G0 F{feed}"),
        format!("G1 F{feed}"),
        String::new(),
    ]);
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Dimensions, PowerRange, PowerWindow};

    fn settings() -> Settings {
        Settings::new(
            0.1,
            PowerRange { min: 0.0, max: 1.0 },
            1500.0,
            Dimensions {
                width: 200,
                height: 100,
            },
        )
    }

    #[test]
    fn display_number_trims() {
        assert_eq!(display_number(2.0), "2");
        assert_eq!(display_number(0.1 * 3.0), "0.3");
        assert_eq!(display_number(1500.25), "1500.25");
        assert_eq!(display_number(-0.0), "0");
    }

    #[test]
    fn header_starts_with_generator_line() {
        let text = header(&settings());
        assert!(text.starts_with("; Generated by burnline - "));
    }

    #[test]
    fn header_reports_physical_size_and_resolution() {
        let text = header(&settings());
        assert!(text.contains("; Size       : 20 x 10 mm\n"));
        assert!(text.contains("; Resolution : 10 PPM - 254 PPI\n"));
        assert!(text.contains("; Beam size  : 0.1 mm\n"));
        assert!(text.contains("; Feed rate  : 1500 mm/min\n"));
    }

    #[test]
    fn header_reports_narrowed_range() {
        let s = Settings {
            beam_range: PowerRange {
                min: 0.0,
                max: 255.0,
            },
            beam_power: PowerWindow {
                min: 20.0,
                max: 80.0,
            },
            ..settings()
        };
        let text = header(&s);
        assert!(text.contains("; Beam range : 51 to 204\n"));
        assert!(text.contains("; Beam power : 20 to 80 %\n"));
    }

    #[test]
    fn options_line_only_when_enabled() {
        assert!(!header(&settings()).contains("; Options"));
        let s = Settings {
            join_pixel: true,
            trim_line: true,
            ..settings()
        };
        assert!(header(&s).contains("; Options    : trimLine, joinPixel\n"));
    }

    #[test]
    fn header_ends_with_feed_rates() {
        let text = header(&settings());
        assert!(text.ends_with("\n\nG0 F1500\nG1 F1500\n"));
    }
}
