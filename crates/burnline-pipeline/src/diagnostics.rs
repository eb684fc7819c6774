//! Job diagnostics: row counts, output size, and timing.
//!
//! Every [`Rasterizer::parse`](crate::Rasterizer::parse) returns a
//! [`JobStats`] alongside the streamed output. Durations are measured
//! with the `web-time` crate (`performance.now()` on WASM,
//! `std::time::Instant` on native) and serialized as fractional seconds.

use std::fmt::Write;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Counters collected while rasterizing one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    /// Rows in the source image.
    pub rows_total: u32,
    /// Rows that produced output.
    pub rows_emitted: u32,
    /// Rows skipped because they produced no instruction.
    pub rows_skipped: u32,
    /// Instruction lines emitted for rows (header excluded).
    pub lines: usize,
    /// Bytes of G-code text sent, header included.
    pub bytes: usize,
    /// Wall-clock duration of the job.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl JobStats {
    /// Record an emitted row of `lines` lines and `bytes` bytes.
    pub const fn record_row(&mut self, lines: usize, bytes: usize) {
        self.rows_emitted += 1;
        self.lines += lines;
        self.bytes += bytes;
    }

    /// Record a row that produced nothing.
    pub const fn record_skip(&mut self) {
        self.rows_skipped += 1;
    }

    /// Human-readable multi-line summary.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Rows    : {} total", self.rows_total);
        let _ = writeln!(out, "          {} emitted", self.rows_emitted);
        let _ = writeln!(out, "          {} skipped", self.rows_skipped);
        let _ = writeln!(out, "Lines   : {}", self.lines);
        let _ = writeln!(out, "Bytes   : {}", self.bytes);
        let _ = write!(
            out,
            "Duration: {:.3}ms",
            self.duration.as_secs_f64() * 1000.0
        );
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn record_row_and_skip() {
        let mut stats = JobStats::default();
        stats.record_row(3, 40);
        stats.record_row(2, 10);
        stats.record_skip();
        assert_eq!(stats.rows_emitted, 2);
        assert_eq!(stats.rows_skipped, 1);
        assert_eq!(stats.lines, 5);
        assert_eq!(stats.bytes, 50);
    }

    #[test]
    fn report_lists_counts() {
        let stats = JobStats {
            rows_total: 4,
            rows_emitted: 3,
            rows_skipped: 1,
            lines: 12,
            bytes: 200,
            duration: Duration::from_millis(5),
        };
        let report = stats.report();
        assert!(report.contains("4 total"));
        assert!(report.contains("1 skipped"));
        assert!(report.contains("Lines   : 12"));
        assert!(report.contains("5.000ms"));
    }

    #[test]
    fn duration_serialized_as_seconds() {
        let stats = JobStats {
            duration: Duration::from_millis(1500),
            ..JobStats::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert!((json["duration"].as_f64().unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn negative_duration_rejected() {
        let json = r#"{"rows_total":0,"rows_emitted":0,"rows_skipped":0,"lines":0,"bytes":0,"duration":-1.0}"#;
        assert!(serde_json::from_str::<JobStats>(json).is_err());
    }
}
