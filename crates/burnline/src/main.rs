//! burnline: rasterize an image file into laser engraver G-code.
//!
//! Decodes the image, splits it into tiles, and runs a raster job on a
//! worker thread while the main thread writes G-code as it arrives and
//! reports progress on stderr.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin burnline -- [OPTIONS] <IMAGE_PATH> [-o OUT.gcode]
//! ```
//!
//! Set `RUST_LOG=debug` for per-row pipeline logging.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;

use burnline_pipeline::{
    Dimensions, JobStats, PowerRange, PowerWindow, Precision, RasterError, Rasterizer, Response,
    Settings, tile_image,
};
use clap::Parser;

/// Rasterize an image into row-by-row laser G-code.
///
/// Darker pixels burn at higher power. Rows alternate direction and
/// repeated words are omitted unless `--verbose-g` is set.
#[derive(Parser)]
#[command(name = "burnline", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Write G-code to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Beam diameter in millimetres; one pixel per beam.
    #[arg(long, default_value_t = 0.1)]
    beam_size: f64,

    /// Machine power value for white.
    #[arg(long, default_value_t = 0.0)]
    range_min: f64,

    /// Machine power value for black.
    #[arg(long, default_value_t = 1.0)]
    range_max: f64,

    /// Lower end of the power window, in percent of the range.
    #[arg(long, default_value_t = 0.0)]
    power_min: f64,

    /// Upper end of the power window, in percent of the range.
    #[arg(long, default_value_t = 100.0)]
    power_max: f64,

    /// Feed rate in mm/min.
    #[arg(long, default_value_t = 1500.0)]
    feed_rate: f64,

    /// Decimal places for X.
    #[arg(long, default_value_t = 2)]
    precision_x: u8,

    /// Decimal places for Y.
    #[arg(long, default_value_t = 2)]
    precision_y: u8,

    /// Decimal places for S.
    #[arg(long, default_value_t = 0)]
    precision_s: u8,

    /// Tile edge length in pixels.
    #[arg(long, default_value_t = burnline_pipeline::types::DEFAULT_TILE_SIZE, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    tile_size: u32,

    /// Source resolution reported in the header (defaults to one pixel
    /// per beam diameter).
    #[arg(long)]
    ppi: Option<f64>,

    /// Skip white pixels at both ends of each row.
    #[arg(long)]
    trim_line: bool,

    /// Merge runs of equal pixels into one move.
    #[arg(long)]
    join_pixel: bool,

    /// Move over white pixels with `G1 S0` instead of `G0`.
    #[arg(long)]
    burn_white: bool,

    /// Write every word on every line.
    #[arg(long)]
    verbose_g: bool,

    /// Scan diagonally (not supported; fails the job).
    #[arg(long)]
    diagonal: bool,

    /// Record smoothing as enabled in the header.
    #[arg(long)]
    smoothing: bool,

    /// Full job settings as a JSON string.
    ///
    /// When provided, all other settings flags are ignored. The image
    /// size always comes from the decoded image.
    #[arg(long)]
    config_json: Option<String>,

    /// Print job statistics as JSON instead of a human-readable report.
    #[arg(long)]
    stats_json: bool,
}

/// Build [`Settings`] from CLI arguments for an image of `image_size`.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual settings flags are ignored.
fn settings_from_cli(cli: &Cli, image_size: Dimensions) -> Result<Settings, RasterError> {
    let settings = if let Some(ref json) = cli.config_json {
        let mut settings: Settings = serde_json::from_str(json)
            .map_err(|e| RasterError::InvalidConfig(format!("--config-json: {e}")))?;
        if settings.image_size != image_size {
            log::warn!(
                "--config-json image size {} x {} replaced by decoded {} x {}",
                settings.image_size.width,
                settings.image_size.height,
                image_size.width,
                image_size.height
            );
            settings.image_size = image_size;
        }
        settings
    } else {
        Settings {
            beam_power: PowerWindow {
                min: cli.power_min,
                max: cli.power_max,
            },
            precision: Precision {
                x: cli.precision_x,
                y: cli.precision_y,
                s: cli.precision_s,
            },
            tile_size: cli.tile_size,
            ppi: cli.ppi,
            trim_line: cli.trim_line,
            join_pixel: cli.join_pixel,
            burn_white: cli.burn_white,
            verbose_g: cli.verbose_g,
            diagonal: cli.diagonal,
            smoothing: cli.smoothing,
            ..Settings::new(
                cli.beam_size,
                PowerRange {
                    min: cli.range_min,
                    max: cli.range_max,
                },
                cli.feed_rate,
                image_size,
            )
        }
    };
    settings.validate()?;
    Ok(settings)
}

/// Rasterize on a worker thread while streaming chunks into `out`.
///
/// The worker is always joined, even when writing fails.
fn run(
    rasterizer: Rasterizer,
    out: &mut dyn Write,
) -> Result<Result<JobStats, RasterError>, io::Error> {
    let (tx, rx) = mpsc::channel::<Response>();
    let worker = std::thread::spawn(move || {
        let mut tx = tx;
        rasterizer.parse(&mut tx)
    });

    // Consumes `rx`, so after a write error the worker's sends are
    // dropped and it runs to completion.
    let written = stream(rx, out);
    let outcome = worker
        .join()
        .map_err(|_| io::Error::other("raster thread panicked"))?;
    written?;
    Ok(outcome)
}

/// Write every G-code chunk followed by a newline, reporting progress.
fn stream(rx: mpsc::Receiver<Response>, out: &mut dyn Write) -> io::Result<()> {
    let mut last_percent = None;
    for response in rx {
        if let Response::Gcode(chunk) = response {
            out.write_all(chunk.text.as_bytes())?;
            out.write_all(b"\n")?;
            if last_percent != Some(chunk.percent) {
                eprint!("\rProgress: {:>3}%", chunk.percent);
                last_percent = Some(chunk.percent);
            }
        }
    }
    eprintln!();
    out.flush()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let image = match image::open(&cli.image_path) {
        Ok(image) => image.to_rgba8(),
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    let image_size = Dimensions {
        width: image.width(),
        height: image.height(),
    };

    let settings = match settings_from_cli(&cli, image_size) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} x {} px)",
        cli.image_path.display(),
        image_size.width,
        image_size.height,
    );
    eprintln!("Settings: {settings:#?}");

    let cells = tile_image(&image, settings.tile_size);
    drop(image);
    let mut rasterizer = Rasterizer::new();
    let loaded = rasterizer.init(settings).and_then(|()| {
        cells
            .into_iter()
            .try_for_each(|cell| rasterizer.add_cell(cell))
    });
    if let Err(e) = loaded {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    log::info!("loaded {} tiles", rasterizer.tile_count());

    let mut out: Box<dyn Write> = match cli.output {
        Some(ref path) => match File::create(path) {
            Ok(file) => Box::new(BufWriter::new(file)),
            Err(e) => {
                eprintln!("Error creating {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let stats = match run(rasterizer, &mut out) {
        Ok(Ok(stats)) => stats,
        Ok(Err(e)) => {
            eprintln!("Raster error: {e}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("Error writing G-code: {e}");
            return ExitCode::FAILURE;
        }
    };
    drop(out);

    if cli.stats_json {
        match serde_json::to_string_pretty(&stats) {
            Ok(json) => eprintln!("{json}"),
            Err(e) => {
                eprintln!("Error serializing stats: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        eprintln!("{}", stats.report());
    }

    if let Some(ref path) = cli.output {
        eprintln!("G-code written to {} ({} bytes)", path.display(), stats.bytes);
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SIZE: Dimensions = Dimensions {
        width: 4,
        height: 3,
    };

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("burnline").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_map_to_settings() {
        let cli = cli(&[
            "in.png",
            "--beam-size",
            "0.2",
            "--range-max",
            "255",
            "--power-max",
            "80",
            "--trim-line",
            "--join-pixel",
        ]);
        let settings = settings_from_cli(&cli, SIZE).unwrap();
        assert!((settings.beam_size - 0.2).abs() < f64::EPSILON);
        assert!((settings.beam_range.max - 255.0).abs() < f64::EPSILON);
        assert!((settings.beam_power.max - 80.0).abs() < f64::EPSILON);
        assert!(settings.trim_line && settings.join_pixel);
        assert!(!settings.burn_white);
        assert_eq!(settings.image_size, SIZE);
        assert_eq!(settings.precision, Precision { x: 2, y: 2, s: 0 });
    }

    #[test]
    fn invalid_flags_rejected() {
        let cli = cli(&["in.png", "--power-min", "90", "--power-max", "10"]);
        assert!(matches!(
            settings_from_cli(&cli, SIZE),
            Err(RasterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_tile_size_rejected_by_parser() {
        assert!(Cli::try_parse_from(["burnline", "in.png", "--tile-size", "0"]).is_err());
    }

    #[test]
    fn config_json_takes_image_size_from_image() {
        let json = r#"{"beamSize":0.5,"beamRange":{"min":0,"max":1},"feedRate":800,
            "imageSize":{"width":1,"height":1},"burnWhite":true}"#;
        let cli = cli(&["in.png", "--config-json", json, "--trim-line"]);
        let settings = settings_from_cli(&cli, SIZE).unwrap();
        assert_eq!(settings.image_size, SIZE);
        assert!(settings.burn_white);
        assert!(!settings.trim_line, "flags ignored with --config-json");
    }

    #[test]
    fn malformed_config_json_rejected() {
        let cli = cli(&["in.png", "--config-json", "{"]);
        assert!(matches!(
            settings_from_cli(&cli, SIZE),
            Err(RasterError::InvalidConfig(_))
        ));
    }

    fn one_pixel() -> Settings {
        Settings::new(
            1.0,
            PowerRange { min: 0.0, max: 1.0 },
            100.0,
            Dimensions {
                width: 1,
                height: 1,
            },
        )
    }

    #[test]
    fn run_streams_every_chunk() {
        let mut rasterizer = Rasterizer::new();
        rasterizer.init(one_pixel()).unwrap();
        rasterizer
            .add_cell(burnline_pipeline::Cell {
                x: 0,
                y: 0,
                buffer: vec![0, 0, 0, 255],
            })
            .unwrap();

        let mut out = Vec::new();
        let stats = run(rasterizer, &mut out).unwrap().unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("; Generated by burnline"));
        assert!(text.ends_with("G0 X1 Y1 S0\nG1 S1\n"));
        assert_eq!(stats.bytes + 2, text.len());
    }

    /// Fails every write.
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_error_still_joins_worker() {
        let mut rasterizer = Rasterizer::new();
        rasterizer.init(one_pixel()).unwrap();
        rasterizer
            .add_cell(burnline_pipeline::Cell {
                x: 0,
                y: 0,
                buffer: vec![0, 0, 0, 255],
            })
            .unwrap();

        let err = run(rasterizer, &mut BrokenPipe).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
