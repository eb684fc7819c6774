//! Job orchestration: header, per-row pipeline, progress and completion.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::diagnostics::JobStats;
use crate::emit::CommandEmitter;
use crate::grid::PixelGrid;
use crate::header::header;
use crate::line::{LineBuilder, LineOptions, ScanDirection};
use crate::project::Projector;
use crate::protocol::{Cell, ChunkKind, GcodeChunk, Request, Response, Sink};
use crate::types::{RasterError, ScanMode, Settings};

/// Settings and pixels of the current job.
#[derive(Debug, Clone)]
struct Job {
    settings: Settings,
    grid: PixelGrid,
}

/// Holds one raster job and turns it into streamed G-code.
///
/// A job is started with [`init`](Self::init), fed tiles with
/// [`add_cell`](Self::add_cell), and rasterized with
/// [`parse`](Self::parse). Parsing does not consume the job: it can be
/// run again and produces the same output.
#[derive(Debug, Clone, Default)]
pub struct Rasterizer {
    job: Option<Job>,
}

impl Rasterizer {
    /// A rasterizer with no job.
    #[must_use]
    pub const fn new() -> Self {
        Self { job: None }
    }

    /// Settings of the current job, if any.
    #[must_use]
    pub fn settings(&self) -> Option<&Settings> {
        self.job.as_ref().map(|job| &job.settings)
    }

    /// Tiles loaded into the current job.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.job.as_ref().map_or(0, |job| job.grid.tile_count())
    }

    /// Start a new job, dropping any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidConfig`] if `settings` fail
    /// validation. The previous job is kept in that case.
    pub fn init(&mut self, settings: Settings) -> Result<(), RasterError> {
        settings.validate()?;
        log::debug!(
            "init: {} x {} px, tile size {}",
            settings.image_size.width,
            settings.image_size.height,
            settings.tile_size
        );
        let grid = PixelGrid::new(settings.image_size, settings.tile_size);
        self.job = Some(Job { settings, grid });
        Ok(())
    }

    /// Store one tile of the current job.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::NotInitialized`] before [`init`](Self::init)
    /// and [`RasterError::InvalidTile`] for a misplaced or mis-sized tile.
    pub fn add_cell(&mut self, cell: Cell) -> Result<(), RasterError> {
        let job = self.job.as_mut().ok_or(RasterError::NotInitialized)?;
        job.grid.add_cell(cell.x, cell.y, cell.buffer)
    }

    /// Rasterize the current job into `sink`.
    ///
    /// # Errors
    ///
    /// See [`parse_with_cancel`](Self::parse_with_cancel).
    pub fn parse<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<JobStats, RasterError> {
        self.parse_with_cancel(sink, &AtomicBool::new(false))
    }

    /// Rasterize the current job into `sink`, checking `cancel` before
    /// every row.
    ///
    /// On success the sink receives one header chunk, one chunk per
    /// non-empty row and a final [`Response::Done`]. On error nothing
    /// further is sent; the caller decides how to report it.
    ///
    /// # Errors
    ///
    /// - [`RasterError::NotInitialized`] before [`init`](Self::init).
    /// - [`RasterError::UnsupportedScanMode`] for diagonal scanning, before
    ///   any output.
    /// - [`RasterError::MissingTile`] if a row reads a tile never supplied.
    /// - [`RasterError::Cancelled`] once `cancel` is set.
    pub fn parse_with_cancel<S: Sink + ?Sized>(
        &self,
        sink: &mut S,
        cancel: &AtomicBool,
    ) -> Result<JobStats, RasterError> {
        let job = self.job.as_ref().ok_or(RasterError::NotInitialized)?;
        let settings = &job.settings;
        if settings.scan_mode() == ScanMode::Diagonal {
            return Err(RasterError::UnsupportedScanMode);
        }

        let start = web_time::Instant::now();
        let height = job.grid.dimensions().height;
        let mut stats = JobStats {
            rows_total: height,
            ..JobStats::default()
        };

        let text = header(settings);
        stats.bytes += text.len();
        sink.send(Response::Gcode(GcodeChunk {
            text,
            kind: ChunkKind::Header,
            percent: 0,
        }));

        let mut builder = LineBuilder::new(
            job.grid.dimensions().width,
            LineOptions {
                trim: settings.trim_line,
                merge: settings.join_pixel,
            },
        );
        let projector = Projector::new(settings);
        let mut emitter = CommandEmitter::new(settings.precision, settings.verbose_g);
        let mut direction = ScanDirection::default();

        for y in 0..height {
            if cancel.load(Ordering::Relaxed) {
                log::info!("job cancelled at row {y} of {height}");
                return Err(RasterError::Cancelled);
            }

            let lines = match builder.build(&job.grid, y, direction)? {
                Some(points) => {
                    let moves: Vec<_> = points.iter().map(|p| projector.project(p)).collect();
                    emitter.row(&moves, projector.travel())
                }
                None => Vec::new(),
            };

            if lines.is_empty() {
                log::debug!("row {y}: empty, skipped");
                stats.record_skip();
                continue;
            }

            let text = lines.join("\n");
            log::debug!("row {y}: {} lines, {direction:?}", lines.len());
            stats.record_row(lines.len(), text.len());
            sink.send(Response::Gcode(GcodeChunk {
                text,
                kind: ChunkKind::Row,
                percent: percent(y, height),
            }));
            direction = direction.toggled();
        }

        sink.send(Response::Done);
        stats.duration = start.elapsed();
        log::info!(
            "job done: {} rows emitted, {} skipped, {} bytes in {:.3}ms",
            stats.rows_emitted,
            stats.rows_skipped,
            stats.bytes,
            stats.duration.as_secs_f64() * 1000.0
        );
        Ok(stats)
    }

    /// Dispatch one request. Returns the job statistics for
    /// [`Request::Parse`].
    ///
    /// # Errors
    ///
    /// Propagates the error of the dispatched operation.
    pub fn handle<S: Sink + ?Sized>(
        &mut self,
        request: Request,
        sink: &mut S,
    ) -> Result<Option<JobStats>, RasterError> {
        match request {
            Request::Init(settings) => self.init(settings).map(|()| None),
            Request::AddCell(cell) => self.add_cell(cell).map(|()| None),
            Request::Parse => self.parse(sink).map(Some),
        }
    }
}

/// `round(y / height * 100)` in integer arithmetic, ties up.
fn percent(y: u32, height: u32) -> u8 {
    let (y, height) = (u64::from(y), u64::from(height));
    let value = (200 * y + height) / (2 * height);
    u8::try_from(value).unwrap_or(100)
}
