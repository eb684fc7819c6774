//! Messages exchanged between a host controller and a raster job.
//!
//! Both directions are closed enums serialized as
//! `{"type": "...", "data": ...}`, so an unknown message type is a
//! deserialization error instead of a silent no-op.

use serde::{Deserialize, Serialize};

use crate::types::Settings;

/// One RGBA tile of the source image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Tile column.
    pub x: u32,
    /// Tile row, counted from the top of the image.
    pub y: u32,
    /// Row-major RGBA bytes of the (edge-clipped) tile.
    pub buffer: Vec<u8>,
}

/// Host-to-job messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Request {
    /// Reset the job with new settings. Drops previously loaded tiles.
    Init(Settings),
    /// Store one tile.
    AddCell(Cell),
    /// Rasterize the loaded tiles.
    Parse,
}

/// Which part of the output a G-code chunk carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChunkKind {
    Header,
    Row,
}

/// A unit of G-code text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcodeChunk {
    /// Newline-separated instruction lines.
    pub text: String,
    pub kind: ChunkKind,
    /// Progress in `0..=100`, non-decreasing over a job.
    pub percent: u8,
}

/// Job-to-host messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Response {
    Gcode(GcodeChunk),
    /// Rasterization finished; no further messages follow for this job.
    Done,
    /// A request failed.
    Error { message: String },
}

/// Receives job output. There is no acknowledgement: every message is
/// handed over as soon as it is produced.
pub trait Sink {
    /// Deliver one message.
    fn send(&mut self, response: Response);
}

impl Sink for Vec<Response> {
    fn send(&mut self, response: Response) {
        self.push(response);
    }
}

impl Sink for std::sync::mpsc::Sender<Response> {
    fn send(&mut self, response: Response) {
        // A host that hung up no longer wants output.
        let _ = std::sync::mpsc::Sender::send(self, response);
    }
}

/// Adapts a closure into a [`Sink`].
pub struct FnSink<F>(pub F);

impl<F: FnMut(Response)> Sink for FnSink<F> {
    fn send(&mut self, response: Response) {
        (self.0)(response);
    }
}
