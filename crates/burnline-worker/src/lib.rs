//! Web worker entry point for burnline raster jobs.
//!
//! This crate compiles to a standalone WASM module that runs inside a
//! `Worker`. The main thread drives one job at a time with three
//! messages and receives G-code as it is produced, so a large engraving
//! can be previewed or sent to the machine before rasterization ends.
//!
//! Requests (plain JS objects):
//! - `{ type: "init", settingsJson }`: `settingsJson` is a JSON string
//!   of the job settings (camelCase field names).
//! - `{ type: "addCell", x, y, buffer }`: one RGBA tile; `x`/`y` are
//!   tile coordinates and `buffer` is a `Uint8Array`.
//! - `{ type: "parse" }`: rasterize the loaded tiles.
//!
//! Responses:
//! - `{ type: "gcode", text, kind, percent }` with `kind` either
//!   `"header"` or `"row"`.
//! - `{ type: "done" }` once a parse completes.
//! - `{ type: "error", message }` for any failed request.
//!
//! Pixel tiles arrive as raw `Uint8Array` buffers rather than JSON so
//! large images do not pay for number-array encoding.

use std::cell::RefCell;

use burnline_pipeline::{
    Cell, ChunkKind, RasterError, Rasterizer, Request, Response, Settings, Sink,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

thread_local! {
    static RASTERIZER: RefCell<Rasterizer> = const { RefCell::new(Rasterizer::new()) };
}

/// Worker entry point.
///
/// Called automatically when the WASM module is instantiated in the
/// worker context.
#[wasm_bindgen(start)]
pub fn worker_main() {
    console_error_panic_hook::set_once();

    let Some(global) = worker_scope() else {
        web_sys::console::error_1(&JsValue::from_str(
            "burnline-worker: not running in a DedicatedWorkerGlobalScope",
        ));
        return;
    };

    let onmessage =
        Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |event: web_sys::MessageEvent| {
            handle_message(&event);
        });
    global.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget(); // leaked: lives as long as the worker
}

fn worker_scope() -> Option<web_sys::DedicatedWorkerGlobalScope> {
    js_sys::global().dyn_into().ok()
}

/// Decode one message and run it against the worker's job.
fn handle_message(event: &web_sys::MessageEvent) {
    let mut sink = PostMessageSink;

    let request = match decode_request(&event.data()) {
        Ok(request) => request,
        Err(message) => {
            sink.send(Response::Error { message });
            return;
        }
    };

    let outcome = RASTERIZER.with(|rasterizer| rasterizer.borrow_mut().handle(request, &mut sink));
    if let Err(e) = outcome {
        sink.send(Response::Error {
            message: e.to_string(),
        });
    }
}

/// Read a field of the message object.
fn field(data: &JsValue, key: &str) -> Result<JsValue, String> {
    let value = js_sys::Reflect::get(data, &JsValue::from_str(key))
        .map_err(|_| format!("cannot read field {key}"))?;
    if value.is_undefined() {
        return Err(format!("missing field {key}"));
    }
    Ok(value)
}

/// Read a tile coordinate: a non-negative integer that fits `u32`.
fn coordinate(data: &JsValue, key: &str) -> Result<u32, String> {
    let value = field(data, key)?
        .as_f64()
        .ok_or_else(|| format!("{key} is not a number"))?;
    if value.fract() != 0.0 || !(0.0..=f64::from(u32::MAX)).contains(&value) {
        return Err(format!("{key} is not a tile coordinate: {value}"));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let coordinate = value as u32;
    Ok(coordinate)
}

/// Turn a JS message object into a [`Request`].
fn decode_request(data: &JsValue) -> Result<Request, String> {
    let kind = field(data, "type")?
        .as_string()
        .ok_or_else(|| "type is not a string".to_string())?;

    match kind.as_str() {
        "init" => {
            let json = field(data, "settingsJson")?
                .as_string()
                .ok_or_else(|| "settingsJson is not a string".to_string())?;
            let settings: Settings = serde_json::from_str(&json)
                .map_err(|e| RasterError::InvalidConfig(e.to_string()).to_string())?;
            Ok(Request::Init(settings))
        }
        "addCell" => {
            let buffer: js_sys::Uint8Array = field(data, "buffer")?
                .dyn_into()
                .map_err(|_| "buffer is not a Uint8Array".to_string())?;
            Ok(Request::AddCell(Cell {
                x: coordinate(data, "x")?,
                y: coordinate(data, "y")?,
                buffer: buffer.to_vec(),
            }))
        }
        "parse" => Ok(Request::Parse),
        other => Err(format!("unknown message type: {other}")),
    }
}

/// Posts every response straight back to the main thread.
struct PostMessageSink;

impl Sink for PostMessageSink {
    fn send(&mut self, response: Response) {
        let object = js_sys::Object::new();
        let set = |key: &str, val: &JsValue| {
            let _ = js_sys::Reflect::set(&object, &JsValue::from_str(key), val);
        };

        match response {
            Response::Gcode(chunk) => {
                set("type", &JsValue::from_str("gcode"));
                set("text", &JsValue::from_str(&chunk.text));
                let kind = match chunk.kind {
                    ChunkKind::Header => "header",
                    ChunkKind::Row => "row",
                };
                set("kind", &JsValue::from_str(kind));
                set("percent", &JsValue::from_f64(f64::from(chunk.percent)));
            }
            Response::Done => set("type", &JsValue::from_str("done")),
            Response::Error { message } => {
                set("type", &JsValue::from_str("error"));
                set("message", &JsValue::from_str(&message));
            }
        }

        if let Some(global) = worker_scope() {
            let _ = global.post_message(&object);
        }
    }
}
