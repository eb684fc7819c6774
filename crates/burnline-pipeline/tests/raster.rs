//! End-to-end rasterization through the public API.

#![allow(clippy::unwrap_used)]

use burnline_pipeline::{
    Cell, ChunkKind, Dimensions, GcodeChunk, PowerRange, PowerWindow, Precision, Rasterizer,
    Request, Response, RgbaImage, Settings, rasterize, tile_image,
};

fn gray_image(rows: &[&[u8]]) -> RgbaImage {
    let height = u32::try_from(rows.len()).unwrap();
    let width = u32::try_from(rows[0].len()).unwrap();
    RgbaImage::from_fn(width, height, |x, y| {
        let v = rows[y as usize][x as usize];
        image::Rgba([v, v, v, 255])
    })
}

fn settings_for(image: &RgbaImage) -> Settings {
    Settings {
        precision: Precision { x: 1, y: 1, s: 0 },
        ..Settings::new(
            1.0,
            PowerRange { min: 0.0, max: 1.0 },
            100.0,
            Dimensions {
                width: image.width(),
                height: image.height(),
            },
        )
    }
}

fn run(settings: Settings, image: &RgbaImage) -> Vec<Response> {
    let mut rasterizer = Rasterizer::new();
    rasterizer.init(settings.clone()).unwrap();
    for cell in tile_image(image, settings.tile_size) {
        rasterizer.add_cell(cell).unwrap();
    }
    let mut sink = Vec::new();
    rasterizer.parse(&mut sink).unwrap();
    sink
}

fn chunks(responses: &[Response], kind: ChunkKind) -> Vec<&GcodeChunk> {
    responses
        .iter()
        .filter_map(|r| match r {
            Response::Gcode(chunk) if chunk.kind == kind => Some(chunk),
            _ => None,
        })
        .collect()
}

#[test]
fn black_then_white_pixel() {
    let image = gray_image(&[&[0, 255]]);
    let settings = Settings {
        beam_power: PowerWindow {
            min: 100.0,
            max: 100.0,
        },
        ..settings_for(&image)
    };
    let responses = run(settings, &image);

    assert_eq!(responses.len(), 3);
    let header = &chunks(&responses, ChunkKind::Header)[0].text;
    assert!(header.contains("; Size       : 2 x 1 mm\n"));
    assert!(header.contains("; Beam range : 1 to 1\n"));
    assert!(header.contains("\nG0 F100\nG1 F100\n"));

    let rows = chunks(&responses, ChunkKind::Row);
    assert_eq!(rows[0].text, "G0 X0.5 Y0.5 S0\nG1 S1\nX1.5");
    assert_eq!(responses.last(), Some(&Response::Done));
}

#[test]
fn trimmed_white_row_keeps_direction() {
    // Image rows top to bottom; machine row 0 is the bottom one.
    let image = gray_image(&[&[0, 0], &[255, 255], &[0, 0]]);
    let settings = Settings {
        trim_line: true,
        ..settings_for(&image)
    };
    let responses = run(settings, &image);
    let rows = chunks(&responses, ChunkKind::Row);

    assert_eq!(rows.len(), 2);
    // Machine row 0 runs left to right.
    assert_eq!(rows[0].text, "G0 X0.5 Y0.5 S0\nG1 S1\nX1.0\nX1.5");
    // Machine row 2 is the next emitted row, so it runs right to left.
    let last_row: Vec<&str> = rows[1].text.lines().collect();
    assert_eq!(last_row.first(), Some(&"G0 Y2.5 S0"));
    assert_eq!(last_row.last(), Some(&"X0.5"));
    assert_eq!(rows[1].percent, 67);
}

#[test]
fn untrimmed_white_row_still_alternates() {
    let image = gray_image(&[&[0, 0], &[255, 255], &[0, 0]]);
    let responses = run(settings_for(&image), &image);
    let rows = chunks(&responses, ChunkKind::Row);

    assert_eq!(rows.len(), 3);
    // Rows 0 and 2 share a direction when row 1 was emitted.
    assert!(rows[2].text.ends_with("X1.5"));
}

#[test]
fn burn_white_never_switches_to_rapid() {
    let image = gray_image(&[&[255, 0, 255], &[255, 0, 255]]);
    let settings = Settings {
        burn_white: true,
        ..settings_for(&image)
    };
    let responses = run(settings, &image);
    let rows = chunks(&responses, ChunkKind::Row);

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].text, "G1 X0.5 Y0.5 S0\nX1.5\nS1\nX2.5");
    for row in rows {
        assert!(!row.text.contains("G0"), "row: {}", row.text);
        assert!(row.text.lines().all(|line| line != "G1"), "row: {}", row.text);
    }
}

#[test]
fn percent_never_decreases() {
    let image = RgbaImage::from_fn(7, 13, |x, y| {
        let v = u8::try_from((x * 31 + y * 17) % 256).unwrap();
        image::Rgba([v, v, v, 255])
    });
    let responses = run(settings_for(&image), &image);
    let percents: Vec<u8> = chunks(&responses, ChunkKind::Row)
        .iter()
        .map(|c| c.percent)
        .collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert!(percents.iter().all(|&p| p <= 100));
}

#[test]
fn feed_rate_only_in_header() {
    let image = gray_image(&[&[0, 128, 255, 64], &[32, 255, 0, 0]]);
    let responses = run(settings_for(&image), &image);
    for row in chunks(&responses, ChunkKind::Row) {
        assert!(!row.text.contains('F'), "row: {}", row.text);
        for line in row.text.lines() {
            assert!(
                line.split(' ')
                    .all(|token| matches!(token.chars().next(), Some('G' | 'X' | 'Y' | 'S'))),
                "line: {line}"
            );
        }
    }
}

#[test]
fn verbose_lines_carry_every_word() {
    let image = gray_image(&[&[0, 128, 255, 64]]);
    let settings = Settings {
        verbose_g: true,
        ..settings_for(&image)
    };
    let responses = run(settings, &image);
    for line in chunks(&responses, ChunkKind::Row)[0].text.lines() {
        assert_eq!(line.split(' ').count(), 4, "line: {line}");
    }
}

#[test]
fn merge_never_adds_lines() {
    let image = gray_image(&[&[0, 0, 0, 255, 255, 128, 128, 0]]);
    let plain = run(settings_for(&image), &image);
    let merged = run(
        Settings {
            join_pixel: true,
            ..settings_for(&image)
        },
        &image,
    );
    let count = |r: &[Response]| chunks(r, ChunkKind::Row)[0].text.lines().count();
    assert!(count(&merged) <= count(&plain));
}

#[test]
fn output_independent_of_tile_size() {
    let image = RgbaImage::from_fn(10, 7, |x, y| {
        let v = if (x + y) % 3 == 0 { 0 } else { 255 };
        image::Rgba([v, v, v, 255])
    });
    let small = run(
        Settings {
            tile_size: 3,
            ..settings_for(&image)
        },
        &image,
    );
    let large = run(settings_for(&image), &image);
    assert_eq!(small, large);
}

#[test]
fn requests_from_json() {
    let mut rasterizer = Rasterizer::new();
    let mut sink = Vec::new();
    let messages = [
        r#"{"type":"init","data":{
            "beamSize":1,"beamRange":{"min":0,"max":1},"feedRate":100,
            "imageSize":{"width":1,"height":1},"precision":{"X":1,"Y":1,"S":0}
        }}"#,
        r#"{"type":"addCell","data":{"x":0,"y":0,"buffer":[0,0,0,255]}}"#,
        r#"{"type":"parse"}"#,
    ];
    for message in messages {
        let request: Request = serde_json::from_str(message).unwrap();
        rasterizer.handle(request, &mut sink).unwrap();
    }
    let rows = chunks(&sink, ChunkKind::Row);
    assert_eq!(rows[0].text, "G0 X0.5 Y0.5 S0\nG1 S1");
    assert_eq!(sink.last(), Some(&Response::Done));
}

#[test]
fn rasterize_matches_streamed_output() {
    let image = gray_image(&[&[0, 255, 0]]);
    let settings = settings_for(&image);
    let cells: Vec<Cell> = tile_image(&image, settings.tile_size);
    let (program, stats) = rasterize(settings.clone(), cells).unwrap();

    let streamed: String = run(settings, &image)
        .iter()
        .filter_map(|r| match r {
            Response::Gcode(chunk) => Some(format!("{}\n", chunk.text)),
            _ => None,
        })
        .collect();
    assert_eq!(program, streamed);
    assert_eq!(stats.rows_emitted, 1);
}
