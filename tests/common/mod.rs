#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::codecs::gif::GifEncoder;
use image::{Delay, Rgba, RgbaImage};
use rust_matrix_player::config::{Configuration, DecoderConfig, FilterMethod, PanelConfig};
use rust_matrix_player::error::SinkError;
use rust_matrix_player::frame::{Frame, FrameGeometry};
use rust_matrix_player::sink::FrameSink;
use tokio_util::sync::CancellationToken;

pub const RED: [u8; 4] = [255, 0, 0, 255];
pub const GREEN: [u8; 4] = [0, 255, 0, 255];
pub const BLUE: [u8; 4] = [0, 0, 255, 255];

/// 4x4 panel: 48 bytes per frame.
pub const GEOMETRY: FrameGeometry = FrameGeometry::new(4, 4);

/// Records every frame with its arrival time and cancels after `limit` frames.
#[derive(Clone)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<(Instant, Frame)>>>,
    cancel: CancellationToken,
    limit: usize,
}

impl RecordingSink {
    pub fn new(cancel: CancellationToken, limit: usize) -> Self {
        Self {
            frames: Arc::default(),
            cancel,
            limit,
        }
    }

    pub fn frames(&self) -> Vec<(Instant, Frame)> {
        self.frames.lock().unwrap().clone()
    }

    /// Dominant colour of each recorded frame, sampled at the centre.
    pub fn colors(&self) -> Vec<char> {
        self.frames()
            .iter()
            .map(|(_, frame)| dominant(frame))
            .collect()
    }
}

impl FrameSink for RecordingSink {
    fn display(&mut self, frame: &Frame) -> Result<(), SinkError> {
        let mut frames = self.frames.lock().unwrap();
        frames.push((Instant::now(), frame.clone()));
        if frames.len() >= self.limit {
            self.cancel.cancel();
        }
        Ok(())
    }
}

/// Fails on every call.
pub struct FailingSink;

impl FrameSink for FailingSink {
    fn display(&mut self, _frame: &Frame) -> Result<(), SinkError> {
        Err(SinkError::Rejected("panel unplugged".into()))
    }
}

/// `r`, `g`, `b`, `w` (white) or `k` (black) for the centre pixel.
pub fn dominant(frame: &Frame) -> char {
    let [r, g, b] = frame
        .pixel(frame.width() / 2, frame.height() / 2)
        .expect("centre pixel");
    match (r > 200, g > 200, b > 200) {
        (true, true, true) => 'w',
        (true, false, false) => 'r',
        (false, true, false) => 'g',
        (false, false, true) => 'b',
        _ if r < 50 && g < 50 && b < 50 => 'k',
        other => panic!("unexpected colour {other:?} ({r}, {g}, {b})"),
    }
}

pub fn write_png(path: &Path, color: [u8; 4]) {
    RgbaImage::from_pixel(8, 8, Rgba(color)).save(path).unwrap();
}

pub fn write_gif(path: &Path, colors: &[[u8; 4]], delay_ms: u32) {
    let file = fs::File::create(path).unwrap();
    let mut encoder = GifEncoder::new(file);
    let frames = colors.iter().map(|c| {
        image::Frame::from_parts(
            RgbaImage::from_pixel(8, 8, Rgba(*c)),
            0,
            0,
            Delay::from_numer_denom_ms(delay_ms, 1),
        )
    });
    encoder.encode_frames(frames).unwrap();
}

pub fn write_corrupt(path: &Path) {
    fs::write(path, b"\x89PNG\r\n\x1a\ndefinitely not an image").unwrap();
}

/// Short timings, a 4x4 panel, and `sh -c <script>` standing in for ffmpeg.
/// The script receives the usual decoder arguments as `$1..`.
pub fn config(media_dir: &Path, decoder_script: &str) -> Configuration {
    Configuration {
        media_dir: media_dir.to_path_buf(),
        panel: PanelConfig {
            rows: GEOMETRY.height,
            cols: GEOMETRY.width,
            ..PanelConfig::default()
        },
        static_duration: Duration::from_millis(50),
        animated_frame_delay: Duration::from_millis(10),
        rescan_backoff: Duration::from_millis(50),
        filter: FilterMethod::Nearest,
        decoder: fake_decoder(decoder_script),
        ..Configuration::default()
    }
    .validated()
    .unwrap()
}

pub fn fake_decoder(script: &str) -> DecoderConfig {
    DecoderConfig {
        program: PathBuf::from("sh"),
        global_args: vec!["-c".into(), script.into(), "fake-decoder".into()],
        realtime: false,
    }
}

/// Script emitting `n` white 4x4 frames, then exiting.
pub fn white_frames(n: usize) -> String {
    format!(
        "head -c {} /dev/zero | tr '\\000' '\\377'",
        n * GEOMETRY.byte_len()
    )
}

pub fn process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

pub fn read_pid(path: &Path) -> u32 {
    fs::read_to_string(path)
        .unwrap()
        .trim()
        .parse()
        .expect("pid file")
}
