use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::frame::FrameGeometry;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Directory scanned (non-recursively) at the start of every cycle.
    pub media_dir: PathBuf,
    /// Physical panel layout; determines the composed frame size.
    pub panel: PanelConfig,
    /// How long a static image stays on the panel.
    #[serde(with = "humantime_serde")]
    pub static_duration: Duration,
    /// Delay used for animation frames whose container gives none.
    #[serde(with = "humantime_serde")]
    pub animated_frame_delay: Duration,
    /// Pause before re-scanning after an empty or unreadable directory mid-run.
    #[serde(with = "humantime_serde")]
    pub rescan_backoff: Duration,
    /// Eligible image extensions (lowercase, without dot).
    pub image_extensions: Vec<String>,
    /// Extensions handed to the external decoder as video.
    pub video_extensions: Vec<String>,
    pub playlist_order: PlaylistOrder,
    /// Optional deterministic seed for `playlist-order: shuffle`.
    pub shuffle_seed: Option<u64>,
    pub scaling: ScalingMode,
    /// Fill colour around letterboxed media when `scaling: fit`.
    pub letterbox_color: [u8; 3],
    pub filter: FilterMethod,
    pub decoder: DecoderConfig,
    pub sink: SinkConfig,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(mut self) -> Result<Self> {
        ensure!(
            !self.media_dir.as_os_str().is_empty(),
            "media-dir must be set"
        );
        self.panel.validate().context("invalid panel configuration")?;
        ensure!(
            self.static_duration > Duration::ZERO,
            "static-duration must be greater than zero"
        );
        ensure!(
            self.animated_frame_delay > Duration::ZERO,
            "animated-frame-delay must be greater than zero"
        );
        ensure!(
            self.rescan_backoff > Duration::ZERO,
            "rescan-backoff must be greater than zero"
        );
        self.image_extensions = normalize_extensions(&self.image_extensions);
        self.video_extensions = normalize_extensions(&self.video_extensions);
        ensure!(
            !self.image_extensions.is_empty() || !self.video_extensions.is_empty(),
            "at least one of image-extensions or video-extensions must be non-empty"
        );
        if let Some(ext) = self
            .image_extensions
            .iter()
            .find(|ext| self.video_extensions.contains(ext))
        {
            anyhow::bail!("extension '{ext}' is listed as both image and video");
        }
        self.decoder.validate()?;
        self.sink.validate()?;
        Ok(self)
    }

    /// Composed pixel dimensions of the whole panel chain.
    pub fn geometry(&self) -> FrameGeometry {
        self.panel.geometry()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::new(),
            panel: PanelConfig::default(),
            static_duration: Duration::from_secs(10),
            animated_frame_delay: Duration::from_millis(100),
            rescan_backoff: Duration::from_secs(5),
            image_extensions: ["png", "jpg", "jpeg", "gif"].map(String::from).to_vec(),
            video_extensions: ["mp4", "avi", "mkv", "mov", "webm", "m4v"]
                .map(String::from)
                .to_vec(),
            playlist_order: PlaylistOrder::default(),
            shuffle_seed: None,
            scaling: ScalingMode::default(),
            letterbox_color: [0, 0, 0],
            filter: FilterMethod::default(),
            decoder: DecoderConfig::default(),
            sink: SinkConfig::default(),
        }
    }
}

fn normalize_extensions(exts: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(exts.len());
    for ext in exts {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        if !ext.is_empty() && !out.contains(&ext) {
            out.push(ext);
        }
    }
    out
}

/// Layout of the LED matrix: single-panel size times chain/parallel counts.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PanelConfig {
    pub rows: u32,
    pub cols: u32,
    /// Panels daisy-chained horizontally.
    pub chain_length: u32,
    /// Chains driven in parallel, stacked vertically.
    pub parallel: u32,
    /// Wiring name of the panel HAT. Informational only: no bundled sink drives
    /// GPIO, so it is logged at startup for the external panel driver to match.
    pub hardware_mapping: String,
}

impl PanelConfig {
    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.cols * self.chain_length, self.rows * self.parallel)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.rows > 0, "panel.rows must be greater than zero");
        ensure!(self.cols > 0, "panel.cols must be greater than zero");
        ensure!(
            self.chain_length > 0,
            "panel.chain-length must be greater than zero"
        );
        ensure!(self.parallel > 0, "panel.parallel must be greater than zero");
        ensure!(
            self.cols.checked_mul(self.chain_length).is_some()
                && self.rows.checked_mul(self.parallel).is_some(),
            "panel dimensions overflow"
        );
        Ok(())
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            rows: 64,
            cols: 64,
            chain_length: 1,
            parallel: 1,
            hardware_mapping: "adafruit-hat".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaylistOrder {
    /// Sorted by file name.
    #[default]
    Alphanumeric,
    /// Reshuffled at the start of every cycle.
    Shuffle,
}

/// How media is fitted to the panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalingMode {
    /// Ignore aspect ratio and fill the panel.
    #[default]
    Stretch,
    /// Keep aspect ratio, letterbox with `letterbox-color`.
    Fit,
    /// Keep aspect ratio, crop to fill.
    Zoom,
}

impl fmt::Display for ScalingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stretch => "stretch",
            Self::Fit => "fit",
            Self::Zoom => "zoom",
        })
    }
}

/// Resampling filter for still and animated images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterMethod {
    Nearest,
    Linear,
    #[default]
    Lanczos,
}

impl From<FilterMethod> for image::imageops::FilterType {
    fn from(method: FilterMethod) -> Self {
        match method {
            FilterMethod::Nearest => image::imageops::FilterType::Nearest,
            FilterMethod::Linear => image::imageops::FilterType::Triangle,
            FilterMethod::Lanczos => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// External video decoder invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DecoderConfig {
    /// Executable name or path (looked up on `PATH`).
    pub program: PathBuf,
    /// Extra arguments placed before the standard ones (e.g. `-hwaccel auto`).
    pub global_args: Vec<String>,
    /// Read input at its native frame rate (`-re`) so output is paced by the source.
    pub realtime: bool,
}

impl DecoderConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            !self.program.as_os_str().is_empty(),
            "decoder.program must not be empty"
        );
        Ok(())
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            global_args: Vec::new(),
            realtime: true,
        }
    }
}

/// Where finished frames go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SinkConfig {
    /// Discard frames (logs at trace level).
    #[default]
    Null,
    /// Write raw RGB24 frames to a file, FIFO, or `-` for stdout.
    RawFile { path: PathBuf },
}

impl SinkConfig {
    fn validate(&self) -> Result<()> {
        if let SinkConfig::RawFile { path } = self {
            ensure!(
                !path.as_os_str().is_empty(),
                "sink.path must not be empty for raw-file sinks"
            );
        }
        Ok(())
    }
}
