//! Media classification: decide how a playlist entry is rendered and decode
//! the frames needed to render it.
//!
//! Images are sniffed by content, so a multi-frame GIF (or APNG, or animated
//! WebP) is animated whatever its file name says. Videos are recognised by
//! extension only; probing them is left to the external decoder.

use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat, RgbaImage};
use tracing::debug;

use crate::config::Configuration;
use crate::error::MediaError;
use crate::frame::{Frame, FrameGeometry};
use crate::processing::scale::{ScaleOptions, fit_to_panel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Static,
    Animated,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Static => "static",
            Self::Animated => "animated",
            Self::Video => "video",
        })
    }
}

/// One animation frame and how long it stays up.
#[derive(Debug, Clone)]
pub struct TimedFrame {
    pub frame: Frame,
    pub delay: Duration,
}

/// Decoded content carried from classification to rendering.
#[derive(Debug, Clone)]
pub enum Media {
    Static(Frame),
    Animated(Vec<TimedFrame>),
    /// Frames come from the external decoder at render time.
    Video,
}

/// A classified playlist entry.
#[derive(Debug, Clone)]
pub struct MediaItem {
    path: PathBuf,
    media: Media,
}

impl MediaItem {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> MediaKind {
        match self.media {
            Media::Static(_) => MediaKind::Static,
            Media::Animated(_) => MediaKind::Animated,
            Media::Video => MediaKind::Video,
        }
    }

    /// Number of pre-decoded frames; `None` for video.
    pub fn frame_count(&self) -> Option<usize> {
        match &self.media {
            Media::Static(_) => Some(1),
            Media::Animated(frames) => Some(frames.len()),
            Media::Video => None,
        }
    }

    pub fn media(&self) -> &Media {
        &self.media
    }

    pub fn into_media(self) -> Media {
        self.media
    }
}

/// Everything classification needs besides the path.
#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    pub geometry: FrameGeometry,
    /// Lowercase extensions treated as video.
    pub video_extensions: Vec<String>,
    /// Used when an animation frame carries no delay of its own.
    pub default_frame_delay: Duration,
    pub scale: ScaleOptions,
}

impl ClassifyOptions {
    pub fn from_config(cfg: &Configuration) -> Self {
        Self {
            geometry: cfg.geometry(),
            video_extensions: cfg.video_extensions.clone(),
            default_frame_delay: cfg.animated_frame_delay,
            scale: ScaleOptions {
                mode: cfg.scaling,
                filter: cfg.filter.into(),
                letterbox_color: cfg.letterbox_color,
            },
        }
    }
}

/// `true` if the file extension is in the video set (case-insensitive).
#[must_use]
pub fn is_video_path(path: &Path, video_extensions: &[String]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| video_extensions.iter().any(|v| v.eq_ignore_ascii_case(ext)))
}

/// Classify `path` and decode what rendering will need.
///
/// # Errors
/// Returns [`MediaError`] when an image cannot be read or decoded.
pub fn classify(path: &Path, opts: &ClassifyOptions) -> Result<MediaItem, MediaError> {
    if is_video_path(path, &opts.video_extensions) {
        debug!(path = %path.display(), "video by extension");
        return Ok(MediaItem {
            path: path.to_path_buf(),
            media: Media::Video,
        });
    }

    let bytes = fs::read(path).map_err(|source| MediaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let decode_err = |source: image::ImageError| MediaError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let format = image::guess_format(&bytes).map_err(decode_err)?;
    let media = match format {
        ImageFormat::Gif => {
            let decoder = GifDecoder::new(Cursor::new(&bytes)).map_err(decode_err)?;
            collect_frames(decoder.into_frames(), path, opts)?
        }
        ImageFormat::Png => {
            let decoder = PngDecoder::new(Cursor::new(&bytes)).map_err(decode_err)?;
            if decoder.is_apng().map_err(decode_err)? {
                let apng = decoder.apng().map_err(decode_err)?;
                collect_frames(apng.into_frames(), path, opts)?
            } else {
                let img = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
                still(img, &bytes, opts)
            }
        }
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(&bytes)).map_err(decode_err)?;
            if decoder.has_animation() {
                collect_frames(decoder.into_frames(), path, opts)?
            } else {
                let img = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
                still(img, &bytes, opts)
            }
        }
        other => {
            let img = image::load_from_memory_with_format(&bytes, other).map_err(decode_err)?;
            still(img, &bytes, opts)
        }
    };

    let item = MediaItem {
        path: path.to_path_buf(),
        media,
    };
    debug!(
        path = %path.display(),
        kind = %item.kind(),
        frames = item.frame_count().unwrap_or(0),
        ?format,
        "classified"
    );
    Ok(item)
}

fn still(img: DynamicImage, bytes: &[u8], opts: &ClassifyOptions) -> Media {
    let rgba = apply_orientation(img.to_rgba8(), read_orientation(bytes).unwrap_or(1));
    Media::Static(Frame::from_rgb_image(fit_to_panel(
        &rgba,
        opts.geometry,
        &opts.scale,
    )))
}

fn collect_frames(
    frames: image::Frames<'_>,
    path: &Path,
    opts: &ClassifyOptions,
) -> Result<Media, MediaError> {
    let mut out = Vec::new();
    for frame in frames {
        let frame = frame.map_err(|source| MediaError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        let delay = Duration::from(frame.delay());
        let delay = if delay.is_zero() {
            opts.default_frame_delay
        } else {
            delay
        };
        let rgb = fit_to_panel(frame.buffer(), opts.geometry, &opts.scale);
        out.push(TimedFrame {
            frame: Frame::from_rgb_image(rgb),
            delay,
        });
    }

    match out.len() {
        0 => Err(MediaError::Empty {
            path: path.to_path_buf(),
        }),
        1 => Ok(Media::Static(out.remove(0).frame)),
        _ => Ok(Media::Animated(out)),
    }
}

fn read_orientation(bytes: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0)
}

// EXIF orientations 2-8; anything else is left as stored.
fn apply_orientation(img: RgbaImage, orientation: u32) -> RgbaImage {
    use image::imageops::{flip_horizontal, flip_vertical, rotate90, rotate180, rotate270};
    match orientation {
        2 => flip_horizontal(&img),
        3 => rotate180(&img),
        4 => flip_vertical(&img),
        5 => flip_horizontal(&rotate90(&img)),
        6 => rotate90(&img),
        7 => flip_horizontal(&rotate270(&img)),
        8 => rotate270(&img),
        _ => img,
    }
}
