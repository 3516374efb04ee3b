use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::frame::FrameGeometry;

/// A playlist entry that could not be opened or decoded as an image.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The image subsystem rejected the content.
    #[error("cannot decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The container decoded but yielded no frames.
    #[error("{} contains no frames", .path.display())]
    Empty { path: PathBuf },
}

/// Failures of the external video decoder process.
#[derive(Debug, Error)]
pub enum DecoderError {
    /// The decoder process could not be started.
    #[error("failed to launch decoder `{program}` for {}: {source}", .path.display())]
    Launch {
        program: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The process started without a readable stdout pipe.
    #[error("decoder for {} has no stdout pipe", .0.display())]
    MissingStdout(PathBuf),

    /// Reading the raw frame stream failed.
    #[error("reading decoder output failed: {0}")]
    Read(#[source] io::Error),

    /// Reaping the decoder process failed.
    #[error("waiting for decoder exit failed: {0}")]
    Wait(#[source] io::Error),
}

/// The media directory could not be enumerated.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The configured path is missing or not a directory.
    #[error("media directory {} is missing or not a directory", .0.display())]
    BadDir(PathBuf),

    /// Listing the directory failed.
    #[error("cannot list {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// The panel driver rejected or failed a display call.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Frame size does not match what the sink was opened for.
    #[error("frame is {actual}, sink expects {expected}")]
    Geometry {
        expected: FrameGeometry,
        actual: FrameGeometry,
    },

    /// Writing to the underlying device failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Driver-specific refusal.
    #[error("sink rejected frame: {0}")]
    Rejected(String),
}

/// Conditions that end [`Player::run`](crate::tasks::player::Player::run).
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The media directory holds no eligible files before anything played.
    #[error("no media found in {}", .0.display())]
    NoMedia(PathBuf),

    /// The file given for ambient playback never produced a frame.
    #[error("{} produced no playable frames", .0.display())]
    NoPlayableMedia(PathBuf),

    /// The media directory was unreadable before anything played.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The single file given for ambient playback is unreadable.
    #[error(transparent)]
    Media(#[from] MediaError),

    /// The decoder for ambient playback could not be started.
    #[error(transparent)]
    Decoder(#[from] DecoderError),

    /// The frame sink failed; playback cannot continue.
    #[error("frame sink failed: {0}")]
    Sink(#[from] SinkError),
}
