//! External video decoder sessions.
//!
//! A session is one child process that writes raw RGB24 frames of exactly the
//! panel geometry to its stdout. Frames are read whole or not at all; a short
//! read ends the stream. Closing a session always reaps the child, whether it
//! finished on its own, is still running, or was abandoned mid-frame.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::config::{Configuration, DecoderConfig, FilterMethod, ScalingMode};
use crate::error::DecoderError;
use crate::frame::{Frame, FrameGeometry};

/// Result of pulling one frame.
#[derive(Debug)]
pub enum Pull {
    Frame(Frame),
    /// The stream ended; `trailing_bytes` of an incomplete frame were dropped.
    EndOfStream { trailing_bytes: usize },
}

/// Splits a byte stream into whole frames.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    geometry: FrameGeometry,
    finished: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, geometry: FrameGeometry) -> Self {
        Self {
            inner,
            geometry,
            finished: false,
        }
    }

    /// Read exactly one frame. Once the end of the stream (or a read error) has
    /// been seen, every later call returns `EndOfStream` without touching the
    /// underlying reader.
    pub async fn next_frame(&mut self) -> io::Result<Pull> {
        if self.finished {
            return Ok(Pull::EndOfStream { trailing_bytes: 0 });
        }
        let mut buf = vec![0u8; self.geometry.byte_len()];
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]).await {
                Ok(0) => {
                    self.finished = true;
                    return Ok(Pull::EndOfStream {
                        trailing_bytes: filled,
                    });
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.finished = true;
                    return Err(err);
                }
            }
        }
        let frame = Frame::from_raw(self.geometry, buf)
            .ok_or_else(|| io::Error::other("frame buffer length mismatch"))?;
        Ok(Pull::Frame(frame))
    }
}

/// How the decoder should fit video onto the panel.
#[derive(Debug, Clone, Copy)]
pub struct VideoOptions {
    pub geometry: FrameGeometry,
    pub scaling: ScalingMode,
    pub filter: FilterMethod,
    pub letterbox_color: [u8; 3],
}

impl VideoOptions {
    pub fn from_config(cfg: &Configuration) -> Self {
        Self {
            geometry: cfg.geometry(),
            scaling: cfg.scaling,
            filter: cfg.filter,
            letterbox_color: cfg.letterbox_color,
        }
    }
}

/// ffmpeg `-vf` chain producing exactly `opts.geometry`.
pub fn video_filter(opts: &VideoOptions) -> String {
    let (w, h) = (opts.geometry.width, opts.geometry.height);
    let flags = match opts.filter {
        FilterMethod::Nearest => "neighbor",
        FilterMethod::Linear => "bilinear",
        FilterMethod::Lanczos => "lanczos",
    };
    match opts.scaling {
        ScalingMode::Stretch => format!("scale={w}:{h}:flags={flags}"),
        ScalingMode::Fit => {
            let [r, g, b] = opts.letterbox_color;
            format!(
                "scale={w}:{h}:flags={flags}:force_original_aspect_ratio=decrease,\
                 pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=0x{r:02x}{g:02x}{b:02x}"
            )
        }
        ScalingMode::Zoom => format!(
            "scale={w}:{h}:flags={flags}:force_original_aspect_ratio=increase,crop={w}:{h}"
        ),
    }
}

/// Full argument list after the program name.
pub fn decoder_args(
    cfg: &DecoderConfig,
    path: &Path,
    opts: &VideoOptions,
    looping: bool,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = cfg.global_args.iter().map(OsString::from).collect();
    args.extend(
        ["-hide_banner", "-loglevel", "quiet", "-nostdin"]
            .into_iter()
            .map(OsString::from),
    );
    if cfg.realtime {
        args.push("-re".into());
    }
    if looping {
        args.push("-stream_loop".into());
        args.push("-1".into());
    }
    args.push("-i".into());
    args.push(path.as_os_str().to_owned());
    args.push("-an".into());
    args.push("-vf".into());
    args.push(video_filter(opts).into());
    for arg in ["-f", "rawvideo", "-pix_fmt", "rgb24", "-"] {
        args.push(arg.into());
    }
    args
}

/// A running decoder child and the reader over its stdout.
#[derive(Debug)]
pub struct DecoderSession {
    path: PathBuf,
    child: Child,
    reader: Option<FrameReader<ChildStdout>>,
    closed: bool,
}

impl DecoderSession {
    /// Launch the configured decoder for `path`.
    pub fn open(
        cfg: &DecoderConfig,
        path: &Path,
        opts: &VideoOptions,
        looping: bool,
    ) -> Result<Self, DecoderError> {
        let mut command = Command::new(&cfg.program);
        command.args(decoder_args(cfg, path, opts, looping));
        Self::spawn(command, path, opts.geometry)
    }

    /// Spawn an already-built command whose stdout carries raw frames.
    pub fn spawn(
        mut command: Command,
        path: &Path,
        geometry: FrameGeometry,
    ) -> Result<Self, DecoderError> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        let program = command.as_std().get_program().to_string_lossy().into_owned();
        let mut child = command.spawn().map_err(|source| DecoderError::Launch {
            program,
            path: path.to_path_buf(),
            source,
        })?;
        let Some(stdout) = child.stdout.take() else {
            child.start_kill().ok();
            return Err(DecoderError::MissingStdout(path.to_path_buf()));
        };
        info!(pid = child.id(), path = %path.display(), %geometry, "decoder started");
        Ok(Self {
            path: path.to_path_buf(),
            child,
            reader: Some(FrameReader::new(stdout, geometry)),
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Child pid while it has not been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Pull the next whole frame. Not cancel-safe: a dropped call may lose a
    /// partially read frame, so a cancelled session should be closed.
    pub async fn next_frame(&mut self) -> Result<Pull, DecoderError> {
        match self.reader.as_mut() {
            Some(reader) => reader.next_frame().await.map_err(DecoderError::Read),
            None => Ok(Pull::EndOfStream { trailing_bytes: 0 }),
        }
    }

    /// Terminate and reap the child. Safe to call more than once.
    pub async fn close(&mut self) -> Result<(), DecoderError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // Dropping the pipe first unblocks a child stuck writing.
        self.reader = None;
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(path = %self.path.display(), %status, "decoder already exited");
                return Ok(());
            }
            Ok(None) => {}
            Err(err) => warn!(path = %self.path.display(), error = %err, "decoder status unavailable"),
        }
        if let Some(pid) = self.child.id() {
            debug!(pid, path = %self.path.display(), "stopping decoder");
        }
        self.child.start_kill().ok();
        let status = self.child.wait().await.map_err(DecoderError::Wait)?;
        debug!(path = %self.path.display(), %status, "decoder reaped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    const GEOM: FrameGeometry = FrameGeometry::new(2, 2);

    fn opts(scaling: ScalingMode) -> VideoOptions {
        VideoOptions {
            geometry: FrameGeometry::new(64, 32),
            scaling,
            filter: FilterMethod::Lanczos,
            letterbox_color: [0, 0, 0x10],
        }
    }

    #[tokio::test]
    async fn reassembles_frames_from_small_chunks() {
        let (mut tx, rx) = tokio::io::duplex(5);
        let writer = tokio::spawn(async move {
            let data: Vec<u8> = (0..36u8).collect();
            tx.write_all(&data).await.unwrap();
        });
        let mut reader = FrameReader::new(rx, GEOM);
        for i in 0..3u8 {
            match reader.next_frame().await.unwrap() {
                Pull::Frame(frame) => assert_eq!(frame.bytes()[0], i * 12),
                other => panic!("expected frame, got {other:?}"),
            }
        }
        writer.await.unwrap();
        assert!(matches!(
            reader.next_frame().await.unwrap(),
            Pull::EndOfStream { trailing_bytes: 0 }
        ));
    }

    #[tokio::test]
    async fn partial_tail_is_dropped_and_reported() {
        let data: Vec<u8> = vec![1; 12 + 7];
        let mut reader = FrameReader::new(&data[..], GEOM);
        assert!(matches!(reader.next_frame().await.unwrap(), Pull::Frame(_)));
        assert!(matches!(
            reader.next_frame().await.unwrap(),
            Pull::EndOfStream { trailing_bytes: 7 }
        ));
    }

    #[tokio::test]
    async fn end_of_stream_is_sticky() {
        let data: Vec<u8> = Vec::new();
        let mut reader = FrameReader::new(&data[..], GEOM);
        for _ in 0..3 {
            assert!(matches!(
                reader.next_frame().await.unwrap(),
                Pull::EndOfStream { trailing_bytes: 0 }
            ));
        }
    }

    #[test]
    fn args_request_rgb24_on_stdout() {
        let cfg = DecoderConfig::default();
        let args = decoder_args(&cfg, Path::new("/m/clip.mp4"), &opts(ScalingMode::Stretch), false);
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args.last().map(String::as_str), Some("-"));
        let joined = args.join(" ");
        assert!(joined.contains("-i /m/clip.mp4"));
        assert!(joined.contains("-f rawvideo -pix_fmt rgb24"));
        assert!(joined.contains("-vf scale=64:32:flags=lanczos"));
        assert!(joined.contains("-re"));
        assert!(!joined.contains("-stream_loop"));
    }

    #[test]
    fn looping_and_global_args_are_placed_before_input() {
        let cfg = DecoderConfig {
            global_args: vec!["-hwaccel".into(), "auto".into()],
            realtime: false,
            ..DecoderConfig::default()
        };
        let args: Vec<String> = decoder_args(&cfg, Path::new("a.mkv"), &opts(ScalingMode::Zoom), true)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(&args[..2], ["-hwaccel", "auto"]);
        let input = args.iter().position(|a| a == "-i").unwrap();
        let looping = args.iter().position(|a| a == "-stream_loop").unwrap();
        assert!(looping < input);
        assert_eq!(args[looping + 1], "-1");
        assert!(!args.iter().any(|a| a == "-re"));
    }

    #[test]
    fn fit_pads_with_letterbox_color() {
        let vf = video_filter(&opts(ScalingMode::Fit));
        assert!(vf.contains("force_original_aspect_ratio=decrease"));
        assert!(vf.ends_with("pad=64:32:(ow-iw)/2:(oh-ih)/2:color=0x000010"));
    }

    #[test]
    fn zoom_crops_to_panel() {
        let vf = video_filter(&opts(ScalingMode::Zoom));
        assert!(vf.contains("force_original_aspect_ratio=increase"));
        assert!(vf.ends_with("crop=64:32"));
    }
}
