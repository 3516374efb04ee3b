//! The playback scheduler: one sequential loop from directory scan to sink.
//!
//! Each cycle re-enumerates the media directory, then visits every entry in
//! order: classify, render according to kind, advance. A bad file is logged
//! and skipped. Only cancellation, a sink failure, or an empty or unreadable
//! directory before anything ever played ends [`Player::run`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::select;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::{Configuration, DecoderConfig, PlaylistOrder};
use crate::decoder::{DecoderSession, Pull, VideoOptions};
use crate::error::{MediaError, PlayerError, ScanError};
use crate::frame::Frame;
use crate::media::{self, ClassifyOptions, Media, MediaItem, TimedFrame};
use crate::scan::{self, ScanOptions};
use crate::sink::FrameSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    LoadingItem,
    RenderingStatic,
    RenderingAnimated,
    RenderingVideo,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::LoadingItem => "loading-item",
            Self::RenderingStatic => "rendering-static",
            Self::RenderingAnimated => "rendering-animated",
            Self::RenderingVideo => "rendering-video",
        })
    }
}

/// Whether the loop keeps going after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Cancelled,
}

/// How a single visit ended.
#[derive(Debug, Clone, Copy)]
struct Visit {
    flow: Flow,
    frames: u64,
}

impl Visit {
    fn skipped() -> Self {
        Self {
            flow: Flow::Continue,
            frames: 0,
        }
    }

    fn cancelled(frames: u64) -> Self {
        Self {
            flow: Flow::Cancelled,
            frames,
        }
    }
}

pub struct Player<S> {
    media_dir: PathBuf,
    scan: ScanOptions,
    order: PlaylistOrder,
    rng: StdRng,
    classify: Arc<ClassifyOptions>,
    video: VideoOptions,
    decoder: DecoderConfig,
    static_duration: Duration,
    rescan_backoff: Duration,
    sink: S,
    cancel: CancellationToken,
    state: PlaybackState,
    frames_pushed: u64,
}

impl<S: FrameSink> Player<S> {
    /// Build a player from validated configuration.
    pub fn new(cfg: &Configuration, sink: S, cancel: CancellationToken) -> Self {
        let rng = match cfg.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            media_dir: cfg.media_dir.clone(),
            scan: ScanOptions::from_config(cfg),
            order: cfg.playlist_order,
            rng,
            classify: Arc::new(ClassifyOptions::from_config(cfg)),
            video: VideoOptions::from_config(cfg),
            decoder: cfg.decoder.clone(),
            static_duration: cfg.static_duration,
            rescan_backoff: cfg.rescan_backoff,
            sink,
            cancel,
            state: PlaybackState::Idle,
            frames_pushed: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Total frames handed to the sink so far.
    pub fn frames_pushed(&self) -> u64 {
        self.frames_pushed
    }

    /// Cycle through the media directory until cancelled.
    ///
    /// # Errors
    /// [`PlayerError::NoMedia`] or [`PlayerError::Scan`] if the directory is
    /// empty or unreadable before anything has played, and
    /// [`PlayerError::Sink`] as soon as the sink fails. A cycle whose entries
    /// all fail is retried after the rescan backoff.
    #[instrument(skip(self), fields(dir = %self.media_dir.display()))]
    pub async fn run(&mut self) -> Result<(), PlayerError> {
        let mut ever_played = false;
        let mut cycle: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.set_state(PlaybackState::Idle);

            let entries = match self.next_cycle() {
                Ok(entries) if !entries.is_empty() => entries,
                Ok(_) if !ever_played => return Err(PlayerError::NoMedia(self.media_dir.clone())),
                Err(err) if !ever_played => return Err(err.into()),
                Ok(_) => {
                    warn!("media directory is empty; waiting before rescanning");
                    if self.pause(self.rescan_backoff).await == Flow::Cancelled {
                        break;
                    }
                    continue;
                }
                Err(err) => {
                    warn!(error = %err, "media directory scan failed; waiting before rescanning");
                    if self.pause(self.rescan_backoff).await == Flow::Cancelled {
                        break;
                    }
                    continue;
                }
            };

            cycle += 1;
            info!(cycle, entries = entries.len(), "starting playlist cycle");

            let mut played_this_cycle = 0usize;
            for path in &entries {
                let visit = self.visit(path).await?;
                if visit.frames > 0 {
                    played_this_cycle += 1;
                }
                if visit.flow == Flow::Cancelled {
                    self.set_state(PlaybackState::Idle);
                    info!("playback cancelled");
                    return Ok(());
                }
            }

            if played_this_cycle == 0 {
                warn!(cycle, "nothing in this cycle could be played; waiting before rescanning");
                if self.pause(self.rescan_backoff).await == Flow::Cancelled {
                    break;
                }
            } else {
                ever_played = true;
            }
            debug!(cycle, played = played_this_cycle, "playlist cycle complete");
        }

        self.set_state(PlaybackState::Idle);
        info!("playback cancelled");
        Ok(())
    }

    /// Play one file on its own until cancelled: videos loop at the decoder,
    /// animations repeat, stills stay up.
    ///
    /// # Errors
    /// Unlike playlist mode, an unreadable file or a decoder that cannot be
    /// launched is fatal here.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn run_single(&mut self, path: &Path) -> Result<(), PlayerError> {
        self.set_state(PlaybackState::LoadingItem);
        let Some(loaded) = self.load(path).await else {
            self.set_state(PlaybackState::Idle);
            return Ok(());
        };
        let item = loaded?;
        info!(kind = %item.kind(), "ambient playback");

        match item.into_media() {
            Media::Static(frame) => {
                self.set_state(PlaybackState::RenderingStatic);
                self.push(&frame)?;
                self.cancel.cancelled().await;
            }
            Media::Animated(frames) => {
                self.set_state(PlaybackState::RenderingAnimated);
                while self.animate(&frames, true).await?.flow == Flow::Continue {}
            }
            Media::Video => {
                self.set_state(PlaybackState::RenderingVideo);
                loop {
                    let mut session = DecoderSession::open(&self.decoder, path, &self.video, true)?;
                    let visit = self.stream(&mut session).await?;
                    if visit.flow == Flow::Cancelled {
                        break;
                    }
                    if visit.frames == 0 {
                        return Err(PlayerError::NoPlayableMedia(path.to_path_buf()));
                    }
                    info!(frames = visit.frames, "looping decoder ended; restarting");
                }
            }
        }

        self.set_state(PlaybackState::Idle);
        info!("playback cancelled");
        Ok(())
    }

    fn next_cycle(&mut self) -> Result<Vec<PathBuf>, ScanError> {
        let mut entries = scan::enumerate(&self.media_dir, &self.scan)?;
        scan::apply_order(&mut entries, self.order, &mut self.rng);
        Ok(entries)
    }

    /// Classify and render one playlist entry.
    async fn visit(&mut self, path: &Path) -> Result<Visit, PlayerError> {
        self.set_state(PlaybackState::LoadingItem);
        let item = match self.load(path).await {
            None => return Ok(Visit::cancelled(0)),
            Some(Ok(item)) => item,
            Some(Err(err)) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable media");
                return Ok(Visit::skipped());
            }
        };
        info!(path = %path.display(), kind = %item.kind(), frames = item.frame_count(), "playing");

        match item.into_media() {
            Media::Static(frame) => {
                self.set_state(PlaybackState::RenderingStatic);
                self.push(&frame)?;
                let flow = self.pause(self.static_duration).await;
                Ok(Visit { flow, frames: 1 })
            }
            Media::Animated(frames) => {
                self.set_state(PlaybackState::RenderingAnimated);
                self.animate(&frames, false).await
            }
            Media::Video => {
                self.set_state(PlaybackState::RenderingVideo);
                match DecoderSession::open(&self.decoder, path, &self.video, false) {
                    Ok(mut session) => self.stream(&mut session).await,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping video");
                        Ok(Visit::skipped())
                    }
                }
            }
        }
    }

    /// Classify off the runtime thread. `None` means cancelled first.
    async fn load(&self, path: &Path) -> Option<Result<MediaItem, MediaError>> {
        let opts = Arc::clone(&self.classify);
        let owned = path.to_path_buf();
        let task = tokio::task::spawn_blocking(move || media::classify(&owned, &opts));
        let joined = select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            joined = task => joined,
        };
        match joined {
            Ok(result) => Some(result),
            Err(err) => Some(Err(MediaError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other(err),
            })),
        }
    }

    /// Push each frame once, waiting its delay before the next one. The last
    /// frame's delay is only honoured with `hold_last`, when the animation
    /// wraps around to its first frame.
    async fn animate(
        &mut self,
        frames: &[TimedFrame],
        hold_last: bool,
    ) -> Result<Visit, PlayerError> {
        let mut shown = 0;
        for (i, timed) in frames.iter().enumerate() {
            self.push(&timed.frame)?;
            shown += 1;
            if i + 1 == frames.len() && !hold_last {
                break;
            }
            if self.pause(timed.delay).await == Flow::Cancelled {
                return Ok(Visit::cancelled(shown));
            }
        }
        Ok(Visit {
            flow: Flow::Continue,
            frames: shown,
        })
    }

    /// Pump a decoder session into the sink, then close it on every path.
    async fn stream(&mut self, session: &mut DecoderSession) -> Result<Visit, PlayerError> {
        let outcome = self.pump(session).await;
        if let Err(err) = session.close().await {
            warn!(path = %session.path().display(), error = %err, "failed to reap decoder");
        }
        outcome
    }

    async fn pump(&mut self, session: &mut DecoderSession) -> Result<Visit, PlayerError> {
        let cancel = self.cancel.clone();
        let mut frames = 0;
        loop {
            let pulled = select! {
                biased;
                _ = cancel.cancelled() => return Ok(Visit::cancelled(frames)),
                pulled = session.next_frame() => pulled,
            };
            match pulled {
                Ok(Pull::Frame(frame)) => {
                    self.push(&frame)?;
                    frames += 1;
                }
                Ok(Pull::EndOfStream { trailing_bytes }) => {
                    debug!(
                        path = %session.path().display(),
                        frames,
                        trailing_bytes,
                        "decoder stream ended"
                    );
                    break;
                }
                Err(err) => {
                    warn!(path = %session.path().display(), frames, error = %err, "decoder stream failed");
                    break;
                }
            }
        }
        Ok(Visit {
            flow: Flow::Continue,
            frames,
        })
    }

    fn push(&mut self, frame: &Frame) -> Result<(), PlayerError> {
        self.sink.display(frame)?;
        self.frames_pushed += 1;
        trace!(n = self.frames_pushed, state = %self.state, "frame pushed");
        Ok(())
    }

    async fn pause(&self, duration: Duration) -> Flow {
        select! {
            biased;
            _ = self.cancel.cancelled() => Flow::Cancelled,
            _ = sleep(duration) => Flow::Continue,
        }
    }

    fn set_state(&mut self, next: PlaybackState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "playback state");
            self.state = next;
        }
    }
}
