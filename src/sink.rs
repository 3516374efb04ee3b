//! Frame sinks: the boundary between playback and the panel driver.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use tracing::{info, trace};

use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::frame::{Frame, FrameGeometry};

/// Accepts finished frames for display.
///
/// `display` is called once per frame, from one task, in presentation order.
/// An error is treated as fatal by the player.
pub trait FrameSink {
    fn display(&mut self, frame: &Frame) -> Result<(), SinkError>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn display(&mut self, frame: &Frame) -> Result<(), SinkError> {
        (**self).display(frame)
    }
}

/// Discards frames.
#[derive(Debug, Default)]
pub struct NullSink {
    frames: u64,
}

impl NullSink {
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl FrameSink for NullSink {
    fn display(&mut self, frame: &Frame) -> Result<(), SinkError> {
        self.frames += 1;
        trace!(n = self.frames, geometry = %frame.geometry(), "frame discarded");
        Ok(())
    }
}

/// Writes raw RGB24 frames back to back, e.g. into a FIFO read by a panel
/// bridge, or to stdout.
pub struct RawFileSink {
    out: Box<dyn Write + Send>,
    geometry: FrameGeometry,
}

impl RawFileSink {
    /// Open `path` for writing; `-` means stdout. A regular file is created or
    /// truncated, a FIFO or device is opened as is.
    pub fn open(path: &Path, geometry: FrameGeometry) -> Result<Self, SinkError> {
        let out: Box<dyn Write + Send> = if path == Path::new("-") {
            Box::new(io::stdout())
        } else {
            let truncate = fs::metadata(path).map_or(true, |meta| meta.is_file());
            let file: File = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(truncate)
                .open(path)?;
            Box::new(file)
        };
        info!(path = %path.display(), %geometry, "raw frame sink opened");
        Ok(Self::from_writer(out, geometry))
    }

    pub fn from_writer(out: Box<dyn Write + Send>, geometry: FrameGeometry) -> Self {
        Self { out, geometry }
    }
}

impl FrameSink for RawFileSink {
    fn display(&mut self, frame: &Frame) -> Result<(), SinkError> {
        if frame.geometry() != self.geometry {
            return Err(SinkError::Geometry {
                expected: self.geometry,
                actual: frame.geometry(),
            });
        }
        self.out.write_all(frame.bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

/// Build the sink named by the configuration.
pub fn from_config(
    cfg: &SinkConfig,
    geometry: FrameGeometry,
) -> Result<Box<dyn FrameSink + Send>, SinkError> {
    Ok(match cfg {
        SinkConfig::Null => Box::new(NullSink::default()),
        SinkConfig::RawFile { path } => Box::new(RawFileSink::open(path, geometry)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn raw_sink_writes_frames_back_to_back() {
        let geometry = FrameGeometry::new(1, 1);
        let buf = Shared::default();
        let mut sink = RawFileSink::from_writer(Box::new(buf.clone()), geometry);
        sink.display(&Frame::from_raw(geometry, vec![1, 2, 3]).unwrap())
            .unwrap();
        sink.display(&Frame::from_raw(geometry, vec![4, 5, 6]).unwrap())
            .unwrap();
        assert_eq!(*buf.0.lock().unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn raw_sink_rejects_wrong_geometry() {
        let mut sink = RawFileSink::from_writer(Box::new(io::sink()), FrameGeometry::new(2, 2));
        let frame = Frame::from_raw(FrameGeometry::new(1, 1), vec![0; 3]).unwrap();
        let err = sink.display(&frame).unwrap_err();
        assert!(matches!(err, SinkError::Geometry { .. }));
    }

    #[test]
    fn raw_file_sink_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.rgb");
        let geometry = FrameGeometry::new(2, 1);
        let mut sink = from_config(&SinkConfig::RawFile { path: path.clone() }, geometry).unwrap();
        sink.display(&Frame::from_raw(geometry, vec![9; 6]).unwrap())
            .unwrap();
        drop(sink);
        assert_eq!(std::fs::read(&path).unwrap(), vec![9; 6]);
    }

    #[test]
    fn raw_file_sink_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.rgb");
        std::fs::write(&path, [0xAA; 12]).unwrap();
        let geometry = FrameGeometry::new(1, 1);
        let mut sink = RawFileSink::open(&path, geometry).unwrap();
        sink.display(&Frame::from_raw(geometry, vec![1, 2, 3]).unwrap())
            .unwrap();
        drop(sink);
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn null_sink_counts() {
        let mut sink = NullSink::default();
        let geometry = FrameGeometry::new(1, 1);
        let frame = Frame::from_raw(geometry, vec![0; 3]).unwrap();
        sink.display(&frame).unwrap();
        sink.display(&frame).unwrap();
        assert_eq!(sink.frames(), 2);
    }
}
