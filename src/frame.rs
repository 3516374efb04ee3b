//! Fixed-size RGB24 frames as pushed to the panel.

use std::fmt;

/// Bytes per RGB24 pixel.
pub const BYTES_PER_PIXEL: usize = 3;

/// Composed panel dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size of one full frame in bytes.
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }
}

impl fmt::Display for FrameGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An immutable, complete RGB24 pixel buffer (row-major).
///
/// A `Frame` can only be built from a buffer of exactly
/// `geometry.byte_len()` bytes, so partial reads never reach a sink.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    geometry: FrameGeometry,
    pixels: Vec<u8>,
}

impl Frame {
    /// Wrap `pixels`, returning `None` unless the length matches `geometry`.
    #[must_use]
    pub fn from_raw(geometry: FrameGeometry, pixels: Vec<u8>) -> Option<Self> {
        (pixels.len() == geometry.byte_len()).then_some(Self { geometry, pixels })
    }

    /// Take ownership of an RGB image; its buffer is complete by construction.
    #[must_use]
    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let geometry = FrameGeometry::new(img.width(), img.height());
        Self {
            geometry,
            pixels: img.into_raw(),
        }
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn width(&self) -> u32 {
        self.geometry.width
    }

    pub fn height(&self) -> u32 {
        self.geometry.height
    }

    pub fn bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// RGB triple at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.geometry.width || y >= self.geometry.height {
            return None;
        }
        let idx = (y as usize * self.geometry.width as usize + x as usize) * BYTES_PER_PIXEL;
        Some([self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]])
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("geometry", &self.geometry)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}
