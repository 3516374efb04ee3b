//! Fitting decoded images to the panel and flattening them to RGB24.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage, RgbaImage};

use crate::config::ScalingMode;
use crate::frame::FrameGeometry;
use crate::processing::layout::{center_offset, resize_to_contain, resize_to_cover};

/// Scaling parameters shared by every still and animation frame.
#[derive(Debug, Clone, Copy)]
pub struct ScaleOptions {
    pub mode: ScalingMode,
    pub filter: FilterType,
    pub letterbox_color: [u8; 3],
}

impl Default for ScaleOptions {
    fn default() -> Self {
        Self {
            mode: ScalingMode::Stretch,
            filter: FilterType::Lanczos3,
            letterbox_color: [0, 0, 0],
        }
    }
}

/// Resize `img` to exactly `geometry` and drop its alpha channel.
pub fn fit_to_panel(img: &RgbaImage, geometry: FrameGeometry, opts: &ScaleOptions) -> RgbImage {
    let (cw, ch) = (geometry.width, geometry.height);
    let (iw, ih) = img.dimensions();
    match opts.mode {
        ScalingMode::Stretch => flatten(&resize(img, cw, ch, opts.filter)),
        ScalingMode::Fit => {
            let (w, h) = resize_to_contain(cw, ch, iw, ih);
            let inner = flatten(&resize(img, w, h, opts.filter));
            let mut canvas = RgbImage::from_pixel(cw, ch, Rgb(opts.letterbox_color));
            let (ox, oy) = center_offset(w, h, cw, ch);
            imageops::replace(&mut canvas, &inner, i64::from(ox), i64::from(oy));
            canvas
        }
        ScalingMode::Zoom => {
            let (w, h) = resize_to_cover(cw, ch, iw, ih);
            let mut covered = resize(img, w, h, opts.filter);
            let (ox, oy) = center_offset(cw, ch, w, h);
            let cropped = imageops::crop(&mut covered, ox, oy, cw, ch).to_image();
            flatten(&cropped)
        }
    }
}

fn resize(img: &RgbaImage, w: u32, h: u32, filter: FilterType) -> RgbaImage {
    if img.dimensions() == (w, h) {
        return img.clone();
    }
    imageops::resize(img, w, h, filter)
}

/// Composite over black: transparent pixels are unlit LEDs.
pub fn flatten(img: &RgbaImage) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut out = RgbImage::new(w, h);
    for (src, dst) in img.pixels().zip(out.pixels_mut()) {
        let a = u16::from(src[3]);
        let blend = |c: u8| ((u16::from(c) * a + 127) / 255) as u8;
        *dst = Rgb([blend(src[0]), blend(src[1]), blend(src[2])]);
    }
    out
}
