//! Size arithmetic for fitting media onto the panel.

/// Largest size with the source aspect ratio that fits inside the canvas.
pub fn resize_to_contain(canvas_w: u32, canvas_h: u32, src_w: u32, src_h: u32) -> (u32, u32) {
    let iw = src_w.max(1) as f64;
    let ih = src_h.max(1) as f64;
    let scale = (canvas_w as f64 / iw).min(canvas_h as f64 / ih);
    let w = (iw * scale).round().clamp(1.0, canvas_w.max(1) as f64);
    let h = (ih * scale).round().clamp(1.0, canvas_h.max(1) as f64);
    (w as u32, h as u32)
}

/// Smallest size with the source aspect ratio that covers the canvas.
pub fn resize_to_cover(canvas_w: u32, canvas_h: u32, src_w: u32, src_h: u32) -> (u32, u32) {
    let iw = src_w.max(1) as f64;
    let ih = src_h.max(1) as f64;
    let scale = (canvas_w as f64 / iw).max(canvas_h as f64 / ih);
    let w = (iw * scale).round().max(canvas_w as f64).max(1.0);
    let h = (ih * scale).round().max(canvas_h as f64).max(1.0);
    (w as u32, h as u32)
}

pub fn center_offset(inner_w: u32, inner_h: u32, outer_w: u32, outer_h: u32) -> (u32, u32) {
    let ox = outer_w.saturating_sub(inner_w) / 2;
    let oy = outer_h.saturating_sub(inner_h) / 2;
    (ox, oy)
}
