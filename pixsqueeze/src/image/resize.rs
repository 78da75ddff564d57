//! Aspect-preserving downscale

use anyhow::{anyhow, Result};
use fast_image_resize as fr;
use fr::images::Image as FrImage;
use imageproc::image::{DynamicImage, GenericImageView, RgbaImage};

/// Fit `(orig_w, orig_h)` within `(max_w, max_h)`, preserving aspect ratio.
///
/// Never upscales. Each axis rounds to nearest independently, which can
/// introduce up to 1px of aspect drift.
pub fn fit_dimensions(orig_w: u32, orig_h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let scale_x = max_w as f64 / orig_w as f64;
    let scale_y = max_h as f64 / orig_h as f64;
    let scale = scale_x.min(scale_y).min(1.0);

    if scale < 1.0 {
        // max(1): a degenerate aspect ratio must not collapse an axis to zero
        let width = ((orig_w as f64 * scale).round() as u32).max(1);
        let height = ((orig_h as f64 * scale).round() as u32).max(1);
        (width, height)
    } else {
        (orig_w, orig_h)
    }
}

// Widen before multiplying; u32 arithmetic would wrap for huge dimensions
fn rgba_buffer_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// Resize to exact target dimensions with Lanczos3 convolution.
///
/// Only ever called for downscales; `fit_dimensions` clamps out upscaling.
pub(super) fn resize(img: &DynamicImage, width: u32, height: u32) -> Result<DynamicImage> {
    let (src_w, src_h) = (img.width(), img.height());

    let src_buffer = img.to_rgba8().into_raw();
    let src_image = FrImage::from_vec_u8(src_w, src_h, src_buffer, fr::PixelType::U8x4)
        .map_err(|e| anyhow!("Invalid resize source buffer: {e}"))?;

    let mut dst_buffer = vec![0u8; rgba_buffer_len(width, height)];
    let mut dst_image =
        FrImage::from_slice_u8(width, height, &mut dst_buffer, fr::PixelType::U8x4)
            .map_err(|e| anyhow!("Invalid resize destination buffer: {e}"))?;

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(
            &src_image,
            &mut dst_image,
            Some(
                &fr::ResizeOptions::new()
                    .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Lanczos3)),
            ),
        )
        .map_err(|e| anyhow!("Resize failed: {e}"))?;

    let resized = RgbaImage::from_raw(width, height, dst_buffer)
        .ok_or_else(|| anyhow!("Resize produced a short buffer"))?;

    Ok(DynamicImage::ImageRgba8(resized))
}
