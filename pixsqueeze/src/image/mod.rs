//! Decode, resize, and re-encode a single image

mod decode;
mod encode;
mod resize;

// Re-export public API
pub use encode::{compress_to_jpeg, compress_to_png, compress_to_webp};
pub use resize::fit_dimensions;

use anyhow::{Context, Result};
use imageproc::image::GenericImageView;

use crate::options::CompressOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }
}

/// Output of one successful worker invocation, everything needed to update
/// a record and render its stats.
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub bytes: Vec<u8>,
    pub dimensions: (u32, u32),
    pub original_size: usize,
    pub original_dimensions: (u32, u32),
    pub format: OutputFormat,
}

impl CompressedImage {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Compressed size as a fraction of the original size.
    pub fn ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        self.size() as f64 / self.original_size as f64
    }
}

/// Decode the raw bytes just far enough to learn the pixel dimensions.
/// Used by ingestion to reject undecodable files up front.
pub fn probe_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    let img = decode::decode(data)?;
    Ok(img.dimensions())
}

/// Compress one image: decode, fit within the configured bounds, re-encode.
///
/// One invocation processes exactly one image and shares no mutable state
/// with any other invocation.
pub fn compress(data: &[u8], options: &CompressOptions) -> Result<CompressedImage> {
    let img = decode::decode(data).context("Failed to decode image")?;
    let (orig_w, orig_h) = img.dimensions();

    let (width, height) =
        resize::fit_dimensions(orig_w, orig_h, options.max_width, options.max_height);

    let img = if (width, height) != (orig_w, orig_h) {
        resize::resize(&img, width, height)?
    } else {
        img
    };

    let bytes = encode::encode(&img, options.format, options.quality)?;

    Ok(CompressedImage {
        bytes,
        dimensions: (width, height),
        original_size: data.len(),
        original_dimensions: (orig_w, orig_h),
        format: options.format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::image::{DynamicImage, Rgba, RgbaImage};

    fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 31 % 256) as u8, (y * 17 % 256) as u8, 64, 255])
        }));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, imageproc::image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn compress_shrinks_to_fit() {
        let data = png_fixture(64, 32);
        let options = CompressOptions {
            quality: 0.8,
            max_width: 16,
            max_height: 16,
            format: OutputFormat::Jpeg,
        };

        let result = compress(&data, &options).unwrap();
        assert_eq!(result.dimensions, (16, 8));
        assert_eq!(result.original_dimensions, (64, 32));
        assert_eq!(result.original_size, data.len());
        assert_eq!(result.format, OutputFormat::Jpeg);
        assert!(!result.bytes.is_empty());
    }

    #[test]
    fn compress_never_upscales() {
        let data = png_fixture(10, 10);
        let options = CompressOptions {
            quality: 0.8,
            max_width: 500,
            max_height: 500,
            format: OutputFormat::Png,
        };

        let result = compress(&data, &options).unwrap();
        assert_eq!(result.dimensions, (10, 10));
    }

    #[test]
    fn compress_rejects_garbage() {
        let options = CompressOptions::default();
        assert!(compress(b"not an image", &options).is_err());
    }

    #[test]
    fn probe_reports_dimensions() {
        let data = png_fixture(7, 3);
        assert_eq!(probe_dimensions(&data).unwrap(), (7, 3));
    }
}
