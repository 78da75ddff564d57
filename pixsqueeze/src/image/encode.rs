//! Image encoding: JPEG, PNG, WebP

use anyhow::{Context, Result};
use imageproc::image::{DynamicImage, GenericImageView};

use super::OutputFormat;

/// Map the 0.0-1.0 option quality onto the 0-100 scale the encoders take.
fn quality_percent(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Compress an image to JPEG format with the specified quality
pub fn compress_to_jpeg<W>(img: &DynamicImage, writer: &mut W, quality: f32) -> Result<()>
where
    W: std::io::Write,
{
    // JpegEncoder rejects alpha channels
    let img = DynamicImage::from(img.to_rgb8());

    let mut encoder = imageproc::image::codecs::jpeg::JpegEncoder::new_with_quality(
        writer,
        quality_percent(quality),
    );

    encoder
        .encode_image(&img)
        .with_context(|| "Failed to compress image to JPEG")?;

    Ok(())
}

/// Compress an image to PNG format. PNG is lossless; the quality setting
/// does not apply and the encoder's default compression is used.
pub fn compress_to_png<W>(img: &DynamicImage, writer: &mut W) -> Result<()>
where
    W: std::io::Write,
{
    use imageproc::image::codecs::png::{CompressionType, FilterType, PngEncoder};
    use imageproc::image::ImageEncoder;

    let encoder =
        PngEncoder::new_with_quality(writer, CompressionType::Default, FilterType::Adaptive);

    encoder
        .write_image(
            img.as_bytes(),
            img.width(),
            img.height(),
            img.color().into(),
        )
        .with_context(|| "Failed to compress image to PNG")?;

    Ok(())
}

/// Compress an image to WebP format with the specified quality
pub fn compress_to_webp(img: &DynamicImage, quality: f32) -> Result<webp::WebPMemory> {
    let img = DynamicImage::from(img.to_rgba8());
    let encoder = webp::Encoder::from_image(&img)
        .map_err(|e| anyhow::anyhow!("Failed to create WebP encoder: {}", e))?;
    let webp_data = encoder.encode(quality_percent(quality) as f32);
    Ok(webp_data)
}

pub(super) fn encode(img: &DynamicImage, format: OutputFormat, quality: f32) -> Result<Vec<u8>> {
    let (width, height) = (img.width(), img.height());
    let mut buffer = Vec::with_capacity(width as usize * height as usize);

    match format {
        OutputFormat::Jpeg => {
            compress_to_jpeg(img, &mut buffer, quality)?;
        }
        OutputFormat::Png => {
            compress_to_png(img, &mut buffer)?;
        }
        OutputFormat::WebP => {
            let webp_data = compress_to_webp(img, quality)?;
            buffer.extend_from_slice(&webp_data);
        }
    }

    Ok(buffer)
}
