//! Bundle processed records into one downloadable zip blob

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::image::{CompressedImage, OutputFormat};
use crate::registry::Registry;

/// File name offered for the bulk download.
pub const ARCHIVE_FILE_NAME: &str = "compressed_images.zip";

/// Derive the download name for one record: `<stem>_compressed.<ext>`,
/// where jpeg maps to the conventional `jpg` extension.
pub fn export_name(name: &str, format: OutputFormat) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    format!("{stem}_compressed.{}", format.extension())
}

/// Insert a numeric suffix when two records derive the same output name
/// (same basename from different source folders).
fn dedup_name(name: String, used: &mut HashSet<String>) -> String {
    if used.insert(name.clone()) {
        return name;
    }
    let (stem, ext) = name
        .rsplit_once('.')
        .map(|(s, e)| (s.to_string(), e.to_string()))
        .unwrap_or((name, String::new()));
    for n in 2usize.. {
        let candidate = if ext.is_empty() {
            format!("{stem}_{n}")
        } else {
            format!("{stem}_{n}.{ext}")
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }
    unreachable!()
}

/// Every processed record paired with its collision-free output name, in
/// insertion order. Single-item and bulk export share this naming.
pub fn export_entries(registry: &Registry) -> Vec<(String, &CompressedImage)> {
    let mut used = HashSet::new();
    registry
        .processed()
        .filter_map(|record| {
            record
                .compressed()
                .map(|c| (dedup_name(export_name(record.name(), c.format), &mut used), c))
        })
        .collect()
}

/// Build the bulk-download archive from every processed record.
///
/// Entries are stored uncompressed; the payloads are already encoded.
/// Any assembly failure fails the whole export, no partial archive.
pub fn build(registry: &Registry) -> Result<Vec<u8>> {
    let entries = export_entries(registry);
    if entries.is_empty() {
        anyhow::bail!("No processed images to archive");
    }

    log::info!("archiving {} images", entries.len());

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (name, compressed) in &entries {
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("Failed to add {name} to archive"))?;
        zip.write_all(&compressed.bytes)
            .with_context(|| format!("Failed to write {name} to archive"))?;
    }

    let cursor = zip.finish().context("Failed to finalize archive")?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::image::{DynamicImage, Rgba, RgbaImage};

    fn png_fixture() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, imageproc::image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn result_with(bytes: Vec<u8>, format: OutputFormat) -> CompressedImage {
        CompressedImage {
            bytes,
            dimensions: (4, 4),
            original_size: 100,
            original_dimensions: (4, 4),
            format,
        }
    }

    #[test]
    fn export_name_maps_jpeg_to_jpg() {
        assert_eq!(
            export_name("photo.png", OutputFormat::Jpeg),
            "photo_compressed.jpg"
        );
        assert_eq!(
            export_name("scan.tiff", OutputFormat::WebP),
            "scan_compressed.webp"
        );
        assert_eq!(
            export_name("noext", OutputFormat::Png),
            "noext_compressed.png"
        );
        assert_eq!(
            export_name("archive.tar.gz", OutputFormat::Png),
            "archive.tar_compressed.png"
        );
    }

    #[test]
    fn colliding_names_get_numeric_suffixes() {
        let mut registry = Registry::new();
        for _ in 0..3 {
            let id = registry.ingest("photo.png", png_fixture()).unwrap();
            registry.upsert_compressed(id, result_with(vec![1], OutputFormat::Jpeg));
        }

        let names: Vec<String> = export_entries(&registry)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(
            names,
            vec![
                "photo_compressed.jpg",
                "photo_compressed_2.jpg",
                "photo_compressed_3.jpg"
            ]
        );
    }

    #[test]
    fn archive_contains_only_processed_records() {
        let mut registry = Registry::new();
        let done = registry.ingest("done.png", png_fixture()).unwrap();
        registry.ingest("pending.png", png_fixture()).unwrap();
        registry.upsert_compressed(done, result_with(vec![0xAA, 0xBB], OutputFormat::WebP));

        let blob = build(&registry).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(blob)).unwrap();
        assert_eq!(archive.len(), 1);
        let mut file = archive.by_index(0).unwrap();
        assert_eq!(file.name(), "done_compressed.webp");
        let mut contents = Vec::new();
        std::io::Read::read_to_end(&mut file, &mut contents).unwrap();
        assert_eq!(contents, vec![0xAA, 0xBB]);
    }

    #[test]
    fn empty_export_is_an_error() {
        let mut registry = Registry::new();
        registry.ingest("pending.png", png_fixture()).unwrap();
        assert!(build(&registry).is_err());
    }

    #[test]
    fn removed_record_is_absent_from_export() {
        let mut registry = Registry::new();
        let keep = registry.ingest("keep.png", png_fixture()).unwrap();
        let gone = registry.ingest("gone.png", png_fixture()).unwrap();
        registry.upsert_compressed(keep, result_with(vec![1], OutputFormat::Jpeg));
        registry.upsert_compressed(gone, result_with(vec![2], OutputFormat::Jpeg));

        registry.remove(gone);

        let blob = build(&registry).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(blob)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names, vec!["keep_compressed.jpg"]);
    }
}
