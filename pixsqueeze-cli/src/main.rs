use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use std::path::{Path, PathBuf};

use pixsqueeze::{
    archive, BatchMode, BatchOutcome, CompressOptions, Dispatcher, OutputFormat, Registry,
};

#[derive(Parser)]
#[command(name = "pixsqueeze")]
#[command(about = "Batch-resize and re-encode images, with optional zip bundling", long_about = None)]
#[command(version)]
struct Args {
    /// Input image files or directories
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Encoder quality (0-100); ignored for png
    #[arg(long, value_name = "QUALITY", value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: Option<u8>,

    /// Maximum output width
    #[arg(long, value_name = "PIXELS")]
    max_width: Option<u32>,

    /// Maximum output height
    #[arg(long, value_name = "PIXELS")]
    max_height: Option<u32>,

    /// Output image format
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Bundle all outputs into one zip archive instead of separate files
    #[arg(long, default_value_t)]
    zip: bool,

    /// Persist the given settings as future defaults
    #[arg(long, default_value_t)]
    save_config: bool,

    /// Verbose output
    #[arg(short, long, default_value_t)]
    verbose: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, default_value_t)]
    quiet: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Jpeg,
    Png,
    Webp,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Jpeg => OutputFormat::Jpeg,
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Webp => OutputFormat::WebP,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose, args.quiet);

    if !args.output_dir.exists() {
        std::fs::create_dir_all(&args.output_dir)
            .context("Failed to create output directory")?;
    }

    let options = build_options(&args);
    options.validate()?;

    if args.save_config {
        if options.save().is_none() {
            log::warn!("Could not persist settings");
        } else {
            log::info!("Settings saved as defaults");
        }
    }

    // Ingest: per-file errors are reported and skipped, the rest proceed
    let mut registry = Registry::new();
    for path in collect_inputs(&args.inputs) {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("Skipping {}: {e}", path.display());
                continue;
            }
        };

        match registry.ingest(&name, bytes) {
            Ok(_) => log::debug!("Loaded {}", path.display()),
            Err(e) => log::error!("Skipping {e}"),
        }
    }

    if registry.is_empty() {
        anyhow::bail!("No usable images among the inputs");
    }

    if !args.quiet {
        log::info!("Compressing {} image(s)...", registry.len());
    }

    let dispatcher = Dispatcher::new();
    let outcome = dispatcher.run(&mut registry, &options, BatchMode::Full, |done, total| {
        log::info!("Compressed {done}/{total}");
    })?;

    match outcome {
        BatchOutcome::Completed { processed } => {
            if !args.quiet {
                log::info!("Processed {processed} image(s)");
            }
        }
        BatchOutcome::Skipped => unreachable!("no other batch can be active"),
    }

    report_stats(&registry, args.quiet);

    if args.zip {
        let blob = archive::build(&registry)?;
        let path = args.output_dir.join(archive::ARCHIVE_FILE_NAME);
        std::fs::write(&path, blob).context("Failed to write archive")?;
        if !args.quiet {
            log::info!("Done: {}", path.display());
        }
    } else {
        for (name, compressed) in archive::export_entries(&registry) {
            let path = args.output_dir.join(&name);
            std::fs::write(&path, &compressed.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !args.quiet {
                log::info!("Done: {}", path.display());
            }
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool, quiet: bool) {
    env_logger::Builder::from_default_env()
        .filter_level(log_level(verbose, quiet))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Quiet mode suppresses chatter but still surfaces per-file errors.
fn log_level(verbose: bool, quiet: bool) -> log::LevelFilter {
    if quiet {
        log::LevelFilter::Error
    } else if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}

/// Saved defaults, overridden by whichever flags were given.
fn build_options(args: &Args) -> CompressOptions {
    let mut options = CompressOptions::load().unwrap_or_default();

    if let Some(quality) = args.quality {
        options.quality = f32::from(quality) / 100.0;
    }
    if let Some(max_width) = args.max_width {
        options.max_width = max_width;
    }
    if let Some(max_height) = args.max_height {
        options.max_height = max_height;
    }
    if let Some(format) = args.format {
        options.format = format.into();
    }

    options
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "avif",
];

fn looks_like_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Explicit files are taken as-is; directories are walked and filtered by
/// image extension, so stray sidecar files don't spam decode errors.
fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in walkdir::WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| {
                    e.map_err(|err| log::warn!("Skipping unreadable entry: {err}"))
                        .ok()
                })
            {
                if entry.file_type().is_file() && looks_like_image(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(input.clone());
        }
    }
    files
}

fn report_stats(registry: &Registry, quiet: bool) {
    if quiet {
        return;
    }

    let mut total_before = 0usize;
    let mut total_after = 0usize;

    for record in registry.processed() {
        let compressed = match record.compressed() {
            Some(c) => c,
            None => continue,
        };
        total_before += record.original_size();
        total_after += compressed.size();

        let (w, h) = compressed.dimensions;
        let (ow, oh) = record.original_dimensions();
        log::info!(
            "{}: {} -> {} ({:.0}%), {ow}x{oh} -> {w}x{h}",
            record.name(),
            format_size(record.original_size()),
            format_size(compressed.size()),
            compressed.ratio() * 100.0,
        );
    }

    if total_before > 0 {
        log::info!(
            "Total: {} -> {} ({:.0}% of original)",
            format_size(total_before),
            format_size(total_after),
            total_after as f64 / total_before as f64 * 100.0,
        );
    }
}

fn format_size(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_mode_still_reports_errors() {
        assert_eq!(log_level(false, true), log::LevelFilter::Error);
        assert_eq!(log_level(true, true), log::LevelFilter::Error);
        assert_eq!(log_level(true, false), log::LevelFilter::Debug);
        assert_eq!(log_level(false, false), log::LevelFilter::Info);
    }

    #[test]
    fn format_size_picks_sensible_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(looks_like_image(Path::new("a/b/photo.JPG")));
        assert!(looks_like_image(Path::new("scan.webp")));
        assert!(!looks_like_image(Path::new("notes.txt")));
        assert!(!looks_like_image(Path::new("Makefile")));
    }

    #[test]
    fn collect_inputs_walks_dirs_and_keeps_explicit_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir(root.join("sub")).unwrap();
        for name in ["a.png", "b.JPG", "notes.txt"] {
            std::fs::write(root.join(name), b"x").unwrap();
        }
        std::fs::write(root.join("sub").join("c.webp"), b"x").unwrap();

        // Directories are filtered by extension; explicit files are not
        let files = collect_inputs(&[root.to_path_buf(), root.join("notes.txt")]);

        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.JPG", "c.webp", "notes.txt"]);
    }
}
