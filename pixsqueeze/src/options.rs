use std::{fs, path::PathBuf};

use anyhow::Result;

use crate::image::OutputFormat;

/// Settings shared by every image in a batch. Read fresh at the start of
/// each run; never snapshotted per record.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompressOptions {
    /// Encoder quality, 0.0 to 1.0. Ignored for PNG.
    pub quality: f32,
    pub max_width: u32,
    pub max_height: u32,
    pub format: OutputFormat,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            quality: 0.8,
            max_width: 1920,
            max_height: 1080,
            format: OutputFormat::Jpeg,
        }
    }
}

impl CompressOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.quality.is_finite() || !(0.0..=1.0).contains(&self.quality) {
            anyhow::bail!("Quality must be between 0.0 and 1.0");
        }
        if self.max_width == 0 || self.max_height == 0 {
            anyhow::bail!("Max dimensions must be positive");
        }
        Ok(())
    }

    pub fn load() -> Option<Self> {
        let config_path = Self::config_path()?;

        fs::read_to_string(&config_path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
    }

    pub fn save(&self) -> Option<()> {
        let config_path = Self::config_path()?;

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).ok()?;
        }

        serde_json::to_string_pretty(self)
            .ok()
            .and_then(|json| fs::write(&config_path, json).ok())
    }

    fn config_path() -> Option<PathBuf> {
        let home = std::env::home_dir()?;
        Some(home.join(".config").join("pixsqueeze").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_valid() {
        assert!(CompressOptions::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let mut options = CompressOptions::default();
        options.quality = 1.5;
        assert!(options.validate().is_err());
        options.quality = -0.1;
        assert!(options.validate().is_err());
        options.quality = f32::NAN;
        assert!(options.validate().is_err());
    }

    #[test]
    fn rejects_zero_dimensions() {
        let mut options = CompressOptions::default();
        options.max_width = 0;
        assert!(options.validate().is_err());
    }

    #[test]
    fn settings_round_trip_through_disk() {
        // config_path derives from the home directory
        let home = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", home.path());

        let options = CompressOptions {
            quality: 0.55,
            max_width: 800,
            max_height: 600,
            format: OutputFormat::WebP,
        };

        options.save().unwrap();
        assert_eq!(CompressOptions::load(), Some(options));
    }
}
