use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Per-call conversion settings.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Render images with URLs that do not parse as absolute URLs as plain
    /// text instead of image blocks.
    pub strict_image_urls: bool,
    /// Adjust output to the destination's structural limits (span length,
    /// children per block, nesting depth).
    pub truncate: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            strict_image_urls: false,
            truncate: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub images: ImagesConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ImagesConfig {
    pub strict_urls: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub truncate: bool,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { truncate: true }
    }
}

impl Config {
    /// Load config from a TOML file, or return defaults if not found.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn options(&self) -> ConvertOptions {
        ConvertOptions {
            strict_image_urls: self.images.strict_urls,
            truncate: self.limits.truncate,
        }
    }
}
