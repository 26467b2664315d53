use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Cache root used when nothing else is configured.
pub const DEFAULT_CACHE_DIR: &str = ".astro/image-cache";
/// Encoder quality applied when a request does not name one.
pub const DEFAULT_QUALITY: u8 = 80;

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    jpeg,
    png,
    webp,
    avif,
}

impl ImageFormat {
    /// File extension of cache entries holding this format.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::jpeg => "jpeg",
            ImageFormat::png => "png",
            ImageFormat::webp => "webp",
            ImageFormat::avif => "avif",
        }
    }

    /// Detect format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpeg" | "jpg" => Some(ImageFormat::jpeg),
            "png" => Some(ImageFormat::png),
            "webp" => Some(ImageFormat::webp),
            "avif" => Some(ImageFormat::avif),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageFormat::from_extension(&s.to_lowercase())
            .ok_or_else(|| ConfigError::InvalidFormat(s.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding `<key>.<format>` entries. Created on the first miss.
    pub cache_dir: PathBuf,
    /// Format assumed when a request's options leave it out.
    pub default_format: ImageFormat,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            default_format: ImageFormat::jpeg,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cache directory cannot be empty")] EmptyCacheDir,
    #[error("Invalid image format: {0}")] InvalidFormat(String),
}

impl CacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self { cache_dir: cache_dir.into(), ..Self::default() }
    }

    /// Builds a config from `IMAGECACHE_DIR` and `IMAGECACHE_DEFAULT_FORMAT`,
    /// falling back to the defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Ok(dir) = std::env::var("IMAGECACHE_DIR") {
            cfg.cache_dir = PathBuf::from(dir);
        }
        if let Ok(fmt) = std::env::var("IMAGECACHE_DEFAULT_FORMAT") {
            cfg.default_format = fmt.parse()?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_dir.as_os_str().is_empty() { return Err(ConfigError::EmptyCacheDir); }
        Ok(())
    }
}
