//! Content-addressed disk cache for image transforms.
//!
//! [`CachedTransform`] decorates any [`TransformBackend`]: it derives a
//! SHA-256 key from the input bytes and the canonical form of the transform
//! options, answers repeated requests from `<cache_dir>/<key>.<format>`, and
//! only calls the wrapped backend on a miss.
//!
//! ```no_run
//! use imagecache::{CacheConfig, CachedTransform, TransformBackend, TransformOutput};
//! use imagecache::transform::params::{ImageConfig, TransformOptions};
//!
//! struct Passthrough;
//!
//! #[async_trait::async_trait]
//! impl TransformBackend for Passthrough {
//!     async fn transform(
//!         &self,
//!         input: &[u8],
//!         options: &TransformOptions,
//!         _config: &ImageConfig,
//!     ) -> imagecache::Result<TransformOutput> {
//!         Ok(TransformOutput { data: input.to_vec(), format: options.format.unwrap_or_default() })
//!     }
//! }
//!
//! # async fn run(bytes: Vec<u8>) -> imagecache::Result<()> {
//! let cached = CachedTransform::new(Passthrough, CacheConfig::default())?;
//! let options = TransformOptions { width: Some(800), ..Default::default() };
//! let out = cached.transform(&bytes, &options, &ImageConfig::default()).await?;
//! println!("{} bytes of {}", out.data.len(), out.format);
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

pub mod cache;
pub mod config;
pub mod transform;

pub use crate::cache::{CacheKey, CacheStats, CachedTransform, DiskCache};
pub use crate::config::{CacheConfig, ConfigError, ImageFormat};
pub use crate::transform::{TransformBackend, TransformOutput};
#[cfg(feature = "image-backend")]
pub use crate::transform::backend::ImageBackend;

#[derive(Error, Debug)]
pub enum ImageCacheError {
    /// Any filesystem failure other than a cache miss, surfaced unchanged.
    #[error(transparent)]
    Filesystem(#[from] std::io::Error),
    #[error("Transformation error: {0}")]
    TransformError(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Cache key error: {0}")]
    KeyError(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ImageCacheError>;
