pub mod cached;
pub mod disk;
pub mod key;

pub use cached::{CacheStats, CachedTransform};
pub use disk::{DiskCache, DiskStats};
pub use key::{derive_key, CacheKey};

use crate::config::ImageFormat;
use crate::Result;

/// Storage behind a [`CachedTransform`].
#[async_trait::async_trait]
pub trait Cache: Send + Sync {
    /// Stored bytes for `key`, or `None` when there is no entry. Every other
    /// failure is returned as an error.
    async fn get(&self, key: &CacheKey, format: ImageFormat) -> Result<Option<Vec<u8>>>;

    /// Store `data` under `key`, creating the backing location if needed.
    async fn put(&self, key: &CacheKey, format: ImageFormat, data: &[u8]) -> Result<()>;
}
