use crate::cache::{derive_key, Cache, CacheKey, DiskCache};
use crate::config::{CacheConfig, ImageFormat};
use crate::transform::params::{ImageConfig, TransformOptions};
use crate::transform::{TransformBackend, TransformOutput};
use crate::Result;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hit/miss counters since the decorator was built.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

/// Content-addressed cache in front of a [`TransformBackend`].
///
/// Implements [`TransformBackend`] itself, so callers swap it in for the
/// backend it wraps without other changes. A hit costs one file read and
/// never reaches the backend; a miss calls the backend once and stores its
/// output. Backend and filesystem errors are returned as they come.
///
/// Two concurrent misses on the same key both run the backend and both
/// write the entry; the outputs are identical, so the last rename wins
/// harmlessly.
pub struct CachedTransform<B, C = DiskCache> {
    backend: B,
    cache: C,
    default_format: ImageFormat,
    counters: Counters,
}

impl<B: TransformBackend> CachedTransform<B, DiskCache> {
    pub fn new(backend: B, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_cache(backend, DiskCache::new(config.cache_dir), config.default_format))
    }
}

impl<B: TransformBackend, C: Cache> CachedTransform<B, C> {
    pub fn with_cache(backend: B, cache: C, default_format: ImageFormat) -> Self {
        Self { backend, cache, default_format, counters: Counters::default() }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Key a request would be stored under, without touching the cache.
    pub fn key_for(&self, input: &[u8], options: &TransformOptions, config: &ImageConfig) -> Result<CacheKey> {
        derive_key(input, options, options.resolved_format(self.default_format), config)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
        }
    }
}

#[async_trait::async_trait]
impl<B: TransformBackend, C: Cache> TransformBackend for CachedTransform<B, C> {
    async fn transform(
        &self,
        input: &[u8],
        options: &TransformOptions,
        config: &ImageConfig,
    ) -> Result<TransformOutput> {
        let format = options.resolved_format(self.default_format);
        let key = derive_key(input, options, format, config)?;

        if let Some(data) = self.cache.get(&key, format).await? {
            tracing::debug!(%key, %format, bytes = data.len(), "image cache hit");
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(TransformOutput { data, format });
        }

        tracing::debug!(%key, %format, "image cache miss");
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let output = self.backend.transform(input, options, config).await?;

        self.cache.put(&key, format, &output.data).await?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        Ok(output)
    }
}
