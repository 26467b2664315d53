use crate::config::ImageFormat;
use crate::Result;
use std::sync::Arc;

pub mod params;
#[cfg(feature = "image-backend")]
pub mod backend;

use params::{ImageConfig, TransformOptions};

/// Bytes produced by a transform together with their encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub data: Vec<u8>,
    pub format: ImageFormat,
}

/// Anything that turns encoded image bytes into other encoded image bytes.
///
/// Implementors must be pure with respect to their arguments: identical
/// `(input, options, config)` must yield identical output, since caches
/// keyed on those arguments never revisit an entry once written.
#[async_trait::async_trait]
pub trait TransformBackend: Send + Sync {
    async fn transform(
        &self,
        input: &[u8],
        options: &TransformOptions,
        config: &ImageConfig,
    ) -> Result<TransformOutput>;
}

#[async_trait::async_trait]
impl<T: TransformBackend + ?Sized> TransformBackend for Arc<T> {
    async fn transform(
        &self,
        input: &[u8],
        options: &TransformOptions,
        config: &ImageConfig,
    ) -> Result<TransformOutput> {
        (**self).transform(input, options, config).await
    }
}

#[async_trait::async_trait]
impl<'a, T: TransformBackend + ?Sized> TransformBackend for &'a T {
    async fn transform(
        &self,
        input: &[u8],
        options: &TransformOptions,
        config: &ImageConfig,
    ) -> Result<TransformOutput> {
        (**self).transform(input, options, config).await
    }
}

#[async_trait::async_trait]
impl<T: TransformBackend + ?Sized> TransformBackend for Box<T> {
    async fn transform(
        &self,
        input: &[u8],
        options: &TransformOptions,
        config: &ImageConfig,
    ) -> Result<TransformOutput> {
        (**self).transform(input, options, config).await
    }
}
