//! Cache key derivation.
//!
//! A key is `hex(SHA-256(input ‖ canonical))`, where `canonical` is the RFC
//! 8785 serialization of the request options with the resolved `format`
//! written in and the backend settings attached under `serviceConfig`.
//! Canonical JSON sorts object keys at every depth, so two option sets that
//! only differ in construction order hash identically.

use crate::config::ImageFormat;
use crate::transform::params::{ImageConfig, TransformOptions};
use crate::{ImageCacheError, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Field under which the backend settings are folded into the key material.
const SERVICE_CONFIG_FIELD: &str = "serviceConfig";

/// Names the typed options and the key material already own. An `extra`
/// entry under one of these would shadow the real value in the key.
const RESERVED_FIELDS: [&str; 6] = ["width", "height", "quality", "format", "fit", SERVICE_CONFIG_FIELD];

/// Lowercase hex SHA-256 digest identifying one transform request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the entry holding this key's output in `format`.
    pub fn file_name(&self, format: ImageFormat) -> String {
        format!("{}.{}", self.0, format.extension())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonical bytes of `options` with `format` forced and the service config attached.
pub fn canonical_params(
    options: &TransformOptions,
    format: ImageFormat,
    config: &ImageConfig,
) -> Result<Vec<u8>> {
    if let Some(name) = options.extra.keys().find(|k| RESERVED_FIELDS.contains(&k.as_str())) {
        return Err(ImageCacheError::InvalidArgument(format!(
            "extra option `{}` collides with a reserved field",
            name
        )));
    }

    let mut material = match serde_json::to_value(options) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            return Err(ImageCacheError::KeyError(format!(
                "options must serialize to an object, got {}",
                other
            )))
        }
        Err(e) => return Err(ImageCacheError::KeyError(e.to_string())),
    };
    material.insert("format".into(), Value::String(format.extension().into()));
    material.insert(SERVICE_CONFIG_FIELD.into(), config.service_config());

    serde_json_canonicalizer::to_vec(&Value::Object(material))
        .map_err(|e| ImageCacheError::KeyError(e.to_string()))
}

/// Derives the cache key for a request whose format resolves to `format`.
pub fn derive_key(
    input: &[u8],
    options: &TransformOptions,
    format: ImageFormat,
    config: &ImageConfig,
) -> Result<CacheKey> {
    let canonical = canonical_params(options, format, config)?;
    let mut hasher = Sha256::new();
    hasher.update(input);
    hasher.update(&canonical);
    Ok(CacheKey(hex::encode(hasher.finalize())))
}
