use crate::config::ImageFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How an image is fitted when both width and height are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Fill the box, cropping the overflow.
    Cover,
    /// Fit inside the box, keeping the aspect ratio.
    Contain,
    /// Stretch to the exact box.
    Fill,
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitMode::Cover => write!(f, "cover"),
            FitMode::Contain => write!(f, "contain"),
            FitMode::Fill => write!(f, "fill"),
        }
    }
}

impl FromStr for FitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cover" => Ok(FitMode::Cover),
            "contain" => Ok(FitMode::Contain),
            "fill" => Ok(FitMode::Fill),
            _ => Err(format!("Invalid fit mode: {}", s)),
        }
    }
}

/// Parameters of a single transform request.
///
/// Known fields are typed; anything else a backend understands travels in
/// `extra` and is flattened next to them when serialized. Unset fields are
/// omitted entirely so they never show up as `null` in the cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// Encoder quality (1-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ImageFormat>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<FitMode>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl TransformOptions {
    /// Requested format, or `default` when the request leaves it out.
    pub fn resolved_format(&self, default: ImageFormat) -> ImageFormat {
        self.format.unwrap_or(default)
    }
}

/// Backend service section of the image configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
}

/// Image configuration handed to every backend call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceConfig>,
}

impl ImageConfig {
    pub fn with_service_config(config: Map<String, Value>) -> Self {
        Self {
            service: Some(ServiceConfig { entrypoint: None, config: Some(config) }),
        }
    }

    /// Backend settings, or an empty object when either level is missing.
    pub fn service_config(&self) -> Value {
        self.service
            .as_ref()
            .and_then(|s| s.config.clone())
            .map(Value::Object)
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}
