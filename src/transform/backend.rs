use crate::config::{ImageFormat, DEFAULT_QUALITY};
use crate::transform::params::{FitMode, ImageConfig, TransformOptions};
use crate::transform::{TransformBackend, TransformOutput};
use crate::ImageCacheError;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder};

/// Pure-Rust transform backend: decode, resize, re-encode.
///
/// Decoding and encoding are CPU-bound and run on tokio's blocking pool so
/// concurrent callers on the async scheduler are not stalled.
#[derive(Debug, Clone)]
pub struct ImageBackend {
    /// Reject inputs larger than this many bytes.
    pub max_input_size: Option<usize>,
    /// Output format when the options leave it out. Keep this in line with
    /// the cache's default format so entry extensions match their contents.
    pub default_format: ImageFormat,
}

impl Default for ImageBackend {
    fn default() -> Self {
        Self { max_input_size: None, default_format: ImageFormat::jpeg }
    }
}

impl ImageBackend {
    pub fn with_max_input_size(mut self, max: usize) -> Self {
        self.max_input_size = Some(max);
        self
    }

    /// Synchronous body of [`TransformBackend::transform`].
    pub fn transform_blocking(&self, input: &[u8], options: &TransformOptions) -> Result<TransformOutput, ImageCacheError> {
        if let Some(max) = self.max_input_size {
            if input.len() > max {
                return Err(ImageCacheError::InvalidArgument("Input exceeds size limit".into()));
            }
        }
        if let Some(q) = options.quality {
            if q == 0 || q > 100 {
                return Err(ImageCacheError::InvalidArgument(format!("Invalid quality: {}", q)));
            }
        }

        let (img, _orig_format) = decode_image(input)?;
        let resized = resize_image(img, options.width, options.height, options.fit)?;
        let format = options.resolved_format(self.default_format);
        let data = encode_image(&resized, format, options.quality.unwrap_or(DEFAULT_QUALITY))?;
        Ok(TransformOutput { data, format })
    }
}

#[async_trait::async_trait]
impl TransformBackend for ImageBackend {
    async fn transform(
        &self,
        input: &[u8],
        options: &TransformOptions,
        _config: &ImageConfig,
    ) -> crate::Result<TransformOutput> {
        let backend = self.clone();
        let input = input.to_vec();
        let options = options.clone();
        tokio::task::spawn_blocking(move || backend.transform_blocking(&input, &options))
            .await
            .map_err(|e| ImageCacheError::TransformError(e.to_string()))?
    }
}

/// Decodes raw image bytes, sniffing the container from its magic bytes.
///
/// # Errors
/// Returns `ImageCacheError::TransformError` if the format cannot be detected
/// or the data is corrupt.
pub fn decode_image(bytes: &[u8]) -> Result<(DynamicImage, Option<ImageFormat>), ImageCacheError> {
    let guessed = image::guess_format(bytes)
        .map_err(|e| ImageCacheError::TransformError(e.to_string()))?;

    let img = image::load_from_memory_with_format(bytes, guessed)
        .map_err(|e| ImageCacheError::TransformError(e.to_string()))?;

    let fmt = match guessed {
        image::ImageFormat::Jpeg => Some(ImageFormat::jpeg),
        image::ImageFormat::Png => Some(ImageFormat::png),
        image::ImageFormat::WebP => Some(ImageFormat::webp),
        image::ImageFormat::Avif => Some(ImageFormat::avif),
        _ => None,
    };

    Ok((img, fmt))
}

/// Resizes an image.
///
/// - Neither dimension: returned unchanged
/// - One dimension: the other is scaled proportionally
/// - Both: placed according to `fit`, exact stretch when `fit` is unset
///
/// Dimensions are clamped to at least one pixel.
pub fn resize_image(
    img: DynamicImage,
    w: Option<u32>,
    h: Option<u32>,
    fit: Option<FitMode>,
) -> Result<DynamicImage, ImageCacheError> {
    let (orig_w, orig_h) = img.dimensions();
    if orig_w == 0 || orig_h == 0 {
        return Err(ImageCacheError::TransformError("Invalid image dimensions".into()));
    }

    let (target_w, target_h) = match (w, h) {
        (None, None) => return Ok(img),
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => {
            let ratio = w as f32 / orig_w as f32;
            (w, (orig_h as f32 * ratio).round() as u32)
        }
        (None, Some(h)) => {
            let ratio = h as f32 / orig_h as f32;
            ((orig_w as f32 * ratio).round() as u32, h)
        }
    };
    let (target_w, target_h) = (target_w.max(1), target_h.max(1));

    // Lanczos3 gives the cleanest downsampling
    let filter = FilterType::Lanczos3;
    Ok(match fit {
        Some(FitMode::Cover) => img.resize_to_fill(target_w, target_h, filter),
        Some(FitMode::Contain) => img.resize(target_w, target_h, filter),
        Some(FitMode::Fill) | None => img.resize_exact(target_w, target_h, filter),
    })
}

/// Encodes an image with the given quality, clamped to 1..=100.
///
/// PNG is lossless and ignores `quality`. AVIF keeps the alpha channel and
/// uses encoder speed 4.
pub fn encode_image(
    img: &DynamicImage,
    fmt: ImageFormat,
    quality: u8,
) -> Result<Vec<u8>, ImageCacheError> {
    let mut out = Vec::new();
    let q = quality.clamp(1, 100);

    match fmt {
        ImageFormat::jpeg => {
            let rgb = img.to_rgb8();
            let (w, h) = rgb.dimensions();
            JpegEncoder::new_with_quality(&mut out, q)
                .write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
                .map_err(|e| ImageCacheError::TransformError(e.to_string()))?;
        }
        ImageFormat::png => {
            let rgba = img.to_rgba8();
            let (w, h) = rgba.dimensions();
            PngEncoder::new(&mut out)
                .write_image(rgba.as_raw(), w, h, ExtendedColorType::Rgba8)
                .map_err(|e| ImageCacheError::TransformError(e.to_string()))?;
        }
        ImageFormat::webp => {
            let rgb = img.to_rgb8();
            let (w, h) = rgb.dimensions();
            let encoded = webp::Encoder::from_rgb(rgb.as_raw(), w, h).encode(q as f32);
            out.extend_from_slice(&encoded);
        }
        ImageFormat::avif => {
            let rgba = img.to_rgba8();
            let (w, h) = rgba.dimensions();
            AvifEncoder::new_with_speed_quality(&mut out, 4, q)
                .write_image(rgba.as_raw(), w, h, ExtendedColorType::Rgba8)
                .map_err(|e| ImageCacheError::TransformError(e.to_string()))?;
        }
    }

    Ok(out)
}
