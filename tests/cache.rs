use imagecache::cache::{Cache, CacheKey, CachedTransform, DiskCache};
use imagecache::config::{CacheConfig, ImageFormat};
use imagecache::transform::params::{ImageConfig, TransformOptions};
use imagecache::{ImageCacheError, Result, TransformBackend, TransformOutput};
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Backend double that records every call and returns canned bytes.
#[derive(Default)]
struct MockBackend {
    calls: Mutex<Vec<(Vec<u8>, TransformOptions, ImageConfig)>>,
    fail: bool,
}

impl MockBackend {
    fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl TransformBackend for MockBackend {
    async fn transform(
        &self,
        input: &[u8],
        options: &TransformOptions,
        config: &ImageConfig,
    ) -> Result<TransformOutput> {
        self.calls.lock().unwrap().push((input.to_vec(), options.clone(), config.clone()));
        if self.fail {
            return Err(ImageCacheError::TransformError("unsupported image".into()));
        }
        // Output depends on the request so distinct keys hold distinct bytes.
        let mut data = b"R:".to_vec();
        data.extend_from_slice(serde_json::to_string(options).unwrap().as_bytes());
        Ok(TransformOutput { data, format: options.format.unwrap_or(ImageFormat::jpeg) })
    }
}

fn cached(backend: Arc<MockBackend>, dir: &Path) -> CachedTransform<Arc<MockBackend>> {
    CachedTransform::new(backend, CacheConfig::new(dir)).unwrap()
}

fn width(w: u32) -> TransformOptions {
    TransformOptions { width: Some(w), ..Default::default() }
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = match std::fs::read_dir(dir) {
        Ok(rd) => rd.map(|e| e.unwrap().file_name().into_string().unwrap()).collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

#[tokio::test]
async fn miss_then_hit() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("image-cache");
    let backend = Arc::new(MockBackend::default());
    let cache = cached(backend.clone(), &root);

    let input = vec![7u8; 100];
    let options = width(200);
    let config = ImageConfig::default();

    assert!(!root.exists(), "cache root must be created lazily");

    let first = cache.transform(&input, &options, &config).await.unwrap();
    assert_eq!(backend.call_count(), 1);
    {
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0], (input.clone(), options.clone(), config.clone()));
    }
    assert_eq!(first.format, ImageFormat::jpeg);

    let key = cache.key_for(&input, &options, &config).unwrap();
    let entry = root.join(format!("{}.jpeg", key));
    assert_eq!(std::fs::read(&entry).unwrap(), first.data);
    assert_eq!(entries(&root), vec![format!("{}.jpeg", key)]);

    let second = cache.transform(&input, &options, &config).await.unwrap();
    assert_eq!(backend.call_count(), 1, "hit must not reach the backend");
    assert_eq!(second, first);

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.writes), (1, 1, 1));
}

#[tokio::test]
async fn defaulted_format_shares_entry_with_explicit_jpeg() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::default());
    let cache = cached(backend.clone(), tmp.path());

    let implicit = width(300);
    let explicit = TransformOptions { format: Some(ImageFormat::jpeg), ..width(300) };

    let a = cache.transform(b"img", &implicit, &ImageConfig::default()).await.unwrap();
    let b = cache.transform(b"img", &explicit, &ImageConfig::default()).await.unwrap();

    assert_eq!(backend.call_count(), 1);
    assert_eq!(a.data, b.data);
    assert_eq!(b.format, ImageFormat::jpeg);
    let names = entries(tmp.path());
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with(".jpeg"));
}

#[tokio::test]
async fn configured_default_format_drives_extension() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::default());
    let cfg = CacheConfig { default_format: ImageFormat::webp, ..CacheConfig::new(tmp.path()) };
    let cache = CachedTransform::new(backend.clone(), cfg).unwrap();

    cache.transform(b"img", &width(10), &ImageConfig::default()).await.unwrap();
    let hit = cache.transform(b"img", &width(10), &ImageConfig::default()).await.unwrap();

    assert_eq!(hit.format, ImageFormat::webp);
    assert!(entries(tmp.path())[0].ends_with(".webp"));
}

#[tokio::test]
async fn differing_options_are_isolated() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::default());
    let cache = cached(backend.clone(), tmp.path());
    let config = ImageConfig::default();

    let small = cache.transform(b"img", &width(200), &config).await.unwrap();
    let large = cache.transform(b"img", &width(400), &config).await.unwrap();

    assert_eq!(backend.call_count(), 2);
    assert_ne!(small.data, large.data);
    assert_ne!(
        cache.key_for(b"img", &width(200), &config).unwrap(),
        cache.key_for(b"img", &width(400), &config).unwrap()
    );
    assert_eq!(entries(tmp.path()).len(), 2);
}

#[tokio::test]
async fn service_config_is_part_of_the_key() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::default());
    let cache = cached(backend.clone(), tmp.path());

    let tuned = ImageConfig::with_service_config(json!({ "limitInputPixels": false }).as_object().cloned().unwrap());
    cache.transform(b"img", &width(200), &ImageConfig::default()).await.unwrap();
    cache.transform(b"img", &width(200), &tuned).await.unwrap();
    assert_eq!(backend.call_count(), 2);

    // The backend sees the config exactly as the caller passed it.
    assert_eq!(backend.calls.lock().unwrap()[1].2, tuned);
}

#[tokio::test]
async fn backend_failure_passes_through_without_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("image-cache");
    let backend = Arc::new(MockBackend::failing());
    let cache = cached(backend.clone(), &root);

    let err = cache.transform(b"not an image", &width(200), &ImageConfig::default()).await.unwrap_err();

    assert!(matches!(err, ImageCacheError::TransformError(ref m) if m == "unsupported image"));
    assert_eq!(err.to_string(), "Transformation error: unsupported image");
    assert_eq!(backend.call_count(), 1);
    assert!(entries(&root).is_empty());
    assert_eq!(cache.stats().writes, 0);
}

#[tokio::test]
async fn unreadable_entry_is_fatal_and_skips_backend() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::default());
    let cache = cached(backend.clone(), tmp.path());

    let key = cache.key_for(b"img", &width(200), &ImageConfig::default()).unwrap();
    std::fs::create_dir(tmp.path().join(format!("{}.jpeg", key))).unwrap();

    let err = cache.transform(b"img", &width(200), &ImageConfig::default()).await.unwrap_err();
    assert!(matches!(err, ImageCacheError::Filesystem(_)));
    assert_eq!(backend.call_count(), 0);
}

/// Store that always misses and refuses every write.
struct ReadOnlyStore;

#[async_trait::async_trait]
impl Cache for ReadOnlyStore {
    async fn get(&self, _key: &CacheKey, _format: ImageFormat) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn put(&self, _key: &CacheKey, _format: ImageFormat, _data: &[u8]) -> Result<()> {
        Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only cache").into())
    }
}

#[tokio::test]
async fn write_failure_propagates() {
    let backend = Arc::new(MockBackend::default());
    let cache = CachedTransform::with_cache(backend.clone(), ReadOnlyStore, ImageFormat::jpeg);

    let err = cache.transform(b"img", &width(200), &ImageConfig::default()).await.unwrap_err();
    assert!(matches!(err, ImageCacheError::Filesystem(ref e) if e.kind() == std::io::ErrorKind::PermissionDenied));
    assert_eq!(err.to_string(), "read-only cache");
    assert_eq!(backend.call_count(), 1);
    assert_eq!(cache.stats().writes, 0);
}

#[tokio::test]
async fn cache_root_that_is_a_file_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("blocked");
    std::fs::write(&root, b"").unwrap();
    let backend = Arc::new(MockBackend::default());
    let cache = cached(backend.clone(), &root);

    let err = cache.transform(b"img", &width(200), &ImageConfig::default()).await.unwrap_err();
    assert!(matches!(err, ImageCacheError::Filesystem(_)));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn existing_entries_are_served_verbatim() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::default());
    let cache = cached(backend.clone(), tmp.path());

    // Seed the store directly; the decorator must trust what is there.
    let key = cache.key_for(b"img", &width(50), &ImageConfig::default()).unwrap();
    DiskCache::new(tmp.path()).put(&key, ImageFormat::jpeg, b"seeded").await.unwrap();

    let out = cache.transform(b"img", &width(50), &ImageConfig::default()).await.unwrap();
    assert_eq!(out.data, b"seeded");
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn concurrent_misses_on_one_key_all_succeed() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::default());
    let cache = Arc::new(cached(backend.clone(), tmp.path()));

    let tasks = (0..8).map(|_| {
        let cache = cache.clone();
        tokio::spawn(async move { cache.transform(b"img", &width(120), &ImageConfig::default()).await })
    });
    let results = futures::future::join_all(tasks).await;

    let outputs: Vec<_> = results.into_iter().map(|r| r.unwrap().unwrap()).collect();
    assert!(outputs.windows(2).all(|w| w[0] == w[1]));
    assert!(backend.call_count() >= 1);

    let names = entries(tmp.path());
    assert_eq!(names.len(), 1, "no temporaries may be left behind: {:?}", names);
    assert_eq!(std::fs::read(tmp.path().join(&names[0])).unwrap(), outputs[0].data);
}

#[tokio::test]
async fn empty_cache_dir_is_rejected() {
    let backend = Arc::new(MockBackend::default());
    let err = CachedTransform::new(backend, CacheConfig::new("")).err().unwrap();
    assert!(matches!(err, ImageCacheError::Config(_)));
}

#[tokio::test]
async fn extra_option_shadowing_a_typed_field_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::default());
    let cache = cached(backend.clone(), tmp.path());

    cache.transform(b"img", &width(300), &ImageConfig::default()).await.unwrap();

    let mut shadowed = width(200);
    shadowed.extra.insert("width".into(), json!(300));
    let err = cache.transform(b"img", &shadowed, &ImageConfig::default()).await.unwrap_err();

    assert!(matches!(err, ImageCacheError::InvalidArgument(_)));
    assert_eq!(backend.call_count(), 1, "the width-300 entry must not answer a width-200 request");
    assert_eq!(cache.stats().hits, 0);
}
