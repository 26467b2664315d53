use crate::cache::{Cache, CacheKey};
use crate::config::ImageFormat;
use crate::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

/// Disambiguates temporary files written concurrently by this process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Flat directory of `<key>.<format>` files.
///
/// There is no index or sidecar; the file name is the whole lookup. Entries
/// are written once and never touched again by this type.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

/// Summary of what currently sits in a cache directory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiskStats {
    pub entry_count: usize,
    pub total_size_bytes: u64,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey, format: ImageFormat) -> PathBuf {
        self.dir.join(key.file_name(format))
    }

    /// Counts the entries in the cache directory. A directory that was never
    /// created reports zero entries.
    pub async fn entry_stats(&self) -> Result<DiskStats> {
        let mut stats = DiskStats::default();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_entry_name(&path) {
                continue;
            }
            let meta = entry.metadata().await?;
            if meta.is_file() {
                stats.entry_count += 1;
                stats.total_size_bytes += meta.len();
            }
        }
        Ok(stats)
    }
}

/// `<hex>.<known extension>`; skips temporaries and foreign files.
fn is_entry_name(path: &Path) -> bool {
    let stem_ok = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false);
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ImageFormat::from_extension)
        .is_some();
    stem_ok && ext_ok
}

#[async_trait::async_trait]
impl Cache for DiskCache {
    async fn get(&self, key: &CacheKey, format: ImageFormat) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key, format)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &CacheKey, format: ImageFormat, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(key, format);
        // Readers only ever see complete entries: write aside, then rename.
        let tmp = self.dir.join(format!(
            ".{}.tmp.{}.{}",
            key.file_name(format),
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        if let Err(e) = fs::write(&tmp, bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}
