use clap::{Parser, Subcommand};
use imagecache::cache::DiskCache;
use imagecache::config::{CacheConfig, ImageFormat};
use imagecache::transform::params::{FitMode, ImageConfig, TransformOptions};
use imagecache::{CachedTransform, ImageBackend, TransformBackend};
use std::path::PathBuf;

/// Cached image transforms for static site builds.
///
/// Logging verbosity follows `RUST_LOG` (default: "imagecache=info").
/// `IMAGECACHE_DIR` and `IMAGECACHE_DEFAULT_FORMAT` set the defaults that
/// `--cache-dir` and the format fallback use.
#[derive(Parser, Debug)]
#[command(name = "imagecache", version, about)]
struct Cli {
    /// Cache root; overrides IMAGECACHE_DIR.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transform one image, answering from the cache when possible.
    Transform {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(short, long)]
        quality: Option<u8>,
        #[arg(short, long)]
        format: Option<ImageFormat>,
        #[arg(long)]
        fit: Option<FitMode>,
    },
    /// Show how many entries the cache root holds.
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imagecache=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = CacheConfig::from_env()?;
    if let Some(dir) = cli.cache_dir {
        cfg.cache_dir = dir;
    }
    cfg.validate()?;

    match cli.command {
        Command::Transform { input, output, width, height, quality, format, fit } => {
            let bytes = tokio::fs::read(&input).await?;
            let options = TransformOptions { width, height, quality, format, fit, ..Default::default() };

            let backend = ImageBackend { default_format: cfg.default_format, ..ImageBackend::default() };
            let cached = CachedTransform::new(backend, cfg)?;
            let result = cached.transform(&bytes, &options, &ImageConfig::default()).await?;
            tokio::fs::write(&output, &result.data).await?;

            let stats = cached.stats();
            tracing::info!(
                input = %input.display(),
                output = %output.display(),
                format = %result.format,
                bytes = result.data.len(),
                hit = stats.hits > 0,
                "transform complete"
            );
        }
        Command::Stats => {
            let cache = DiskCache::new(&cfg.cache_dir);
            let stats = cache.entry_stats().await?;
            tracing::info!(dir = %cache.dir().display(), "cache stats");
            println!(
                "{} entries, {:.2} MB in {}",
                stats.entry_count,
                stats.total_size_bytes as f64 / 1024.0 / 1024.0,
                cache.dir().display()
            );
        }
    }
    Ok(())
}
