use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::{debug, info};
use url::Url;

use language_detection_worker::client::{InProcessWorkerFactory, LanguageDetectionWorkerClient};
use language_detection_worker::config::ClientConfig;
use language_detection_worker::documents::InMemoryDocumentStore;
use language_detection_worker::logging::init_logger;
use language_detection_worker::service::LanguageDetectionService;
use language_detection_worker::worker::KeywordClassifier;

#[derive(Parser, Debug)]
#[command(name = "language-detection-worker")]
#[command(about = "Detect the language of source files through the detection worker")]
#[command(version)]
struct Args {
    /// Files to classify
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// JSON configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Log level filter (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Disable ANSI colors in log output
    #[arg(long)]
    no_color: bool,

    /// Also write a debug-level session log to the user cache directory
    #[arg(long)]
    log_file: bool,

    /// Keep mirrors until their document is closed
    #[arg(long)]
    no_idle_eviction: bool,
}

fn file_uri(path: &Path) -> anyhow::Result<Url> {
    let absolute = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", path.display()))?;
    Url::from_file_path(&absolute).map_err(|_| anyhow!("Not a file path: {}", absolute.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = init_logger(args.no_color, args.log_level.as_deref(), args.log_file)
        .context("Failed to initialize logging")?;

    let mut config = ClientConfig::from_env_or_default(args.config.as_deref())?;
    if args.no_idle_eviction {
        config.idle_eviction = false;
    }
    debug!("Configuration: {:?}", config);

    let store = Arc::new(InMemoryDocumentStore::new());
    let factory = InProcessWorkerFactory::new(Arc::new(KeywordClassifier::loader()), config.detection.clone());
    let client = LanguageDetectionWorkerClient::new(config, store.clone(), Arc::new(factory));
    let service = LanguageDetectionService::new(client);

    for path in &args.files {
        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let uri = file_uri(path)?;
        store.open(uri.clone(), &text);

        let best = service.detect_language(&uri).await?;
        let ranked = service.detect_languages(&uri).await?;
        println!(
            "{}: {} [{}]",
            path.display(),
            best.as_deref().unwrap_or("unknown"),
            ranked.join(", ")
        );
        store.close(&uri);
    }

    service.dispose().await;
    info!("Detection metrics: {:?}", service.client().metrics());
    Ok(())
}
