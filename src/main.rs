//! Embedding server entry point.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use embedding_server::config::DEFAULT_MODEL;
use embedding_server::embeddings::EmbeddingService;
use embedding_server::server::{init_metrics, init_tracing, App, ServerConfig};
use embedding_server::{Config, Result};

/// HTTP service exposing a pretrained sentence-embedding model
#[derive(Parser, Debug)]
#[command(name = "embedding-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Embedding model to load
    #[arg(short, long, env = "EMBEDDING_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Directory containing model folders (`<dir>/<model>/model.onnx`);
    /// models without one are downloaded from the Hugging Face hub
    #[arg(long, env = "MODELS_DIR", default_value = "./models")]
    models_dir: std::path::PathBuf,

    /// Host address to bind to
    #[arg(long, env = "MODEL_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "MODEL_PORT", default_value = "8000")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "EMBEDDING_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "EMBEDDING_LOG_JSON")]
    log_json: bool,

    /// Number of embedding worker threads
    #[arg(long, env = "EMBEDDING_THREADS", default_value = "2")]
    embedding_threads: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json);

    tracing::info!(
        "Embedding server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config {
        model_name: cli.model,
        models_dir: cli.models_dir,
        host: cli.host,
        port: cli.port,
        log_level: cli.log_level,
        embedding_threads: cli.embedding_threads,
    };

    tracing::debug!(?config, "Configuration loaded");
    config.validate()?;

    init_metrics();

    tracing::info!(
        model = %config.model_name,
        model_dir = %config.model_dir().display(),
        "Serving on {}",
        config.server_addr()
    );

    let service = EmbeddingService::new(config.model_name.clone(), config.embedding_threads);
    let app = App::new(
        ServerConfig {
            host: config.host.clone(),
            port: config.port,
        },
        service.clone(),
    );

    let listener = app.bind().await?;
    let loader = service.spawn_load_model(config.models_dir.clone());

    app.serve(listener, loader).await
}
