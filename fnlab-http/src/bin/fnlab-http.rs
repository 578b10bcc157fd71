use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use fnlab_core::{SecretConfig, SystemConfig, config};
use fnlab_http::{ServerConfig, start_server};
use secrecy::SecretString;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// fnlab HTTP API Server
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Host address to bind to
    #[arg(short = 'H', long, env = "FNLAB_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "FNLAB_PORT", default_value_t = 5000)]
    port: u16,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// JSON system configuration file
    #[arg(short, long, env = "FNLAB_CONFIG")]
    config: Option<PathBuf>,

    /// API key of the model endpoint; GROQ_API_KEY is used when unset
    #[arg(long, env = "FNLAB_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

fn init_tracing(log_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env は引数の解析前に読み込む
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let system_config: SystemConfig = match &cli.config {
        Some(path) => {
            info!("Loading configuration from file: {}", path.display());
            config::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?
        }
        None => SystemConfig::default(),
    };

    let api_key = cli
        .api_key
        .or_else(|| std::env::var("GROQ_API_KEY").ok())
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::from);

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        system_config: Some(system_config),
        secret_config: Some(SecretConfig { api_key }),
        ..Default::default()
    };
    start_server(config).await
}
