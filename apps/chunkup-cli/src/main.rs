//! chunkup: uploads files to a chunked storage service.

mod adapter;
mod app;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chunkup", about = "Upload files in chunks over WebSocket", version)]
struct Args {
    /// Files to upload.
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Storage service endpoint (ws:// or wss://).
    #[arg(long, env = "CHUNKUP_ENDPOINT")]
    endpoint: Option<String>,
    /// Bearer token for the storage service.
    #[arg(long, env = "CHUNKUP_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Requested chunk size in bytes.
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Configuration file (defaults to ~/.config/chunkup/config.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Whole-upload attempts, including the first.
    #[arg(long)]
    retries: Option<u32>,
    /// Send the file's SHA-256 in the init request.
    #[arg(long)]
    hash: bool,
    /// Use the bare file name as the server key.
    #[arg(long)]
    no_prefix: bool,
}

impl Args {
    /// Applies flags on top of the file configuration.
    fn apply(&self, config: &mut config::Config) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(token) = &self.token {
            config.auth_token = Some(token.clone());
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(attempts) = self.retries {
            config.attempts = attempts;
        }
        if self.hash {
            config.compute_hash = true;
        }
        if self.no_prefix {
            config.timestamp_keys = false;
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = config::Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    tracing::debug!(endpoint = %config.endpoint, chunk_size = config.chunk_size, "configuration ready");

    let rt = tokio::runtime::Runtime::new()?;
    let summary = rt.block_on(app::run(config, args.files))?;

    if summary.failed > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
