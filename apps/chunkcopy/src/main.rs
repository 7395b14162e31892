//! chunkcopy client entry point.

mod cli;
mod config;

use chunkcopy_client::{CopyMode, copy_file};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::Config;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::resolve(&cli)?;
    let client_config = config.client_config();
    client_config.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        server = %client_config.server_addr,
        chunk_size = client_config.chunk_size,
        workers = client_config.worker_count,
        "starting chunkcopy"
    );

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(copy_file(&client_config, &cli.local_file, &cli.remote_file))?;

    let mode = match report.mode {
        CopyMode::Single => "single copy".to_string(),
        CopyMode::Multipart { total_parts } => format!("multipart copy, {total_parts} parts"),
    };
    tracing::info!(
        local = %cli.local_file.display(),
        remote = %cli.remote_file,
        size = report.size,
        checksum = %report.checksum,
        "copied ({mode})"
    );
    Ok(())
}
