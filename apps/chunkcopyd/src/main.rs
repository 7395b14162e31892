//! chunkcopy server entry point.

mod cli;
mod config;

use chunkcopy_server::CopyServer;
use clap::Parser;
use tokio_util::sync::CancellationToken;
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
    let server_config = config.server_config();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %server_config.bind_addr,
        workers = server_config.worker_count,
        queue = server_config.conn_queue_size,
        scratch_dir = %server_config.scratch_dir.display(),
        "starting chunkcopyd"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let cancel = CancellationToken::new();

        let shutdown = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("shutdown requested");
                    shutdown.cancel();
                }
                Err(e) => tracing::error!("cannot listen for shutdown signal: {e}"),
            }
        });

        CopyServer::new(server_config, cancel).run().await
    })?;

    tracing::info!("server shut down cleanly");
    Ok(())
}
