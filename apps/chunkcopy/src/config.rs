//! Client settings: optional TOML file, overridden by command-line flags.
//!
//! ```toml
//! destination_address = "backup-host:5678"
//! chunk_size = 16777216
//! worker_count = 8
//! ```

use std::path::Path;

use anyhow::Context;
use chunkcopy_client::ClientConfig;
use chunkcopy_transfer::DEFAULT_CHUNK_SIZE;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Server host and port.
    #[serde(default)]
    pub destination_address: String,

    /// Multipart chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Concurrent upload workers.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            destination_address: String::new(),
            chunk_size: default_chunk_size(),
            worker_count: default_worker_count(),
        }
    }
}

impl Config {
    /// Reads settings from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Builds the effective settings: file (if any), then flags.
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(addr) = &cli.destination_address {
            config.destination_address = addr.clone();
        }
        if let Some(chunk_size) = cli.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(worker_count) = cli.worker_count {
            config.worker_count = worker_count;
        }

        if config.destination_address.is_empty() {
            anyhow::bail!("no destination address: pass --destination-address or set it in --config");
        }
        Ok(config)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server_addr: self.destination_address.clone(),
            chunk_size: self.chunk_size,
            worker_count: self.worker_count,
        }
    }
}
