//! Server settings: optional TOML file, overridden by command-line flags.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chunkcopy_server::ServerConfig;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Accepted-connection queue capacity.
    #[serde(default = "default_conn_size")]
    pub conn_size: usize,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Seconds a client gets to send its request header.
    #[serde(default = "default_header_timeout_secs")]
    pub header_timeout_secs: u64,
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    chunkcopy_server::DEFAULT_PORT
}

fn default_conn_size() -> usize {
    ServerConfig::default().conn_queue_size
}

fn default_worker_count() -> usize {
    ServerConfig::default().worker_count
}

fn default_scratch_dir() -> PathBuf {
    ServerConfig::default().scratch_dir
}

fn default_header_timeout_secs() -> u64 {
    chunkcopy_server::HEADER_READ_TIMEOUT.as_secs()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            conn_size: default_conn_size(),
            worker_count: default_worker_count(),
            scratch_dir: default_scratch_dir(),
            header_timeout_secs: default_header_timeout_secs(),
        }
    }
}

impl Config {
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

        if let Some(bind) = cli.bind {
            config.bind = bind;
        }
        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(conn_size) = cli.conn_size {
            config.conn_size = conn_size;
        }
        if let Some(worker_count) = cli.worker_count {
            config.worker_count = worker_count;
        }
        if let Some(dir) = &cli.scratch_dir {
            config.scratch_dir = dir.clone();
        }
        Ok(config)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: SocketAddr::new(self.bind, self.port).to_string(),
            conn_queue_size: self.conn_size,
            worker_count: self.worker_count,
            scratch_dir: self.scratch_dir.clone(),
            header_timeout: Duration::from_secs(self.header_timeout_secs),
        }
    }
}
