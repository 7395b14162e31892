use std::path::PathBuf;
use std::time::Duration;

use crate::{HEADER_READ_TIMEOUT, ServerError};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on, e.g. `0.0.0.0:5678` (port 0 = OS-assigned).
    pub bind_addr: String,
    /// Capacity of the accepted-connection queue. A full queue stalls the
    /// accept loop.
    pub conn_queue_size: usize,
    /// Number of connection handler tasks.
    pub worker_count: usize,
    /// Root directory for not-yet-stitched chunks
    /// (`<scratch_dir>/<copy_id>/<part_number>`).
    pub scratch_dir: PathBuf,
    /// Connections that have not sent a full header within this window are
    /// closed without a reply.
    pub header_timeout: Duration,
}

/// Default listen port.
pub const DEFAULT_PORT: u16 = 5678;

fn parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            conn_queue_size: parallelism() * 10,
            worker_count: parallelism(),
            scratch_dir: std::env::temp_dir().join("chunkcopy"),
            header_timeout: HEADER_READ_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Checks the values the server cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.bind_addr.is_empty() {
            return Err(ServerError::InvalidConfig("bind address is empty".into()));
        }
        if self.conn_queue_size == 0 {
            return Err(ServerError::InvalidConfig(
                "connection queue size must be greater than zero".into(),
            ));
        }
        if self.worker_count == 0 {
            return Err(ServerError::InvalidConfig(
                "worker count must be greater than zero".into(),
            ));
        }
        if self.header_timeout.is_zero() {
            return Err(ServerError::InvalidConfig(
                "header timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
