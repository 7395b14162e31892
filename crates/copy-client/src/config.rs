use chunkcopy_transfer::DEFAULT_CHUNK_SIZE;

use crate::ClientError;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address as `host:port`.
    pub server_addr: String,
    /// Multipart chunk size in bytes. Files smaller than this are sent as a
    /// single copy.
    pub chunk_size: u64,
    /// Number of concurrent chunk upload workers.
    pub worker_count: usize,
}

impl ClientConfig {
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.server_addr.is_empty() {
            return Err(ClientError::InvalidConfig("server address is empty".into()));
        }
        if self.chunk_size == 0 {
            return Err(ClientError::InvalidConfig(
                "chunk size must be greater than zero".into(),
            ));
        }
        if self.worker_count == 0 {
            return Err(ClientError::InvalidConfig(
                "worker count must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
