//! Receiving side of chunkcopy.
//!
//! A fixed pool of handler tasks consumes a bounded queue of accepted
//! connections. Each connection carries exactly one request: a single-copy
//! upload, a multipart init, one multipart chunk, or a multipart complete.
//! In-flight copies are tracked in an [`OperationRegistry`] keyed by
//! destination path and by copy id.

mod config;
mod handler;
mod registry;
mod server;
mod stitch;
mod writer;

pub use config::{DEFAULT_PORT, ServerConfig};
pub use registry::{MultipartOp, MultipartState, OperationRegistry, SingleCopyGuard};
pub use server::CopyServer;
pub use stitch::stitch_parts;
pub use writer::write_body;

pub use chunkcopy_protocol::TCP_BUFFER_SIZE;

use std::time::Duration;

/// How long a connection may take to deliver its request header.
pub const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors produced by the copy server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire error: {0}")]
    Wire(#[from] chunkcopy_protocol::WireError),

    #[error("timed out waiting for request header")]
    HeaderTimeout,

    #[error("connection closed after {received} of {expected} body bytes")]
    TruncatedBody { expected: u64, received: u64 },

    #[error("invalid part number: {0}")]
    InvalidPartNumber(u64),

    #[error("failed to stitch part {part}: {source}")]
    Stitch {
        part: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
