//! Sending side of chunkcopy.
//!
//! [`copy_file`] hashes the local file, then either uploads it on one
//! connection (files smaller than the chunk size) or runs a multipart
//! session: init, a pool of workers uploading chunks concurrently, and a
//! complete request that makes the server stitch the parts.

mod config;
mod connection;
mod copy;
mod multipart;
mod single;

pub use config::ClientConfig;
pub use copy::{CopyMode, CopyReport, copy_file};
pub use multipart::{
    ChunkStatus, ChunkUploadResult, MultipartSummary, MultipartUpload, complete_multipart,
    init_multipart,
};
pub use single::single_copy;

pub use chunkcopy_protocol::TCP_BUFFER_SIZE;

use std::time::Duration;

use chunkcopy_protocol::{Checksum, ErrorKind, WireError};
use chunkcopy_transfer::TransferError;

/// Timeout for each connection attempt.
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors produced by the copy client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection timed out")]
    Timeout,

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("checksum mismatch: expected {expected}, server reported {actual}")]
    ChecksumMismatch { expected: Checksum, actual: Checksum },

    #[error("{0}")]
    Server(ErrorKind),

    #[error("unexpected response from server: {0}")]
    UnexpectedResponse(&'static str),

    #[error("multipart upload incomplete: {failed} of {total} parts failed")]
    MultipartIncomplete { failed: u64, total: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
