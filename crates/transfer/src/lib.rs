//! Chunk planning and content checksums for chunkcopy transfers.
//!
//! The digest used end to end is MD5: 16 bytes, matching the digest field
//! of the wire headers.

mod checksum;
mod chunked;
mod types;

pub use checksum::{ContentHasher, calculate_file_checksum, checksum_bytes};
pub use chunked::ChunkSource;
pub use types::{ChunkMeta, plan_chunks, total_parts};

/// Default multipart chunk size: 16 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 16 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk {part_number} exceeds addressable memory ({length} bytes)")]
    ChunkTooLarge { part_number: u64, length: u64 },
}
