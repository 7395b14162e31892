//! Wire protocol for chunkcopy client/server communication.
//!
//! A transfer is a sequence of request/response exchanges, one per TCP
//! connection. Each exchange starts with a fixed-length header; see the
//! [`wire`] module for the byte layout.

pub mod types;
pub mod wire;

pub use types::{Checksum, CopyId, DIGEST_LEN, ErrorKind};
pub use wire::{
    HEADER_LEN, HeaderBytes, MAX_PATH_LEN, Message, WireError, read_header, read_message,
    write_message,
};

/// Socket buffer used when streaming request bodies (256 KB).
pub const TCP_BUFFER_SIZE: usize = 256 * 1024;
