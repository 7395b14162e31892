//! Fixed-length header codec.
//!
//! # Wire format
//!
//! Every request and response starts with a header of exactly
//! [`HEADER_LEN`] bytes: a 2-byte ASCII op tag followed by op-specific
//! fields, zero-padded to the full length. Integers are little-endian,
//! paths are UTF-8 prefixed by a single length byte.
//!
//! ```text
//! SC  [2..10] content_length  [10] path_len  [11..] path
//! SS  [2..18] digest
//! MI  [2] path_len  [3..] path
//! MS  [2..18] copy_id
//! MC  [2..18] copy_id  [18..26] part_number  [26..34] chunk_length
//! MT  [2..18] copy_id  [18..26] advisory_size
//! MM  [2..18] digest
//! ER  [2] error_kind
//! ```
//!
//! `SC` and `MC` headers are followed by exactly `content_length` /
//! `chunk_length` raw body bytes. All other messages are header-only.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::types::{Checksum, CopyId, DIGEST_LEN, ErrorKind};

/// Length of every header on the wire.
pub const HEADER_LEN: usize = 512;

/// Longest path a header can carry (1-byte length prefix).
pub const MAX_PATH_LEN: usize = u8::MAX as usize;

/// A raw, not yet decoded header.
pub type HeaderBytes = [u8; HEADER_LEN];

const TAG_SINGLE_COPY_REQUEST: [u8; 2] = *b"SC";
const TAG_SINGLE_COPY_SUCCESS: [u8; 2] = *b"SS";
const TAG_MULTIPART_INIT_REQUEST: [u8; 2] = *b"MI";
const TAG_MULTIPART_INIT_SUCCESS: [u8; 2] = *b"MS";
const TAG_MULTIPART_CHUNK_REQUEST: [u8; 2] = *b"MC";
const TAG_MULTIPART_COMPLETE_REQUEST: [u8; 2] = *b"MT";
const TAG_MULTIPART_SUCCESS: [u8; 2] = *b"MM";
const TAG_ERROR_RESPONSE: [u8; 2] = *b"ER";

/// Errors produced while encoding, decoding or exchanging headers.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path too long: {0} bytes (max {MAX_PATH_LEN})")]
    PathTooLong(usize),

    #[error("empty path")]
    EmptyPath,

    #[error("cannot encode an unknown message")]
    UnknownMessage,

    #[error("malformed {op} header: {reason}")]
    Malformed { op: &'static str, reason: String },

    #[error("unknown error kind code: {0}")]
    UnknownErrorKind(u8),
}

/// Every message the protocol defines, plus a sentinel for unrecognised tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Whole-file copy; the body follows the header.
    SingleCopyRequest { path: String, content_length: u64 },
    /// Digest of the bytes a single copy (or a single chunk) wrote.
    SingleCopySuccess { checksum: Checksum },
    MultipartInitRequest { path: String },
    MultipartInitSuccess { copy_id: CopyId },
    /// One chunk of a multipart copy; the body follows the header.
    MultipartChunkRequest {
        copy_id: CopyId,
        part_number: u64,
        chunk_length: u64,
    },
    /// `advisory_size` is informational only; the server stitches what it
    /// actually received.
    MultipartCompleteRequest { copy_id: CopyId, advisory_size: u64 },
    /// Digest of the stitched destination file.
    MultipartSuccess { checksum: Checksum },
    ErrorResponse { kind: ErrorKind },
    /// A header whose tag is not part of the protocol.
    Unknown { tag: [u8; 2] },
}

impl Message {
    /// Short name of the message kind, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SingleCopyRequest { .. } => "single-copy-request",
            Self::SingleCopySuccess { .. } => "single-copy-success",
            Self::MultipartInitRequest { .. } => "multipart-init-request",
            Self::MultipartInitSuccess { .. } => "multipart-init-success",
            Self::MultipartChunkRequest { .. } => "multipart-chunk-request",
            Self::MultipartCompleteRequest { .. } => "multipart-complete-request",
            Self::MultipartSuccess { .. } => "multipart-success",
            Self::ErrorResponse { .. } => "error-response",
            Self::Unknown { .. } => "unknown",
        }
    }

    /// Encodes the message into a zero-padded header.
    pub fn encode(&self) -> Result<HeaderBytes, WireError> {
        let mut buf = [0u8; HEADER_LEN];
        let mut w = HeaderWriter::new(&mut buf);

        match self {
            Self::SingleCopyRequest {
                path,
                content_length,
            } => {
                w.put(&TAG_SINGLE_COPY_REQUEST);
                w.put(&content_length.to_le_bytes());
                w.put_path(path)?;
            }
            Self::SingleCopySuccess { checksum } => {
                w.put(&TAG_SINGLE_COPY_SUCCESS);
                w.put(checksum.as_bytes());
            }
            Self::MultipartInitRequest { path } => {
                w.put(&TAG_MULTIPART_INIT_REQUEST);
                w.put_path(path)?;
            }
            Self::MultipartInitSuccess { copy_id } => {
                w.put(&TAG_MULTIPART_INIT_SUCCESS);
                w.put(copy_id.as_bytes());
            }
            Self::MultipartChunkRequest {
                copy_id,
                part_number,
                chunk_length,
            } => {
                w.put(&TAG_MULTIPART_CHUNK_REQUEST);
                w.put(copy_id.as_bytes());
                w.put(&part_number.to_le_bytes());
                w.put(&chunk_length.to_le_bytes());
            }
            Self::MultipartCompleteRequest {
                copy_id,
                advisory_size,
            } => {
                w.put(&TAG_MULTIPART_COMPLETE_REQUEST);
                w.put(copy_id.as_bytes());
                w.put(&advisory_size.to_le_bytes());
            }
            Self::MultipartSuccess { checksum } => {
                w.put(&TAG_MULTIPART_SUCCESS);
                w.put(checksum.as_bytes());
            }
            Self::ErrorResponse { kind } => {
                w.put(&TAG_ERROR_RESPONSE);
                w.put(&[kind.code()]);
            }
            Self::Unknown { .. } => return Err(WireError::UnknownMessage),
        }

        Ok(buf)
    }

    /// Decodes a header.
    ///
    /// An unrecognised tag yields [`Message::Unknown`] without looking at
    /// any further bytes. A recognised tag with malformed fields is an error.
    pub fn decode(buf: &HeaderBytes) -> Result<Self, WireError> {
        let tag = [buf[0], buf[1]];
        let mut r = HeaderReader::new(buf);

        let msg = match tag {
            TAG_SINGLE_COPY_REQUEST => {
                let content_length = r.u64();
                let path = r.path("single-copy-request")?;
                Self::SingleCopyRequest {
                    path,
                    content_length,
                }
            }
            TAG_SINGLE_COPY_SUCCESS => Self::SingleCopySuccess {
                checksum: r.checksum(),
            },
            TAG_MULTIPART_INIT_REQUEST => Self::MultipartInitRequest {
                path: r.path("multipart-init-request")?,
            },
            TAG_MULTIPART_INIT_SUCCESS => Self::MultipartInitSuccess {
                copy_id: r.copy_id(),
            },
            TAG_MULTIPART_CHUNK_REQUEST => Self::MultipartChunkRequest {
                copy_id: r.copy_id(),
                part_number: r.u64(),
                chunk_length: r.u64(),
            },
            TAG_MULTIPART_COMPLETE_REQUEST => Self::MultipartCompleteRequest {
                copy_id: r.copy_id(),
                advisory_size: r.u64(),
            },
            TAG_MULTIPART_SUCCESS => Self::MultipartSuccess {
                checksum: r.checksum(),
            },
            TAG_ERROR_RESPONSE => {
                let code = r.u8();
                let kind = ErrorKind::from_code(code).ok_or(WireError::UnknownErrorKind(code))?;
                Self::ErrorResponse { kind }
            }
            _ => Self::Unknown { tag },
        };

        Ok(msg)
    }
}

/// Sequential writer over a header buffer. Fields never exceed the buffer:
/// the largest layout (`SC` with a 255-byte path) is 266 bytes.
struct HeaderWriter<'a> {
    buf: &'a mut HeaderBytes,
    pos: usize,
}

impl<'a> HeaderWriter<'a> {
    fn new(buf: &'a mut HeaderBytes) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn put_path(&mut self, path: &str) -> Result<(), WireError> {
        let bytes = path.as_bytes();
        if bytes.is_empty() {
            return Err(WireError::EmptyPath);
        }
        if bytes.len() > MAX_PATH_LEN {
            return Err(WireError::PathTooLong(bytes.len()));
        }
        self.put(&[bytes.len() as u8]);
        self.put(bytes);
        Ok(())
    }
}

/// Sequential reader starting right after the op tag.
struct HeaderReader<'a> {
    buf: &'a HeaderBytes,
    pos: usize,
}

impl<'a> HeaderReader<'a> {
    fn new(buf: &'a HeaderBytes) -> Self {
        Self { buf, pos: 2 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u8(&mut self) -> u8 {
        let [b] = self.take::<1>();
        b
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take::<8>())
    }

    fn copy_id(&mut self) -> CopyId {
        CopyId::from_bytes(self.take::<16>())
    }

    fn checksum(&mut self) -> Checksum {
        Checksum(self.take::<DIGEST_LEN>())
    }

    fn path(&mut self, op: &'static str) -> Result<String, WireError> {
        let len = self.u8() as usize;
        if len == 0 {
            return Err(WireError::Malformed {
                op,
                reason: "empty path".into(),
            });
        }
        let raw = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        String::from_utf8(raw.to_vec()).map_err(|e| WireError::Malformed {
            op,
            reason: format!("invalid UTF-8 path: {e}"),
        })
    }
}

/// Reads exactly one header from the stream.
///
/// A stream that ends before [`HEADER_LEN`] bytes arrive is an error; no
/// field is interpreted until the whole header is in hand.
pub async fn read_header<R: AsyncRead + Unpin>(reader: &mut R) -> Result<HeaderBytes, WireError> {
    let mut buf = [0u8; HEADER_LEN];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Reads and decodes one header.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message, WireError> {
    let buf = read_header(reader).await?;
    Message::decode(&buf)
}

/// Encodes and writes one header. Does not flush.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &Message,
) -> Result<(), WireError> {
    let buf = msg.encode()?;
    writer.write_all(&buf).await?;
    Ok(())
}
