//! Streams a request body to disk while accumulating its digest.

use std::path::Path;

use chunkcopy_protocol::Checksum;
use chunkcopy_transfer::ContentHasher;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::{ServerError, TCP_BUFFER_SIZE};

/// Writes exactly `content_length` bytes from `reader` to `dest`, creating
/// or truncating it, and returns the digest of those bytes.
///
/// The same routine serves single copies (destination file) and multipart
/// chunks (scratch part file).
pub async fn write_body<R: AsyncRead + Unpin>(
    reader: &mut R,
    dest: &Path,
    content_length: u64,
) -> Result<Checksum, ServerError> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(dest)
        .await?;

    let mut hasher = ContentHasher::new();
    let buf_len = content_length.min(TCP_BUFFER_SIZE as u64) as usize;
    let mut buf = vec![0u8; buf_len];
    let mut remaining = content_length;

    while remaining > 0 {
        let to_read = (remaining as usize).min(buf.len());
        let n = reader.read(&mut buf[..to_read]).await?;
        if n == 0 {
            return Err(ServerError::TruncatedBody {
                expected: content_length,
                received: content_length - remaining,
            });
        }

        file.write_all(&buf[..n]).await?;
        hasher.update(&buf[..n]);
        remaining -= n as u64;
    }

    file.flush().await?;
    Ok(hasher.finalize())
}

/// Reads and drops `len` body bytes so a rejected request can still be
/// answered on a clean connection.
pub(crate) async fn discard_body<R: AsyncRead + Unpin>(
    reader: &mut R,
    len: u64,
) -> Result<u64, ServerError> {
    let mut limited = reader.take(len);
    let n = tokio::io::copy(&mut limited, &mut tokio::io::sink()).await?;
    Ok(n)
}
