//! Reassembly of numbered chunk files into the destination file.

use std::io;
use std::path::Path;

use chunkcopy_protocol::Checksum;
use chunkcopy_transfer::ContentHasher;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::{ServerError, TCP_BUFFER_SIZE};

/// Concatenates `<scratch_dir>/1 ..= <scratch_dir>/<part_count>` in order
/// into `dest` and returns the digest of the stitched bytes.
///
/// `dest` is created or truncated first. Each part file is deleted once
/// appended, and the emptied scratch directory is removed at the end. The
/// first failure aborts the stitch; whatever was already appended to
/// `dest` stays there.
pub async fn stitch_parts(
    scratch_dir: &Path,
    dest: &Path,
    part_count: u64,
) -> Result<Checksum, ServerError> {
    let mut out = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(dest)
        .await?;

    // Flush even on failure so the partial destination is on disk.
    let appended = append_parts(scratch_dir, &mut out, part_count).await;
    let flushed = out.flush().await;
    let checksum = appended?;
    flushed?;

    match tokio::fs::remove_dir(scratch_dir).await {
        Ok(()) => {}
        // A copy completed without any chunk never created its directory.
        Err(e) if e.kind() == io::ErrorKind::NotFound && part_count == 0 => {}
        Err(e) => return Err(e.into()),
    }

    Ok(checksum)
}

async fn append_parts(
    scratch_dir: &Path,
    out: &mut tokio::fs::File,
    part_count: u64,
) -> Result<Checksum, ServerError> {
    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; TCP_BUFFER_SIZE];

    for part in 1..=part_count {
        let part_path = scratch_dir.join(part.to_string());
        let stitch_err = |source: io::Error| ServerError::Stitch { part, source };

        let mut part_file = tokio::fs::File::open(&part_path)
            .await
            .map_err(stitch_err)?;
        let mut part_len = 0u64;
        loop {
            let n = part_file.read(&mut buf).await.map_err(stitch_err)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).await?;
            hasher.update(&buf[..n]);
            part_len += n as u64;
        }
        drop(part_file);

        tokio::fs::remove_file(&part_path)
            .await
            .map_err(stitch_err)?;
        debug!(part, bytes = part_len, "part stitched");
    }

    Ok(hasher.finalize())
}
