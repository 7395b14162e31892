use std::path::Path;

use chunkcopy_protocol::Checksum;
use chunkcopy_transfer::calculate_file_checksum;
use tracing::{info, warn};

use crate::ClientError;
use crate::config::ClientConfig;
use crate::multipart::{MultipartUpload, complete_multipart, init_multipart};
use crate::single::single_copy;

/// How a file was transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    Single,
    Multipart { total_parts: u64 },
}

/// Result of a verified copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub mode: CopyMode,
    pub size: u64,
    /// Digest computed locally and confirmed by the server.
    pub checksum: Checksum,
}

/// Copies `local` to `remote` on the configured server.
///
/// Files smaller than the chunk size go through a single copy; everything
/// else is uploaded as a multipart copy. The whole-file digest is computed
/// once up front and must match the server's.
pub async fn copy_file(
    config: &ClientConfig,
    local: &Path,
    remote: &str,
) -> Result<CopyReport, ClientError> {
    config.validate()?;

    let size = tokio::fs::metadata(local).await?.len();
    let checksum = {
        let path = local.to_path_buf();
        tokio::task::spawn_blocking(move || calculate_file_checksum(&path))
            .await
            .map_err(std::io::Error::other)??
    };

    if size < config.chunk_size {
        single_copy(&config.server_addr, local, remote, checksum).await?;
        return Ok(CopyReport {
            mode: CopyMode::Single,
            size,
            checksum,
        });
    }

    info!(
        local = %local.display(),
        remote,
        server = %config.server_addr,
        size,
        %checksum,
        "multipart copy"
    );

    let copy_id = init_multipart(&config.server_addr, remote).await?;
    let upload = MultipartUpload::new(
        copy_id,
        local,
        config.chunk_size,
        config.worker_count,
        &config.server_addr,
    )?;
    let summary = upload.run().await;
    upload.close();

    if !summary.is_complete() {
        // Completing now would stitch a file with gaps.
        warn!(%copy_id, failed_parts = ?summary.failed_parts, "not completing multipart copy");
        return Err(ClientError::MultipartIncomplete {
            failed: summary.failed,
            total: summary.total_parts,
        });
    }

    let remote_checksum = complete_multipart(&config.server_addr, copy_id, size, checksum).await?;
    info!(%copy_id, remote, checksum = %remote_checksum, "multipart copy verified");

    Ok(CopyReport {
        mode: CopyMode::Multipart {
            total_parts: summary.total_parts,
        },
        size,
        checksum,
    })
}
