//! Multipart session: init, concurrent chunk uploads, complete.
//!
//! A [`MultipartUpload`] plans the chunks of the source file and runs a
//! fixed pool of workers over a bounded job queue. Every worker dials a
//! fresh connection per chunk, sends the chunk, and checks the digest the
//! server returns against its own. A failed chunk never stops the other
//! uploads; [`MultipartUpload::run`] always waits for every worker and
//! accounts for every part before it returns.

use std::path::Path;
use std::sync::Arc;

use chunkcopy_protocol::{Checksum, CopyId, Message};
use chunkcopy_transfer::{ChunkMeta, ChunkSource, checksum_bytes, plan_chunks};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::ClientError;
use crate::connection::{exchange, multipart_digest, request, unexpected, verify_digest};

/// Outcome of one chunk upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    Successful,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkUploadResult {
    pub part_number: u64,
    pub status: ChunkStatus,
}

/// Aggregate of a finished upload run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartSummary {
    pub total_parts: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Part numbers that did not upload, ascending.
    pub failed_parts: Vec<u64>,
}

impl MultipartSummary {
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.succeeded == self.total_parts
    }
}

/// Asks the server to open a multipart session for `remote`.
pub async fn init_multipart(server_addr: &str, remote: &str) -> Result<CopyId, ClientError> {
    let response = request(
        server_addr,
        &Message::MultipartInitRequest {
            path: remote.to_string(),
        },
    )
    .await?;

    match response {
        Message::MultipartInitSuccess { copy_id } => {
            info!(%copy_id, remote, "multipart copy initiated");
            Ok(copy_id)
        }
        other => Err(unexpected(other)),
    }
}

/// Asks the server to stitch the uploaded parts and checks the digest of
/// the stitched file against `expected`.
pub async fn complete_multipart(
    server_addr: &str,
    copy_id: CopyId,
    advisory_size: u64,
    expected: Checksum,
) -> Result<Checksum, ClientError> {
    let response = request(
        server_addr,
        &Message::MultipartCompleteRequest {
            copy_id,
            advisory_size,
        },
    )
    .await?;
    verify_digest(response, expected, multipart_digest)
}

/// State shared by every upload worker of one session.
#[derive(Debug)]
struct WorkerContext {
    copy_id: CopyId,
    source: Arc<ChunkSource>,
    server_addr: String,
}

/// Chunk uploads of one multipart session.
#[derive(Debug)]
pub struct MultipartUpload {
    ctx: Arc<WorkerContext>,
    chunks: Vec<ChunkMeta>,
    worker_count: usize,
}

impl MultipartUpload {
    /// Opens `local` and plans its chunks.
    ///
    /// A zero-length file yields one zero-length part.
    pub fn new(
        copy_id: CopyId,
        local: &Path,
        chunk_size: u64,
        worker_count: usize,
        server_addr: &str,
    ) -> Result<Self, ClientError> {
        if worker_count == 0 {
            return Err(ClientError::InvalidConfig(
                "worker count must be greater than zero".into(),
            ));
        }
        let source = ChunkSource::open(local)?;
        let chunks = plan_chunks(source.file_size(), chunk_size)?;

        Ok(Self {
            ctx: Arc::new(WorkerContext {
                copy_id,
                source: Arc::new(source),
                server_addr: server_addr.to_string(),
            }),
            chunks,
            worker_count,
        })
    }

    pub fn copy_id(&self) -> CopyId {
        self.ctx.copy_id
    }

    pub fn total_parts(&self) -> u64 {
        self.chunks.len() as u64
    }

    pub fn chunks(&self) -> &[ChunkMeta] {
        &self.chunks
    }

    /// Uploads every chunk and reports how many succeeded.
    pub async fn run(&self) -> MultipartSummary {
        let total = self.chunks.len();
        let copy_id = self.ctx.copy_id;
        info!(
            %copy_id,
            parts = total,
            workers = self.worker_count,
            "uploading chunks"
        );

        // Both queues hold every part, so neither side ever blocks on send.
        let (job_tx, job_rx) = mpsc::channel::<ChunkMeta>(total);
        let (result_tx, mut result_rx) = mpsc::channel::<ChunkUploadResult>(total);

        for chunk in &self.chunks {
            if job_tx.send(*chunk).await.is_err() {
                break;
            }
        }
        drop(job_tx);

        let jobs = Arc::new(Mutex::new(job_rx));
        let mut workers = JoinSet::new();
        for worker_id in 0..self.worker_count.min(total) {
            workers.spawn(upload_worker(
                worker_id,
                Arc::clone(&jobs),
                result_tx.clone(),
                Arc::clone(&self.ctx),
            ));
        }
        drop(result_tx);

        // Barrier: every worker has exited before the results are tallied.
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(%copy_id, "upload worker failed: {e}");
            }
        }

        let mut results = Vec::with_capacity(total);
        while let Some(result) = result_rx.recv().await {
            results.push(result);
        }
        let summary = tally(&self.chunks, results);

        info!(
            %copy_id,
            total = summary.total_parts,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "chunk uploads finished"
        );
        summary
    }

    /// Releases the source file.
    pub fn close(self) {
        debug!(copy_id = %self.ctx.copy_id, "closing multipart source");
    }
}

/// Folds per-part results into a summary covering every planned chunk.
fn tally(
    chunks: &[ChunkMeta],
    results: impl IntoIterator<Item = ChunkUploadResult>,
) -> MultipartSummary {
    let mut reported = vec![None; chunks.len()];
    for result in results {
        let slot = (result.part_number as usize)
            .checked_sub(1)
            .and_then(|i| reported.get_mut(i));
        if let Some(slot) = slot {
            *slot = Some(result.status);
        }
    }

    let mut summary = MultipartSummary {
        total_parts: chunks.len() as u64,
        succeeded: 0,
        failed: 0,
        failed_parts: Vec::new(),
    };
    for (chunk, status) in chunks.iter().zip(reported) {
        match status {
            Some(ChunkStatus::Successful) => summary.succeeded += 1,
            // A part nobody reported on belonged to a crashed worker.
            Some(ChunkStatus::Failed) | None => {
                summary.failed += 1;
                summary.failed_parts.push(chunk.part_number);
            }
        }
    }
    summary
}

async fn upload_worker(
    worker_id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<ChunkMeta>>>,
    results: mpsc::Sender<ChunkUploadResult>,
    ctx: Arc<WorkerContext>,
) {
    loop {
        let next = jobs.lock().await.recv().await;
        let Some(chunk) = next else {
            debug!(worker_id, "no more chunks");
            return;
        };

        let status = match upload_chunk(&ctx, chunk).await {
            Ok(()) => {
                debug!(worker_id, part = chunk.part_number, "chunk uploaded");
                ChunkStatus::Successful
            }
            Err(e) => {
                warn!(
                    worker_id,
                    copy_id = %ctx.copy_id,
                    part = chunk.part_number,
                    "chunk upload failed: {e}"
                );
                ChunkStatus::Failed
            }
        };

        let result = ChunkUploadResult {
            part_number: chunk.part_number,
            status,
        };
        if results.send(result).await.is_err() {
            return;
        }
    }
}

async fn upload_chunk(ctx: &WorkerContext, chunk: ChunkMeta) -> Result<(), ClientError> {
    let source = Arc::clone(&ctx.source);
    let data = tokio::task::spawn_blocking(move || source.read_chunk(&chunk))
        .await
        .map_err(std::io::Error::other)??;
    let expected = checksum_bytes(&data);

    let request = Message::MultipartChunkRequest {
        copy_id: ctx.copy_id,
        part_number: chunk.part_number,
        chunk_length: chunk.length,
    };
    let response = exchange(&ctx.server_addr, &request, data.as_slice(), chunk.length).await?;

    // Chunk replies reuse the single-copy success tag.
    match response {
        Message::SingleCopySuccess { checksum } if checksum == expected => Ok(()),
        Message::SingleCopySuccess { checksum } => Err(ClientError::ChecksumMismatch {
            expected,
            actual: checksum,
        }),
        other => Err(unexpected(other)),
    }
}
