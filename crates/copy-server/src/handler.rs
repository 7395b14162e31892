//! Per-connection request dispatch.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chunkcopy_protocol::{Checksum, CopyId, ErrorKind, Message, read_header, write_message};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use crate::ServerError;
use crate::registry::OperationRegistry;
use crate::stitch::stitch_parts;
use crate::writer::{discard_body, write_body};

/// State shared by every connection handler.
#[derive(Debug)]
pub(crate) struct HandlerContext {
    pub registry: Arc<OperationRegistry>,
    pub scratch_dir: PathBuf,
    pub header_timeout: Duration,
}

/// Serves the single request carried by `stream`, then lets it close.
pub(crate) async fn handle_connection<S>(mut stream: S, peer: SocketAddr, ctx: &HandlerContext)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = dispatch(&mut stream, ctx).await {
        warn!(%peer, "connection failed: {e}");
    }
    let _ = stream.shutdown().await;
}

async fn dispatch<S>(stream: &mut S, ctx: &HandlerContext) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // A short or late header means the peer is gone; nothing to answer.
    let header = match tokio::time::timeout(ctx.header_timeout, read_header(stream)).await {
        Ok(header) => header?,
        Err(_) => return Err(ServerError::HeaderTimeout),
    };

    let msg = match Message::decode(&header) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("rejecting malformed header: {e}");
            return reply_error(stream, ErrorKind::ParseHeader).await;
        }
    };

    match msg {
        Message::SingleCopyRequest {
            path,
            content_length,
        } => single_copy(stream, ctx, &path, content_length).await,
        Message::MultipartInitRequest { path } => multipart_init(stream, ctx, &path).await,
        Message::MultipartChunkRequest {
            copy_id,
            part_number,
            chunk_length,
        } => multipart_chunk(stream, ctx, copy_id, part_number, chunk_length).await,
        Message::MultipartCompleteRequest {
            copy_id,
            advisory_size,
        } => multipart_complete(stream, ctx, copy_id, advisory_size).await,
        other => {
            warn!(op = other.name(), "unexpected message from client");
            reply_error(stream, ErrorKind::ParseHeader).await
        }
    }
}

async fn single_copy<S>(
    stream: &mut S,
    ctx: &HandlerContext,
    path: &str,
    content_length: u64,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(_guard) = ctx.registry.admit_single(path) else {
        warn!(path, "single copy rejected: copy already in progress");
        discard_body(stream, content_length).await?;
        return reply_error(stream, ErrorKind::CopyInProgress).await;
    };

    info!(path, content_length, "single copy started");
    match receive_body(stream, Path::new(path), content_length).await {
        Ok(checksum) => {
            info!(path, %checksum, "single copy written");
            reply(stream, &Message::SingleCopySuccess { checksum }).await
        }
        Err(e) => {
            warn!(path, "single copy failed: {e}");
            reply_error(stream, ErrorKind::SingleCopyWrite).await
        }
    }
}

async fn multipart_init<S>(stream: &mut S, ctx: &HandlerContext, path: &str) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(op) = ctx.registry.begin_multipart(path, &ctx.scratch_dir) else {
        warn!(path, "multipart init rejected: copy already in progress");
        return reply_error(stream, ErrorKind::CopyInProgress).await;
    };

    let copy_id = op.copy_id();
    info!(path, %copy_id, "multipart copy initiated");

    if let Err(e) = reply(stream, &Message::MultipartInitSuccess { copy_id }).await {
        // The client never learned the id; nothing could complete this copy.
        ctx.registry.finish_multipart(&op);
        return Err(e);
    }
    Ok(())
}

async fn multipart_chunk<S>(
    stream: &mut S,
    ctx: &HandlerContext,
    copy_id: CopyId,
    part_number: u64,
    chunk_length: u64,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(op) = ctx.registry.multipart(&copy_id) else {
        warn!(%copy_id, part_number, "chunk rejected: unknown copy id");
        discard_body(stream, chunk_length).await?;
        return reply_error(stream, ErrorKind::CopyIdNotFound).await;
    };

    if part_number == 0 {
        warn!(%copy_id, "chunk rejected: {}", ServerError::InvalidPartNumber(part_number));
        discard_body(stream, chunk_length).await?;
        return reply_error(stream, ErrorKind::PartWrite).await;
    }

    if let Err(e) = tokio::fs::create_dir_all(op.scratch_dir()).await {
        warn!(%copy_id, dir = %op.scratch_dir().display(), "cannot create scratch directory: {e}");
        discard_body(stream, chunk_length).await?;
        return reply_error(stream, ErrorKind::PartWrite).await;
    }

    let part_path = op.scratch_dir().join(part_number.to_string());
    match receive_body(stream, &part_path, chunk_length).await {
        Ok(checksum) => {
            let received = op.record_part();
            debug!(%copy_id, part_number, chunk_length, %checksum, received, "chunk written");
            reply(stream, &Message::SingleCopySuccess { checksum }).await
        }
        Err(e) => {
            warn!(%copy_id, part_number, "chunk write failed: {e}");
            reply_error(stream, ErrorKind::PartWrite).await
        }
    }
}

async fn multipart_complete<S>(
    stream: &mut S,
    ctx: &HandlerContext,
    copy_id: CopyId,
    advisory_size: u64,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(op) = ctx.registry.multipart(&copy_id) else {
        warn!(%copy_id, "complete rejected: unknown copy id");
        return reply_error(stream, ErrorKind::CopyIdNotFound).await;
    };

    if !op.begin_completion() {
        warn!(%copy_id, state = ?op.state(), "complete rejected: already completing");
        return reply_error(stream, ErrorKind::CopyInProgress).await;
    }

    let parts = op.completed_parts();
    info!(%copy_id, path = op.path(), parts, advisory_size, "stitching multipart copy");

    let result = stitch_parts(op.scratch_dir(), Path::new(op.path()), parts).await;
    ctx.registry.finish_multipart(&op);

    match result {
        Ok(checksum) => {
            op.mark_completed();
            info!(%copy_id, path = op.path(), %checksum, "multipart copy completed");
            reply(stream, &Message::MultipartSuccess { checksum }).await
        }
        Err(e) => {
            error!(%copy_id, path = op.path(), "stitching failed: {e}");
            reply_error(stream, ErrorKind::Reassembly).await
        }
    }
}

/// Writes the body to `dest`; on failure the unread rest of the body is
/// drained so the client is still reading when the error reply goes out.
async fn receive_body<S>(
    stream: &mut S,
    dest: &Path,
    content_length: u64,
) -> Result<Checksum, ServerError>
where
    S: AsyncRead + Unpin,
{
    let mut body = stream.take(content_length);
    let result = write_body(&mut body, dest, content_length).await;
    if result.is_err() {
        let unread = body.limit();
        if let Err(e) = discard_body(&mut body, unread).await {
            debug!(dest = %dest.display(), "draining failed body: {e}");
        }
    }
    result
}

async fn reply<S>(stream: &mut S, msg: &Message) -> Result<(), ServerError>
where
    S: AsyncWrite + Unpin,
{
    write_message(stream, msg).await?;
    stream.flush().await?;
    Ok(())
}

async fn reply_error<S>(stream: &mut S, kind: ErrorKind) -> Result<(), ServerError>
where
    S: AsyncWrite + Unpin,
{
    reply(stream, &Message::ErrorResponse { kind }).await
}
