use std::path::Path;

use chunkcopy_protocol::{Checksum, Message};
use tracing::info;

use crate::ClientError;
use crate::connection::{exchange, single_copy_digest, verify_digest};

/// Uploads `local` to `remote` on a single connection.
///
/// `expected` is the digest of the local file, computed up front by the
/// caller. The server's digest must match it.
pub async fn single_copy(
    server_addr: &str,
    local: &Path,
    remote: &str,
    expected: Checksum,
) -> Result<Checksum, ClientError> {
    let file = tokio::fs::File::open(local).await?;
    let content_length = file.metadata().await?.len();

    info!(
        local = %local.display(),
        remote,
        server = server_addr,
        size = content_length,
        checksum = %expected,
        "single copy"
    );

    let request = Message::SingleCopyRequest {
        path: remote.to_string(),
        content_length,
    };
    let response = exchange(server_addr, &request, file, content_length).await?;
    let checksum = verify_digest(response, expected, single_copy_digest)?;

    info!(remote, %checksum, "single copy verified");
    Ok(checksum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkcopy_protocol::{ErrorKind, read_message, write_message};
    use chunkcopy_transfer::checksum_bytes;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Accepts one connection, consumes the request, and answers with
    /// `response`.
    async fn one_shot_server(response: Message) -> (String, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_message(&mut stream).await.unwrap();
            let Message::SingleCopyRequest { content_length, .. } = request else {
                panic!("unexpected request: {request:?}");
            };
            let mut body = vec![0u8; content_length as usize];
            stream.read_exact(&mut body).await.unwrap();
            write_message(&mut stream, &response).await.unwrap();
            body
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn sends_header_then_body() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("ten.bin");
        std::fs::write(&local, b"0123456789").unwrap();
        let digest = checksum_bytes(b"0123456789");

        let (addr, server) = one_shot_server(Message::SingleCopySuccess { checksum: digest }).await;
        let got = single_copy(&addr, &local, "/remote/ten.bin", digest).await.unwrap();

        assert_eq!(got, digest);
        assert_eq!(server.await.unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn digest_mismatch_is_an_error() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("f.bin");
        std::fs::write(&local, b"abc").unwrap();

        let (addr, server) = one_shot_server(Message::SingleCopySuccess {
            checksum: checksum_bytes(b"abd"),
        })
        .await;
        let result = single_copy(&addr, &local, "/remote/f.bin", checksum_bytes(b"abc")).await;

        assert!(matches!(result, Err(ClientError::ChecksumMismatch { .. })));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn server_error_is_propagated() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("f.bin");
        std::fs::write(&local, b"abc").unwrap();

        let (addr, server) = one_shot_server(Message::ErrorResponse {
            kind: ErrorKind::SingleCopyWrite,
        })
        .await;
        let err = single_copy(&addr, &local, "/remote/f.bin", checksum_bytes(b"abc"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "error writing single file at server");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn missing_local_file() {
        let dir = TempDir::new().unwrap();
        let result = single_copy(
            "127.0.0.1:1",
            &dir.path().join("missing"),
            "/remote/x",
            Checksum::default(),
        )
        .await;
        assert!(matches!(result, Err(ClientError::Io(_))));
    }
}
