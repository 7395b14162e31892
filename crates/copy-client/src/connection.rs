//! One request/response exchange per connection.

use chunkcopy_protocol::{Checksum, Message, read_message, write_message};
use tokio::io::{AsyncRead, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::debug;

use crate::{ClientError, TCP_BUFFER_SIZE, TCP_CONNECT_TIMEOUT};

/// Opens a fresh connection to the server.
pub(crate) async fn connect(addr: &str) -> Result<TcpStream, ClientError> {
    match tokio::time::timeout(TCP_CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            debug!(%addr, "connected");
            Ok(stream)
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(ClientError::Timeout),
    }
}

/// Sends `request` followed by `body_len` bytes from `body`, then reads one
/// response header.
pub(crate) async fn exchange<B>(
    addr: &str,
    request: &Message,
    body: B,
    body_len: u64,
) -> Result<Message, ClientError>
where
    B: AsyncRead + Unpin,
{
    let stream = connect(addr).await?;
    let (mut reader, writer) = stream.into_split();
    let mut writer = BufWriter::with_capacity(TCP_BUFFER_SIZE, writer);

    write_message(&mut writer, request).await?;
    let mut body = tokio::io::AsyncReadExt::take(body, body_len);
    let sent = tokio::io::copy(&mut body, &mut writer).await?;
    if sent != body_len {
        return Err(ClientError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("body ended after {sent} of {body_len} bytes"),
        )));
    }
    writer.flush().await?;

    Ok(read_message(&mut reader).await?)
}

/// Sends a header-only request and reads the response.
pub(crate) async fn request(addr: &str, request: &Message) -> Result<Message, ClientError> {
    exchange(addr, request, tokio::io::empty(), 0).await
}

/// Interprets a digest-carrying response and checks it against `expected`.
///
/// `accept` picks the digest out of the success variant for this exchange.
pub(crate) fn verify_digest(
    response: Message,
    expected: Checksum,
    accept: fn(&Message) -> Option<Checksum>,
) -> Result<Checksum, ClientError> {
    if let Some(actual) = accept(&response) {
        if actual != expected {
            return Err(ClientError::ChecksumMismatch { expected, actual });
        }
        return Ok(actual);
    }
    Err(unexpected(response))
}

/// Maps a response that is not the expected success variant to an error.
pub(crate) fn unexpected(response: Message) -> ClientError {
    match response {
        Message::ErrorResponse { kind } => ClientError::Server(kind),
        other => ClientError::UnexpectedResponse(other.name()),
    }
}

pub(crate) fn single_copy_digest(msg: &Message) -> Option<Checksum> {
    match msg {
        Message::SingleCopySuccess { checksum } => Some(*checksum),
        _ => None,
    }
}

pub(crate) fn multipart_digest(msg: &Message) -> Option<Checksum> {
    match msg {
        Message::MultipartSuccess { checksum } => Some(*checksum),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkcopy_protocol::ErrorKind;

    #[test]
    fn verify_accepts_matching_digest() {
        let digest = Checksum([1; 16]);
        let got = verify_digest(
            Message::SingleCopySuccess { checksum: digest },
            digest,
            single_copy_digest,
        )
        .unwrap();
        assert_eq!(got, digest);
    }

    #[test]
    fn verify_reports_mismatch() {
        let result = verify_digest(
            Message::MultipartSuccess {
                checksum: Checksum([2; 16]),
            },
            Checksum([1; 16]),
            multipart_digest,
        );
        assert!(matches!(
            result,
            Err(ClientError::ChecksumMismatch { expected, actual })
                if expected == Checksum([1; 16]) && actual == Checksum([2; 16])
        ));
    }

    #[test]
    fn error_response_maps_to_server_error() {
        let result = verify_digest(
            Message::ErrorResponse {
                kind: ErrorKind::CopyInProgress,
            },
            Checksum::default(),
            single_copy_digest,
        );
        match result {
            Err(ClientError::Server(kind)) => {
                assert_eq!(kind, ErrorKind::CopyInProgress);
                assert_eq!(
                    ClientError::Server(kind).to_string(),
                    "copy operation already in progress for this path"
                );
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn wrong_success_variant_is_unexpected() {
        let result = verify_digest(
            Message::SingleCopySuccess {
                checksum: Checksum::default(),
            },
            Checksum::default(),
            multipart_digest,
        );
        assert!(matches!(result, Err(ClientError::UnexpectedResponse(_))));
    }
}
