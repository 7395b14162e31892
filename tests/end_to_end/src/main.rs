fn main() {
    println!("Run `cargo test -p end-to-end` to execute the loopback copy scenarios.");
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use chunkcopy_client::{
        ClientConfig, ClientError, CopyMode, complete_multipart, copy_file, init_multipart,
    };
    use chunkcopy_protocol::{CopyId, ErrorKind, Message, read_message, write_message};
    use chunkcopy_server::{CopyServer, OperationRegistry, ServerConfig};
    use chunkcopy_transfer::{calculate_file_checksum, checksum_bytes};
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;
    use tokio_util::sync::CancellationToken;

    /// A loopback server with its own scratch and destination directories.
    struct Harness {
        dir: TempDir,
        addr: String,
        registry: Arc<OperationRegistry>,
        cancel: CancellationToken,
        server: tokio::task::JoinHandle<()>,
    }

    impl Harness {
        async fn start() -> Self {
            let dir = TempDir::new().unwrap();
            let cancel = CancellationToken::new();
            let server = CopyServer::new(
                ServerConfig {
                    bind_addr: "127.0.0.1:0".into(),
                    conn_queue_size: 32,
                    worker_count: 4,
                    scratch_dir: dir.path().join("scratch"),
                    ..ServerConfig::default()
                },
                cancel.clone(),
            );
            let listener = server.listen().await.unwrap();
            let addr = listener.local_addr().unwrap().to_string();
            let registry = server.registry();
            let server = tokio::spawn(async move { server.serve(listener).await.unwrap() });

            Self {
                dir,
                addr,
                registry,
                cancel,
                server,
            }
        }

        fn client(&self, chunk_size: u64, worker_count: usize) -> ClientConfig {
            ClientConfig {
                server_addr: self.addr.clone(),
                chunk_size,
                worker_count,
            }
        }

        fn write_source(&self, name: &str, data: &[u8]) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, data).unwrap();
            path
        }

        fn remote(&self, name: &str) -> String {
            self.dir.path().join(name).to_string_lossy().into_owned()
        }

        fn scratch_dir(&self) -> PathBuf {
            self.dir.path().join("scratch")
        }

        async fn stop(self) {
            self.cancel.cancel();
            self.server.await.unwrap();
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 256) as u8).collect()
    }

    async fn wait_until_busy(registry: &OperationRegistry, path: &str) {
        for _ in 0..500 {
            if registry.is_path_busy(path) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{path} never became busy");
    }

    fn assert_same_file(a: &Path, b: &Path) {
        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }

    #[tokio::test]
    async fn small_file_uses_single_copy() {
        let h = Harness::start().await;
        let source = h.write_source("ten.bin", b"0123456789");
        let remote = h.remote("ten.out");

        let report = copy_file(&h.client(500, 3), &source, &remote).await.unwrap();

        assert_eq!(report.mode, CopyMode::Single);
        assert_eq!(report.size, 10);
        assert_eq!(report.checksum, checksum_bytes(b"0123456789"));
        assert_same_file(&source, Path::new(&remote));
        assert!(h.registry.is_empty());
        h.stop().await;
    }

    #[tokio::test]
    async fn ragged_multipart_copy_is_byte_identical() {
        let h = Harness::start().await;
        let data = pattern(1200);
        let source = h.write_source("ragged.bin", &data);
        let remote = h.remote("ragged.out");

        let report = copy_file(&h.client(500, 3), &source, &remote).await.unwrap();

        assert_eq!(report.mode, CopyMode::Multipart { total_parts: 3 });
        assert_eq!(report.checksum, checksum_bytes(&data));
        assert_eq!(std::fs::read(&remote).unwrap(), data);
        assert!(h.registry.is_empty());
        assert_eq!(h.registry.multipart_count(), 0);

        // Stitching removes every part and the per-copy directory.
        let leftovers: Vec<_> = std::fs::read_dir(h.scratch_dir()).unwrap().collect();
        assert!(leftovers.is_empty());
        h.stop().await;
    }

    #[tokio::test]
    async fn round_trips_edge_sizes() {
        let h = Harness::start().await;
        let chunk_size = 64;

        for size in [0usize, 1, 63, 64, 65, 128, 1000] {
            let data = pattern(size);
            let source = h.write_source(&format!("edge-{size}.bin"), &data);
            let remote = h.remote(&format!("edge-{size}.out"));

            let report = copy_file(&h.client(chunk_size, 4), &source, &remote)
                .await
                .unwrap();

            let expected_mode = if (size as u64) < chunk_size {
                CopyMode::Single
            } else {
                CopyMode::Multipart {
                    total_parts: (size as u64).div_ceil(chunk_size),
                }
            };
            assert_eq!(report.mode, expected_mode, "size {size}");
            assert_eq!(std::fs::read(&remote).unwrap(), data, "size {size}");
            assert_eq!(
                calculate_file_checksum(Path::new(&remote)).unwrap(),
                report.checksum
            );
        }
        assert!(h.registry.is_empty());
        h.stop().await;
    }

    #[tokio::test]
    async fn many_workers_many_parts() {
        let h = Harness::start().await;
        let data = pattern(256 * 1024 + 17);
        let source = h.write_source("many.bin", &data);
        let remote = h.remote("many.out");

        let report = copy_file(&h.client(4096, 8), &source, &remote).await.unwrap();

        assert_eq!(report.mode, CopyMode::Multipart { total_parts: 65 });
        assert_eq!(std::fs::read(&remote).unwrap(), data);
        h.stop().await;
    }

    #[tokio::test]
    async fn second_copy_to_busy_path_is_rejected() {
        let h = Harness::start().await;
        let remote = h.remote("contended.out");
        let first_body = pattern(100);

        // Start a single copy and stall halfway through its body.
        let mut first = TcpStream::connect(&h.addr).await.unwrap();
        write_message(
            &mut first,
            &Message::SingleCopyRequest {
                path: remote.clone(),
                content_length: first_body.len() as u64,
            },
        )
        .await
        .unwrap();
        first.write_all(&first_body[..40]).await.unwrap();
        wait_until_busy(&h.registry, &remote).await;

        let other = h.write_source("other.bin", b"intruder");
        let err = copy_file(&h.client(500, 2), &other, &remote)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Server(ErrorKind::CopyInProgress)));

        let err = init_multipart(&h.addr, &remote).await.unwrap_err();
        assert!(matches!(err, ClientError::Server(ErrorKind::CopyInProgress)));

        // The original write finishes untouched.
        first.write_all(&first_body[40..]).await.unwrap();
        assert_eq!(
            read_message(&mut first).await.unwrap(),
            Message::SingleCopySuccess {
                checksum: checksum_bytes(&first_body)
            }
        );
        assert_eq!(std::fs::read(&remote).unwrap(), first_body);
        assert!(!h.registry.is_path_busy(&remote));
        h.stop().await;
    }

    #[tokio::test]
    async fn failed_write_reports_server_error_not_reset() {
        let h = Harness::start().await;
        let data = pattern(8 << 20);
        let source = h.write_source("unwritable.bin", &data);
        let remote = h.remote("no/such/dir/out.bin");

        let err = copy_file(&h.client(64 << 20, 2), &source, &remote)
            .await
            .unwrap_err();

        assert!(
            matches!(err, ClientError::Server(ErrorKind::SingleCopyWrite)),
            "got {err:?}"
        );
        assert!(!Path::new(&remote).exists());
        assert!(h.registry.is_empty());
        h.stop().await;
    }

    #[tokio::test]
    async fn unknown_copy_id_never_touches_disk() {
        let h = Harness::start().await;
        let bogus = CopyId::new_random();

        let mut stream = TcpStream::connect(&h.addr).await.unwrap();
        write_message(
            &mut stream,
            &Message::MultipartChunkRequest {
                copy_id: bogus,
                part_number: 1,
                chunk_length: 5,
            },
        )
        .await
        .unwrap();
        stream.write_all(b"hello").await.unwrap();
        assert_eq!(
            read_message(&mut stream).await.unwrap(),
            Message::ErrorResponse {
                kind: ErrorKind::CopyIdNotFound
            }
        );

        let err = complete_multipart(&h.addr, bogus, 5, checksum_bytes(b"hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Server(ErrorKind::CopyIdNotFound)));

        assert!(!h.scratch_dir().exists());
        h.stop().await;
    }

    #[tokio::test]
    async fn abandoned_session_keeps_path_reserved() {
        let h = Harness::start().await;
        let remote = h.remote("abandoned.out");

        let copy_id = init_multipart(&h.addr, &remote).await.unwrap();
        assert!(h.registry.multipart(&copy_id).is_some());

        // Without a complete request the path stays registered.
        let err = init_multipart(&h.addr, &remote).await.unwrap_err();
        assert!(matches!(err, ClientError::Server(ErrorKind::CopyInProgress)));

        // Completing with no parts stitches an empty file and frees the path.
        let checksum = complete_multipart(&h.addr, copy_id, 0, checksum_bytes(b""))
            .await
            .unwrap();
        assert_eq!(checksum, checksum_bytes(b""));
        assert_eq!(std::fs::read(&remote).unwrap(), b"");
        assert!(h.registry.is_empty());
        assert!(init_multipart(&h.addr, &remote).await.is_ok());
        h.stop().await;
    }

    #[tokio::test]
    async fn garbage_header_gets_parse_error() {
        let h = Harness::start().await;
        let mut stream = TcpStream::connect(&h.addr).await.unwrap();
        stream.write_all(&[0xAB; 512]).await.unwrap();
        assert_eq!(
            read_message(&mut stream).await.unwrap(),
            Message::ErrorResponse {
                kind: ErrorKind::ParseHeader
            }
        );
        h.stop().await;
    }

    #[tokio::test]
    async fn copies_to_distinct_paths_run_concurrently() {
        let h = Arc::new(Harness::start().await);
        let mut tasks = tokio::task::JoinSet::new();

        for i in 0..6 {
            let h = Arc::clone(&h);
            tasks.spawn(async move {
                let data = pattern(700 + i * 113);
                let source = h.write_source(&format!("c-{i}.bin"), &data);
                let remote = h.remote(&format!("c-{i}.out"));
                copy_file(&h.client(256, 3), &source, &remote).await.unwrap();
                (remote, data)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            let (remote, data) = joined.unwrap();
            assert_eq!(std::fs::read(&remote).unwrap(), data);
        }

        let h = Arc::into_inner(h).unwrap();
        assert!(h.registry.is_empty());
        h.stop().await;
    }
}
