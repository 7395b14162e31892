//! Accept loop and handler pool.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ServerError;
use crate::config::ServerConfig;
use crate::handler::{HandlerContext, handle_connection};
use crate::registry::OperationRegistry;

type ConnQueue = Arc<Mutex<mpsc::Receiver<(TcpStream, SocketAddr)>>>;

/// TCP server receiving single and multipart copies.
pub struct CopyServer {
    config: ServerConfig,
    registry: Arc<OperationRegistry>,
    cancel: CancellationToken,
}

impl CopyServer {
    pub fn new(config: ServerConfig, cancel: CancellationToken) -> Self {
        Self {
            config,
            registry: Arc::new(OperationRegistry::new()),
            cancel,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Registry of in-flight copies.
    pub fn registry(&self) -> Arc<OperationRegistry> {
        Arc::clone(&self.registry)
    }

    /// Validates the configuration and binds the listener.
    pub async fn listen(&self) -> Result<TcpListener, ServerError> {
        self.config.validate()?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "copy server listening");
        Ok(listener)
    }

    /// Binds and serves until cancelled.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.listen().await?;
        self.serve(listener).await
    }

    /// Accepts connections on `listener` until the cancel token fires.
    ///
    /// Accepted connections are queued for `worker_count` handler tasks.
    /// When the queue is full the accept loop waits for a free slot. On
    /// cancel, already queued connections are still served before this
    /// returns.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.config.validate()?;

        let (tx, rx) = mpsc::channel(self.config.conn_queue_size);
        let queue: ConnQueue = Arc::new(Mutex::new(rx));
        let ctx = Arc::new(HandlerContext {
            registry: Arc::clone(&self.registry),
            scratch_dir: self.config.scratch_dir.clone(),
            header_timeout: self.config.header_timeout,
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.worker_count {
            workers.spawn(handler_loop(worker_id, Arc::clone(&queue), Arc::clone(&ctx)));
        }
        info!(
            workers = self.config.worker_count,
            queue = self.config.conn_queue_size,
            scratch_dir = %self.config.scratch_dir.display(),
            "handler pool started"
        );

        let result = self.accept_loop(&listener, &tx).await;

        // Closing the queue lets each handler drain it and exit.
        drop(tx);
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("handler task failed: {e}");
            }
        }
        info!("copy server stopped");
        result
    }

    async fn accept_loop(
        &self,
        listener: &TcpListener,
        tx: &mpsc::Sender<(TcpStream, SocketAddr)>,
    ) -> Result<(), ServerError> {
        loop {
            let (stream, peer) = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("copy server cancelled");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        continue;
                    }
                },
            };

            debug!(%peer, "connection accepted");
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("copy server cancelled");
                    return Ok(());
                }
                sent = tx.send((stream, peer)) => {
                    if sent.is_err() {
                        // Every handler is gone.
                        return Err(ServerError::Io(std::io::Error::other(
                            "connection queue closed",
                        )));
                    }
                }
            }
        }
    }
}

async fn handler_loop(worker_id: usize, queue: ConnQueue, ctx: Arc<HandlerContext>) {
    loop {
        // The lock is held only while waiting for the next connection.
        let next = queue.lock().await.recv().await;
        let Some((stream, peer)) = next else {
            debug!(worker_id, "handler exiting");
            return;
        };

        let ctx = Arc::clone(&ctx);
        let task = tokio::spawn(async move { handle_connection(stream, peer, &ctx).await });
        if let Err(e) = task.await {
            error!(worker_id, %peer, "connection handler panicked: {e}");
        }
    }
}
