//! Pull-based sequencing of completion streams.
//!
//! [`StreamSequencer::start`] spawns one worker per request. The worker opens
//! the gateway and forwards chunks into a bounded channel in arrival order,
//! stopping after the first terminal chunk. The session pulls them back out
//! through a [`ChunkHandle`] on its own schedule. Dropping the handle aborts
//! the worker, which drops the HTTP response and releases the connection.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::future::{AbortHandle, Abortable};
use tokio::sync::mpsc;

use termai_providers::{CompletionGateway, CompletionRequest};
use termai_types::Chunk;

const CHUNK_CHANNEL_CAPACITY: usize = 64;

pub(crate) const WORKER_STOPPED: &str = "stream worker stopped before completion";

#[derive(Clone)]
pub struct StreamSequencer {
    gateway: Arc<dyn CompletionGateway>,
}

impl std::fmt::Debug for StreamSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSequencer").finish_non_exhaustive()
    }
}

impl StreamSequencer {
    pub fn new(gateway: Arc<dyn CompletionGateway>) -> Self {
        Self { gateway }
    }

    /// Submit `request` and return immediately.
    ///
    /// Connection and status failures arrive as the first chunk, carrying the
    /// gateway error text. Must be called from within a Tokio runtime.
    pub fn start(&self, request: CompletionRequest) -> ChunkHandle {
        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let (abort_handle, abort_registration) = AbortHandle::new_pair();
        let gateway = Arc::clone(&self.gateway);

        let task = async move {
            let mut stream = match gateway.open(request).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!("Completion request failed: {e}");
                    let _ = tx.send(Chunk::error(e.to_string())).await;
                    return;
                }
            };

            while let Some(chunk) = stream.next().await {
                let terminal = chunk.is_terminal();
                if tx.send(chunk).await.is_err() {
                    tracing::debug!("Chunk receiver dropped; stopping stream worker");
                    return;
                }
                if terminal {
                    return;
                }
            }

            // Source ended without a marker: treat as completion.
            let _ = tx.send(Chunk::end()).await;
        };

        tokio::spawn(async move {
            let _ = Abortable::new(task, abort_registration).await;
        });

        ChunkHandle {
            rx,
            abort_handle,
            finished: false,
        }
    }
}

/// Receiving end of one in-flight completion.
#[derive(Debug)]
pub struct ChunkHandle {
    rx: mpsc::Receiver<Chunk>,
    abort_handle: AbortHandle,
    finished: bool,
}

impl ChunkHandle {
    /// Wait for the next chunk.
    ///
    /// After a terminal chunk has been returned every further call yields an
    /// end chunk without waiting.
    pub async fn next(&mut self) -> Chunk {
        if self.finished {
            return Chunk::end();
        }
        let chunk = self
            .rx
            .recv()
            .await
            .unwrap_or_else(|| Chunk::error(WORKER_STOPPED));
        self.observe(chunk)
    }

    /// Non-blocking variant of [`next`](Self::next) for the frame loop.
    pub fn try_next(&mut self) -> Option<Chunk> {
        if self.finished {
            return None;
        }
        let chunk = match self.rx.try_recv() {
            Ok(chunk) => chunk,
            Err(mpsc::error::TryRecvError::Empty) => return None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                tracing::warn!("Stream channel disconnected");
                Chunk::error(WORKER_STOPPED)
            }
        };
        Some(self.observe(chunk))
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn cancel(&mut self) {
        self.abort_handle.abort();
        self.rx.close();
        self.finished = true;
    }

    fn observe(&mut self, chunk: Chunk) -> Chunk {
        if chunk.is_terminal() {
            self.finished = true;
            self.abort_handle.abort();
        }
        chunk
    }
}

impl Drop for ChunkHandle {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}
