//! Request tracking
//!
//! Correlates outgoing requests with the responses that arrive on the
//! receive loop.
//!
//! # Request Lifecycle
//!
//! 1. **Generate ID**: Assign a unique id to the request
//! 2. **Register**: Create a oneshot channel for its response
//! 3. **Send**: Transmit the request over WebSocket
//! 4. **Wait**: The caller awaits the oneshot receiver
//! 5. **Complete**: The receive loop matches the response id and delivers it
//!
//! Responses may arrive in any order. Timeouts are applied by the caller by
//! racing the receiver against `tokio::time::timeout`, followed by
//! [`RequestManager::forget`] so the entry does not linger.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tailor_core::{Error, Response, Result};
use tokio::sync::{oneshot, Mutex};

type PendingMap = HashMap<u64, oneshot::Sender<Result<Response>>>;

/// Manager for tracking pending requests
#[derive(Clone, Default)]
pub struct RequestManager {
    pending: Arc<Mutex<PendingMap>>,
    counter: Arc<AtomicU64>,
}

impl RequestManager {
    /// Create a new request manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a new unique request id, starting at 1
    ///
    /// Id 0 is left for server replies to requests whose id could not be read.
    pub fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Register a pending request
    pub async fn register(&self, id: u64) -> oneshot::Receiver<Result<Response>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        rx
    }

    /// Complete a pending request with its response
    ///
    /// Returns `false` if no request with that id was waiting.
    pub async fn complete(&self, response: Response) -> bool {
        match self.pending.lock().await.remove(&response.id) {
            Some(tx) => {
                let _ = tx.send(Ok(response));
                true
            }
            None => false,
        }
    }

    /// Drop a pending request without answering it
    pub async fn forget(&self, id: u64) {
        self.pending.lock().await.remove(&id);
    }

    /// Fail all pending requests
    pub async fn fail_all(&self, error: Error) {
        let mut pending = self.pending.lock().await;
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(error.clone()));
        }
    }

    /// Number of requests waiting for a response
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
