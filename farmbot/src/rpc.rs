//! Outstanding RPC requests, keyed by label

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use farmbot_core::RpcReply;

/// Requests waiting for an `rpc_ok` / `rpc_error`
///
/// Cloning shares the same table; the device keeps one handle and the reply
/// dispatcher another.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingRpcs {
    inner: Arc<Mutex<HashMap<String, oneshot::Sender<RpcReply>>>>,
}

impl PendingRpcs {
    /// Register a label before its request goes out
    pub fn register(&self, label: &str) -> oneshot::Receiver<RpcReply> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().insert(label.to_string(), tx);
        rx
    }

    /// Forget a label (timeout or failed publish)
    pub fn cancel(&self, label: &str) {
        self.inner.lock().remove(label);
    }

    /// Route a reply to its waiter; returns false for unknown labels
    pub fn resolve(&self, reply: RpcReply) -> bool {
        let waiter = self.inner.lock().remove(reply.label());

        match waiter {
            Some(tx) => {
                trace!("Resolving RPC {}", reply.label());
                // Waiter may have given up already
                let _ = tx.send(reply);
                true
            }
            None => {
                debug!("Reply for unknown label {}", reply.label());
                false
            }
        }
    }

    /// Drop every waiter; their receivers observe a closed channel
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
