//! Once-for-id reply slots of in-flight requests

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

use super::{DispatchError, DispatchResult, Event};

/// Whether a registered payload type answers a request with success or failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReplyKind {
    Success,
    Error,
}

#[derive(Debug)]
pub(crate) struct Delivery {
    pub kind: ReplyKind,
    pub event: Event,
}

/// Shared by every payload type registered for one request id; resolves once
struct ReplySlot {
    tx: Mutex<Option<oneshot::Sender<Delivery>>>,
}

impl ReplySlot {
    fn resolve(&self, delivery: Delivery) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(tx) = tx {
            let _ = tx.send(delivery);
        }
    }
}

struct Entry {
    kind: ReplyKind,
    slot: Arc<ReplySlot>,
}

/// Table of `(payload type, request id)` registrations
#[derive(Default)]
pub(crate) struct PendingTable {
    entries: Mutex<HashMap<(u32, String), Entry>>,
}

impl PendingTable {
    /// Register one once-for-id entry per expected payload type
    ///
    /// The returned guard releases every entry of the request when dropped.
    pub fn register(
        self: &Arc<Self>,
        request_id: &str,
        success: &[u32],
        error: &[u32],
    ) -> (PendingGuard, oneshot::Receiver<Delivery>) {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(ReplySlot {
            tx: Mutex::new(Some(tx)),
        });

        let kinds = success
            .iter()
            .map(|pt| (*pt, ReplyKind::Success))
            .chain(error.iter().map(|pt| (*pt, ReplyKind::Error)));

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut payload_types = Vec::with_capacity(success.len() + error.len());
        for (payload_type, kind) in kinds {
            entries.insert(
                (payload_type, request_id.to_string()),
                Entry {
                    kind,
                    slot: slot.clone(),
                },
            );
            payload_types.push(payload_type);
        }

        let guard = PendingGuard {
            table: self.clone(),
            request_id: request_id.to_string(),
            payload_types,
        };
        (guard, rx)
    }

    /// Resolve the request waiting for this exact payload type and id
    ///
    /// Returns `false` when nobody waits for it.
    pub fn deliver(&self, request_id: &str, event: Event) -> DispatchResult<bool> {
        let entry = self
            .entries
            .lock()
            .map_err(|_| DispatchError::Internal("pending table lock poisoned".to_string()))?
            .remove(&(event.payload_type, request_id.to_string()));

        match entry {
            Some(entry) => {
                entry.slot.resolve(Delivery {
                    kind: entry.kind,
                    event,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Number of registered entries
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drop every entry; their waiters observe the channel closing
    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn release(&self, request_id: &str, payload_types: &[u32]) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for payload_type in payload_types {
            entries.remove(&(*payload_type, request_id.to_string()));
        }
    }
}

/// Releases the entries of one request on every exit path
pub(crate) struct PendingGuard {
    table: Arc<PendingTable>,
    request_id: String,
    payload_types: Vec<u32>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.table.release(&self.request_id, &self.payload_types);
    }
}
