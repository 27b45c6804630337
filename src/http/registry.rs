//! Cancellation registry
//!
//! Maps request ids to the abort controller of the in-flight request so
//! callers can cancel one request or all of them. Entries are only added by
//! [`CancellationRegistry::register`] and always removed when the returned
//! [`Registration`] drops, whichever way the request settles.

use super::signal::{AbortController, AbortReason};
use crate::types::RequestId;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Default)]
pub(crate) struct CancellationRegistry {
    active: Mutex<BTreeMap<RequestId, AbortController>>,
    last_id: AtomicU64,
}

impl CancellationRegistry {
    fn lock(&self) -> MutexGuard<'_, BTreeMap<RequestId, AbortController>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fresh id; ids start at 1 and only grow
    pub(crate) fn next_id(&self) -> RequestId {
        self.last_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Track `controller` under `id` until the registration drops
    pub(crate) fn register(&self, id: RequestId, controller: AbortController) -> Registration<'_> {
        self.lock().insert(id, controller);
        Registration { registry: self, id }
    }

    /// Abort and forget one request
    pub(crate) fn cancel(&self, id: RequestId) -> bool {
        let removed = self.lock().remove(&id);
        match removed {
            Some(controller) => {
                controller.abort(AbortReason::Cancelled);
                debug!(request_id = id, "request cancelled");
                true
            }
            None => false,
        }
    }

    /// Abort and forget every request; returns how many there were
    pub(crate) fn cancel_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.lock());
        for controller in drained.values() {
            controller.abort(AbortReason::Cancelled);
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "all requests cancelled");
        }
        drained.len()
    }

    pub(crate) fn ids(&self) -> Vec<RequestId> {
        self.lock().keys().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Removes its entry from the registry on drop
#[derive(Debug)]
pub(crate) struct Registration<'a> {
    registry: &'a CancellationRegistry,
    id: RequestId,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.id);
    }
}
