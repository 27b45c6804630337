//! Abort signals
//!
//! An [`AbortController`] owns the right to abort; [`AbortSignal`]s observe
//! it. A merged signal is simply the union of its sources' receivers, so it
//! fires on the first source to abort, fires immediately if any source is
//! already aborted, and never fires when it has no sources. No forwarding
//! task is involved and nothing fires twice.

use futures::future::select_all;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Why a signal fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The attempt's own deadline passed
    Timeout,
    /// A caller, `cancel_request`, or `cancel_all_requests`
    Cancelled,
}

/// Owner side of an abort signal
#[derive(Debug, Clone)]
pub struct AbortController {
    sender: Arc<watch::Sender<Option<AbortReason>>>,
}

impl AbortController {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// A signal observing this controller
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            sources: vec![self.sender.subscribe()],
        }
    }

    /// Abort with `reason`. Only the first call has any effect; returns
    /// whether this call was it.
    pub fn abort(&self, reason: AbortReason) -> bool {
        self.sender.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    pub fn is_aborted(&self) -> bool {
        self.sender.borrow().is_some()
    }

    /// Abort with `reason` once `after` has elapsed, unless the returned
    /// guard is dropped first
    pub fn abort_after(&self, after: Duration, reason: AbortReason) -> TimerGuard {
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            controller.abort(reason);
        });
        TimerGuard { handle }
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancels a scheduled abort when dropped
#[derive(Debug)]
pub struct TimerGuard {
    handle: JoinHandle<()>,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Observer side of one or more abort controllers
///
/// The default signal has no sources and never fires.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    sources: Vec<watch::Receiver<Option<AbortReason>>>,
}

impl AbortSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        Self::default()
    }

    /// Fires on the first of `signals` to fire
    pub fn any<'a>(signals: impl IntoIterator<Item = &'a AbortSignal>) -> Self {
        Self {
            sources: signals
                .into_iter()
                .flat_map(|signal| signal.sources.iter().cloned())
                .collect(),
        }
    }

    /// Fires on whichever of `self` and `other` fires first.
    ///
    /// When both are already aborted, `self`'s reason is reported.
    pub fn merge(&self, other: &AbortSignal) -> Self {
        Self::any([self, other])
    }

    /// Reason of the first aborted source, in source order
    pub fn reason(&self) -> Option<AbortReason> {
        self.sources.iter().find_map(|source| *source.borrow())
    }

    pub fn is_aborted(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolve once any source aborts
    pub async fn aborted(&self) -> AbortReason {
        if let Some(reason) = self.reason() {
            return reason;
        }
        if self.sources.is_empty() {
            return pending().await;
        }

        let waits = self
            .sources
            .iter()
            .cloned()
            .map(|source| Box::pin(wait_for_abort(source)));
        select_all(waits).await.0
    }
}

/// A source whose controller is gone without aborting never fires
async fn wait_for_abort(mut source: watch::Receiver<Option<AbortReason>>) -> AbortReason {
    let reason = match source.wait_for(Option::is_some).await {
        Ok(value) => *value,
        Err(_) => None,
    };
    match reason {
        Some(reason) => reason,
        None => pending().await,
    }
}
