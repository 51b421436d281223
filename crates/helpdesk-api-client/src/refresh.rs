//! Refresh coalescing.
//!
//! A [`RefreshGate`] holds the refresh-in-progress flag and the ordered
//! queue of callers waiting on the in-flight exchange. The first caller to
//! [`RefreshGate::enter`] while the flag is clear receives a
//! [`RefreshLease`] and is responsible for the exchange; every later caller
//! gets a receiver that resolves when the lease settles.
//!
//! The lock is only held for synchronous bookkeeping and never across an
//! `.await`.

use crate::ExpiryReason;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::debug;

/// Result of one refresh exchange: the new access credential, or why the
/// session ended.
pub type RefreshOutcome = Result<String, ExpiryReason>;

#[derive(Debug, Default)]
struct GateState {
    in_progress: bool,
    pending: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// What a caller must do after a 401.
#[derive(Debug)]
pub enum GateEntry {
    /// No refresh was in flight: the caller now owns it.
    Lead(RefreshLease),
    /// A refresh is in flight: await its outcome.
    Wait(oneshot::Receiver<RefreshOutcome>),
}

/// Shared refresh flag and pending-caller queue.
#[derive(Debug, Clone, Default)]
pub struct RefreshGate {
    state: Arc<Mutex<GateState>>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        // The critical sections cannot panic, so a poisoned lock still
        // holds consistent state.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Either start a refresh or join the one in flight.
    pub fn enter(&self) -> GateEntry {
        let mut state = self.lock();
        if state.in_progress {
            let (tx, rx) = oneshot::channel();
            state.pending.push(tx);
            debug!(queued = state.pending.len(), "Refresh in flight, queueing caller");
            GateEntry::Wait(rx)
        } else {
            state.in_progress = true;
            GateEntry::Lead(RefreshLease {
                gate: self.clone(),
                settled: false,
            })
        }
    }

    /// Whether a refresh exchange is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.lock().in_progress
    }

    /// Number of callers waiting on the in-flight refresh.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Clear the flag and drain the queue in one critical section, then
    /// deliver the outcome to every waiter in enqueue order.
    fn settle(&self, outcome: RefreshOutcome) {
        let pending = {
            let mut state = self.lock();
            state.in_progress = false;
            std::mem::take(&mut state.pending)
        };

        let waiters = pending.len();
        for tx in pending {
            // A waiter whose caller went away has dropped its receiver.
            let _ = tx.send(outcome.clone());
        }
        if waiters > 0 {
            debug!(waiters, ok = outcome.is_ok(), "Settled queued callers");
        }
    }
}

/// Ownership of the in-flight refresh.
///
/// Dropping an unsettled lease settles it with
/// [`ExpiryReason::RefreshInterrupted`] so waiters are never stranded.
#[derive(Debug)]
pub struct RefreshLease {
    gate: RefreshGate,
    settled: bool,
}

impl RefreshLease {
    /// Publish the outcome to every queued caller and reopen the gate.
    pub fn settle(mut self, outcome: RefreshOutcome) {
        self.settled = true;
        self.gate.settle(outcome);
    }
}

impl Drop for RefreshLease {
    fn drop(&mut self) {
        if !self.settled {
            self.gate.settle(Err(ExpiryReason::RefreshInterrupted));
        }
    }
}
