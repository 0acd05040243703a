//! Correlates chooser callbacks with the share requests waiting on them.
//!
//! A request parks a one-shot slot under a fresh [`CallbackId`] right before
//! its chooser is launched. Whatever platform callback later reports the
//! outcome settles that slot, which removes it; a second settle for the same
//! id finds nothing and fails.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::{Error, Result};

/// Opaque identity of a parked share request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CallbackId(Uuid);

impl CallbackId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the platform reported once the chooser went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    /// A target was launched, or the chooser closed in a way we can't tell
    /// apart from that.
    Completed,
    Cancelled,
    Failed(String),
}

#[derive(Default)]
pub struct PendingResults {
    slots: Mutex<HashMap<CallbackId, oneshot::Sender<ShareOutcome>>>,
}

impl PendingResults {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<CallbackId, oneshot::Sender<ShareOutcome>>> {
        match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Parks a new request and hands back the callback the presenter settles
    /// plus the receiver the caller awaits.
    pub fn park(self: &Arc<Self>) -> (PendingCallback, oneshot::Receiver<ShareOutcome>) {
        let id = CallbackId::new();
        let (tx, rx) = oneshot::channel();
        self.slots().insert(id, tx);
        debug!("parked share request {}", id);
        (
            PendingCallback {
                id,
                results: Arc::clone(self),
            },
            rx,
        )
    }

    /// Delivers `outcome` to the request parked under `id`, exactly once.
    pub fn settle(&self, id: CallbackId, outcome: ShareOutcome) -> Result<()> {
        let tx = self.slots().remove(&id).ok_or(Error::UnknownCallback(id))?;
        debug!("settling share request {} with {:?}", id, outcome);
        if tx.send(outcome).is_err() {
            // the caller went away; nothing left to notify
            debug!("share request {} settled after its caller was dropped", id);
        }
        Ok(())
    }

    /// Forgets a slot whose chooser never made it on screen.
    pub fn discard(&self, id: CallbackId) {
        self.slots().remove(&id);
    }

    /// Drops every parked slot. Waiting callers observe [`Error::Abandoned`].
    pub fn abandon_all(&self) -> usize {
        let mut slots = self.slots();
        let count = slots.len();
        slots.clear();
        count
    }

    #[cfg(test)]
    pub fn contains(&self, id: CallbackId) -> bool {
        self.slots().contains_key(&id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The token a presenter holds on to until its platform reports back.
pub struct PendingCallback {
    id: CallbackId,
    results: Arc<PendingResults>,
}

impl PendingCallback {
    pub fn id(&self) -> CallbackId {
        self.id
    }

    pub fn settle(self, outcome: ShareOutcome) -> Result<()> {
        self.results.settle(self.id, outcome)
    }
}

impl fmt::Debug for PendingCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCallback").field("id", &self.id).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharePhase {
    Idle,
    Staged,
    ChooserPresented,
    Resolved(ShareOutcome),
}

/// Tracks one request through its phases. Out-of-order transitions are
/// refused and leave the phase untouched.
#[derive(Debug)]
pub struct ShareLifecycle {
    phase: SharePhase,
}

impl ShareLifecycle {
    pub fn new() -> Self {
        Self {
            phase: SharePhase::Idle,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> &SharePhase {
        &self.phase
    }

    #[must_use]
    pub fn on_staged(&mut self) -> bool {
        self.advance(SharePhase::Idle, SharePhase::Staged)
    }

    #[must_use]
    pub fn on_presented(&mut self) -> bool {
        self.advance(SharePhase::Staged, SharePhase::ChooserPresented)
    }

    #[must_use]
    pub fn on_resolved(&mut self, outcome: ShareOutcome) -> bool {
        self.advance(SharePhase::ChooserPresented, SharePhase::Resolved(outcome))
    }

    fn advance(&mut self, from: SharePhase, to: SharePhase) -> bool {
        if self.phase != from {
            debug!("ignoring share transition {:?} -> {:?}", self.phase, to);
            return false;
        }
        debug!("share transition {:?} -> {:?}", self.phase, to);
        self.phase = to;
        true
    }
}

impl Default for ShareLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_delivers_exactly_once() {
        let results = PendingResults::new();
        let (callback, mut rx) = results.park();
        let id = callback.id();

        callback.settle(ShareOutcome::Completed).unwrap();
        assert_eq!(rx.try_recv().unwrap(), ShareOutcome::Completed);

        assert!(matches!(
            results.settle(id, ShareOutcome::Cancelled),
            Err(Error::UnknownCallback(other)) if other == id
        ));
        assert!(results.is_empty());
    }

    #[test]
    fn concurrent_requests_get_independent_slots() {
        let results = PendingResults::new();
        let (first, mut first_rx) = results.park();
        let (second, mut second_rx) = results.park();
        assert_ne!(first.id(), second.id());
        assert_eq!(results.len(), 2);

        second.settle(ShareOutcome::Cancelled).unwrap();
        assert!(first_rx.try_recv().is_err());
        assert_eq!(second_rx.try_recv().unwrap(), ShareOutcome::Cancelled);

        first.settle(ShareOutcome::Completed).unwrap();
        assert_eq!(first_rx.try_recv().unwrap(), ShareOutcome::Completed);
    }

    #[test]
    fn settling_after_caller_dropped_still_consumes_slot() {
        let results = PendingResults::new();
        let (callback, rx) = results.park();
        let id = callback.id();
        drop(rx);
        callback.settle(ShareOutcome::Completed).unwrap();
        assert!(!results.contains(id));
    }

    #[test]
    fn abandon_closes_waiting_receivers() {
        let results = PendingResults::new();
        let (_callback, mut rx) = results.park();
        assert_eq!(results.abandon_all(), 1);
        assert!(matches!(
            rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }

    #[test]
    fn discard_removes_slot() {
        let results = PendingResults::new();
        let (callback, _rx) = results.park();
        results.discard(callback.id());
        assert!(callback.settle(ShareOutcome::Completed).is_err());
    }

    #[test]
    fn lifecycle_follows_happy_path() {
        let mut lifecycle = ShareLifecycle::new();
        assert!(lifecycle.on_staged());
        assert!(lifecycle.on_presented());
        assert!(lifecycle.on_resolved(ShareOutcome::Cancelled));
        assert_eq!(
            lifecycle.phase(),
            &SharePhase::Resolved(ShareOutcome::Cancelled)
        );
    }

    #[test]
    fn lifecycle_refuses_out_of_order_transitions() {
        let mut lifecycle = ShareLifecycle::new();
        assert!(!lifecycle.on_presented());
        assert!(!lifecycle.on_resolved(ShareOutcome::Completed));
        assert_eq!(lifecycle.phase(), &SharePhase::Idle);

        assert!(lifecycle.on_staged());
        assert!(lifecycle.on_presented());
        assert!(lifecycle.on_resolved(ShareOutcome::Completed));
        assert!(!lifecycle.on_resolved(ShareOutcome::Cancelled));
        assert_eq!(
            lifecycle.phase(),
            &SharePhase::Resolved(ShareOutcome::Completed)
        );
    }
}
