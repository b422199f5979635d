//! Pending Request Table - pairs outbound commands with inbound replies.
//!
//! Flow:
//! 1. Correlator mints a `RequestId` and calls `register()` to get a wait handle
//! 2. Correlator writes the command to the browser
//! 3. Dispatch loop decodes the reply and calls `fulfill()`
//! 4. Correlator wakes (or times out) and calls `take_result()`
//!
//! Every operation runs under the `DashMap` shard lock of its identifier, so
//! a `fulfill` racing a timeout-driven `take_result` resolves one way or the
//! other, never half-way. No lock is held while a caller waits.

use crate::domain::command::Action;
use crate::domain::correlation::RequestId;
use crate::domain::error::BridgeError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;

/// Single-fire wait handle returned by `register()`.
///
/// Resolves with `Ok(())` once the entry is fulfilled. Resolves with an error
/// if the entry is removed without being fulfilled.
pub type WaitHandle = oneshot::Receiver<()>;

/// Bookkeeping for one outstanding command.
struct PendingEntry {
    /// Fired once by `fulfill`
    signal: Option<oneshot::Sender<()>>,
    /// Reply payload, written at most once
    result: Option<Value>,
    /// Action name (for logging)
    action: Action,
    created_at: Instant,
}

/// Counters for the pending table
#[derive(Debug, Default)]
struct PendingStats {
    /// Entries registered
    total_registered: AtomicU64,
    /// Replies stored into a live entry
    total_fulfilled: AtomicU64,
    /// Results handed back to a waiter
    total_completed: AtomicU64,
    /// Waits that hit their deadline
    total_timeouts: AtomicU64,
    /// Replies with no live entry
    total_discarded: AtomicU64,
}

/// Point-in-time copy of `PendingStats`, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingSnapshot {
    pub pending: usize,
    pub registered: u64,
    pub fulfilled: u64,
    pub completed: u64,
    pub timeouts: u64,
    pub discarded: u64,
}

/// Process-wide map from request identifier to pending entry.
#[derive(Default)]
pub struct PendingRequestTable {
    pending: DashMap<RequestId, PendingEntry>,
    stats: PendingStats,
}

impl PendingRequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry and return its wait handle.
    ///
    /// Fails with `DuplicateIdentifier` if `id` is already pending.
    pub fn register(&self, id: &RequestId, action: Action) -> Result<WaitHandle, BridgeError> {
        match self.pending.entry(id.clone()) {
            Entry::Occupied(_) => Err(BridgeError::DuplicateIdentifier(id.clone())),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(PendingEntry {
                    signal: Some(tx),
                    result: None,
                    action,
                    created_at: Instant::now(),
                });
                self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
                debug!(request_id = %id, action = %action, "Registered pending request");
                Ok(rx)
            }
        }
    }

    /// Store `payload` for `id` and release its wait handle.
    ///
    /// Returns false when there is no live entry (late or unknown reply) or
    /// the entry was already fulfilled; the payload is dropped in both cases.
    pub fn fulfill(&self, id: &RequestId, payload: Value) -> bool {
        let Some(mut entry) = self.pending.get_mut(id) else {
            self.stats.total_discarded.fetch_add(1, Ordering::Relaxed);
            debug!(request_id = %id, "Reply for unknown or expired request id");
            return false;
        };

        let Some(signal) = entry.signal.take() else {
            self.stats.total_discarded.fetch_add(1, Ordering::Relaxed);
            debug!(request_id = %id, "Duplicate reply ignored");
            return false;
        };

        entry.result = Some(payload);
        // A dropped receiver means the waiter is gone; its guard removes the entry.
        let _ = signal.send(());
        self.stats.total_fulfilled.fetch_add(1, Ordering::Relaxed);
        debug!(
            request_id = %id,
            action = %entry.action,
            response_time_ms = entry.created_at.elapsed().as_millis(),
            "Fulfilled pending request"
        );
        true
    }

    /// Remove the entry for `id` and return its result slot.
    ///
    /// Idempotent: returns `None` if the entry is absent or was never fulfilled.
    pub fn take_result(&self, id: &RequestId) -> Option<Value> {
        let (_, entry) = self.pending.remove(id)?;
        if entry.result.is_some() {
            self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
        }
        entry.result
    }

    /// Count one expired wait.
    pub fn record_timeout(&self, id: &RequestId, elapsed: Duration) {
        self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
        debug!(
            request_id = %id,
            elapsed_ms = elapsed.as_millis(),
            "Pending request timed out"
        );
    }

    /// Get number of currently pending requests
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a request id is pending
    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn snapshot(&self) -> PendingSnapshot {
        PendingSnapshot {
            pending: self.pending_count(),
            registered: self.stats.total_registered.load(Ordering::Relaxed),
            fulfilled: self.stats.total_fulfilled.load(Ordering::Relaxed),
            completed: self.stats.total_completed.load(Ordering::Relaxed),
            timeouts: self.stats.total_timeouts.load(Ordering::Relaxed),
            discarded: self.stats.total_discarded.load(Ordering::Relaxed),
        }
    }
}
