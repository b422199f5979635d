//! Correlator - turns one HTTP call into one browser round trip.

use crate::domain::command::{Action, Command, OutboundMessage};
use crate::domain::correlation::RequestId;
use crate::domain::error::{BridgeError, BridgeResult};
use crate::domain::pending::PendingRequestTable;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, warn};

/// Port for writing messages to the browser.
#[async_trait]
pub trait FrameSender: Send + Sync {
    /// Write one complete message. Concurrent calls must not interleave.
    async fn send(&self, message: &OutboundMessage) -> BridgeResult<()>;
}

/// Removes the table entry when the waiting call ends, however it ends.
/// Covers the case where the HTTP caller disconnects and the future is dropped.
struct PendingGuard<'a> {
    table: &'a PendingRequestTable,
    id: &'a RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.take_result(self.id);
    }
}

/// Issues identifiers, registers waiters, sends commands and waits for replies.
pub struct Correlator {
    /// Pending request table shared with the dispatch loop
    pending: Arc<PendingRequestTable>,
    /// Outbound channel
    sender: Arc<dyn FrameSender>,
    /// Set once the outbound channel fails; observed by the service
    transport_failure: watch::Sender<Option<String>>,
}

impl Correlator {
    pub fn new(pending: Arc<PendingRequestTable>, sender: Arc<dyn FrameSender>) -> Self {
        let (transport_failure, _) = watch::channel(None);
        Self {
            pending,
            sender,
            transport_failure,
        }
    }

    /// Receiver that flips to `Some(reason)` when an outbound write fails.
    pub fn transport_failures(&self) -> watch::Receiver<Option<String>> {
        self.transport_failure.subscribe()
    }

    pub fn pending(&self) -> &Arc<PendingRequestTable> {
        &self.pending
    }

    /// Send `action` with `fields` and wait up to `timeout` for its reply.
    ///
    /// Returns the reply payload, or `Timeout` carrying the identifier and
    /// the elapsed time. A reply that lands in the same instant the deadline
    /// fires is still returned.
    pub async fn execute(
        &self,
        action: Action,
        fields: Map<String, Value>,
        timeout: Duration,
    ) -> BridgeResult<Value> {
        self.round_trip(RequestId::new(), action, fields, timeout).await
    }

    async fn round_trip(
        &self,
        id: RequestId,
        action: Action,
        fields: Map<String, Value>,
        timeout: Duration,
    ) -> BridgeResult<Value> {
        let failed = self.transport_failure.borrow().clone();
        if let Some(reason) = failed {
            return Err(BridgeError::TransportClosed(reason));
        }

        let started = Instant::now();
        let handle = match self.pending.register(&id, action) {
            Ok(handle) => handle,
            Err(e) => {
                error!(request_id = %id, action = %action, "Identifier already pending, rejecting");
                return Err(e);
            }
        };
        let _guard = PendingGuard {
            table: &self.pending,
            id: &id,
        };

        let message = OutboundMessage::from(Command::new(action, id.clone(), fields));
        if let Err(e) = self.sender.send(&message).await {
            error!(request_id = %id, action = %action, error = %e, "Outbound write failed");
            self.transport_failure.send_replace(Some(e.to_string()));
            return Err(e);
        }

        debug!(request_id = %id, action = %action, "Sent command");

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => self
                .pending
                .take_result(&id)
                .ok_or_else(|| BridgeError::ResultMissing(id.clone())),
            Ok(Err(_)) => {
                warn!(request_id = %id, "Pending entry removed before it was fulfilled");
                Err(BridgeError::ResultMissing(id.clone()))
            }
            Err(_) => self.expire(&id, action, started, timeout),
        }
    }

    /// Resolve a wait whose deadline fired.
    ///
    /// A fulfill that landed before this removal still wins; otherwise the
    /// entry is gone and any later reply is discarded.
    fn expire(
        &self,
        id: &RequestId,
        action: Action,
        started: Instant,
        timeout: Duration,
    ) -> BridgeResult<Value> {
        if let Some(payload) = self.pending.take_result(id) {
            debug!(request_id = %id, "Reply landed as the deadline fired");
            return Ok(payload);
        }
        let elapsed = started.elapsed();
        self.pending.record_timeout(id, elapsed);
        warn!(
            request_id = %id,
            action = %action,
            timeout_ms = timeout.as_millis(),
            "Timed out waiting for browser reply"
        );
        Err(BridgeError::Timeout {
            id: id.clone(),
            elapsed,
        })
    }
}

/// In-memory sender for testing
pub mod channel {
    use super::*;
    use tokio::sync::mpsc;

    /// Forwards every message into an unbounded channel.
    pub struct ChannelSender(pub mpsc::UnboundedSender<OutboundMessage>);

    #[async_trait]
    impl FrameSender for ChannelSender {
        async fn send(&self, message: &OutboundMessage) -> BridgeResult<()> {
            self.0
                .send(message.clone())
                .map_err(|_| BridgeError::Io(std::io::ErrorKind::BrokenPipe.into()))
        }
    }

    /// Create a test sender and the receiving end that plays the browser.
    pub fn create_test_channel() -> (Arc<ChannelSender>, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelSender(tx)), rx)
    }
}
