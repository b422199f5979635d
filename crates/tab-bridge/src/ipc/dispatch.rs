//! Inbound Dispatch Loop - the single reader of the browser's stream.

use crate::domain::command::OutboundMessage;
use crate::domain::error::{BridgeError, BridgeResult};
use crate::domain::message::InboundMessage;
use crate::domain::pending::PendingRequestTable;
use crate::ipc::framing::FrameReader;
use crate::ipc::handler::FrameSender;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, info, trace};

/// Reads frames until the stream ends and routes each one.
///
/// Consumes its `FrameReader`, so no other component can read the stream.
pub struct DispatchLoop<R> {
    reader: FrameReader<R>,
    pending: Arc<PendingRequestTable>,
    sender: Arc<dyn FrameSender>,
    reply_fields: Vec<String>,
}

impl<R: AsyncRead + Unpin> DispatchLoop<R> {
    pub fn new(
        reader: FrameReader<R>,
        pending: Arc<PendingRequestTable>,
        sender: Arc<dyn FrameSender>,
        reply_fields: Vec<String>,
    ) -> Self {
        Self {
            reader,
            pending,
            sender,
            reply_fields,
        }
    }

    /// Run until the stream ends.
    ///
    /// `Ok(())` means the browser closed the stream. Every `Err` is fatal:
    /// after a framing error the stream position can no longer be trusted.
    pub async fn run(mut self) -> BridgeResult<()> {
        info!("Dispatch loop started");
        loop {
            let value = match self.reader.receive().await {
                Ok(value) => value,
                Err(BridgeError::EndOfStream) => {
                    info!("Browser closed the inbound stream");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            self.dispatch(value).await?;
        }
    }

    async fn dispatch(&self, value: serde_json::Value) -> BridgeResult<()> {
        match InboundMessage::classify(value, &self.reply_fields) {
            InboundMessage::Ping => {
                trace!("Ping received, answering pong");
                self.sender.send(&OutboundMessage::pong()).await
            }
            InboundMessage::Reply { id, payload } => {
                self.pending.fulfill(&id, payload);
                Ok(())
            }
            InboundMessage::Other(value) => {
                debug!(message = %value, "Ignoring unrecognized inbound message");
                Ok(())
            }
        }
    }
}
