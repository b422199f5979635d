//! Framed Channel Adapter - length-prefixed JSON over a byte stream.
//!
//! ## Wire Format
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  4 bytes: u32 payload length, native byte order         │
//! ├─────────────────────────────────────────────────────────┤
//! │  N bytes: UTF-8 JSON                                    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! No correlation logic lives here.

use crate::domain::command::OutboundMessage;
use crate::domain::error::{BridgeError, BridgeResult};
use crate::ipc::handler::FrameSender;
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Size of the length prefix in bytes.
pub const PREFIX_LEN: usize = 4;

/// Serialize a message into one complete frame (prefix + payload).
pub fn encode_frame(message: &OutboundMessage) -> BridgeResult<Vec<u8>> {
    let payload = serde_json::to_vec(message).map_err(|e| BridgeError::Encode(e.to_string()))?;
    let len = u32::try_from(payload.len()).map_err(|_| BridgeError::FrameTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut frame = Vec::with_capacity(PREFIX_LEN + payload.len());
    frame.extend_from_slice(&len.to_ne_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Read one frame and decode its JSON payload.
///
/// Returns `Ok(None)` when the stream ends before any prefix byte. A stream
/// that ends inside the prefix or the payload is `UnexpectedEof`.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame: usize,
) -> BridgeResult<Option<Value>> {
    let mut len_buf = [0u8; PREFIX_LEN];
    let mut filled = 0;
    while filled < PREFIX_LEN {
        let n = reader.read(&mut len_buf[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(BridgeError::UnexpectedEof)
            };
        }
        filled += n;
    }

    let length = u32::from_ne_bytes(len_buf) as usize;
    if length > max_frame {
        return Err(BridgeError::FrameTooLarge {
            size: length,
            max: max_frame,
        });
    }

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            BridgeError::UnexpectedEof
        } else {
            BridgeError::Io(e)
        }
    })?;

    let message = serde_json::from_slice(&payload)?;
    Ok(Some(message))
}

/// One encoded frame queued for the writer task.
struct WriteRequest {
    frame: Vec<u8>,
    done: oneshot::Sender<std::io::Result<()>>,
}

/// Outbound half of the channel.
///
/// Frames are written by a dedicated task that owns the stream, one whole
/// frame at a time. A caller that is dropped while waiting leaves its frame
/// queued or in flight, never half-written.
pub struct FrameWriter {
    queue: mpsc::UnboundedSender<WriteRequest>,
}

impl FrameWriter {
    /// Spawn the writer task on the current runtime.
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (queue, requests) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(writer, requests));
        Self { queue }
    }

    /// Encode, queue, and wait until the frame is written and flushed.
    pub async fn write_message(&self, message: &OutboundMessage) -> BridgeResult<()> {
        let frame = encode_frame(message)?;
        let (done, written) = oneshot::channel();
        self.queue
            .send(WriteRequest { frame, done })
            .map_err(|_| writer_gone())?;
        written.await.map_err(|_| writer_gone())??;
        Ok(())
    }
}

fn writer_gone() -> BridgeError {
    BridgeError::Io(std::io::ErrorKind::BrokenPipe.into())
}

/// Drain the queue until every `FrameWriter` handle is dropped or a write fails.
async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut requests: mpsc::UnboundedReceiver<WriteRequest>,
) {
    while let Some(request) = requests.recv().await {
        let result = match writer.write_all(&request.frame).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        let failed = result.is_err();
        if let Err(e) = &result {
            debug!(error = %e, "Outbound stream failed, writer task stopping");
        }
        // The requester may have been dropped.
        let _ = request.done.send(result);
        if failed {
            break;
        }
    }
}

#[async_trait]
impl FrameSender for FrameWriter {
    async fn send(&self, message: &OutboundMessage) -> BridgeResult<()> {
        self.write_message(message).await
    }
}

/// Inbound half of the channel. Owned by exactly one reader.
pub struct FrameReader<R> {
    reader: R,
    max_frame: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_frame: usize) -> Self {
        Self { reader, max_frame }
    }

    /// Block until the next message. Clean end of stream is `EndOfStream`.
    pub async fn receive(&mut self) -> BridgeResult<Value> {
        read_frame(&mut self.reader, self.max_frame)
            .await?
            .ok_or(BridgeError::EndOfStream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::command::{Action, Command};
    use crate::domain::correlation::RequestId;
    use serde_json::{json, Map};
    use std::io::Cursor;

    const MAX: usize = 1024 * 1024;

    fn raw_frame(payload: &[u8]) -> Vec<u8> {
        let mut buf = (payload.len() as u32).to_ne_bytes().to_vec();
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn test_command_frame_layout() {
        let id = RequestId::from_wire("r1").unwrap();
        let msg = OutboundMessage::from(Command::new(Action::GetTabs, id, Map::new()));

        let out = encode_frame(&msg).unwrap();

        let len = u32::from_ne_bytes(out[..4].try_into().unwrap()) as usize;
        assert_eq!(len, out.len() - 4);
        let body: Value = serde_json::from_slice(&out[4..]).unwrap();
        assert_eq!(body, json!({"action": "getTabs", "id": "r1"}));
    }

    #[tokio::test]
    async fn test_reads_consecutive_frames() {
        let mut bytes = raw_frame(br#"{"cmd":"ping"}"#);
        bytes.extend(raw_frame(br#"{"id":"a","tabs":[]}"#));
        let mut reader = FrameReader::new(Cursor::new(bytes), MAX);

        assert_eq!(reader.receive().await.unwrap(), json!({"cmd": "ping"}));
        assert_eq!(reader.receive().await.unwrap(), json!({"id": "a", "tabs": []}));
        assert!(matches!(reader.receive().await, Err(BridgeError::EndOfStream)));
    }

    #[tokio::test]
    async fn test_empty_stream_is_end_of_stream() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(read_frame(&mut cursor, MAX).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_prefix() {
        let mut cursor = Cursor::new(vec![5u8, 0]);
        assert!(matches!(
            read_frame(&mut cursor, MAX).await,
            Err(BridgeError::UnexpectedEof)
        ));
    }

    #[tokio::test]
    async fn test_truncated_payload() {
        let mut bytes = raw_frame(br#"{"cmd":"ping"}"#);
        bytes.truncate(bytes.len() - 3);
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            read_frame(&mut cursor, MAX).await,
            Err(BridgeError::UnexpectedEof)
        ));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_decode_error() {
        let mut cursor = Cursor::new(raw_frame(b"{not json"));
        assert!(matches!(
            read_frame(&mut cursor, MAX).await,
            Err(BridgeError::Decode(_))
        ));

        let mut cursor = Cursor::new(raw_frame(&[0xff, 0xfe, 0x22]));
        assert!(matches!(
            read_frame(&mut cursor, MAX).await,
            Err(BridgeError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_before_allocation() {
        let mut cursor = Cursor::new(u32::MAX.to_ne_bytes().to_vec());
        assert!(matches!(
            read_frame(&mut cursor, MAX).await,
            Err(BridgeError::FrameTooLarge { max: MAX, .. })
        ));
    }

    #[tokio::test]
    async fn test_writer_on_closed_stream_fails_with_io() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let writer = FrameWriter::new(client);
        let err = writer.send(&OutboundMessage::pong()).await.unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
    }

    #[tokio::test]
    async fn test_writer_reader_over_duplex() {
        let (client, server) = tokio::io::duplex(1024);
        let writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server, MAX);

        writer.send(&OutboundMessage::pong()).await.unwrap();
        assert_eq!(reader.receive().await.unwrap(), json!({"reply": "pong"}));

        drop(writer);
        assert!(matches!(reader.receive().await, Err(BridgeError::EndOfStream)));
    }

    #[tokio::test]
    async fn test_cancelled_sender_leaves_whole_frame() {
        // 64-byte pipe: the large frame cannot complete until the reader drains it.
        let (client, server) = tokio::io::duplex(64);
        let writer = std::sync::Arc::new(FrameWriter::new(client));

        let mut fields = Map::new();
        fields.insert("text".into(), json!("x".repeat(200)));
        let large = OutboundMessage::from(Command::new(
            Action::CallMcp,
            RequestId::from_wire("large").unwrap(),
            fields,
        ));

        let w = std::sync::Arc::clone(&writer);
        let stalled = tokio::spawn(async move { w.send(&large).await });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        stalled.abort();
        assert!(stalled.await.unwrap_err().is_cancelled());

        let w = std::sync::Arc::clone(&writer);
        let pong = tokio::spawn(async move { w.send(&OutboundMessage::pong()).await });

        let mut reader = FrameReader::new(server, MAX);
        let limit = std::time::Duration::from_secs(2);
        let first = tokio::time::timeout(limit, reader.receive())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first["id"], "large");
        assert_eq!(first["text"].as_str().unwrap().len(), 200);

        let second = tokio::time::timeout(limit, reader.receive())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second, json!({"reply": "pong"}));
        pong.await.unwrap().unwrap();
    }
}
