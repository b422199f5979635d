//! Bridge error taxonomy and the HTTP-facing error body.
//!
//! Transport errors (`Io`, `EndOfStream`, `UnexpectedEof`, `Decode`,
//! `FrameTooLarge`) end the process. `Timeout` is local to one request.

use crate::domain::correlation::RequestId;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::time::Duration;

/// Body text returned with HTTP 504.
pub const TIMEOUT_MESSAGE: &str = "Timeout waiting for Chrome";

/// Errors raised by the framed channel and the correlation layer.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Reading or writing a byte stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the inbound stream on a frame boundary.
    #[error("end of stream")]
    EndOfStream,

    /// Stream ended in the middle of a frame.
    #[error("unexpected end of stream inside a frame")]
    UnexpectedEof,

    /// Frame payload was not well-formed UTF-8 JSON.
    #[error("decode error: {0}")]
    Decode(String),

    /// Outbound message could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),

    /// Frame length outside the configured bound.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Identifier already present in the pending table.
    #[error("duplicate request identifier: {0}")]
    DuplicateIdentifier(RequestId),

    /// No reply arrived before the deadline.
    #[error("request {id} timed out after {}ms", elapsed.as_millis())]
    Timeout { id: RequestId, elapsed: Duration },

    /// Wait handle fired but the slot was empty.
    #[error("reply for {0} vanished before it was read")]
    ResultMissing(RequestId),

    /// The outbound channel has already failed.
    #[error("transport closed: {0}")]
    TransportClosed(String),
}

impl BridgeError {
    /// Whether this error leaves the shared transport unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::Io(_)
                | BridgeError::EndOfStream
                | BridgeError::UnexpectedEof
                | BridgeError::Decode(_)
                | BridgeError::Encode(_)
                | BridgeError::FrameTooLarge { .. }
                | BridgeError::TransportClosed(_)
        )
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Decode(e.to_string())
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Error surfaced to HTTP callers as `{"error": <message>}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Malformed request body.
    pub fn bad_request(details: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            format!("Invalid request body: {}", details.into()),
        )
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }

    pub fn timeout() -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, TIMEOUT_MESSAGE)
    }

    /// Browser channel is broken.
    pub fn bad_gateway(details: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, details)
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, details)
    }

    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.message })
    }
}

impl From<BridgeError> for ApiError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Timeout { .. } => ApiError::timeout(),
            e if e.is_fatal() => ApiError::bad_gateway(format!("Browser channel failed: {}", e)),
            e => ApiError::internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body())).into_response()
    }
}
