//! Domain types for the bridge.
//!
//! Identifiers, command and reply shapes, the pending request table,
//! configuration and errors. Nothing here touches a byte stream.

pub mod command;
pub mod config;
pub mod correlation;
pub mod error;
pub mod message;
pub mod pending;

// Re-exports for convenience
pub use command::{Action, Command, OutboundMessage};
pub use config::{BridgeConfig, ConfigError, TimeoutConfig};
pub use correlation::RequestId;
pub use error::{ApiError, BridgeError, BridgeResult};
pub use message::InboundMessage;
pub use pending::{PendingRequestTable, PendingSnapshot, WaitHandle};
