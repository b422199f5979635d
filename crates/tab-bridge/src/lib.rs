//! Tab Bridge - native messaging host that lets local HTTP clients drive
//! browser tabs.
//!
//! The browser extension launches the host and talks length-prefixed JSON
//! over stdin/stdout. Each HTTP call becomes one command frame; the reply
//! frame carrying the same identifier is routed back to that caller.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                             TAB BRIDGE                              │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  HTTP clients (127.0.0.1, OS-assigned port)                         │
//! │         │                                                           │
//! │  ┌──────┴──────────────────────────────────────┐                    │
//! │  │ Middleware: Tracing → Timeout → BodyLimit   │                    │
//! │  └──────┬──────────────────────────────────────┘                    │
//! │  ┌──────┴──────────┐                                                │
//! │  │ Command Gateway │  GET /tabs, POST /switch, /create, /mcp        │
//! │  └──────┬──────────┘                                                │
//! │  ┌──────┴──────────┐    register / take_result   ┌───────────────┐  │
//! │  │   Correlator    │ ──────────────────────────→ │ Pending Table │  │
//! │  └──────┬──────────┘                             └───────▲───────┘  │
//! │         │ FrameWriter (writer task, whole frames)        │ fulfill  │
//! │         ▼                                        ┌───────┴───────┐  │
//! │      stdout ─────────────→ browser ────────────→ │ Dispatch Loop │  │
//! │                                        stdin     └───────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use tab_bridge::{BridgeConfig, BridgeService, FrameWriter};
//!
//! let config = BridgeConfig::from_env()?;
//! let sender = Arc::new(FrameWriter::new(tokio::io::stdout()));
//! let service = BridgeService::new(config, sender)?;
//! let _http = service.start_http().await;
//! let result = service.run(tokio::io::stdin()).await;
//! std::process::exit(BridgeService::exit_code(&result));
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod diagnostics;
pub mod domain;
pub mod ipc;
pub mod middleware;
pub mod router;
pub mod service;

// Re-exports for public API
pub use diagnostics::ErrorLog;
pub use domain::config::BridgeConfig;
pub use domain::error::{ApiError, BridgeError, BridgeResult};
pub use domain::{Action, Command, OutboundMessage, PendingRequestTable, RequestId};
pub use ipc::{Correlator, DispatchLoop, FrameReader, FrameSender, FrameWriter};
pub use service::{BridgeService, HttpServer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
