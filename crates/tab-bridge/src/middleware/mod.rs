//! Middleware stack for the HTTP surface.
//!
//! Layer order: Request → Tracing → Timeout → BodyLimit → Handler

pub mod timeout;
pub mod tracing;

pub use self::timeout::TimeoutLayer;
pub use self::tracing::TracingLayer;
