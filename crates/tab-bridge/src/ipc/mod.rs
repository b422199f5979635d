//! Browser-facing side of the bridge: framing, correlation and dispatch.

pub mod dispatch;
pub mod framing;
pub mod handler;

pub use dispatch::DispatchLoop;
pub use framing::{FrameReader, FrameWriter};
pub use handler::{Correlator, FrameSender};
