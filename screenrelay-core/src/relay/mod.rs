//! The relay loops.
//!
//! ```text
//! ConnectionAcceptor ── accept ──► ClientConnection
//!        │                              │
//!        ├── ensure DeviceSession ──────┤
//!        ▼                              ▼
//! FrameStreamer: capture ─► FrameBuffer ─► write ─► loop
//! ```
//!
//! Both loops race every blocking call against [`Shutdown`](crate::shutdown::Shutdown).

pub mod acceptor;
pub mod streamer;

pub use acceptor::{ConnectionAcceptor, RelayOptions, RelaySummary};
pub use streamer::{CapturePolicy, FrameStreamer, StreamEnd, StreamStats};
