//! # screenrelay-core
//!
//! Relays screenshots from a tethered device to one TCP client.
//!
//! This crate contains:
//! - **Buffer**: `FrameBuffer`, the single growable transmit buffer
//! - **Codec**: `FrameCodec`, `[u32 LE length][payload]` framing via `tokio_util`
//! - **Device**: `DeviceBackend` seam, `DeviceSession` lifecycle, the
//!   libimobiledevice tool backend and a scripted test backend
//! - **Relay**: `FrameStreamer` (capture/send loop) and `ConnectionAcceptor`
//!   (single-client accept loop)
//! - **Network**: `ListenEndpoint`, `ClientConnection`, `RelayClient`
//! - **Shutdown**: quit counter + cancellation shared by every loop
//! - **Error**: `RelayError` / `DeviceError`, typed with `thiserror`

pub mod buffer;
pub mod codec;
pub mod device;
pub mod error;
pub mod network;
pub mod relay;
pub mod shutdown;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use buffer::{FrameBuffer, LENGTH_PREFIX_SIZE};
pub use codec::FrameCodec;
pub use device::{
    DeviceBackend, DeviceSession, SCREENSHOT_SERVICE, ScriptedBackend, SessionState, ToolBackend,
    Udid,
};
pub use error::{DeviceError, RelayError};
pub use network::{ClientConnection, ListenEndpoint, RelayClient};
pub use relay::{
    CapturePolicy, ConnectionAcceptor, FrameStreamer, RelayOptions, RelaySummary, StreamEnd,
    StreamStats,
};
pub use shutdown::Shutdown;
