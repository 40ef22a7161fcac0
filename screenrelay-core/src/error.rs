//! Domain-specific error types for the relay.
//!
//! Device-side failures are kept in [`DeviceError`] so the session and
//! streamer can decide locally whether a failure is recoverable.
//! Everything that reaches the accept loop or the binary is a
//! [`RelayError`].

use std::net::SocketAddr;

use thiserror::Error;

/// Failures reported by the external imaging service.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No attached device matches the requested identifier.
    #[error("no device found with udid {udid}, is it plugged in?")]
    DeviceNotFound { udid: String },

    /// The device answered but the capture service could not be started.
    #[error("could not start {service}: {reason}")]
    ServiceUnavailable { service: String, reason: String },

    /// A single capture request did not succeed. Recoverable.
    #[error("capture failed: {0}")]
    CaptureFailed(String),

    /// An operation that needs an open session was called in another state.
    #[error("device session is not open (state: {state})")]
    NotOpen { state: &'static str },
}

/// The canonical error type for the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Process-fatal ────────────────────────────────────────────
    /// The listening socket could not be created, bound or put in listen mode.
    #[error("cannot listen on {addr}: {source}")]
    ListenSetupFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    // ── Connection-fatal ─────────────────────────────────────────
    /// Writing a frame to the client failed. The device session survives.
    #[error("client write failed: {0}")]
    ClientWriteFailed(#[source] std::io::Error),

    // ── Framing ──────────────────────────────────────────────────
    /// The payload does not fit the 32-bit length prefix (or a decoder limit).
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── Input validation ─────────────────────────────────────────
    /// Device identifiers are exactly 40 characters long.
    #[error("invalid udid: expected 40 characters, got {len}")]
    InvalidUdid { len: usize },

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    // ── Wrapped ──────────────────────────────────────────────────
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),
}

impl DeviceError {
    /// Capture failures are retried; everything else needs a new session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DeviceError::CaptureFailed(_))
    }
}
