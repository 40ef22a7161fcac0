//! Device side of the relay.
//!
//! The relay never talks to the device transport stack directly. It
//! sees a [`DeviceBackend`] with five blocking calls and wraps it in a
//! [`DeviceSession`] state machine:
//!
//! ```text
//! Unopened ──connect──► Connecting ──ok──► Open ──close──► Closed
//!                            │                               ▲
//!                            └────────────err────────────────┘
//! ```
//!
//! | Module    | Purpose                                              |
//! |-----------|------------------------------------------------------|
//! | `session` | Lifecycle of one open capture channel                |
//! | `idevice` | Backend driving the libimobiledevice command-line tools |
//! | `mock`    | Scripted backend for tests                           |

pub mod idevice;
pub mod mock;
pub mod session;

use std::fmt;
use std::str::FromStr;

use crate::error::{DeviceError, RelayError};

pub use idevice::ToolBackend;
pub use mock::{BackendCounters, ScriptedBackend};
pub use session::{DeviceSession, SessionState};

/// Service started on the device to obtain screenshots.
pub const SCREENSHOT_SERVICE: &str = "com.apple.mobile.screenshotr";

/// Required length of a device identifier.
pub const UDID_LEN: usize = 40;

// ── Udid ─────────────────────────────────────────────────────────

/// A validated 40-character device identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Udid(String);

impl Udid {
    pub fn parse(s: &str) -> Result<Self, RelayError> {
        let len = s.chars().count();
        if len != UDID_LEN {
            return Err(RelayError::InvalidUdid { len });
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Udid {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Udid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── DeviceBackend ────────────────────────────────────────────────

/// The external imaging service, reduced to the calls the relay needs.
///
/// All calls may block on device I/O. Teardown calls take their handle
/// by value, so a handle cannot be released twice.
pub trait DeviceBackend: Send {
    /// Open handle to one attached device.
    type Device: Send;
    /// Open channel to a named service on that device.
    type Service: Send;

    fn open_device(&self, udid: &Udid) -> Result<Self::Device, DeviceError>;

    fn start_service(
        &self,
        device: &mut Self::Device,
        service_name: &str,
    ) -> Result<Self::Service, DeviceError>;

    /// Take one screenshot. The returned bytes are opaque to the relay.
    fn capture(&self, service: &mut Self::Service) -> Result<Vec<u8>, DeviceError>;

    fn close_service(&self, service: Self::Service);

    fn close_device(&self, device: Self::Device);
}
