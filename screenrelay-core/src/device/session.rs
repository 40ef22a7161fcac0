//! Lifecycle of one capture channel to the device.

use std::fmt;

use tracing::{debug, info};

use crate::device::{DeviceBackend, Udid};
use crate::error::DeviceError;

/// Where a [`DeviceSession`] is in its lifecycle. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Connecting,
    Open,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Unopened => "unopened",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An open, stateful channel to the device's screenshot service.
///
/// Not safe for concurrent use: every method takes `&mut self`. The
/// handles are released by [`close`](Self::close) or on drop, whichever
/// comes first, and never twice.
pub struct DeviceSession<B: DeviceBackend> {
    backend: B,
    service_name: String,
    state: SessionState,
    udid: Option<Udid>,
    device: Option<B::Device>,
    service: Option<B::Service>,
}

impl<B: DeviceBackend> DeviceSession<B> {
    pub fn new(backend: B, service_name: impl Into<String>) -> Self {
        Self {
            backend,
            service_name: service_name.into(),
            state: SessionState::Unopened,
            udid: None,
            device: None,
            service: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn udid(&self) -> Option<&Udid> {
        self.udid.as_ref()
    }

    /// Acquire the device, then start the capture service on it.
    ///
    /// A no-op when already open. On failure every partially acquired
    /// handle is released and the session ends up `Closed`.
    pub fn connect(&mut self, udid: &Udid) -> Result<(), DeviceError> {
        match self.state {
            SessionState::Open => return Ok(()),
            SessionState::Closed | SessionState::Connecting => {
                return Err(DeviceError::NotOpen {
                    state: self.state.as_str(),
                });
            }
            SessionState::Unopened => {}
        }

        self.state = SessionState::Connecting;
        self.udid = Some(udid.clone());

        let mut device = match self.backend.open_device(udid) {
            Ok(d) => d,
            Err(e) => {
                self.state = SessionState::Closed;
                return Err(e);
            }
        };
        info!("device {udid} found");

        match self.backend.start_service(&mut device, &self.service_name) {
            Ok(service) => {
                info!("{} started on {udid}", self.service_name);
                self.device = Some(device);
                self.service = Some(service);
                self.state = SessionState::Open;
                Ok(())
            }
            Err(e) => {
                self.backend.close_device(device);
                self.state = SessionState::Closed;
                Err(e)
            }
        }
    }

    /// Request one frame. Valid only while `Open`.
    pub fn capture_frame(&mut self) -> Result<Vec<u8>, DeviceError> {
        let state = self.state;
        match (state, self.service.as_mut()) {
            (SessionState::Open, Some(service)) => self.backend.capture(service),
            _ => Err(DeviceError::NotOpen {
                state: state.as_str(),
            }),
        }
    }

    /// Release the service channel and the device handle. Idempotent.
    pub fn close(&mut self) {
        if let Some(service) = self.service.take() {
            self.backend.close_service(service);
        }
        if let Some(device) = self.device.take() {
            self.backend.close_device(device);
        }
        if self.state != SessionState::Closed {
            debug!("device session closed (was {})", self.state);
            self.state = SessionState::Closed;
        }
    }
}

impl<B: DeviceBackend> Drop for DeviceSession<B> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<B: DeviceBackend> fmt::Debug for DeviceSession<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("service_name", &self.service_name)
            .field("state", &self.state)
            .field("udid", &self.udid)
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────
