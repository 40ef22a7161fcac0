//! Configuration for the relay service.
//!
//! Everything here is optional tuning; the device UDID and the port
//! always come from the command line.

use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use screenrelay_core::buffer::{DEFAULT_GROWTH_MARGIN, DEFAULT_INITIAL_CAPACITY};
use screenrelay_core::device::SCREENSHOT_SERVICE;
use screenrelay_core::device::idevice::{DEFAULT_LIST_TOOL, DEFAULT_SCREENSHOT_TOOL};
use screenrelay_core::{CapturePolicy, ListenEndpoint, RelayError, RelayOptions, ToolBackend};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Listening socket.
    pub network: NetworkConfig,
    /// External device tools.
    pub device: DeviceConfig,
    /// Capture loop and frame buffer.
    pub capture: CaptureConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind; the port comes from `--port`.
    pub bind_address: String,
    /// Pending-connection queue length.
    pub backlog: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device service that produces screenshots.
    pub service_name: String,
    /// Tool listing attached device UDIDs.
    pub list_tool: String,
    /// Tool taking one screenshot.
    pub screenshot_tool: String,
    /// Where the per-session screenshot file is written.
    pub scratch_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Frame buffer allocated at startup.
    pub initial_buffer_bytes: usize,
    /// Extra bytes added whenever the frame buffer grows.
    pub growth_margin: usize,
    /// Reconnect to the device after this many failed captures in a row (0 = never).
    pub max_consecutive_failures: u32,
    /// Pause after a failed capture, in milliseconds.
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            backlog: 1,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            service_name: SCREENSHOT_SERVICE.into(),
            list_tool: DEFAULT_LIST_TOOL.into(),
            screenshot_tool: DEFAULT_SCREENSHOT_TOOL.into(),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let policy = CapturePolicy::default();
        Self {
            initial_buffer_bytes: DEFAULT_INITIAL_CAPACITY,
            growth_margin: DEFAULT_GROWTH_MARGIN,
            max_consecutive_failures: policy.max_consecutive_failures,
            retry_delay_ms: policy.retry_delay.as_millis() as u64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

/// Where the loaded configuration came from. Logged once tracing is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// No file at the path; defaults in use.
    Missing,
    /// The file could not be read or parsed; defaults in use.
    Invalid(String),
}

impl RelayConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> (Self, ConfigSource) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(cfg) => (cfg, ConfigSource::File),
                Err(e) => (Self::default(), ConfigSource::Invalid(e.to_string())),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                (Self::default(), ConfigSource::Missing)
            }
            Err(e) => (Self::default(), ConfigSource::Invalid(e.to_string())),
        }
    }

    pub fn endpoint(&self, port: u16) -> Result<ListenEndpoint, RelayError> {
        let addr: IpAddr = self.network.bind_address.parse().map_err(|e| {
            RelayError::Config(format!(
                "bind_address {:?}: {e}",
                self.network.bind_address
            ))
        })?;
        Ok(ListenEndpoint::new(addr, port).with_backlog(self.network.backlog))
    }

    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            service_name: self.device.service_name.clone(),
            capture_policy: CapturePolicy {
                max_consecutive_failures: self.capture.max_consecutive_failures,
                retry_delay: Duration::from_millis(self.capture.retry_delay_ms),
            },
            initial_buffer_bytes: self.capture.initial_buffer_bytes,
            growth_margin: self.capture.growth_margin,
        }
    }

    pub fn backend(&self, debug: bool) -> ToolBackend {
        ToolBackend::new(&self.device.list_tool, &self.device.screenshot_tool)
            .with_debug(debug)
            .with_scratch_dir(&self.device.scratch_dir)
    }
}

// ── Tests ────────────────────────────────────────────────────────
