//! Backend built on the libimobiledevice command-line tools.
//!
//! ```text
//! open_device    idevice_id -l                    (is the UDID attached?)
//! start_service  idevicescreenshot -u UDID FILE   (probe capture)
//! capture        idevicescreenshot -u UDID FILE   (read FILE back)
//! close_service  remove FILE
//! ```
//!
//! Pairing, lockdown and the service port negotiation all happen
//! inside the tools. Every call blocks until the tool exits.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, warn};

use crate::device::{DeviceBackend, Udid};
use crate::error::DeviceError;

pub const DEFAULT_LIST_TOOL: &str = "idevice_id";
pub const DEFAULT_SCREENSHOT_TOOL: &str = "idevicescreenshot";

#[derive(Debug, Clone)]
pub struct ToolBackend {
    list_tool: PathBuf,
    screenshot_tool: PathBuf,
    scratch_dir: PathBuf,
    debug: bool,
}

#[derive(Debug)]
pub struct ToolDevice {
    udid: Udid,
}

#[derive(Debug)]
pub struct ToolService {
    udid: Udid,
    scratch: PathBuf,
}

impl Default for ToolBackend {
    fn default() -> Self {
        Self::new(DEFAULT_LIST_TOOL, DEFAULT_SCREENSHOT_TOOL)
    }
}

impl ToolBackend {
    /// Backend running the given tools, with scratch files in the system temp dir.
    pub fn new(list_tool: impl Into<PathBuf>, screenshot_tool: impl Into<PathBuf>) -> Self {
        Self {
            list_tool: list_tool.into(),
            screenshot_tool: screenshot_tool.into(),
            scratch_dir: std::env::temp_dir(),
            debug: false,
        }
    }

    /// Run the tools with their own `-d` communication debugging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Directory for the per-session screenshot file.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    fn run(&self, tool: &Path, args: &[&OsStr]) -> io::Result<Output> {
        let mut cmd = Command::new(tool);
        if self.debug {
            cmd.arg("-d");
        }
        cmd.args(args);
        let output = cmd.output()?;
        if self.debug && !output.stderr.is_empty() {
            debug!(
                "{}: {}",
                tool.display(),
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        Ok(output)
    }

    fn screenshot(&self, udid: &Udid, dest: &Path) -> Result<(), String> {
        let output = self
            .run(
                &self.screenshot_tool,
                &[OsStr::new("-u"), OsStr::new(udid.as_str()), dest.as_os_str()],
            )
            .map_err(|e| format!("cannot run {}: {e}", self.screenshot_tool.display()))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(failure_reason(&output))
        }
    }
}

/// Best human-readable explanation of a failed tool run.
fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = if stderr.trim().is_empty() {
        stdout.trim()
    } else {
        stderr.trim()
    };
    if text.is_empty() {
        format!("exited with {}", output.status)
    } else {
        text.lines().last().unwrap_or(text).to_string()
    }
}

/// Whether `listing` (one UDID per line) contains `udid`.
fn listing_contains(listing: &str, udid: &Udid) -> bool {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|id| id == udid.as_str())
}

impl DeviceBackend for ToolBackend {
    type Device = ToolDevice;
    type Service = ToolService;

    fn open_device(&self, udid: &Udid) -> Result<Self::Device, DeviceError> {
        let output = self
            .run(&self.list_tool, &[OsStr::new("-l")])
            .map_err(|e| {
                warn!("cannot run {}: {e}", self.list_tool.display());
                DeviceError::DeviceNotFound {
                    udid: udid.to_string(),
                }
            })?;

        let listing = String::from_utf8_lossy(&output.stdout);
        if output.status.success() && listing_contains(&listing, udid) {
            Ok(ToolDevice { udid: udid.clone() })
        } else {
            Err(DeviceError::DeviceNotFound {
                udid: udid.to_string(),
            })
        }
    }

    fn start_service(
        &self,
        device: &mut Self::Device,
        service_name: &str,
    ) -> Result<Self::Service, DeviceError> {
        let scratch = self.scratch_dir.join(format!(
            "screenrelay-{}-{}.img",
            std::process::id(),
            device.udid
        ));

        self.screenshot(&device.udid, &scratch)
            .map_err(|reason| DeviceError::ServiceUnavailable {
                service: service_name.to_string(),
                reason,
            })?;

        Ok(ToolService {
            udid: device.udid.clone(),
            scratch,
        })
    }

    fn capture(&self, service: &mut Self::Service) -> Result<Vec<u8>, DeviceError> {
        self.screenshot(&service.udid, &service.scratch)
            .map_err(DeviceError::CaptureFailed)?;
        std::fs::read(&service.scratch).map_err(|e| {
            DeviceError::CaptureFailed(format!("{}: {e}", service.scratch.display()))
        })
    }

    fn close_service(&self, service: Self::Service) {
        if let Err(e) = std::fs::remove_file(&service.scratch) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("cannot remove {}: {e}", service.scratch.display());
            }
        }
    }

    fn close_device(&self, _device: Self::Device) {}
}

// ── Tests ────────────────────────────────────────────────────────
