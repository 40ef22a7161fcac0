//! Scripted in-memory backend.
//!
//! Stands in for a real device in tests: presence and service
//! availability are switches, captures come from a queue, and every
//! open/close is counted so tests can assert handles are released
//! exactly once. Clones share the same script.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::device::{DeviceBackend, Udid};
use crate::error::DeviceError;

/// How many times each backend call happened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCounters {
    pub device_opens: u32,
    pub device_closes: u32,
    pub service_starts: u32,
    pub service_closes: u32,
    pub captures: u64,
}

#[derive(Debug)]
struct Script {
    device_present: bool,
    service_available: bool,
    queue: VecDeque<Result<Vec<u8>, String>>,
    /// Returned once the queue is empty; `None` means captures fail.
    repeat: Option<Vec<u8>>,
    counters: BackendCounters,
}

#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

/// Handle returned by [`ScriptedBackend::open_device`].
#[derive(Debug)]
pub struct ScriptedDevice {
    pub udid: Udid,
}

/// Handle returned by [`ScriptedBackend::start_service`].
#[derive(Debug)]
pub struct ScriptedService {
    pub name: String,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    /// A present device with a working service and an empty capture queue.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                device_present: true,
                service_available: true,
                queue: VecDeque::new(),
                repeat: None,
                counters: BackendCounters::default(),
            })),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_device_present(&self, present: bool) {
        self.script().device_present = present;
    }

    pub fn set_service_available(&self, available: bool) {
        self.script().service_available = available;
    }

    pub fn push_frame(&self, frame: Vec<u8>) {
        self.script().queue.push_back(Ok(frame));
    }

    pub fn push_failure(&self, reason: &str) {
        self.script().queue.push_back(Err(reason.to_string()));
    }

    /// Frame returned forever once the queue drains.
    pub fn set_repeat_frame(&self, frame: Option<Vec<u8>>) {
        self.script().repeat = frame;
    }

    pub fn counters(&self) -> BackendCounters {
        self.script().counters
    }
}

impl DeviceBackend for ScriptedBackend {
    type Device = ScriptedDevice;
    type Service = ScriptedService;

    fn open_device(&self, udid: &Udid) -> Result<Self::Device, DeviceError> {
        let mut script = self.script();
        if !script.device_present {
            return Err(DeviceError::DeviceNotFound {
                udid: udid.to_string(),
            });
        }
        script.counters.device_opens += 1;
        Ok(ScriptedDevice { udid: udid.clone() })
    }

    fn start_service(
        &self,
        _device: &mut Self::Device,
        service_name: &str,
    ) -> Result<Self::Service, DeviceError> {
        let mut script = self.script();
        if !script.service_available {
            return Err(DeviceError::ServiceUnavailable {
                service: service_name.to_string(),
                reason: "developer disk image not mounted".into(),
            });
        }
        script.counters.service_starts += 1;
        Ok(ScriptedService {
            name: service_name.to_string(),
        })
    }

    fn capture(&self, _service: &mut Self::Service) -> Result<Vec<u8>, DeviceError> {
        let mut script = self.script();
        script.counters.captures += 1;
        match script.queue.pop_front() {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(reason)) => Err(DeviceError::CaptureFailed(reason)),
            None => script
                .repeat
                .clone()
                .ok_or_else(|| DeviceError::CaptureFailed("no frame scripted".into())),
        }
    }

    fn close_service(&self, _service: Self::Service) {
        self.script().counters.service_closes += 1;
    }

    fn close_device(&self, _device: Self::Device) {
        self.script().counters.device_closes += 1;
    }
}
