// ── In-memory cloud backend for unit tests ──

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use samst_api::Error as ApiError;
use samst_api::cloud::{DeviceCommand, DeviceDto, DeviceStatus, UserInfo};

use crate::backend::CloudBackend;

type CommandHook = Box<dyn FnMut(&DeviceCommand, &mut Value) + Send>;

/// Scripted [`CloudBackend`].
///
/// Scripted results are consumed first; afterwards status reads return the
/// current `status` document and commands run through the optional hook,
/// which may rewrite that document.
pub(crate) struct FakeBackend {
    pub devices: Mutex<Vec<Value>>,
    pub status: Mutex<Value>,
    pub status_errors: Mutex<VecDeque<ApiError>>,
    pub command_script: Mutex<VecDeque<Result<(), ApiError>>>,
    pub sent: Mutex<Vec<DeviceCommand>>,
    pub status_calls: AtomicUsize,
    pub status_delay: Mutex<Duration>,
    pub capability_defs: Mutex<HashMap<String, Value>>,
    hook: Mutex<Option<CommandHook>>,
}

impl FakeBackend {
    pub fn new(status: Value) -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            status: Mutex::new(status),
            status_errors: Mutex::new(VecDeque::new()),
            command_script: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
            status_delay: Mutex::new(Duration::ZERO),
            capability_defs: Mutex::new(HashMap::new()),
            hook: Mutex::new(None),
        }
    }

    pub fn on_command(&self, hook: impl FnMut(&DeviceCommand, &mut Value) + Send + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn fail_status(&self, err: ApiError) {
        self.status_errors.lock().unwrap().push_back(err);
    }

    pub fn fail_command(&self, err: ApiError) {
        self.command_script.lock().unwrap().push_back(Err(err));
    }

    /// Let the next scripted command through before later failures.
    pub fn pass_command(&self) {
        self.command_script.lock().unwrap().push_back(Ok(()));
    }

    pub fn sent(&self) -> Vec<DeviceCommand> {
        self.sent.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CloudBackend for FakeBackend {
    async fn list_devices(&self) -> Result<Vec<DeviceDto>, ApiError> {
        let raw = self.devices.lock().unwrap().clone();
        Ok(raw
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect())
    }

    async fn get_device(&self, device_id: &str) -> Result<DeviceDto, ApiError> {
        let raw = self.devices.lock().unwrap().clone();
        raw.into_iter()
            .find(|d| d["deviceId"] == device_id)
            .map(|v| serde_json::from_value(v).unwrap())
            .ok_or_else(|| ApiError::Rejected {
                status: 404,
                message: format!("no device {device_id}"),
            })
    }

    async fn get_status(&self, _device_id: &str) -> Result<DeviceStatus, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.status_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.status_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        let doc = self.status.lock().unwrap().clone();
        Ok(serde_json::from_value(doc).unwrap())
    }

    async fn get_capability_def(&self, capability: &str, _version: u32) -> Result<Value, ApiError> {
        self.capability_defs
            .lock()
            .unwrap()
            .get(capability)
            .cloned()
            .ok_or_else(|| ApiError::Rejected {
                status: 404,
                message: format!("no definition for {capability}"),
            })
    }

    async fn send_commands(&self, _device_id: &str, commands: &[DeviceCommand]) -> Result<(), ApiError> {
        self.sent.lock().unwrap().extend(commands.iter().cloned());
        if let Some(Err(err)) = self.command_script.lock().unwrap().pop_front() {
            return Err(err);
        }
        if let Some(hook) = self.hook.lock().unwrap().as_mut() {
            let mut status = self.status.lock().unwrap();
            for cmd in commands {
                hook(cmd, &mut status);
            }
        }
        Ok(())
    }

    async fn get_user_me(&self) -> Result<UserInfo, ApiError> {
        Ok(serde_json::from_value(json!({ "username": "tester" })).unwrap())
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────

pub(crate) const SOUNDMODE_KEY: &str = "x.com.samsung.networkaudio.soundmode";

/// Status of an idle, powered-on soundbar.
pub(crate) fn soundbar_status(extra_main: &Value) -> Value {
    let mut main = json!({
        "switch": { "switch": { "value": "on" } },
        "mediaPlayback": { "playbackStatus": { "value": "stopped" } },
        "samsungvd.audioInputSource": {
            "inputSource": { "value": "HDMI1" },
            "supportedInputSources": { "value": ["HDMI1", "BT", "WIFI", "D.IN"] }
        }
    });
    if let (Some(base), Some(extra)) = (main.as_object_mut(), extra_main.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    json!({ "components": { "main": main } })
}

/// Emulates the OCF execute resources of a soundbar.
///
/// A query publishes the resource into `execute.data`. A write updates the
/// resource, except a sound mode outside `accepted` which the device
/// silently ignores.
pub(crate) fn execute_emulator(
    resources: HashMap<String, Map<String, Value>>,
    accepted: &'static [&'static str],
) -> impl FnMut(&DeviceCommand, &mut Value) + Send + 'static {
    let mut resources = resources;
    move |cmd, status| {
        if cmd.capability != "execute" {
            return;
        }
        let args = cmd.arguments.clone().unwrap_or_default();
        let Some(href) = args.first().and_then(Value::as_str).map(str::to_owned) else {
            return;
        };
        match args.get(1).and_then(Value::as_object) {
            Some(body) => {
                let entry = resources.entry(href).or_default();
                for (k, v) in body {
                    if k == SOUNDMODE_KEY && !v.as_str().is_some_and(|m| accepted.contains(&m)) {
                        continue;
                    }
                    entry.insert(k.clone(), v.clone());
                }
            }
            None => {
                let payload = resources.get(&href).cloned().unwrap_or_default();
                status["components"]["main"]["execute"] =
                    json!({ "data": { "value": { "payload": payload } } });
            }
        }
    }
}
