// ── Hub ──
//
// Owns the per-device table. Each registered device gets a dispatcher, a
// polling coordinator, and for OCF soundbars the execute-feature poller and
// the sound-mode prober. With `background` set the coordinator runs on its
// own task and drives the soundbar hook. The table only owns lookup;
// readers hold `Arc<DeviceHandle>` clones.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use samst_api::cloud::UserInfo;
use samst_api::{CloudClient, TransportConfig};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::apps;
use crate::backend::CloudBackend;
use crate::config::HubConfig;
use crate::coordinator::{PollingCoordinator, RefreshHook};
use crate::dispatcher::CommandDispatcher;
use crate::error::CoreError;
use crate::model::{AttributeStore, CapabilityIndex, CommandRequest, Device};
use crate::prober::FeatureProber;
use crate::soundbar::{self, SoundbarFeatures, SoundbarHook};

// ── Device handle ────────────────────────────────────────────────────

/// Everything the hub keeps for one device.
pub struct DeviceHandle {
    device: Device,
    index: CapabilityIndex,
    dispatcher: Arc<CommandDispatcher>,
    coordinator: PollingCoordinator,
    soundbar: Option<Arc<SoundbarFeatures>>,
    prober: Option<Arc<FeatureProber>>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl DeviceHandle {
    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_id(&self) -> &str {
        &self.device.device_id
    }

    pub fn capabilities(&self) -> &CapabilityIndex {
        &self.index
    }

    pub fn dispatcher(&self) -> &Arc<CommandDispatcher> {
        &self.dispatcher
    }

    pub fn coordinator(&self) -> &PollingCoordinator {
        &self.coordinator
    }

    /// Execute-resource features; `None` for anything but OCF soundbars.
    pub fn soundbar(&self) -> Option<&Arc<SoundbarFeatures>> {
        self.soundbar.as_ref()
    }

    pub fn prober(&self) -> Option<&Arc<FeatureProber>> {
        self.prober.as_ref()
    }

    pub fn snapshot(&self) -> Option<Arc<AttributeStore>> {
        self.coordinator.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<AttributeStore>>> {
        self.coordinator.subscribe()
    }

    /// Wait until the first snapshot is published, or `timeout` elapses.
    pub async fn first_snapshot(&self, timeout: Duration) -> Result<Arc<AttributeStore>, CoreError> {
        let mut rx = self.subscribe();
        let wait = rx.wait_for(Option::is_some);
        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(snapshot)) => snapshot.clone().ok_or_else(|| self.not_ready("no snapshot")),
            Ok(Err(_)) => Err(CoreError::Cancelled),
            Err(_) => Err(self.not_ready("timed out waiting for the first status read")),
        }
    }

    fn not_ready(&self, reason: &str) -> CoreError {
        CoreError::NotReady {
            device_id: self.device.device_id.clone(),
            reason: reason.to_owned(),
        }
    }

    /// Send one command after checking the device advertises it.
    ///
    /// A capability the device lacks fails with `Unsupported` before any
    /// network call. A successful send triggers an early refresh.
    pub async fn send(&self, request: &CommandRequest) -> Result<(), CoreError> {
        self.check_supported(request)?;
        self.dispatcher.send(request).await?;
        self.coordinator.request_refresh();
        Ok(())
    }

    fn check_supported(&self, request: &CommandRequest) -> Result<(), CoreError> {
        let unsupported = || CoreError::Unsupported {
            operation: format!("{}.{}", request.capability, request.command),
        };
        if !self.index.has_capability(&request.capability) {
            return Err(unsupported());
        }
        // Only a fetched definition can rule out a command.
        if self.index.definition(&request.capability).is_some()
            && self.index.command_def(&request.capability, &request.command).is_none()
        {
            return Err(unsupported());
        }
        Ok(())
    }

    /// Launch a TV app by catalog id, `"Name (id)"` label or name.
    ///
    /// Unknown values are sent as a bare app name.
    pub async fn launch_app(&self, app: &str) -> Result<(), CoreError> {
        let request = match apps::resolve(app) {
            Some(known) => CommandRequest::launch_app(Some(known.app_id), Some(known.name))?,
            None => CommandRequest::launch_app(None, Some(app))?,
        };
        self.send(&request).await
    }

    /// Switch a soundbar input, cycling when only "next" is supported.
    pub async fn select_input_source(&self, source: &str) -> Result<usize, CoreError> {
        let snapshot = self
            .snapshot()
            .ok_or_else(|| self.not_ready("input sources are not known yet"))?;
        let steps = soundbar::select_input_source(&self.dispatcher, &snapshot, source).await?;
        self.coordinator.request_refresh();
        Ok(steps)
    }

    async fn stop(&self) {
        self.coordinator.shutdown();
        let task = self.task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

// ── Hub ──────────────────────────────────────────────────────────────

/// Device table plus discovery.
///
/// Cheaply cloneable via `Arc<HubInner>`.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    backend: Arc<dyn CloudBackend>,
    config: HubConfig,
    devices: DashMap<String, Arc<DeviceHandle>>,
    cancel: CancellationToken,
    discovery: Mutex<Option<JoinHandle<()>>>,
}

impl Hub {
    pub fn new(backend: Arc<dyn CloudBackend>, config: HubConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                backend,
                config,
                devices: DashMap::new(),
                cancel: CancellationToken::new(),
                discovery: Mutex::new(None),
            }),
        }
    }

    /// Build a hub backed by the SmartThings cloud client.
    pub fn connect(config: HubConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            timeout: config.timeout,
            ..TransportConfig::default()
        };
        let client = CloudClient::from_token(&config.api_base, &config.token, &transport)?;
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    pub fn backend(&self) -> &Arc<dyn CloudBackend> {
        &self.inner.backend
    }

    /// Check the token against `/users/me`.
    pub async fn validate_token(&self) -> Result<UserInfo, CoreError> {
        Ok(self.inner.backend.get_user_me().await?)
    }

    // ── Discovery ────────────────────────────────────────────────────

    /// List visible devices, filtered to Samsung unless configured otherwise.
    ///
    /// Does not register anything.
    pub async fn scan(&self) -> Result<Vec<Device>, CoreError> {
        let include_all = self.inner.config.include_non_samsung;
        let devices = self
            .inner
            .backend
            .list_devices()
            .await?
            .into_iter()
            .map(Device::from)
            .filter(|d| include_all || d.is_samsung())
            .collect();
        Ok(devices)
    }

    /// Scan and register every device not yet in the table.
    ///
    /// Returns the ids that were added. A device that fails to register is
    /// logged and left for the next scan.
    pub async fn discover(&self) -> Result<Vec<String>, CoreError> {
        let mut added = Vec::new();
        for device in self.scan().await? {
            if self.inner.devices.contains_key(&device.device_id) {
                continue;
            }
            let id = device.device_id.clone();
            match self.register(device).await {
                Ok(_) => added.push(id),
                Err(e) => warn!(device_id = %id, error = %e, "device setup failed"),
            }
        }
        if !added.is_empty() {
            info!(count = added.len(), "discovered new devices");
        }
        Ok(added)
    }

    /// Run [`discover`](Self::discover) periodically in the background.
    ///
    /// The first scan waits for the configured initial delay. Calling this
    /// twice replaces nothing; the running loop is kept.
    pub async fn start_discovery(&self) {
        let mut slot = self.inner.discovery.lock().await;
        if slot.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let hub = self.clone();
        let cancel = self.inner.cancel.child_token();
        *slot = Some(tokio::spawn(async move {
            let mut delay = hub.inner.config.discovery_initial_delay;
            let period = hub.inner.config.effective_discovery_interval();
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
                if let Err(e) = hub.discover().await {
                    warn!(error = %e, "discovery scan failed");
                }
                delay = period;
            }
            debug!("discovery loop stopped");
        }));
    }

    // ── Device table ─────────────────────────────────────────────────

    /// Fetch and register one device by id. Already-registered devices are
    /// returned as-is.
    pub async fn add_device(&self, device_id: &str) -> Result<Arc<DeviceHandle>, CoreError> {
        if let Some(existing) = self.device(device_id) {
            return Ok(existing);
        }
        let dto = self.inner.backend.get_device(device_id).await?;
        self.register(Device::from(dto)).await
    }

    async fn register(&self, device: Device) -> Result<Arc<DeviceHandle>, CoreError> {
        let backend = Arc::clone(&self.inner.backend);
        let config = &self.inner.config;
        let device_id = device.device_id.clone();

        let mut index = CapabilityIndex::from_device(&device);
        if config.fetch_capability_defs {
            for cap in &device.capabilities {
                match backend.get_capability_def(&cap.id, cap.version).await {
                    Ok(def) => index.insert_definition(cap.id.clone(), def),
                    Err(e) => {
                        debug!(device_id = %device_id, capability = %cap.id, error = %e, "capability definition unavailable");
                    }
                }
            }
        }

        let dispatcher = Arc::new(CommandDispatcher::new(device_id.clone(), Arc::clone(&backend)));
        let cancel = self.inner.cancel.child_token();

        let (soundbar, prober) = if device.is_soundbar() && index.has_capability("execute") {
            let features = Arc::new(SoundbarFeatures::new(
                Arc::clone(&dispatcher),
                config.poll.execute_poll_interval,
            ));
            let prober = Arc::new(FeatureProber::new(
                Arc::clone(&dispatcher),
                device.model.clone(),
                config.probe.clone(),
            ));
            (Some(features), Some(prober))
        } else {
            (None, None)
        };

        let coordinator = match (&soundbar, &prober) {
            (Some(features), Some(prober)) if config.background => {
                let hook: Arc<dyn RefreshHook> = Arc::new(SoundbarHook {
                    features: Arc::clone(features),
                    prober: Arc::clone(prober),
                });
                PollingCoordinator::with_hook(device_id.clone(), backend, &config.poll, cancel, hook)
            }
            _ => PollingCoordinator::new(device_id.clone(), backend, &config.poll, cancel),
        };

        let handle = Arc::new(DeviceHandle {
            device,
            index,
            dispatcher,
            coordinator,
            soundbar,
            prober,
            task: std::sync::Mutex::new(None),
        });

        match self.inner.devices.entry(device_id.clone()) {
            Entry::Occupied(existing) => Ok(Arc::clone(existing.get())),
            Entry::Vacant(slot) => {
                if config.background {
                    let task = handle.coordinator.spawn();
                    if let Ok(mut t) = handle.task.lock() {
                        *t = Some(task);
                    }
                }
                slot.insert(Arc::clone(&handle));
                info!(
                    device_id = %device_id,
                    name = handle.device.display_name(),
                    family = %handle.device.family(),
                    "device registered"
                );
                Ok(handle)
            }
        }
    }

    /// Register a device named by id or label, scanning when it is not
    /// already in the table.
    pub async fn resolve(&self, identifier: &str) -> Result<Arc<DeviceHandle>, CoreError> {
        if let Ok(handle) = self.find(identifier) {
            return Ok(handle);
        }
        let found = self.scan().await?.into_iter().find(|d| {
            d.device_id == identifier
                || d.label
                    .as_deref()
                    .is_some_and(|l| l.eq_ignore_ascii_case(identifier))
        });
        match found {
            Some(device) => self.register(device).await,
            None => Err(CoreError::DeviceNotFound {
                identifier: identifier.to_owned(),
            }),
        }
    }

    pub fn device(&self, device_id: &str) -> Option<Arc<DeviceHandle>> {
        self.inner.devices.get(device_id).map(|h| Arc::clone(h.value()))
    }

    /// Look up by id, then by case-insensitive label.
    pub fn find(&self, identifier: &str) -> Result<Arc<DeviceHandle>, CoreError> {
        if let Some(handle) = self.device(identifier) {
            return Ok(handle);
        }
        self.inner
            .devices
            .iter()
            .find(|h| {
                h.device
                    .label
                    .as_deref()
                    .is_some_and(|l| l.eq_ignore_ascii_case(identifier))
            })
            .map(|h| Arc::clone(h.value()))
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: identifier.to_owned(),
            })
    }

    /// Registered devices, ordered by id.
    pub fn devices(&self) -> Vec<Arc<DeviceHandle>> {
        let mut all: Vec<_> = self.inner.devices.iter().map(|h| Arc::clone(h.value())).collect();
        all.sort_by(|a, b| a.device_id().cmp(b.device_id()));
        all
    }

    /// Stop polling a device and forget it.
    pub async fn remove_device(&self, device_id: &str) -> bool {
        let Some((_, handle)) = self.inner.devices.remove(device_id) else {
            return false;
        };
        handle.stop().await;
        info!(device_id = %device_id, "device removed");
        true
    }

    /// Cancel every loop and wait for the tasks to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(task) = self.inner.discovery.lock().await.take() {
            let _ = task.await;
        }
        for handle in self.devices() {
            handle.stop().await;
        }
        debug!("hub stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::testing::{FakeBackend, soundbar_status};

    fn device_json(id: &str, manufacturer: &str, caps: &[&str]) -> Value {
        let caps: Vec<Value> = caps.iter().map(|c| json!({ "id": c, "version": 1 })).collect();
        json!({
            "deviceId": id,
            "label": format!("Device {id}"),
            "manufacturerName": manufacturer,
            "components": [{ "id": "main", "capabilities": caps }]
        })
    }

    fn hub_with(devices: Vec<Value>) -> (Arc<FakeBackend>, Hub) {
        let backend = Arc::new(FakeBackend::new(soundbar_status(&json!({}))));
        *backend.devices.lock().unwrap() = devices;
        let config = HubConfig::new(secrecy::SecretString::from("token".to_owned()));
        (backend.clone(), Hub::new(backend, config))
    }

    #[tokio::test(start_paused = true)]
    async fn discover_filters_non_samsung_and_reports_new_ids() {
        let (_backend, hub) = hub_with(vec![
            device_json("tv-1", "Samsung Electronics", &["switch", "tvChannel"]),
            device_json("lamp-1", "IKEA of Sweden", &["switch"]),
        ]);

        assert_eq!(hub.discover().await.unwrap(), ["tv-1"]);
        assert!(hub.device("lamp-1").is_none());
        assert!(hub.discover().await.unwrap().is_empty());
        hub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn include_non_samsung_keeps_everything() {
        let backend = Arc::new(FakeBackend::new(soundbar_status(&json!({}))));
        *backend.devices.lock().unwrap() = vec![device_json("lamp-1", "IKEA", &["switch"])];
        let mut config = HubConfig::new(secrecy::SecretString::from("token".to_owned()));
        config.include_non_samsung = true;
        let hub = Hub::new(backend, config);

        assert_eq!(hub.scan().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_capability_fails_without_network_call() {
        let (backend, hub) = hub_with(vec![device_json("tv-1", "Samsung", &["switch"])]);
        let handle = hub.add_device("tv-1").await.unwrap();

        let err = handle
            .send(&CommandRequest::new("audioMute", "mute"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Unsupported { ref operation } if operation == "audioMute.mute"));
        assert!(backend.sent().is_empty());
        hub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn fetched_definition_rules_out_unknown_command() {
        let (backend, hub) = hub_with(vec![device_json("tv-1", "Samsung", &["switch"])]);
        backend
            .capability_defs
            .lock()
            .unwrap()
            .insert("switch".into(), json!({ "commands": { "on": {}, "off": {} } }));
        let handle = hub.add_device("tv-1").await.unwrap();

        assert!(handle.send(&CommandRequest::new("switch", "on")).await.is_ok());
        assert!(handle.send(&CommandRequest::new("switch", "toggle")).await.is_err());
        assert_eq!(backend.sent().len(), 1);
        hub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_definition_fetch_leaves_device_usable() {
        let (backend, hub) = hub_with(vec![device_json("tv-1", "Samsung", &["switch"])]);
        let handle = hub.add_device("tv-1").await.unwrap();

        assert!(handle.capabilities().definition("switch").is_none());
        assert!(handle.send(&CommandRequest::new("switch", "on")).await.is_ok());
        assert_eq!(backend.sent().len(), 1);
        hub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn successful_send_triggers_early_refresh() {
        let (backend, hub) = hub_with(vec![device_json("tv-1", "Samsung", &["switch"])]);
        let handle = hub.add_device("tv-1").await.unwrap();
        handle.first_snapshot(Duration::from_secs(1)).await.unwrap();
        let before = backend.status_calls();

        handle.send(&CommandRequest::new("switch", "off")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(backend.status_calls(), before + 1);
        hub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn soundbar_with_execute_gets_features() {
        let (_backend, hub) = hub_with(vec![
            device_json("sb-1", "Samsung", &["switch", "samsungvd.audioInputSource", "execute"]),
            device_json("sb-2", "Samsung", &["switch", "samsungvd.audioInputSource"]),
        ]);
        hub.discover().await.unwrap();

        assert!(hub.device("sb-1").unwrap().soundbar().is_some());
        assert!(hub.device("sb-1").unwrap().prober().is_some());
        assert!(hub.device("sb-2").unwrap().soundbar().is_none());
        hub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn foreground_hub_leaves_polling_to_the_caller() {
        let backend = Arc::new(FakeBackend::new(soundbar_status(&json!({}))));
        *backend.devices.lock().unwrap() = vec![device_json(
            "sb-1",
            "Samsung",
            &["switch", "samsungvd.audioInputSource", "execute"],
        )];
        let mut config = HubConfig::new(secrecy::SecretString::from("token".to_owned()));
        config.background = false;
        let hub = Hub::new(backend.clone(), config);

        let handle = hub.add_device("sb-1").await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(backend.status_calls(), 0);

        handle.coordinator().refresh().await;
        assert!(handle.snapshot().is_some());
        // No hook: the refresh sent no execute commands.
        assert!(backend.sent().is_empty());
        assert!(handle.soundbar().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn launch_app_resolves_catalog_entries() {
        let (backend, hub) = hub_with(vec![device_json("tv-1", "Samsung", &["custom.launchapp"])]);
        let handle = hub.add_device("tv-1").await.unwrap();

        handle.launch_app("Netflix").await.unwrap();
        handle.launch_app("Some Other App").await.unwrap();

        let sent = backend.sent();
        assert_eq!(sent[0].arguments.as_ref().unwrap()[1], json!("Netflix"));
        assert!(sent[0].arguments.as_ref().unwrap()[0].is_string());
        assert_eq!(
            sent[1].arguments.as_ref().unwrap(),
            &vec![Value::Null, json!("Some Other App")]
        );
        hub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn find_by_label_and_remove() {
        let (_backend, hub) = hub_with(vec![device_json("tv-1", "Samsung", &["switch"])]);
        hub.add_device("tv-1").await.unwrap();

        assert_eq!(hub.find("device TV-1").unwrap().device_id(), "tv-1");
        assert!(matches!(hub.find("nope"), Err(CoreError::DeviceNotFound { .. })));

        assert!(hub.remove_device("tv-1").await);
        assert!(!hub.remove_device("tv-1").await);
        assert!(hub.devices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_registers_by_label() {
        let (_backend, hub) = hub_with(vec![device_json("tv-1", "Samsung", &["switch"])]);

        let handle = hub.resolve("Device tv-1").await.unwrap();
        assert_eq!(handle.device_id(), "tv-1");
        assert_eq!(hub.devices().len(), 1);
        assert!(matches!(
            hub.resolve("kitchen").await,
            Err(CoreError::DeviceNotFound { .. })
        ));
        hub.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn background_discovery_waits_for_initial_delay() {
        let (_backend, hub) = hub_with(vec![device_json("tv-1", "Samsung", &["switch"])]);
        hub.start_discovery().await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(hub.devices().is_empty());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(hub.devices().len(), 1);
        hub.shutdown().await;
    }
}
