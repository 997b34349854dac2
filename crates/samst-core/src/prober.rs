// ── Sound-mode prober ──
//
// Soundbars advertise sound modes they silently refuse. The prober learns
// the real set by writing each candidate, reading it back, and restoring
// the original mode. Runs are expensive, so they are gated by a TTL cache,
// an attempt throttle, and an idle check so music is never interrupted.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;
use strum::Display;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;
use crate::dispatcher::CommandDispatcher;
use crate::error::CoreError;
use crate::model::{AttributeStore, execute};

pub const SOUNDMODE_PROP: &str = "x.com.samsung.networkaudio.soundmode";

const BASE_MODES: &[&str] = &["standard", "surround", "game", "smart", "adaptive"];
const PREMIUM_MODES: &[&str] = &["movie", "music", "clearvoice", "dts_virtual_x", "amplify"];
const S_SERIES_MODES: &[&str] = &["music", "clearvoice"];
const PREMIUM_PREFIXES: &[&str] = &["HW-Q9", "HW-Q8", "HW-Q990", "HW-Q930", "HW-Q800"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// Another attempt ran too recently.
    Throttled,
    /// The device is off or playing.
    NotIdle,
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Skipped(SkipReason),
    /// A fresh validation result already exists.
    Cached,
    /// A run completed and validated this many modes.
    Validated(usize),
}

/// Cached result of the last completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedOptionSet {
    pub validated: Vec<String>,
    pub last_validated_at: Option<Instant>,
    pub validation_done: bool,
}

/// Candidate sound modes for `model`, followed by user overrides.
///
/// Deduplicated case-insensitively; first occurrence wins.
pub fn candidate_modes(model: Option<&str>, overrides: &[String]) -> Vec<String> {
    let model = model.unwrap_or_default().trim().to_uppercase();
    let mut lists: Vec<&[&str]> = vec![BASE_MODES];
    if PREMIUM_PREFIXES.iter().any(|p| model.starts_with(p)) {
        lists.push(PREMIUM_MODES);
    } else if model.starts_with("HW-S") {
        lists.push(S_SERIES_MODES);
    }

    let mut out: Vec<String> = Vec::new();
    let builtin = lists.into_iter().flatten().map(|m| (*m).to_owned());
    for mode in builtin.chain(overrides.iter().map(|m| m.trim().to_owned())) {
        if !mode.is_empty() && !out.iter().any(|m| m.eq_ignore_ascii_case(&mode)) {
            out.push(mode);
        }
    }
    out
}

/// Powered on and not playing. A missing switch attribute counts as not idle.
pub fn is_idle(snapshot: &AttributeStore) -> bool {
    let on = snapshot.main_str("switch", "switch") == Some("on");
    let playing = snapshot.main_str("mediaPlayback", "playbackStatus") == Some("playing");
    on && !playing
}

pub struct FeatureProber {
    dispatcher: Arc<CommandDispatcher>,
    model: Option<String>,
    config: ProbeConfig,
    cache: ArcSwap<ValidatedOptionSet>,
    last_attempt: Mutex<Option<Instant>>,
    running: Mutex<()>,
}

impl FeatureProber {
    pub fn new(dispatcher: Arc<CommandDispatcher>, model: Option<String>, config: ProbeConfig) -> Self {
        Self {
            dispatcher,
            model,
            config,
            cache: ArcSwap::from_pointee(ValidatedOptionSet::default()),
            last_attempt: Mutex::new(None),
            running: Mutex::new(()),
        }
    }

    pub fn options(&self) -> Arc<ValidatedOptionSet> {
        self.cache.load_full()
    }

    /// Validated modes, or `None` before the first completed run.
    pub fn validated_modes(&self) -> Option<Vec<String>> {
        let cache = self.cache.load();
        cache.validation_done.then(|| cache.validated.clone())
    }

    /// Drop the cache so the next eligible call validates again.
    pub async fn invalidate(&self) {
        self.cache.store(Arc::new(ValidatedOptionSet::default()));
        *self.last_attempt.lock().await = None;
    }

    /// Validate sound modes if the cache is stale and the device is idle.
    ///
    /// Individual candidate failures are swallowed. A failed initial read or
    /// repeated rate limiting aborts the run and keeps the old cache.
    pub async fn probe(&self, snapshot: &AttributeStore) -> Result<ProbeOutcome, CoreError> {
        let Ok(_running) = self.running.try_lock() else {
            return Ok(ProbeOutcome::Skipped(SkipReason::AlreadyRunning));
        };

        let now = Instant::now();
        let cache = self.cache.load();
        if cache.validation_done
            && cache
                .last_validated_at
                .is_some_and(|at| now.duration_since(at) < self.config.ttl)
        {
            return Ok(ProbeOutcome::Cached);
        }

        let mut last_attempt = self.last_attempt.lock().await;
        if last_attempt.is_some_and(|at| now.duration_since(at) < self.config.min_attempt_interval) {
            return Ok(ProbeOutcome::Skipped(SkipReason::Throttled));
        }
        if !is_idle(snapshot) {
            debug!(device_id = %self.dispatcher.device_id(), "soundbar busy, skipping validation");
            return Ok(ProbeOutcome::Skipped(SkipReason::NotIdle));
        }
        *last_attempt = Some(now);
        drop(last_attempt);

        self.run().await
    }

    async fn run(&self) -> Result<ProbeOutcome, CoreError> {
        let device_id = self.dispatcher.device_id();
        let original = self.read_mode().await?;
        if original.is_none() {
            debug!(device_id = %device_id, "soundbar did not report its sound mode");
        }

        let candidates = candidate_modes(self.model.as_deref(), &self.config.soundmode_overrides);
        info!(device_id = %device_id, candidates = candidates.len(), "validating sound modes");

        let mut validated = Vec::new();
        let mut consecutive_rate_limits = 0;
        let mut aborted = None;
        for candidate in candidates {
            match self.try_mode(&candidate).await {
                Ok(accepted) => {
                    consecutive_rate_limits = 0;
                    debug!(device_id = %device_id, mode = %candidate, accepted, "candidate checked");
                    if accepted {
                        validated.push(candidate);
                    }
                }
                Err(e) if e.is_rate_limited() => {
                    consecutive_rate_limits += 1;
                    if consecutive_rate_limits >= self.config.max_consecutive_rate_limits {
                        aborted = Some(e);
                        break;
                    }
                }
                Err(e) => {
                    consecutive_rate_limits = 0;
                    debug!(device_id = %device_id, mode = %candidate, error = %e, "candidate failed");
                }
            }
        }

        match &original {
            Some(mode) => {
                if let Err(e) = self
                    .dispatcher
                    .execute_set(execute::SOUNDMODE, SOUNDMODE_PROP, Value::from(mode.as_str()))
                    .await
                {
                    warn!(device_id = %device_id, mode = %mode, error = %e, "could not restore sound mode");
                }
            }
            None => debug!(device_id = %device_id, "no original sound mode, skipping restore"),
        }

        if let Some(e) = aborted {
            warn!(device_id = %device_id, error = %e, "sound mode validation aborted");
            return Err(e);
        }

        let count = validated.len();
        self.cache.store(Arc::new(ValidatedOptionSet {
            validated,
            last_validated_at: Some(Instant::now()),
            validation_done: true,
        }));
        info!(device_id = %device_id, count, "sound modes validated");
        Ok(ProbeOutcome::Validated(count))
    }

    async fn read_mode(&self) -> Result<Option<String>, CoreError> {
        let payload = self.dispatcher.execute_query(execute::SOUNDMODE).await?;
        Ok(payload
            .get(SOUNDMODE_PROP)
            .and_then(Value::as_str)
            .map(str::to_owned))
    }

    async fn try_mode(&self, mode: &str) -> Result<bool, CoreError> {
        self.dispatcher
            .execute_set(execute::SOUNDMODE, SOUNDMODE_PROP, Value::from(mode))
            .await?;
        tokio::time::sleep(self.config.settle_delay).await;
        let current = self.read_mode().await?;
        Ok(current.is_some_and(|m| m.eq_ignore_ascii_case(mode)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::model::attributes::tests::store_from;
    use crate::testing::{FakeBackend, SOUNDMODE_KEY, execute_emulator, soundbar_status};

    fn setup(accepted: &'static [&'static str]) -> (Arc<FakeBackend>, FeatureProber) {
        setup_with(&json!({ SOUNDMODE_KEY: "standard" }), accepted)
    }

    fn setup_with(
        soundmode: &Value,
        accepted: &'static [&'static str],
    ) -> (Arc<FakeBackend>, FeatureProber) {
        let backend = Arc::new(FakeBackend::new(soundbar_status(&json!({}))));
        let mut resources = HashMap::new();
        resources.insert(
            execute::SOUNDMODE.to_owned(),
            soundmode.as_object().cloned().unwrap(),
        );
        backend.on_command(execute_emulator(resources, accepted));
        let dispatcher = Arc::new(CommandDispatcher::new("sb-1", backend.clone()));
        let prober = FeatureProber::new(dispatcher, Some("HW-Q990B".into()), ProbeConfig::default());
        (backend, prober)
    }

    fn idle() -> AttributeStore {
        store_from(soundbar_status(&json!({})))
    }

    fn soundmode_writes(backend: &FakeBackend) -> Vec<Value> {
        backend
            .sent()
            .into_iter()
            .filter_map(|c| c.arguments)
            .filter_map(|a| a.get(1).and_then(|b| b.get(SOUNDMODE_KEY)).cloned())
            .collect()
    }

    fn last_soundmode_write(backend: &FakeBackend) -> Option<Value> {
        soundmode_writes(backend).pop()
    }

    #[test]
    fn candidates_are_model_aware_and_deduplicated() {
        let base = candidate_modes(None, &[]);
        assert_eq!(base, ["standard", "surround", "game", "smart", "adaptive"]);

        let premium = candidate_modes(Some("hw-q990c"), &["Movie".into(), "night".into()]);
        assert!(premium.contains(&"dts_virtual_x".to_owned()));
        assert_eq!(premium.last().map(String::as_str), Some("night"));
        assert_eq!(premium.iter().filter(|m| m.eq_ignore_ascii_case("movie")).count(), 1);

        let s_series = candidate_modes(Some("HW-S60B"), &[]);
        assert!(s_series.contains(&"clearvoice".to_owned()));
        assert!(!s_series.contains(&"amplify".to_owned()));
    }

    #[test]
    fn idle_guard() {
        assert!(is_idle(&idle()));
        let playing = store_from(soundbar_status(
            &json!({ "mediaPlayback": { "playbackStatus": { "value": "playing" } } }),
        ));
        assert!(!is_idle(&playing));
        let off = store_from(soundbar_status(&json!({ "switch": { "switch": { "value": "off" } } })));
        assert!(!is_idle(&off));
        assert!(!is_idle(&store_from(json!({ "components": {} }))));
    }

    #[tokio::test(start_paused = true)]
    async fn validates_and_restores_original_mode() {
        let (backend, prober) = setup(&["standard", "surround", "music"]);

        let outcome = prober.probe(&idle()).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::Validated(3));
        assert_eq!(
            prober.validated_modes().unwrap(),
            ["standard", "surround", "music"]
        );
        assert_eq!(last_soundmode_write(&backend), Some(json!("standard")));
    }

    #[tokio::test(start_paused = true)]
    async fn original_mode_needs_its_own_read_back() {
        let (backend, prober) = setup(&["standard", "surround"]);
        // The initial query passes; the write of "standard" itself fails.
        backend.pass_command();
        backend.fail_command(samst_api::Error::Api {
            status: 500,
            message: "internal error".into(),
        });

        let outcome = prober.probe(&idle()).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::Validated(1));
        assert_eq!(prober.validated_modes().unwrap(), ["surround"]);
        assert_eq!(last_soundmode_write(&backend), Some(json!("standard")));
    }

    #[tokio::test(start_paused = true)]
    async fn unreported_mode_still_validates_without_restore() {
        let (backend, prober) = setup_with(
            &json!({ "x.com.samsung.networkaudio.supportedSoundmode": ["standard", "surround"] }),
            &["standard", "surround"],
        );

        let outcome = prober.probe(&idle()).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::Validated(2));
        assert_eq!(prober.validated_modes().unwrap(), ["standard", "surround"]);
        // One write per candidate and no restore write.
        let candidates = candidate_modes(Some("HW-Q990B"), &[]);
        assert_eq!(soundmode_writes(&backend).len(), candidates.len());
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_cache_short_circuits() {
        let (backend, prober) = setup(&["standard"]);
        prober.probe(&idle()).await.unwrap();
        let sent = backend.sent().len();

        tokio::time::advance(Duration::from_secs(60 * 60)).await;
        assert_eq!(prober.probe(&idle()).await.unwrap(), ProbeOutcome::Cached);
        assert_eq!(backend.sent().len(), sent);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_device_is_not_probed() {
        let (backend, prober) = setup(&["standard"]);
        let playing = store_from(soundbar_status(
            &json!({ "mediaPlayback": { "playbackStatus": { "value": "playing" } } }),
        ));
        assert_eq!(
            prober.probe(&playing).await.unwrap(),
            ProbeOutcome::Skipped(SkipReason::NotIdle)
        );
        assert!(backend.sent().is_empty());
        assert!(prober.validated_modes().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_throttles_next_attempt() {
        let (backend, prober) = setup(&["standard"]);
        backend.fail_command(samst_api::Error::Rejected {
            status: 422,
            message: "execute".into(),
        });

        assert!(prober.probe(&idle()).await.is_err());
        assert_eq!(
            prober.probe(&idle()).await.unwrap(),
            ProbeOutcome::Skipped(SkipReason::Throttled)
        );

        tokio::time::advance(Duration::from_secs(181)).await;
        assert!(matches!(
            prober.probe(&idle()).await.unwrap(),
            ProbeOutcome::Validated(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_rate_limits_abort_and_keep_cache() {
        let (backend, prober) = setup(&["standard", "surround"]);
        prober.probe(&idle()).await.unwrap();
        let before = prober.options();

        tokio::time::advance(ProbeConfig::default().ttl + Duration::from_secs(1)).await;
        // The initial read goes through; both candidate writes exhaust their retries.
        backend.pass_command();
        for _ in 0..8 {
            backend.fail_command(samst_api::Error::RateLimited {
                retry_after: None,
                message: String::new(),
            });
        }

        let err = prober.probe(&idle()).await.unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(prober.options(), before);
        assert_eq!(last_soundmode_write(&backend), Some(json!("standard")));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_forces_revalidation() {
        let (_backend, prober) = setup(&["standard"]);
        prober.probe(&idle()).await.unwrap();
        prober.invalidate().await;
        assert!(prober.validated_modes().is_none());
        assert!(matches!(
            prober.probe(&idle()).await.unwrap(),
            ProbeOutcome::Validated(1)
        ));
    }
}
