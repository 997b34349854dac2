// ── Soundbar execute features ──
//
// OCF soundbars expose sound mode, woofer, EQ and a few toggles only via
// the generic `execute` capability. Reading them costs a command plus a
// status read each, so the passive poll is heavily throttled.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value, json};
use strum::{Display, EnumIter, EnumString};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::coordinator::RefreshHook;
use crate::dispatcher::CommandDispatcher;
use crate::error::CoreError;
use crate::model::{AttributeStore, CommandRequest, execute};
use crate::prober::{FeatureProber, SOUNDMODE_PROP};

const PREFIX: &str = "x.com.samsung.networkaudio.";

/// Pause after each `setNextInputSource` step.
pub const INPUT_STEP_DELAY: Duration = Duration::from_millis(600);

/// Accepted range for woofer and per-channel levels.
pub const LEVEL_RANGE: std::ops::RangeInclusive<i64> = -12..=6;

/// Individual channel addressed by `channelVolume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize)]
pub enum SpeakerIdentifier {
    #[strum(serialize = "Spk_Center")]
    Center,
    #[strum(serialize = "Spk_Side")]
    Side,
    #[strum(serialize = "Spk_Wide")]
    Wide,
    #[strum(serialize = "Spk_Front_Top")]
    FrontTop,
    #[strum(serialize = "Spk_Rear")]
    Rear,
    #[strum(serialize = "Spk_Rear_Top")]
    RearTop,
}

/// Where the wireless rear speakers are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize)]
pub enum RearSpeakerMode {
    Front,
    Rear,
}

/// Last values read from the execute resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SoundbarExecuteState {
    /// `None` until the first poll, `Some(false)` once execute proved useless.
    pub supported: Option<bool>,
    pub sound_mode: Option<String>,
    pub supported_sound_modes: Vec<String>,
    pub woofer_level: Option<i64>,
    pub woofer_connection: Option<String>,
    pub eq_preset: Option<String>,
    pub eq_presets: Vec<String>,
    pub night_mode: Option<bool>,
    pub bass_boost: Option<bool>,
    pub voice_amplifier: Option<bool>,
}

impl SoundbarExecuteState {
    fn apply_soundmode(&mut self, payload: &Map<String, Value>) {
        self.sound_mode = str_prop(payload, "soundmode");
        self.supported_sound_modes = list_prop(payload, "supportedSoundmode");
    }

    fn apply_woofer(&mut self, payload: &Map<String, Value>) {
        self.woofer_level = prop(payload, "woofer").and_then(Value::as_i64);
        self.woofer_connection = str_prop(payload, "connection");
    }

    fn apply_eq(&mut self, payload: &Map<String, Value>) {
        self.eq_preset = str_prop(payload, "EQname");
        self.eq_presets = list_prop(payload, "supportedList");
    }

    fn apply_advanced(&mut self, payload: &Map<String, Value>) {
        self.night_mode = flag_prop(payload, "nightmode");
        self.bass_boost = flag_prop(payload, "bassboost");
        self.voice_amplifier = flag_prop(payload, "voiceamplifier");
    }
}

fn prop<'a>(payload: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    payload.get(&format!("{PREFIX}{name}"))
}

fn str_prop(payload: &Map<String, Value>, name: &str) -> Option<String> {
    prop(payload, name).and_then(Value::as_str).map(str::to_owned)
}

fn list_prop(payload: &Map<String, Value>, name: &str) -> Vec<String> {
    prop(payload, name)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default()
}

fn flag_prop(payload: &Map<String, Value>, name: &str) -> Option<bool> {
    match prop(payload, name)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

fn flag(on: bool) -> Value {
    Value::from(i64::from(on))
}

fn check_level(what: &str, level: i64) -> Result<(), CoreError> {
    if LEVEL_RANGE.contains(&level) {
        Ok(())
    } else {
        Err(CoreError::InvalidArgument {
            message: format!(
                "{what} level {level} outside {}..={}",
                LEVEL_RANGE.start(),
                LEVEL_RANGE.end()
            ),
        })
    }
}

pub struct SoundbarFeatures {
    dispatcher: Arc<CommandDispatcher>,
    poll_interval: Duration,
    state: ArcSwap<SoundbarExecuteState>,
    last_poll: Mutex<Option<Instant>>,
}

impl SoundbarFeatures {
    pub fn new(dispatcher: Arc<CommandDispatcher>, poll_interval: Duration) -> Self {
        Self {
            dispatcher,
            poll_interval,
            state: ArcSwap::from_pointee(SoundbarExecuteState::default()),
            last_poll: Mutex::new(None),
        }
    }

    pub fn state(&self) -> Arc<SoundbarExecuteState> {
        self.state.load_full()
    }

    pub fn is_unsupported(&self) -> bool {
        self.state.load().supported == Some(false)
    }

    /// Read all execute resources, at most once per poll interval.
    ///
    /// Returns `false` when throttled or when execute is known unusable.
    pub async fn poll(&self) -> Result<bool, CoreError> {
        if self.is_unsupported() {
            return Ok(false);
        }
        {
            let mut last = self.last_poll.lock().await;
            let now = Instant::now();
            if last.is_some_and(|at| now.duration_since(at) < self.poll_interval) {
                return Ok(false);
            }
            *last = Some(now);
        }

        let device_id = self.dispatcher.device_id();
        let mut next = SoundbarExecuteState::clone(&self.state.load());

        let payload = self.query(execute::SOUNDMODE).await?;
        if payload.is_empty() {
            if next.supported.is_none() {
                info!(device_id = %device_id, "soundbar returned no execute data, disabling execute features");
                next.supported = Some(false);
                self.state.store(Arc::new(next));
                return Ok(true);
            }
        } else {
            next.supported = Some(true);
            next.apply_soundmode(&payload);
        }

        let payload = self.query(execute::WOOFER).await?;
        if !payload.is_empty() {
            next.apply_woofer(&payload);
        }
        let payload = self.query(execute::EQ).await?;
        if !payload.is_empty() {
            next.apply_eq(&payload);
        }
        let payload = self.query(execute::ADVANCED_AUDIO).await?;
        if !payload.is_empty() {
            next.apply_advanced(&payload);
        }

        debug!(device_id = %device_id, sound_mode = ?next.sound_mode, "execute features updated");
        self.state.store(Arc::new(next));
        Ok(true)
    }

    async fn query(&self, href: &str) -> Result<Map<String, Value>, CoreError> {
        match self.dispatcher.execute_query(href).await {
            Ok(payload) => Ok(payload),
            Err(e) => {
                if matches!(e, CoreError::Rejected { .. }) {
                    warn!(device_id = %self.dispatcher.device_id(), href, error = %e, "execute rejected, disabling execute features");
                    let mut next = SoundbarExecuteState::clone(&self.state.load());
                    next.supported = Some(false);
                    self.state.store(Arc::new(next));
                }
                Err(e)
            }
        }
    }

    // ── Setters ──────────────────────────────────────────────────────

    pub async fn set_sound_mode(&self, mode: &str) -> Result<(), CoreError> {
        self.dispatcher
            .execute_set(execute::SOUNDMODE, SOUNDMODE_PROP, Value::from(mode))
            .await
    }

    pub async fn set_woofer_level(&self, level: i64) -> Result<(), CoreError> {
        check_level("woofer", level)?;
        self.set(execute::WOOFER, "woofer", Value::from(level)).await
    }

    pub async fn set_eq_preset(&self, preset: &str) -> Result<(), CoreError> {
        self.set(execute::EQ, "EQname", Value::from(preset)).await
    }

    pub async fn set_night_mode(&self, on: bool) -> Result<(), CoreError> {
        self.set(execute::ADVANCED_AUDIO, "nightmode", flag(on)).await
    }

    pub async fn set_bass_boost(&self, on: bool) -> Result<(), CoreError> {
        self.set(execute::ADVANCED_AUDIO, "bassboost", flag(on)).await
    }

    pub async fn set_voice_amplifier(&self, on: bool) -> Result<(), CoreError> {
        self.set(execute::ADVANCED_AUDIO, "voiceamplifier", flag(on)).await
    }

    pub async fn set_active_voice_amplifier(&self, on: bool) -> Result<(), CoreError> {
        self.set(execute::ACTIVE_VOICE_AMPLIFIER, "activeVoiceAmplifier", flag(on))
            .await
    }

    pub async fn set_space_fit_sound(&self, on: bool) -> Result<(), CoreError> {
        self.set(execute::SPACE_FIT, "spacefitSound", flag(on)).await
    }

    /// Channel levels are write-only; there is no read-back resource.
    pub async fn set_speaker_level(&self, speaker: SpeakerIdentifier, level: i64) -> Result<(), CoreError> {
        check_level("speaker", level)?;
        let value = json!([{ "name": speaker.to_string(), "value": level }]);
        self.set(execute::CHANNEL_VOLUME, "channelVolume", value).await
    }

    pub async fn set_rear_speaker_mode(&self, mode: RearSpeakerMode) -> Result<(), CoreError> {
        self.set(
            execute::SURROUND_SPEAKER,
            "currentRearPosition",
            Value::from(mode.to_string()),
        )
        .await
    }

    async fn set(&self, href: &str, name: &str, value: Value) -> Result<(), CoreError> {
        self.dispatcher
            .execute_set(href, &format!("{PREFIX}{name}"), value)
            .await
    }
}

// ── Input cycling ────────────────────────────────────────────────────

/// Step through inputs with `setNextInputSource` until `source` is active.
///
/// Many soundbars list their inputs but ignore a direct `setInputSource`.
/// The current input is taken from `snapshot`; an unknown current input
/// counts as the first entry. Returns the number of steps sent.
pub async fn select_input_source(
    dispatcher: &CommandDispatcher,
    snapshot: &AttributeStore,
    source: &str,
) -> Result<usize, CoreError> {
    const CAP: &str = "samsungvd.audioInputSource";

    let sources: Vec<&str> = snapshot
        .main(CAP, "supportedInputSources")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if sources.is_empty() {
        return Err(CoreError::Unsupported {
            operation: "select input source (no supported inputs reported)".into(),
        });
    }

    let current = snapshot.main_str(CAP, "inputSource");
    if current == Some(source) {
        return Ok(0);
    }
    let Some(target) = sources.iter().position(|s| *s == source) else {
        return Err(CoreError::InvalidArgument {
            message: format!("unknown input {source:?}, expected one of {}", sources.join(", ")),
        });
    };
    let start = current
        .and_then(|c| sources.iter().position(|s| *s == c))
        .unwrap_or(0);
    let steps = (target + sources.len() - start) % sources.len();

    debug!(device_id = %dispatcher.device_id(), source, steps, "cycling input source");
    let next = CommandRequest::new(CAP, "setNextInputSource").with_arguments(Vec::new());
    for _ in 0..steps {
        dispatcher.send(&next).await?;
        tokio::time::sleep(INPUT_STEP_DELAY).await;
    }
    Ok(steps)
}

// ── Post-refresh hook ────────────────────────────────────────────────

/// Runs the execute poll and the sound-mode prober after each refresh.
pub struct SoundbarHook {
    pub features: Arc<SoundbarFeatures>,
    pub prober: Arc<FeatureProber>,
}

#[async_trait]
impl RefreshHook for SoundbarHook {
    async fn after_refresh(&self, snapshot: &Arc<AttributeStore>) {
        if let Err(e) = self.features.poll().await {
            debug!(error = %e, "execute feature poll failed");
        }
        if self.features.is_unsupported() {
            return;
        }
        match self.prober.probe(snapshot).await {
            Ok(outcome) => debug!(?outcome, "sound mode probe"),
            Err(e) => warn!(error = %e, "sound mode probe failed"),
        }
    }
}
