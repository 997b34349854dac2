// ── Soundbar LAN facade ──

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use samst_api::LocalTransport;
use samst_api::local::SoundbarRpc;

use super::endpoint::LocalEndpointClient;
use crate::config::EndpointConfig;
use crate::error::CoreError;

/// Consolidated soundbar status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoundbarStatus {
    pub power: String,
    pub volume: u8,
    pub mute: bool,
    pub input: String,
    pub sound_mode: String,
    pub codec: Option<String>,
    pub identifier: Option<String>,
}

fn field<'a>(reply: &'a Map<String, Value>, method: &str, key: &str) -> Result<&'a Value, CoreError> {
    reply.get(key).ok_or_else(|| CoreError::MalformedResponse {
        message: format!("{method}: reply has no {key}"),
    })
}

fn string_field(reply: &Map<String, Value>, method: &str, key: &str) -> Result<String, CoreError> {
    Ok(match field(reply, method, key)? {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn optional_string(reply: &Map<String, Value>, key: &str) -> Option<String> {
    reply.get(key).and_then(Value::as_str).map(str::to_owned)
}

pub struct SoundbarLocal<T: LocalTransport = SoundbarRpc> {
    endpoint: LocalEndpointClient<T>,
}

impl SoundbarLocal<SoundbarRpc> {
    /// Facade for the soundbar at `host`, with its self-signed certificate accepted.
    pub fn connect(host: impl Into<String>, timeout: Duration) -> Result<Self, CoreError> {
        let rpc = SoundbarRpc::with_timeout(host, timeout)?;
        Ok(Self::new(rpc, EndpointConfig::soundbar()))
    }
}

impl<T: LocalTransport> SoundbarLocal<T> {
    pub fn new(transport: T, config: EndpointConfig) -> Self {
        Self {
            endpoint: LocalEndpointClient::new(transport, config),
        }
    }

    pub fn endpoint(&self) -> &LocalEndpointClient<T> {
        &self.endpoint
    }

    async fn call(&self, method: &str, params: Value) -> Result<Map<String, Value>, CoreError> {
        match self.endpoint.call(method, params).await? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => Err(CoreError::MalformedResponse {
                message: format!("{method}: unexpected reply {other}"),
            }),
        }
    }

    // ── Power ────────────────────────────────────────────────────────

    pub async fn power_on(&self) -> Result<(), CoreError> {
        self.call("powerControl", json!({ "power": "powerOn" })).await.map(drop)
    }

    pub async fn power_off(&self) -> Result<(), CoreError> {
        self.call("powerControl", json!({ "power": "powerOff" })).await.map(drop)
    }

    pub async fn power_state(&self) -> Result<String, CoreError> {
        let reply = self.call("powerControl", Value::Null).await?;
        string_field(&reply, "powerControl", "power")
    }

    // ── Volume ───────────────────────────────────────────────────────

    pub async fn volume_up(&self) -> Result<(), CoreError> {
        self.remote_key("VOL_UP").await
    }

    pub async fn volume_down(&self) -> Result<(), CoreError> {
        self.remote_key("VOL_DOWN").await
    }

    pub async fn mute_toggle(&self) -> Result<(), CoreError> {
        self.remote_key("MUTE").await
    }

    async fn remote_key(&self, key: &str) -> Result<(), CoreError> {
        self.call("remoteKeyControl", json!({ "remoteKey": key }))
            .await
            .map(drop)
    }

    pub async fn volume(&self) -> Result<u8, CoreError> {
        let reply = self.call("getVolume", Value::Null).await?;
        let raw = field(&reply, "getVolume", "volume")?;
        let volume = match raw {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        volume
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| CoreError::MalformedResponse {
                message: format!("getVolume: bad volume {raw}"),
            })
    }

    /// Step to `level`. The firmware only accepts single-step changes.
    pub async fn set_volume(&self, level: u8) -> Result<(), CoreError> {
        if level > 100 {
            return Err(CoreError::InvalidArgument {
                message: format!("volume {level} outside 0..=100"),
            });
        }
        let mut current = self.volume().await?;
        debug!(from = current, to = level, "stepping soundbar volume");
        while current != level {
            if current < level {
                self.volume_up().await?;
                current += 1;
            } else {
                self.volume_down().await?;
                current -= 1;
            }
        }
        Ok(())
    }

    pub async fn is_muted(&self) -> Result<bool, CoreError> {
        let reply = self.call("getMute", Value::Null).await?;
        Ok(match field(&reply, "getMute", "mute")? {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
            Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "on" | "1"),
            _ => false,
        })
    }

    // ── Input and sound mode ─────────────────────────────────────────

    pub async fn input(&self) -> Result<String, CoreError> {
        let reply = self.call("inputSelectControl", Value::Null).await?;
        string_field(&reply, "inputSelectControl", "inputSource")
    }

    pub async fn select_input(&self, source: &str) -> Result<(), CoreError> {
        self.call("inputSelectControl", json!({ "inputSource": source }))
            .await
            .map(drop)
    }

    pub async fn sound_mode(&self) -> Result<String, CoreError> {
        let reply = self.call("soundModeControl", Value::Null).await?;
        string_field(&reply, "soundModeControl", "soundMode")
    }

    pub async fn set_sound_mode(&self, mode: &str) -> Result<(), CoreError> {
        self.call("soundModeControl", json!({ "soundMode": mode }))
            .await
            .map(drop)
    }

    /// Keep the candidates the soundbar actually switches to, then restore
    /// the original mode. Failed candidates are skipped.
    pub async fn detect_sound_modes(&self, candidates: &[String]) -> Result<Vec<String>, CoreError> {
        let original = self.sound_mode().await?;
        let mut supported = Vec::new();
        for mode in candidates {
            if self.set_sound_mode(mode).await.is_err() {
                continue;
            }
            if self.sound_mode().await.is_ok_and(|m| m.eq_ignore_ascii_case(mode)) {
                supported.push(mode.clone());
            }
        }
        if let Err(e) = self.set_sound_mode(&original).await {
            debug!(error = %e, "could not restore sound mode");
        }
        if !supported.iter().any(|m| m.eq_ignore_ascii_case(&original)) {
            supported.insert(0, original);
        }
        Ok(supported)
    }

    // ── Info ─────────────────────────────────────────────────────────

    pub async fn codec(&self) -> Result<Option<String>, CoreError> {
        let reply = self.call("getCodec", Value::Null).await?;
        Ok(optional_string(&reply, "codec"))
    }

    pub async fn identifier(&self) -> Result<Option<String>, CoreError> {
        let reply = self.call("getIdentifier", Value::Null).await?;
        Ok(optional_string(&reply, "identifier"))
    }

    pub async fn status(&self) -> Result<SoundbarStatus, CoreError> {
        Ok(SoundbarStatus {
            power: self.power_state().await?,
            volume: self.volume().await?,
            mute: self.is_muted().await?,
            input: self.input().await?,
            sound_mode: self.sound_mode().await?,
            codec: self.codec().await?,
            identifier: self.identifier().await?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::local::endpoint::tests::{FakeTransport, rpc};

    /// A soundbar whose volume and sound mode respond to writes.
    fn soundbar(volume: u64, accepted: &'static [&'static str]) -> FakeTransport {
        let volume = Arc::new(Mutex::new(volume));
        let mode = Arc::new(Mutex::new("standard".to_owned()));
        FakeTransport::new(move |method, params| {
            let mut volume = volume.lock().unwrap();
            let mut mode = mode.lock().unwrap();
            Ok(match (method, params.get("remoteKey").and_then(Value::as_str)) {
                ("getVolume", _) => json!({ "volume": *volume }),
                ("remoteKeyControl", Some("VOL_UP")) => {
                    *volume += 1;
                    json!({})
                }
                ("remoteKeyControl", Some("VOL_DOWN")) => {
                    *volume -= 1;
                    json!({})
                }
                ("soundModeControl", _) => {
                    if let Some(next) = params.get("soundMode").and_then(Value::as_str) {
                        if accepted.contains(&next) {
                            *mode = next.to_owned();
                        }
                    }
                    json!({ "soundMode": *mode })
                }
                ("powerControl", _) => json!({ "power": "powerOn" }),
                ("getMute", _) => json!({ "mute": false }),
                ("inputSelectControl", _) => json!({ "inputSource": "HDMI_IN1" }),
                ("getCodec", _) => json!({ "codec": "Dolby Atmos" }),
                ("getIdentifier", _) => json!({}),
                _ => return Err(rpc(method, Some(-32601), "Method not found")),
            })
        })
    }

    fn facade(transport: &FakeTransport) -> SoundbarLocal<FakeTransport> {
        SoundbarLocal::new(transport.clone(), EndpointConfig::soundbar())
    }

    #[tokio::test]
    async fn set_volume_steps_one_unit_at_a_time() {
        let transport = soundbar(10, &[]);
        let sb = facade(&transport);

        sb.set_volume(13).await.unwrap();
        assert_eq!(sb.volume().await.unwrap(), 13);
        assert_eq!(transport.calls_to("remoteKeyControl").len(), 3);

        sb.set_volume(12).await.unwrap();
        assert_eq!(sb.volume().await.unwrap(), 12);
        assert!(sb.set_volume(101).await.is_err());
    }

    #[tokio::test]
    async fn status_reads_everything() {
        let transport = soundbar(7, &[]);
        let status = facade(&transport).status().await.unwrap();
        assert_eq!(status.volume, 7);
        assert_eq!(status.power, "powerOn");
        assert_eq!(status.codec.as_deref(), Some("Dolby Atmos"));
        assert_eq!(status.identifier, None);
    }

    #[tokio::test]
    async fn detect_sound_modes_restores_original() {
        let transport = soundbar(0, &["standard", "surround", "game"]);
        let sb = facade(&transport);
        let candidates: Vec<String> = ["surround", "music", "game"].iter().map(|s| (*s).to_owned()).collect();

        let modes = sb.detect_sound_modes(&candidates).await.unwrap();
        assert_eq!(modes, ["standard", "surround", "game"]);
        assert_eq!(sb.sound_mode().await.unwrap(), "standard");
    }

    #[tokio::test]
    async fn unknown_method_is_fatal() {
        let transport = soundbar(0, &[]);
        transport.script("getVolume", Err(rpc("getVolume", Some(-32601), "Method not found")));
        let err = facade(&transport).volume().await.unwrap_err();
        assert_eq!(err.error_number(), Some(-32601));
    }
}
