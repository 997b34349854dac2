// ── Frame TV art facade ──
//
// Typed operations over the art and remote-control channels. Every call
// goes through the endpoint client, so port discovery, retries and the
// unsupported-operation memory apply uniformly.

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use samst_api::LocalTransport;
use samst_api::local::TvTransport;

use super::endpoint::LocalEndpointClient;
use crate::apps;
use crate::config::EndpointConfig;
use crate::error::CoreError;

/// Categories tried, in order, when the TV rejects a slideshow category.
pub const SLIDESHOW_FALLBACK_CATEGORIES: &[&str] = &["MY-C0002", "MY-C0004", "MY-C0008"];

/// Error code the art app returns for an invalid slideshow category.
const INVALID_CATEGORY: i64 = -9;

/// Aggregated view of the art app, built by [`FrameArt::state`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameState {
    pub online: bool,
    pub api_version: Option<String>,
    pub art_mode: Option<bool>,
    pub current_artwork_id: Option<String>,
    pub current_filter: Option<String>,
    pub current_matte: Option<String>,
    pub current_artwork: Map<String, Value>,
    pub brightness: Option<u8>,
    pub artwork_ids: Vec<String>,
    pub matte_options: Vec<String>,
    pub photo_filter_options: Vec<String>,
    pub slideshow: Map<String, Value>,
    pub artmode_settings: Vec<String>,
    pub supports_art_mode: bool,
    pub supports_slideshow: bool,
    pub supports_motion_timer: bool,
    pub supports_motion_sensitivity: bool,
    pub supports_brightness_sensor: bool,
    /// `"<section>: <error>"` for every read that failed.
    pub last_errors: Vec<String>,
}

// ── Reply parsing ────────────────────────────────────────────────────

/// An object, or a JSON string holding one.
fn as_object(value: Option<&Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_default(),
        _ => Map::new(),
    }
}

/// A list, or a JSON string holding one.
fn as_list(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn first_str<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()))
}

fn push_unique(out: &mut Vec<String>, item: &str) {
    if !item.is_empty() && !out.iter().any(|s| s == item) {
        out.push(item.to_owned());
    }
}

/// Option ids from a list of `{id|name}` objects or plain strings.
fn option_keys(items: &[Value]) -> Vec<String> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::Object(map) => {
                if let Some(key) = first_str(map, &["id", "name"]) {
                    push_unique(&mut out, key);
                }
            }
            Value::String(s) => push_unique(&mut out, s),
            _ => {}
        }
    }
    out
}

fn parse_on_off(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_lowercase().as_str() {
            "on" => Some(true),
            "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Brightness on the 1..=10 scale; anything else is a sentinel.
fn parse_brightness(value: Option<&Value>) -> Option<u8> {
    let raw = match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    u8::try_from(raw).ok().filter(|b| (1..=10).contains(b))
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

pub struct FrameArt<T: LocalTransport = TvTransport> {
    endpoint: LocalEndpointClient<T>,
}

impl FrameArt<TvTransport> {
    /// Facade for the TV at `host`, preferring `port`.
    pub fn connect(host: impl Into<String>, port: u16, token: Option<String>) -> Self {
        let transport = TvTransport::new(host).with_token(token);
        Self::new(transport, EndpointConfig::frame(port))
    }
}

impl<T: LocalTransport> FrameArt<T> {
    pub fn new(transport: T, config: EndpointConfig) -> Self {
        Self {
            endpoint: LocalEndpointClient::new(transport, config),
        }
    }

    pub fn endpoint(&self) -> &LocalEndpointClient<T> {
        &self.endpoint
    }

    async fn request(&self, operation: &str, params: Value) -> Result<Value, CoreError> {
        self.endpoint.call(operation, params).await
    }

    async fn request_object(&self, operation: &str, params: Value) -> Result<Map<String, Value>, CoreError> {
        let reply = self.request(operation, params).await?;
        Ok(as_object(Some(&reply)))
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// `true` if the art channel answers at all.
    pub async fn ping(&self) -> bool {
        self.api_version().await.is_ok()
    }

    pub async fn api_version(&self) -> Result<Option<String>, CoreError> {
        let reply = self.request_object("get_api_version", Value::Null).await?;
        Ok(reply.get("version").map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }))
    }

    pub async fn art_mode(&self) -> Result<Option<bool>, CoreError> {
        let reply = self.request_object("get_artmode", Value::Null).await?;
        Ok(parse_on_off(reply.get("value")))
    }

    pub async fn brightness(&self) -> Result<Option<u8>, CoreError> {
        let reply = self.request_object("get_brightness", Value::Null).await?;
        Ok(parse_brightness(reply.get("value")))
    }

    pub async fn current_artwork(&self) -> Result<Map<String, Value>, CoreError> {
        self.request_object("get_current", Value::Null).await
    }

    /// Artwork entries. Firmware answers with a list or a `content_list`.
    pub async fn artworks(&self) -> Result<Vec<Map<String, Value>>, CoreError> {
        let reply = self.request("get_thumbnail_list", Value::Null).await?;
        let items = match &reply {
            Value::Array(items) => items.clone(),
            Value::Object(map) if map.contains_key("content_list") => as_list(map.get("content_list")),
            Value::Object(map) => vec![Value::Object(map.clone())],
            _ => Vec::new(),
        };
        Ok(items
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }

    pub async fn artwork_ids(&self) -> Result<Vec<String>, CoreError> {
        let mut out = Vec::new();
        for item in self.artworks().await? {
            if let Some(id) = first_str(&item, &["content_id", "contentId", "id"]) {
                push_unique(&mut out, id);
            }
        }
        Ok(out)
    }

    pub async fn matte_options(&self) -> Result<Vec<String>, CoreError> {
        let reply = self.request_object("get_matte_list", Value::Null).await?;
        let items = ["matte_type_list", "matte_types"]
            .iter()
            .map(|k| as_list(reply.get(*k)))
            .find(|l| !l.is_empty())
            .unwrap_or_default();
        Ok(option_keys(&items))
    }

    pub async fn photo_filter_options(&self) -> Result<Vec<String>, CoreError> {
        let reply = self.request("get_photo_filter_list", Value::Null).await?;
        let items = match &reply {
            Value::Object(map) => as_list(map.get("filter_list")),
            other => as_list(Some(other)),
        };
        Ok(option_keys(&items))
    }

    pub async fn slideshow_status(&self) -> Result<Map<String, Value>, CoreError> {
        self.request_object("get_slideshow_status", Value::Null).await
    }

    /// Setting names present in the art-mode settings payload.
    pub async fn artmode_settings(&self) -> Result<Vec<String>, CoreError> {
        let reply = self.request_object("get_artmode_settings", Value::Null).await?;
        let mut out = Vec::new();
        for item in as_list(reply.get("data")) {
            if let Some(name) = item.get("item").and_then(Value::as_str) {
                push_unique(&mut out, name);
            }
        }
        Ok(out)
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Switch art mode.
    ///
    /// Some firmware applies the change but never answers, so a failure is
    /// checked against the actual mode before retrying with `"on"`/`"off"`.
    pub async fn set_art_mode(&self, on: bool) -> Result<(), CoreError> {
        match self.request("set_artmode", json!({ "value": on })).await {
            Ok(_) => return Ok(()),
            Err(e @ CoreError::Unsupported { .. }) => return Err(e),
            Err(e) => debug!(error = %e, "boolean art mode write failed, verifying"),
        }
        if let Ok(Some(current)) = self.art_mode().await {
            if current == on {
                return Ok(());
            }
        }
        self.request("set_artmode", json!({ "value": on_off(on) }))
            .await
            .map(drop)
    }

    pub async fn set_brightness(&self, value: u8) -> Result<(), CoreError> {
        if !(1..=10).contains(&value) {
            return Err(CoreError::InvalidArgument {
                message: format!("brightness {value} outside 1..=10"),
            });
        }
        self.request("set_brightness", json!({ "value": value })).await.map(drop)
    }

    pub async fn select_image(&self, content_id: &str, show: bool) -> Result<(), CoreError> {
        self.request(
            "select_image",
            json!({ "content_id": content_id, "category_id": null, "show": show }),
        )
        .await
        .map(drop)
    }

    pub async fn delete_list(&self, content_ids: &[String]) -> Result<(), CoreError> {
        if content_ids.is_empty() {
            return Ok(());
        }
        let list: Vec<Value> = content_ids
            .iter()
            .map(|id| json!({ "content_id": id }))
            .collect();
        self.request("delete_list", json!({ "content_id_list": list }))
            .await
            .map(drop)
    }

    pub async fn change_matte(&self, content_id: &str, matte: &str) -> Result<(), CoreError> {
        self.request("change_matte", json!({ "content_id": content_id, "matte_id": matte }))
            .await
            .map(drop)
    }

    pub async fn set_photo_filter(&self, content_id: &str, filter_id: &str) -> Result<(), CoreError> {
        self.request(
            "set_photo_filter",
            json!({ "content_id": content_id, "filter_id": filter_id }),
        )
        .await
        .map(drop)
    }

    /// Configure the slideshow; `minutes == 0` turns it off.
    ///
    /// An invalid-category answer walks the fallback categories. If none is
    /// accepted the operation is marked unsupported.
    pub async fn set_slideshow_status(
        &self,
        minutes: u32,
        shuffle: bool,
        category: Option<&str>,
    ) -> Result<(), CoreError> {
        const OP: &str = "set_slideshow_status";
        let first = category.unwrap_or(SLIDESHOW_FALLBACK_CATEGORIES[0]);
        let params = |category: &str| {
            json!({
                "value": if minutes > 0 { minutes.to_string() } else { "off".to_owned() },
                "type": if shuffle { "shuffleslideshow" } else { "slideshow" },
                "category_id": category,
            })
        };

        match self.request(OP, params(first)).await {
            Ok(_) => return Ok(()),
            Err(e) if e.error_number() != Some(INVALID_CATEGORY) => return Err(e),
            Err(_) => debug!(category = first, "slideshow category rejected"),
        }

        for fallback in SLIDESHOW_FALLBACK_CATEGORIES.iter().filter(|c| **c != first) {
            match self.request(OP, params(fallback)).await {
                Ok(_) => return Ok(()),
                Err(e @ CoreError::Unsupported { .. }) => return Err(e),
                Err(e) => debug!(category = fallback, error = %e, "slideshow fallback rejected"),
            }
        }

        warn!("no slideshow category accepted");
        self.endpoint.mark_unsupported(OP).await;
        Err(CoreError::Unsupported {
            operation: OP.to_owned(),
        })
    }

    pub async fn set_motion_timer(&self, value: &str) -> Result<(), CoreError> {
        self.request("set_motion_timer", json!({ "value": value })).await.map(drop)
    }

    pub async fn set_motion_sensitivity(&self, value: &str) -> Result<(), CoreError> {
        self.request("set_motion_sensitivity", json!({ "value": value }))
            .await
            .map(drop)
    }

    pub async fn set_brightness_sensor(&self, enabled: bool) -> Result<(), CoreError> {
        self.request("set_brightness_sensor_setting", json!({ "value": enabled }))
            .await
            .map(drop)
    }

    // ── Remote channel ───────────────────────────────────────────────

    pub async fn app_list(&self) -> Result<Vec<Map<String, Value>>, CoreError> {
        let reply = self.request("app_list", Value::Null).await?;
        Ok(as_list(Some(&reply))
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }

    pub async fn run_app(&self, app_id: &str, app_type: &str, meta_tag: &str) -> Result<(), CoreError> {
        self.request(
            "run_app",
            json!({ "app_id": app_id, "app_type": app_type, "meta_tag": meta_tag }),
        )
        .await
        .map(drop)
    }

    pub async fn open_url(&self, url: &str) -> Result<(), CoreError> {
        if !apps::is_http_url(url) {
            return Err(CoreError::InvalidArgument {
                message: format!("not an http(s) URL: {url}"),
            });
        }
        self.request("open_browser", json!({ "url": url })).await.map(drop)
    }

    // ── Aggregate ────────────────────────────────────────────────────

    /// Read everything the art app exposes. Individual failures land in
    /// `last_errors`; the TV counts as online once the version read works.
    pub async fn state(&self) -> FrameState {
        let mut state = FrameState::default();
        let mut errors = Vec::new();
        let mut note = |section: &str, e: &CoreError| errors.push(format!("{section}: {e}"));

        match self.api_version().await {
            Ok(version) => {
                state.online = true;
                state.api_version = version;
            }
            Err(e) => note("api_version", &e),
        }

        if state.online {
            match self.art_mode().await {
                Ok(v) => state.art_mode = v,
                Err(e) => note("art_mode", &e),
            }
            match self.current_artwork().await {
                Ok(v) => state.current_artwork = v,
                Err(e) => note("current_artwork", &e),
            }
            match self.brightness().await {
                Ok(v) => state.brightness = v,
                Err(e) => note("brightness", &e),
            }
            match self.artwork_ids().await {
                Ok(v) => state.artwork_ids = v,
                Err(e) => note("artworks", &e),
            }
            match self.matte_options().await {
                Ok(v) => state.matte_options = v,
                Err(e) => note("matte", &e),
            }
            match self.photo_filter_options().await {
                Ok(v) => state.photo_filter_options = v,
                Err(e) => note("photo_filter", &e),
            }
            match self.slideshow_status().await {
                Ok(v) => state.slideshow = v,
                Err(e) => note("slideshow", &e),
            }
            match self.artmode_settings().await {
                Ok(v) => state.artmode_settings = v,
                Err(e) => note("artmode_settings", &e),
            }
        }

        let current = &state.current_artwork;
        state.current_artwork_id = first_str(current, &["content_id", "contentId"]).map(str::to_owned);
        state.current_filter = first_str(current, &["filter_id", "filterId"]).map(str::to_owned);
        state.current_matte = first_str(current, &["matte_id", "matteId"]).map(str::to_owned);
        if let Some(id) = &state.current_artwork_id {
            // Some firmware lists nothing but the active artwork.
            if !state.artwork_ids.contains(id) {
                state.artwork_ids.insert(0, id.clone());
            }
        }

        let endpoint = &self.endpoint;
        state.supports_art_mode = !endpoint.is_unsupported("set_artmode").await;
        state.supports_slideshow = !endpoint.is_unsupported("set_slideshow_status").await;
        state.supports_motion_timer = !endpoint.is_unsupported("set_motion_timer").await;
        state.supports_motion_sensitivity = !endpoint.is_unsupported("set_motion_sensitivity").await;
        state.supports_brightness_sensor = !endpoint.is_unsupported("set_brightness_sensor_setting").await;
        state.last_errors = errors;
        state
    }
}
