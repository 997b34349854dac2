// SmartThings cloud response and request shapes.
//
// Only the fields the reliability layer reads are typed; everything else is
// kept in `extra` so nothing the backend sends is silently dropped.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Devices ──────────────────────────────────────────────────────────

/// One page of `GET /devices`.
#[derive(Debug, Clone, Deserialize)]
pub struct DevicePage {
    #[serde(default)]
    pub items: Vec<DeviceDto>,
    #[serde(default, rename = "_links")]
    pub links: Option<Links>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub next: Option<Link>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: String,
}

/// A device record from `GET /devices` or `GET /devices/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub device_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub manufacturer_name: Option<String>,
    #[serde(default)]
    pub presentation_id: Option<String>,
    #[serde(default)]
    pub device_type_name: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub ocf: Option<OcfInfo>,
    #[serde(default)]
    pub components: Vec<ComponentDto>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// OCF metadata block carried by Samsung TVs and soundbars.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcfInfo {
    #[serde(default)]
    pub ocf_device_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model_number: Option<String>,
    #[serde(default)]
    pub manufacturer_name: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDto {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<CapabilityRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityRef {
    pub id: String,
    #[serde(default = "default_capability_version")]
    pub version: u32,
}

fn default_capability_version() -> u32 {
    1
}

// ── Status ───────────────────────────────────────────────────────────

/// One attribute reading inside a status document.
///
/// `value` is `None` only when the key is missing; a reported `null`
/// becomes `Some(Value::Null)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeState {
    #[serde(default, deserialize_with = "present_value")]
    pub value: Option<Value>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn present_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// `component -> capability -> attribute -> state`
pub type ComponentStatus = HashMap<String, HashMap<String, AttributeState>>;

/// `GET /devices/{id}/status`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceStatus {
    #[serde(default)]
    pub components: HashMap<String, ComponentStatus>,
}

// ── Commands ─────────────────────────────────────────────────────────

/// A single entry of `POST /devices/{id}/commands`.
///
/// `arguments: None` omits the key; `Some(vec![Value::Null, ..])` keeps
/// the explicit nulls on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub component: String,
    pub capability: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<Value>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CommandBody<'a> {
    pub commands: &'a [DeviceCommand],
}

// ── Users ────────────────────────────────────────────────────────────

/// `GET /users/me`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn command_without_arguments_omits_key() {
        let cmd = DeviceCommand {
            component: "main".into(),
            capability: "switch".into(),
            command: "on".into(),
            arguments: None,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert!(json.get("arguments").is_none());
    }

    #[test]
    fn command_keeps_explicit_nulls() {
        let cmd = DeviceCommand {
            component: "main".into(),
            capability: "custom.launchapp".into(),
            command: "launchApp".into(),
            arguments: Some(vec![Value::Null, Value::from("Netflix")]),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["arguments"], serde_json::json!([null, "Netflix"]));
    }

    #[test]
    fn explicit_null_value_is_kept() {
        let state: AttributeState = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(state.value, Some(Value::Null));
        let missing: AttributeState = serde_json::from_str(r#"{"unit": "%"}"#).unwrap();
        assert_eq!(missing.value, None);
    }

    #[test]
    fn capability_version_defaults_to_one() {
        let cap: CapabilityRef = serde_json::from_str(r#"{"id":"switch"}"#).unwrap();
        assert_eq!(cap.version, 1);
    }
}
