// ── Attribute snapshots ──

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use samst_api::cloud::DeviceStatus;

/// One reported attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// A row of [`AttributeStore::flatten`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeRow<'a> {
    pub component: &'a str,
    pub capability: &'a str,
    pub attribute: &'a str,
    pub value: &'a Value,
    pub unit: Option<&'a str>,
}

type CapabilityMap = BTreeMap<String, BTreeMap<String, Attribute>>;

/// Immutable snapshot of a device's reported state:
/// `component -> capability -> attribute -> {value, unit}`.
///
/// Replaced wholesale on each refresh. A missing path means "not
/// reported", which is distinct from a reported `false`, `0` or `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttributeStore {
    components: BTreeMap<String, CapabilityMap>,
}

impl AttributeStore {
    /// Attributes without a `value` key are dropped; an explicit `null`
    /// value is kept.
    pub fn from_status(status: DeviceStatus) -> Self {
        let components = status
            .components
            .into_iter()
            .map(|(component, caps)| {
                let caps = caps
                    .into_iter()
                    .map(|(cap, attrs)| {
                        let attrs = attrs
                            .into_iter()
                            .filter_map(|(name, state)| {
                                state.value.map(|value| {
                                    (
                                        name,
                                        Attribute {
                                            value,
                                            unit: state.unit,
                                        },
                                    )
                                })
                            })
                            .collect();
                        (cap, attrs)
                    })
                    .collect();
                (component, caps)
            })
            .collect();
        Self { components }
    }

    pub fn attribute(&self, component: &str, capability: &str, attribute: &str) -> Option<&Attribute> {
        self.components.get(component)?.get(capability)?.get(attribute)
    }

    pub fn value(&self, component: &str, capability: &str, attribute: &str) -> Option<&Value> {
        self.attribute(component, capability, attribute).map(|a| &a.value)
    }

    pub fn str_value(&self, component: &str, capability: &str, attribute: &str) -> Option<&str> {
        self.value(component, capability, attribute)?.as_str()
    }

    pub fn unit(&self, component: &str, capability: &str, attribute: &str) -> Option<&str> {
        self.attribute(component, capability, attribute)?.unit.as_deref()
    }

    /// Shorthand for the `main` component.
    pub fn main(&self, capability: &str, attribute: &str) -> Option<&Value> {
        self.value("main", capability, attribute)
    }

    pub fn main_str(&self, capability: &str, attribute: &str) -> Option<&str> {
        self.str_value("main", capability, attribute)
    }

    /// `payload` of the last `execute` response, if one is in the snapshot.
    pub fn execute_payload(&self) -> Option<&serde_json::Map<String, Value>> {
        self.main("execute", "data")?.get("payload")?.as_object()
    }

    /// Every reported attribute in stable order.
    pub fn flatten(&self) -> Vec<AttributeRow<'_>> {
        self.components
            .iter()
            .flat_map(|(component, caps)| {
                caps.iter().flat_map(move |(capability, attrs)| {
                    attrs.iter().map(move |(attribute, attr)| AttributeRow {
                        component,
                        capability,
                        attribute,
                        value: &attr.value,
                        unit: attr.unit.as_deref(),
                    })
                })
            })
            .collect()
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;

    pub(crate) fn store_from(json: Value) -> AttributeStore {
        AttributeStore::from_status(serde_json::from_value(json).unwrap())
    }

    #[test]
    fn absent_is_not_falsy() {
        let store = store_from(json!({
            "components": { "main": {
                "audioMute": { "mute": { "value": null } },
                "audioVolume": { "volume": { "value": 0, "unit": "%" } }
            }}
        }));

        assert_eq!(store.main("audioVolume", "volume"), Some(&json!(0)));
        assert_eq!(store.unit("main", "audioVolume", "volume"), Some("%"));
        assert_eq!(store.main("audioMute", "mute"), Some(&Value::Null));
        assert_eq!(store.main("switch", "switch"), None);
        assert_eq!(store.value("sub", "audioVolume", "volume"), None);
    }

    #[test]
    fn attributes_without_value_key_are_dropped() {
        let store = store_from(json!({
            "components": { "main": { "switch": { "switch": { "timestamp": "t" } } } }
        }));
        assert!(store.attribute("main", "switch", "switch").is_none());
    }

    #[test]
    fn flatten_and_execute_payload() {
        let store = store_from(json!({
            "components": { "main": {
                "execute": { "data": { "value": {
                    "payload": { "x.com.samsung.networkaudio.soundmode": "surround" }
                }}},
                "switch": { "switch": { "value": "on" } }
            }}
        }));

        let rows = store.flatten();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].capability, "execute");
        assert_eq!(rows[1].value, &json!("on"));
        assert_eq!(
            store.execute_payload().and_then(|p| p.get("x.com.samsung.networkaudio.soundmode")),
            Some(&json!("surround"))
        );
    }
}
