// ── Device domain types ──

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use samst_api::cloud::DeviceDto;

/// Broad device family, derived from the advertised capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    /// OCF soundbar: has `samsungvd.audioInputSource` and no `tvChannel`.
    Soundbar,
    Tv,
    Other,
}

/// An advertised `{id, version}` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CapabilityId {
    pub id: String,
    pub version: u32,
}

/// Canonical device record, built once at enumeration and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub label: Option<String>,
    pub manufacturer_name: Option<String>,
    pub device_type_name: Option<String>,
    pub ocf_device_type: Option<String>,
    pub model: Option<String>,
    pub components: Vec<String>,
    /// Deduplicated across components.
    pub capabilities: BTreeSet<CapabilityId>,
}

impl Device {
    pub fn has_capability(&self, id: &str) -> bool {
        self.capabilities.iter().any(|c| c.id == id)
    }

    /// Samsung manufacturers all report a name starting with "Samsung".
    pub fn is_samsung(&self) -> bool {
        self.manufacturer_name
            .as_deref()
            .is_some_and(|m| m.trim().to_lowercase().starts_with("samsung"))
    }

    pub fn family(&self) -> DeviceFamily {
        if self.has_capability("samsungvd.audioInputSource") && !self.has_capability("tvChannel") {
            DeviceFamily::Soundbar
        } else if self.has_capability("tvChannel") || self.has_capability("samsungvd.mediaInputSource")
        {
            DeviceFamily::Tv
        } else {
            DeviceFamily::Other
        }
    }

    pub fn is_soundbar(&self) -> bool {
        self.family() == DeviceFamily::Soundbar
    }

    /// Best human-readable name.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.device_id)
    }
}

impl From<DeviceDto> for Device {
    fn from(dto: DeviceDto) -> Self {
        let ocf = dto.ocf.unwrap_or_default();
        let manufacturer_name = dto.manufacturer_name.or(ocf.manufacturer_name);
        let capabilities = dto
            .components
            .iter()
            .flat_map(|c| c.capabilities.iter())
            .filter(|c| !c.id.is_empty())
            .map(|c| CapabilityId {
                id: c.id.clone(),
                version: c.version,
            })
            .collect();

        Self {
            device_id: dto.device_id,
            label: dto.label.or(dto.name),
            manufacturer_name,
            device_type_name: dto.device_type_name,
            ocf_device_type: ocf.ocf_device_type,
            model: ocf.model_number,
            components: dto.components.into_iter().map(|c| c.id).collect(),
            capabilities,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn device_with(caps: &[&str]) -> Device {
        Device {
            device_id: "dev-1".into(),
            label: Some("Living Room".into()),
            manufacturer_name: Some("Samsung Electronics".into()),
            device_type_name: None,
            ocf_device_type: None,
            model: None,
            components: vec!["main".into()],
            capabilities: caps
                .iter()
                .map(|id| CapabilityId {
                    id: (*id).to_owned(),
                    version: 1,
                })
                .collect(),
        }
    }

    #[test]
    fn soundbar_family_requires_no_tv_channel() {
        assert_eq!(
            device_with(&["switch", "samsungvd.audioInputSource"]).family(),
            DeviceFamily::Soundbar
        );
        assert_eq!(
            device_with(&["samsungvd.audioInputSource", "tvChannel"]).family(),
            DeviceFamily::Tv
        );
        assert_eq!(device_with(&["switch"]).family(), DeviceFamily::Other);
    }

    #[test]
    fn capabilities_are_deduplicated_from_dto() {
        let dto: DeviceDto = serde_json::from_value(serde_json::json!({
            "deviceId": "abc",
            "manufacturerName": "Samsung Electronics",
            "components": [
                { "id": "main", "capabilities": [{ "id": "switch", "version": 1 }] },
                { "id": "sub", "capabilities": [{ "id": "switch", "version": 1 }] }
            ]
        }))
        .unwrap();
        let device = Device::from(dto);
        assert_eq!(device.capabilities.len(), 1);
        assert_eq!(device.components, ["main", "sub"]);
        assert!(device.is_samsung());
    }

    #[test]
    fn non_samsung_manufacturer() {
        let mut device = device_with(&["switch"]);
        device.manufacturer_name = Some("IKEA of Sweden".into());
        assert!(!device.is_samsung());
        device.manufacturer_name = None;
        assert!(!device.is_samsung());
    }
}
