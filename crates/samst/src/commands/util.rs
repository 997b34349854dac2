//! Shared helpers for command handlers.

use std::sync::Arc;

use samst_core::{AttributeStore, DeviceHandle, Hub, RefreshOutcome};

use crate::error::CliError;

/// Resolve a device identifier (ID or label) and register it with the hub.
pub async fn resolve_device(hub: &Hub, identifier: &str) -> Result<Arc<DeviceHandle>, CliError> {
    Ok(hub.resolve(identifier).await?)
}

/// Run one poll cycle and return the published snapshot.
///
/// A rate-limited cycle is only useful if an earlier snapshot exists.
pub async fn fresh_snapshot(handle: &DeviceHandle) -> Result<Arc<AttributeStore>, CliError> {
    match handle.coordinator().refresh().await {
        RefreshOutcome::Updated => {}
        RefreshOutcome::RateLimited { next_interval } => {
            tracing::warn!(
                device_id = %handle.device_id(),
                next_in_secs = next_interval.as_secs(),
                "status read was rate limited"
            );
        }
        RefreshOutcome::Failed(e) => return Err(e.into()),
        RefreshOutcome::Discarded => return Err(CliError::Cancelled),
    }
    handle.snapshot().ok_or_else(|| CliError::NotReady {
        device: handle.device_id().to_owned(),
        reason: "no status has been read yet".into(),
    })
}

/// Pick the LAN host: the flag wins, then the profile setting.
pub fn require_host(flag: Option<String>, profile: Option<String>, key: &str, what: &str) -> Result<String, CliError> {
    flag.or(profile)
        .filter(|h| !h.trim().is_empty())
        .ok_or_else(|| CliError::MissingSetting {
            what: what.into(),
            key: key.into(),
        })
}

/// Render a JSON value for a table cell.
pub fn cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "null".into(),
        other => other.to_string(),
    }
}

/// `on`/`off`/`-` for optional flags.
pub fn on_off(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "on",
        Some(false) => "off",
        None => "-",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn host_flag_beats_profile() {
        let host = require_host(Some("10.0.0.2".into()), Some("10.0.0.3".into()), "frame.host", "Frame TV host");
        assert_eq!(host.unwrap(), "10.0.0.2");
    }

    #[test]
    fn blank_host_is_missing() {
        let err = require_host(None, Some("  ".into()), "frame.host", "Frame TV host").unwrap_err();
        assert!(matches!(err, CliError::MissingSetting { .. }));
    }

    #[test]
    fn cells_unquote_strings() {
        assert_eq!(cell(&json!("on")), "on");
        assert_eq!(cell(&json!(12)), "12");
        assert_eq!(cell(&json!(null)), "null");
    }
}
