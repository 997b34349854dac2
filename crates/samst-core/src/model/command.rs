// ── Outbound command requests ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use samst_api::cloud::DeviceCommand;

use crate::error::CoreError;

/// `x.com.samsung.networkaudio.*` execute resources on OCF soundbars.
pub mod execute {
    pub const SOUNDMODE: &str = "/sec/networkaudio/soundmode";
    pub const WOOFER: &str = "/sec/networkaudio/woofer";
    pub const EQ: &str = "/sec/networkaudio/eq";
    pub const ADVANCED_AUDIO: &str = "/sec/networkaudio/advancedaudio";
    pub const CHANNEL_VOLUME: &str = "/sec/networkaudio/channelVolume";
    pub const SURROUND_SPEAKER: &str = "/sec/networkaudio/surroundspeaker";
    pub const ACTIVE_VOICE_AMPLIFIER: &str = "/sec/networkaudio/activeVoiceAmplifier";
    pub const SPACE_FIT: &str = "/sec/networkaudio/spacefitSound";
}

/// A single capability command for one component.
///
/// `arguments: None` omits the key on the wire. `Some(vec![])` sends an
/// empty list. `null` entries are positional placeholders and are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub component: String,
    pub capability: String,
    pub command: String,
    pub arguments: Option<Vec<Value>>,
}

impl CommandRequest {
    /// Command on the `main` component without arguments.
    pub fn new(capability: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            component: "main".to_owned(),
            capability: capability.into(),
            command: command.into(),
            arguments: None,
        }
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    pub fn with_arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// `custom.launchapp.launchApp`.
    ///
    /// The app id is an optional leading parameter: with only a name the
    /// arguments are `[null, name]` so the name stays in second position.
    pub fn launch_app(app_id: Option<&str>, app_name: Option<&str>) -> Result<Self, CoreError> {
        let arguments = match (app_id, app_name) {
            (Some(id), Some(name)) => vec![Value::from(id), Value::from(name)],
            (Some(id), None) => vec![Value::from(id)],
            (None, Some(name)) => vec![Value::Null, Value::from(name)],
            (None, None) => {
                return Err(CoreError::InvalidArgument {
                    message: "launch_app needs an app id or an app name".into(),
                });
            }
        };
        Ok(Self::new("custom.launchapp", "launchApp").with_arguments(arguments))
    }

    /// Ask the device to publish the resource at `href` into `execute.data`.
    pub fn execute_query(href: &str) -> Self {
        Self::new("execute", "execute").with_arguments(vec![Value::from(href)])
    }

    /// Write `{prop: value}` to the resource at `href`.
    pub fn execute_set(href: &str, prop: &str, value: Value) -> Self {
        let mut body = Map::new();
        body.insert(prop.to_owned(), value);
        Self::new("execute", "execute").with_arguments(vec![Value::from(href), Value::Object(body)])
    }

    /// Build from raw user JSON for the arguments.
    ///
    /// Blank or `null` means no arguments, a list is used as-is, and any
    /// other scalar or object becomes a one-element list.
    pub fn from_json_args(
        component: &str,
        capability: &str,
        command: &str,
        args_json: &str,
    ) -> Result<Self, CoreError> {
        let trimmed = args_json.trim();
        let arguments = if trimmed.is_empty() {
            None
        } else {
            let parsed: Value =
                serde_json::from_str(trimmed).map_err(|e| CoreError::InvalidArgument {
                    message: format!("arguments are not valid JSON: {e}"),
                })?;
            match parsed {
                Value::Null => None,
                Value::Array(items) => Some(items),
                other => Some(vec![other]),
            }
        };
        Ok(Self {
            component: component.to_owned(),
            capability: capability.to_owned(),
            command: command.to_owned(),
            arguments,
        })
    }
}

impl From<&CommandRequest> for DeviceCommand {
    fn from(req: &CommandRequest) -> Self {
        Self {
            component: req.component.clone(),
            capability: req.capability.clone(),
            command: req.command.clone(),
            arguments: req.arguments.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn launch_app_by_name_keeps_null_placeholder() {
        let req = CommandRequest::launch_app(None, Some("Netflix")).unwrap();
        assert_eq!(req.arguments, Some(vec![Value::Null, json!("Netflix")]));

        let wire = serde_json::to_value(DeviceCommand::from(&req)).unwrap();
        assert_eq!(wire["arguments"], json!([null, "Netflix"]));
    }

    #[test]
    fn launch_app_needs_something() {
        assert!(CommandRequest::launch_app(None, None).is_err());
        let req = CommandRequest::launch_app(Some("11101200001"), None).unwrap();
        assert_eq!(req.arguments, Some(vec![json!("11101200001")]));
    }

    #[test]
    fn execute_builders() {
        let query = CommandRequest::execute_query(execute::SOUNDMODE);
        assert_eq!(query.arguments, Some(vec![json!("/sec/networkaudio/soundmode")]));

        let set = CommandRequest::execute_set(
            execute::WOOFER,
            "x.com.samsung.networkaudio.woofer",
            json!(3),
        );
        assert_eq!(
            set.arguments,
            Some(vec![
                json!("/sec/networkaudio/woofer"),
                json!({ "x.com.samsung.networkaudio.woofer": 3 })
            ])
        );
    }

    #[test]
    fn raw_json_arguments() {
        let none = CommandRequest::from_json_args("main", "switch", "on", "  ").unwrap();
        assert_eq!(none.arguments, None);
        let null = CommandRequest::from_json_args("main", "switch", "on", "null").unwrap();
        assert_eq!(null.arguments, None);
        let scalar = CommandRequest::from_json_args("main", "audioVolume", "setVolume", "12").unwrap();
        assert_eq!(scalar.arguments, Some(vec![json!(12)]));
        let list =
            CommandRequest::from_json_args("main", "custom.launchapp", "launchApp", r#"[null, "YouTube"]"#)
                .unwrap();
        assert_eq!(list.arguments, Some(vec![Value::Null, json!("YouTube")]));
        assert!(CommandRequest::from_json_args("main", "x", "y", "{oops").is_err());
    }
}
