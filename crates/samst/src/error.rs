//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use samst_config::ConfigError;
use samst_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const BUSY: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach {target}")]
    #[diagnostic(
        code(samst::connection_failed),
        help(
            "Check network access to the device or to the SmartThings API.\n\
             LAN devices must be powered on and on the same network."
        )
    )]
    ConnectionFailed { target: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(samst::auth_failed),
        help(
            "Verify the SmartThings token and its scopes.\n\
             Run: samst config set-token --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No token configured for profile '{profile}'")]
    #[diagnostic(
        code(samst::no_credentials),
        help(
            "Store one with: samst config set-token\n\
             Or set the SAMST_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Backend pressure ─────────────────────────────────────────────

    #[error("SmartThings is busy: {message}")]
    #[diagnostic(
        code(samst::busy),
        help("The command was retried and still failed. Wait a moment and try again.")
    )]
    Busy { message: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(samst::not_found),
        help("Run: samst {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Operation '{operation}' is not supported by this device")]
    #[diagnostic(
        code(samst::unsupported),
        help("Run: samst devices get <device> to see the advertised capabilities")
    )]
    Unsupported { operation: String },

    #[error("Device {device} has no state yet: {reason}")]
    #[diagnostic(code(samst::not_ready), help("Retry in a few seconds."))]
    NotReady { device: String, reason: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error ({code}): {message}")]
    #[diagnostic(code(samst::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(samst::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(samst::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: samst config set token_env SAMST_TOKEN --profile {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No {what} configured")]
    #[diagnostic(
        code(samst::missing_setting),
        help("Pass --host, or run: samst config set {key} <value>")
    )]
    MissingSetting { what: String, key: String },

    #[error(transparent)]
    #[diagnostic(code(samst::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out")]
    #[diagnostic(
        code(samst::timeout),
        help("Increase timeout with --timeout or check the device.")
    )]
    Timeout,

    #[error("Cancelled")]
    #[diagnostic(code(samst::cancelled))]
    Cancelled,

    // ── IO ───────────────────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            Self::Busy { .. } | Self::NotReady { .. } => exit_code::BUSY,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::MissingSetting { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed {
                target: "device".into(),
                reason,
            },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },

            CoreError::Timeout { .. } => CliError::Timeout,

            CoreError::RateLimited { .. } => CliError::Busy {
                message: err.to_string(),
            },

            CoreError::Conflict { message } | CoreError::Unavailable { message } => {
                CliError::Busy { message }
            }

            CoreError::NotReady { device_id, reason } => CliError::NotReady {
                device: device_id,
                reason,
            },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices list".into(),
            },

            CoreError::Unsupported { operation } => CliError::Unsupported { operation },

            CoreError::InvalidArgument { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Rejected { message } => CliError::ApiError {
                code: "rejected".into(),
                message,
            },

            CoreError::Device {
                operation,
                code,
                message,
            } => CliError::ApiError {
                code: code.map_or_else(|| operation.clone(), |c| format!("{operation} {c}")),
                message,
            },

            CoreError::MalformedResponse { message } => CliError::ApiError {
                code: "malformed".into(),
                message,
            },

            CoreError::Api { message, status } => CliError::ApiError {
                code: status.map_or_else(|| "unknown".into(), |s| s.to_string()),
                message,
            },

            CoreError::Cancelled => CliError::Cancelled,

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            other => CliError::Config(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let busy = CliError::from(CoreError::RateLimited { retry_after: None });
        assert_eq!(busy.exit_code(), exit_code::BUSY);

        let unsupported = CliError::from(CoreError::Unsupported {
            operation: "audioMute.mute".into(),
        });
        assert_eq!(unsupported.exit_code(), exit_code::UNSUPPORTED);

        let missing = CliError::from(CoreError::DeviceNotFound {
            identifier: "tv".into(),
        });
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);
    }

    #[test]
    fn config_errors_keep_their_meaning() {
        let err = CliError::from(ConfigError::NoCredentials {
            profile: "home".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
