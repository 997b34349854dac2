// ── Core error types ──
//
// User-facing errors from samst-core. Consumers never see HTTP status
// codes or raw transport failures directly. The `From<samst_api::Error>`
// impl translates transport-layer errors into domain-appropriate variants.

use std::time::Duration;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach device: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Backend pressure ─────────────────────────────────────────────
    #[error("Rate limited by SmartThings{}", retry_after.map(|d| format!(" (retry after {:.1}s)", d.as_secs_f64())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    #[error("Command conflicted with another in-flight command: {message}")]
    Conflict { message: String },

    #[error("Service temporarily unavailable: {message}")]
    Unavailable { message: String },

    /// No snapshot has ever been published for this device.
    #[error("Device {device_id} has no state yet: {reason}")]
    NotReady { device_id: String, reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Unexpected response: {message}")]
    MalformedResponse { message: String },

    // ── Operation errors ─────────────────────────────────────────────
    /// The device or firmware does not implement this operation.
    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    #[error("Operation rejected: {message}")]
    Rejected { message: String },

    /// A LAN device answered with an error for this operation.
    #[error("{operation} failed: {message}")]
    Device {
        operation: String,
        code: Option<i64>,
        message: String,
    },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Errors a caller may reasonably retry later without changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
                | Self::RateLimited { .. }
                | Self::Conflict { .. }
                | Self::Unavailable { .. }
                | Self::NotReady { .. }
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Numeric code reported by a LAN device, if any.
    pub fn error_number(&self) -> Option<i64> {
        match self {
            Self::Device { code, .. } => *code,
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<samst_api::Error> for CoreError {
    fn from(err: samst_api::Error) -> Self {
        use samst_api::Error as ApiError;

        // Includes codes only present in the message text.
        let device_code = err.error_number();
        match err {
            ApiError::Authentication { message } | ApiError::Forbidden { message } => {
                CoreError::AuthenticationFailed { message }
            }
            ApiError::RateLimited { retry_after, .. } => CoreError::RateLimited { retry_after },
            ApiError::Conflict { message } => CoreError::Conflict { message },
            ApiError::Unavailable { message, .. } => CoreError::Unavailable { message },
            ApiError::Rejected { message, .. } => CoreError::Rejected { message },
            ApiError::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            ApiError::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() || e.is_request() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            ApiError::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            ApiError::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                reason: format!("WebSocket connection failed: {reason}"),
            },
            ApiError::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            ApiError::Rpc { method, message, .. } => CoreError::Device {
                operation: method,
                code: device_code,
                message,
            },
            ApiError::Deserialization { message, body: _ } => {
                CoreError::MalformedResponse { message }
            }
        }
    }
}
