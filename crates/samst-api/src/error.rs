use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `samst-api` crate.
///
/// Covers every failure mode across both channels: the SmartThings cloud
/// REST API and the local LAN protocols (Frame TV WebSocket channels,
/// soundbar JSON-RPC). `samst-core` classifies these into retry decisions
/// and user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token rejected (HTTP 401) or the TV refused the pairing.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Token is valid but lacks the scope for this call (HTTP 403).
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    // ── Cloud status classes ────────────────────────────────────────
    /// HTTP 429. `retry_after` is the backend's suggested delay, if any.
    #[error("Rate limited{}: {message}", retry_after.map(|d| format!(" (retry after {:.1}s)", d.as_secs_f64())).unwrap_or_default())]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },

    /// HTTP 409 -- another command raced this one on the same device.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// HTTP 502/503/504 -- backend temporarily unavailable.
    #[error("Service unavailable (HTTP {status}): {message}")]
    Unavailable { status: u16, message: String },

    /// HTTP 400/404/422 -- the backend understood the request and refused it.
    #[error("Request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Any other non-success HTTP status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Local protocols ─────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// The device answered but refused the operation.
    ///
    /// Frame TVs report `error number N`; soundbars return a JSON-RPC
    /// `error` object. `code` is the numeric code when one was present.
    #[error("`{method}` request failed: {message}")]
    Rpc {
        method: String,
        code: Option<i64>,
        message: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

/// Message fragments that identify a dropped or unreachable peer.
const CONNECTION_SIGNATURES: &[&str] = &[
    "cannot connect",
    "connect call failed",
    "timed out",
    "host is down",
    "no route to host",
    "connection refused",
    "connection reset",
    "websocket",
    "clientdisconnect",
    "broken pipe",
];

impl Error {
    /// Returns `true` if this error means the credentials must be renewed.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Forbidden { .. })
    }

    /// Returns `true` for HTTP 429.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// The backend-suggested retry delay carried by a rate-limit response.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Returns `true` for the cloud responses a command may be retried on:
    /// conflict, rate limiting, and temporary unavailability.
    pub fn is_retryable_status(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::RateLimited { .. } | Self::Unavailable { .. }
        )
    }

    /// Returns `true` if the failure looks like the peer could not be
    /// reached or dropped the connection, as opposed to a logical refusal.
    pub fn is_connection_failure(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } | Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } => true,
            // A coded refusal is a logical answer, even if its text mentions a timeout.
            Self::Rpc { code: Some(_), .. } => false,
            Self::Rpc { message, .. } => {
                let lower = message.to_lowercase();
                CONNECTION_SIGNATURES.iter().any(|sig| lower.contains(sig))
            }
            _ => false,
        }
    }

    /// The numeric device error code, if the device reported one.
    ///
    /// Falls back to scanning the message for `error number N`, the shape
    /// Frame firmware uses in its error events.
    pub fn error_number(&self) -> Option<i64> {
        match self {
            Self::Rpc { code: Some(code), .. } => Some(*code),
            Self::Rpc { message, .. } => parse_error_number(message),
            _ => None,
        }
    }

    /// HTTP status code, if this error came from an HTTP response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::RateLimited { .. } => Some(429),
            Self::Conflict { .. } => Some(409),
            Self::Unavailable { status, .. }
            | Self::Rejected { status, .. }
            | Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Extract `N` from text like ``"`set_motion_timer` request failed with error number -1"``.
pub fn parse_error_number(message: &str) -> Option<i64> {
    let lower = message.to_lowercase();
    let idx = lower.find("error number")?;
    let tail = lower[idx + "error number".len()..].trim_start();
    let end = tail
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
        .map_or(tail.len(), |(i, _)| i);
    tail[..end].parse().ok()
}
