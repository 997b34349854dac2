// Async HTTP client for the SmartThings cloud REST API.
//
// Base path: https://api.smartthings.com/v1/
// Auth: `Authorization: Bearer <token>`

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use super::types::{CommandBody, DeviceCommand, DeviceDto, DevicePage, DeviceStatus, UserInfo};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Default SmartThings API root.
pub const DEFAULT_BASE_URL: &str = "https://api.smartthings.com/v1";

/// Upper bound on followed `_links.next` hops, guards against a cycling cursor.
const MAX_PAGES: usize = 200;

// ── Error response shape ─────────────────────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<ErrorInner>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(serde::Deserialize)]
struct ErrorInner {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the SmartThings cloud API.
///
/// Stateless apart from the bearer token baked into the default headers;
/// cheap to clone (the inner `reqwest::Client` is reference counted).
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CloudClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a personal access token or OAuth access token.
    pub fn from_token(
        base_url: &str,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| Error::Authentication {
                message: format!("invalid token header value: {e}"),
            })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self {
            http,
            base_url: Self::normalize_base_url(base_url)?,
        })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: Self::normalize_base_url(base_url)?,
        })
    }

    /// Ensure a trailing slash so relative joins keep the `/v1` segment.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get_url<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {url}");
        let resp = self.http.get(url).send().await?;
        handle_response(resp).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.get_url(self.url(path)?).await
    }

    async fn post_no_response<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("POST {url}");
        let resp = self.http.post(url).json(body).send().await?;
        handle_empty(resp).await
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    // ── Devices ──────────────────────────────────────────────────────

    /// List every device visible to the token, following `_links.next`.
    pub async fn list_devices(&self) -> Result<Vec<DeviceDto>, Error> {
        let mut all = Vec::new();
        let mut next = Some(self.url("devices")?);
        let mut pages = 0;

        while let Some(url) = next.take() {
            let page: DevicePage = self.get_url(url.clone()).await?;
            all.extend(page.items);
            pages += 1;

            let href = page.links.and_then(|l| l.next).map(|n| n.href);
            if let Some(href) = href {
                let candidate = url.join(&href)?;
                if candidate == url || pages >= MAX_PAGES {
                    debug!(pages, "stopping device pagination");
                    break;
                }
                next = Some(candidate);
            }
        }

        trace!(count = all.len(), "listed devices");
        Ok(all)
    }

    pub async fn get_device(&self, device_id: &str) -> Result<DeviceDto, Error> {
        self.get(&format!("devices/{device_id}")).await
    }

    pub async fn get_status(&self, device_id: &str) -> Result<DeviceStatus, Error> {
        self.get(&format!("devices/{device_id}/status")).await
    }

    /// Post a batch of commands. An empty 2xx body counts as success.
    pub async fn send_commands(
        &self,
        device_id: &str,
        commands: &[DeviceCommand],
    ) -> Result<(), Error> {
        self.post_no_response(&format!("devices/{device_id}/commands"), &CommandBody { commands })
            .await
    }

    // ── Capabilities ─────────────────────────────────────────────────

    /// Raw capability definition (`commands`, `attributes`, ...).
    pub async fn get_capability_def(&self, capability: &str, version: u32) -> Result<Value, Error> {
        self.get(&format!("capabilities/{capability}/{version}")).await
    }

    // ── Users ────────────────────────────────────────────────────────

    /// Cheap call used to validate a token.
    pub async fn get_user_me(&self) -> Result<UserInfo, Error> {
        self.get("users/me").await
    }
}

// ── Response handling ────────────────────────────────────────────────

async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    if status.is_success() {
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    } else {
        Err(parse_error(status, resp).await)
    }
}

async fn handle_empty(resp: reqwest::Response) -> Result<(), Error> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(parse_error(status, resp).await)
    }
}

async fn parse_error(status: StatusCode, resp: reqwest::Response) -> Error {
    let retry_header = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let raw = resp.text().await.unwrap_or_default();
    let message = error_message(status, &raw);

    match status.as_u16() {
        401 => Error::Authentication { message },
        403 => Error::Forbidden { message },
        409 => Error::Conflict { message },
        429 => Error::RateLimited {
            retry_after: parse_retry_after(retry_header.as_deref(), &raw),
            message,
        },
        code @ (502..=504) => Error::Unavailable {
            status: code,
            message,
        },
        code @ (400 | 404 | 422) => Error::Rejected {
            status: code,
            message,
        },
        code => Error::Api {
            status: code,
            message,
        },
    }
}

fn error_message(status: StatusCode, raw: &str) -> String {
    if let Ok(err) = serde_json::from_str::<ErrorResponse>(raw) {
        let inner = err.error.and_then(|e| match (e.code, e.message) {
            (Some(code), Some(msg)) => Some(format!("{code}: {msg}")),
            (None, Some(msg)) => Some(msg),
            (Some(code), None) => Some(code),
            (None, None) => None,
        });
        if let Some(msg) = inner.or(err.message) {
            return msg;
        }
    }
    if raw.trim().is_empty() {
        status.to_string()
    } else {
        raw.to_owned()
    }
}

/// Suggested delay from a 429: the `Retry-After` header (seconds), else a
/// body phrase like `retry in 1500 millis`.
pub fn parse_retry_after(header: Option<&str>, body: &str) -> Option<Duration> {
    // Negative, NaN and out-of-range values fall through to the body.
    if let Some(delay) = header
        .and_then(|h| h.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    {
        return Some(delay);
    }

    let lower = body.to_lowercase();
    let idx = lower.find("retry in")?;
    let tail = lower[idx + "retry in".len()..].trim_start();
    let digits: String = tail.chars().take_while(char::is_ascii_digit).collect();
    let rest = tail[digits.len()..].trim_start();
    if digits.is_empty() || !rest.starts_with("milli") {
        return None;
    }
    digits.parse::<u64>().ok().map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_or_negative_header_is_ignored() {
        assert_eq!(parse_retry_after(Some("99999999999999999999"), ""), None);
        assert_eq!(parse_retry_after(Some("inf"), ""), None);
        assert_eq!(parse_retry_after(Some("-3"), ""), None);
        assert_eq!(
            parse_retry_after(Some("1e30"), "retry in 250 millis"),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn retry_after_prefers_header_seconds() {
        assert_eq!(
            parse_retry_after(Some("12"), "retry in 500 millis"),
            Some(Duration::from_secs(12))
        );
        assert_eq!(
            parse_retry_after(Some("2.5"), ""),
            Some(Duration::from_millis(2500))
        );
    }

    #[test]
    fn retry_after_falls_back_to_body_millis() {
        assert_eq!(
            parse_retry_after(None, r#"{"error":{"message":"Limit reached, retry in 1500 millis"}}"#),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(parse_retry_after(Some("soon"), "retry in 20 millis"), Some(Duration::from_millis(20)));
    }

    #[test]
    fn retry_after_absent() {
        assert_eq!(parse_retry_after(None, "slow down"), None);
        assert_eq!(parse_retry_after(None, "retry in a moment"), None);
        assert_eq!(parse_retry_after(None, "retry in 3 seconds"), None);
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let url = CloudClient::normalize_base_url("https://api.smartthings.com/v1").ok();
        assert_eq!(
            url.map(|u| u.to_string()),
            Some("https://api.smartthings.com/v1/".to_owned())
        );
    }

    #[test]
    fn error_message_prefers_structured_body() {
        let msg = error_message(
            StatusCode::CONFLICT,
            r#"{"error":{"code":"ConflictError","message":"busy"}}"#,
        );
        assert_eq!(msg, "ConflictError: busy");
        assert_eq!(error_message(StatusCode::CONFLICT, ""), "409 Conflict");
        assert_eq!(error_message(StatusCode::CONFLICT, "plain"), "plain");
    }
}
