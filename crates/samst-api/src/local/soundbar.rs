// JSON-RPC 2.0 client for Samsung Wi-Fi soundbars.
//
// Endpoint: https://{host}:1516/ (self-signed certificate)
// Auth: `createAccessToken` once per session, then `AccessToken` in every
// call's params.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{debug, trace};
use url::Url;

use super::{LocalConnection, LocalTransport};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Port the soundbar firmware listens on.
pub const SOUNDBAR_PORT: u16 = 1516;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);
const CREATE_TOKEN: &str = "createAccessToken";

/// Session factory for one soundbar.
#[derive(Debug, Clone)]
pub struct SoundbarRpc {
    http: reqwest::Client,
    host: String,
}

impl SoundbarRpc {
    pub fn new(host: impl Into<String>) -> Result<Self, Error> {
        Self::with_timeout(host, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(host: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let http = TransportConfig::local(timeout).build_client()?;
        Ok(Self {
            http,
            host: host.into(),
        })
    }

    /// Wrap an existing client (tests point this at a plain-HTTP mock).
    pub fn from_reqwest(host: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            http,
            host: host.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Open a session against an explicit base URL.
    pub async fn connect_url(&self, url: Url) -> Result<SoundbarSession, Error> {
        let mut session = SoundbarSession {
            http: self.http.clone(),
            url,
            token: None,
        };
        session.create_token().await?;
        Ok(session)
    }
}

#[async_trait]
impl LocalTransport for SoundbarRpc {
    type Connection = SoundbarSession;

    async fn connect(&self, port: u16) -> Result<SoundbarSession, Error> {
        let url = Url::parse(&format!("https://{}:{port}/", self.host))?;
        self.connect_url(url).await
    }
}

/// An authenticated JSON-RPC session.
#[derive(Debug)]
pub struct SoundbarSession {
    http: reqwest::Client,
    url: Url,
    token: Option<String>,
}

impl SoundbarSession {
    async fn create_token(&mut self) -> Result<(), Error> {
        let result = self.post(CREATE_TOKEN, Map::new()).await?;
        let token = result
            .get("AccessToken")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Deserialization {
                message: "createAccessToken result has no AccessToken".into(),
                body: Value::Object(result.clone()).to_string(),
            })?;
        self.token = Some(token.to_owned());
        Ok(())
    }

    async fn post(&self, method: &str, params: Map<String, Value>) -> Result<Map<String, Value>, Error> {
        let mut payload = json!({ "jsonrpc": "2.0", "method": method, "id": 1 });
        if !params.is_empty() {
            payload["params"] = Value::Object(params);
        }
        debug!(method, "POST {}", self.url);

        let resp = self.http.post(self.url.clone()).json(&payload).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: if body.is_empty() { status.to_string() } else { body },
            });
        }
        trace!(method, body = %body, "soundbar response");
        parse_rpc_response(method, &body)
    }
}

#[async_trait]
impl LocalConnection for SoundbarSession {
    async fn invoke(&mut self, method: &str, params: Value) -> Result<Value, Error> {
        let mut params = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(Error::Rpc {
                    method: method.to_owned(),
                    code: None,
                    message: format!("params must be an object, got {other}"),
                });
            }
        };
        if method != CREATE_TOKEN {
            if self.token.is_none() {
                self.create_token().await?;
            }
            if let Some(token) = &self.token {
                params
                    .entry("AccessToken")
                    .or_insert_with(|| Value::String(token.clone()));
            }
        }
        self.post(method, params).await.map(Value::Object)
    }

    async fn close(&mut self) {
        self.token = None;
    }
}

/// Unwrap a JSON-RPC envelope: `error` wins, `result` must be an object.
fn parse_rpc_response(method: &str, body: &str) -> Result<Map<String, Value>, Error> {
    let data: Value = serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: format!("{method}: {e}"),
        body: body.to_owned(),
    })?;

    if let Some(err) = data.get("error") {
        return Err(Error::Rpc {
            method: method.to_owned(),
            code: err.get("code").and_then(Value::as_i64),
            message: err
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| err.to_string(), str::to_owned),
        });
    }

    match data.get("result") {
        Some(Value::Object(result)) => Ok(result.clone()),
        Some(other) => Err(Error::Deserialization {
            message: format!("{method}: unexpected result {other}"),
            body: body.to_owned(),
        }),
        None => Err(Error::Deserialization {
            message: format!("{method}: response has no result"),
            body: body.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_object_becomes_rpc_error() {
        let err = parse_rpc_response(
            "getVolume",
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .err();
        match err {
            Some(Error::Rpc { method, code, message }) => {
                assert_eq!(method, "getVolume");
                assert_eq!(code, Some(-32601));
                assert_eq!(message, "Method not found");
            }
            other => panic!("expected Rpc error, got {other:?}"),
        }
    }

    #[test]
    fn non_object_result_is_rejected() {
        let err = parse_rpc_response("getVolume", r#"{"result": 12}"#).err();
        assert!(matches!(err, Some(Error::Deserialization { .. })));
    }

    #[test]
    fn object_result_is_returned() {
        let result = parse_rpc_response("getVolume", r#"{"result": {"volume": 12}}"#).ok();
        assert_eq!(
            result.and_then(|r| r.get("volume").and_then(Value::as_i64)),
            Some(12)
        );
    }
}
