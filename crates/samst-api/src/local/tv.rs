// Samsung TV WebSocket channels.
//
// Art channel:    {ws|wss}://host:port/api/v2/channels/com.samsung.art-app
// Remote channel: {ws|wss}://host:port/api/v2/channels/samsung.remote.control
//
// Port 8002 speaks TLS with a self-signed certificate, 8001 is plain. Art
// requests travel as `ms.channel.emit` / `art_app_request` with a
// JSON-encoded `data` string; replies come back as `d2d_service_message`
// events whose inner `id` matches the request.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;
use uuid::Uuid;

use super::{LocalConnection, LocalTransport};
use crate::error::Error;
use crate::transport::TransportConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const ART_CHANNEL: &str = "com.samsung.art-app";
pub const REMOTE_CHANNEL: &str = "samsung.remote.control";

/// Port served over TLS; every other port is plain `ws://`.
pub const TLS_PORT: u16 = 8002;

const DEFAULT_CLIENT_NAME: &str = "samst";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const BROWSER_APP_ID: &str = "org.tizen.browser";

// ── Operation names ──────────────────────────────────────────────────

/// Map an art operation to the request name the firmware expects.
fn art_request_name(op: &str) -> &str {
    match op {
        "get_artmode" => "get_artmode_status",
        "set_artmode" => "set_artmode_status",
        "get_current" => "get_current_artwork",
        "get_thumbnail_list" => "get_content_list",
        "delete_list" => "delete_image_list",
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Art,
    Remote,
}

impl Channel {
    fn path(self) -> &'static str {
        match self {
            Self::Art => ART_CHANNEL,
            Self::Remote => REMOTE_CHANNEL,
        }
    }

    /// Event that completes the handshake on this channel.
    fn ready_event(self) -> &'static str {
        match self {
            Self::Art => "ms.channel.ready",
            Self::Remote => "ms.channel.connect",
        }
    }
}

// ── Transport ────────────────────────────────────────────────────────

/// Session factory for one TV.
#[derive(Debug, Clone)]
pub struct TvTransport {
    host: String,
    name: String,
    token: Option<String>,
    timeout: Duration,
}

impl TvTransport {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            name: DEFAULT_CLIENT_NAME.to_owned(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Client name shown in the TV's device-connection prompt.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Pairing token from an earlier session.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn channel_url(&self, port: u16, channel: Channel) -> Result<Url, Error> {
        let scheme = if port == TLS_PORT { "wss" } else { "ws" };
        let mut url = Url::parse(&format!(
            "{scheme}://{}:{port}/api/v2/channels/{}",
            self.host,
            channel.path()
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("name", &BASE64.encode(self.name.as_bytes()));
            if let Some(token) = &self.token {
                query.append_pair("token", token);
            }
        }
        Ok(url)
    }

    async fn open(&self, port: u16, channel: Channel) -> Result<(WsStream, Option<String>), Error> {
        let url = self.channel_url(port, channel)?;
        debug!(host = %self.host, port, channel = channel.path(), "opening TV channel");

        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;
        let request = ClientRequestBuilder::new(uri);
        let connector = if port == TLS_PORT {
            TransportConfig::local(self.timeout).ws_connector()?
        } else {
            None
        };

        let connect =
            tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector);
        let (mut ws, _response) = tokio::time::timeout(self.timeout, connect)
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        let token = tokio::time::timeout(self.timeout, handshake(&mut ws, channel))
            .await
            .map_err(|_| self.timeout_error())??;
        Ok((ws, token))
    }

    fn timeout_error(&self) -> Error {
        Error::Timeout {
            timeout_secs: self.timeout.as_secs(),
        }
    }
}

#[async_trait]
impl LocalTransport for TvTransport {
    type Connection = TvSession;

    /// Channels open lazily on first use, so this never touches the network.
    async fn connect(&self, port: u16) -> Result<TvSession, Error> {
        Ok(TvSession {
            transport: self.clone(),
            port,
            art: None,
            remote: None,
            issued_token: None,
        })
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// Per-port session. Holds at most one socket per channel.
pub struct TvSession {
    transport: TvTransport,
    port: u16,
    art: Option<WsStream>,
    remote: Option<WsStream>,
    issued_token: Option<String>,
}

impl std::fmt::Debug for TvSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TvSession")
            .field("host", &self.transport.host)
            .field("port", &self.port)
            .field("art_open", &self.art.is_some())
            .field("remote_open", &self.remote.is_some())
            .finish_non_exhaustive()
    }
}

impl TvSession {
    /// Token the TV issued during the handshake, if it sent a new one.
    pub fn issued_token(&self) -> Option<&str> {
        self.issued_token.as_deref()
    }

    async fn stream(&mut self, channel: Channel) -> Result<&mut WsStream, Error> {
        let slot_empty = match channel {
            Channel::Art => self.art.is_none(),
            Channel::Remote => self.remote.is_none(),
        };
        if slot_empty {
            let (ws, token) = self.transport.open(self.port, channel).await?;
            if token.is_some() {
                self.issued_token = token;
            }
            match channel {
                Channel::Art => self.art = Some(ws),
                Channel::Remote => self.remote = Some(ws),
            }
        }
        let slot = match channel {
            Channel::Art => self.art.as_mut(),
            Channel::Remote => self.remote.as_mut(),
        };
        slot.ok_or_else(|| Error::WebSocketConnect(format!("{} channel not open", channel.path())))
    }

    async fn art_request(&mut self, op: &str, params: Value) -> Result<Value, Error> {
        let request = art_request_name(op).to_owned();
        let mut data = into_object(op, params)?;
        let id = Uuid::new_v4().to_string();
        data.insert("request".into(), Value::String(request.clone()));
        data.insert("id".into(), Value::String(id.clone()));
        data.insert("request_id".into(), Value::String(id.clone()));

        let message = json!({
            "method": "ms.channel.emit",
            "params": {
                "event": "art_app_request",
                "to": "host",
                "data": Value::Object(data).to_string(),
            }
        });

        let timeout = self.transport.timeout;
        let ws = self.stream(Channel::Art).await?;
        send_json(ws, &message).await?;
        debug!(request = %request, "art request sent");

        tokio::time::timeout(timeout, wait_for_art_reply(ws, &request, &id))
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: timeout.as_secs(),
            })?
    }

    async fn app_list(&mut self) -> Result<Value, Error> {
        let timeout = self.transport.timeout;
        let ws = self.stream(Channel::Remote).await?;
        send_json(
            ws,
            &json!({
                "method": "ms.channel.emit",
                "params": { "event": "ed.installedApp.get", "to": "host" }
            }),
        )
        .await?;

        let wait = async {
            loop {
                let frame = next_json(ws).await?;
                if frame.get("event").and_then(Value::as_str) == Some("ed.installedApp.get") {
                    let apps = frame
                        .pointer("/data/data")
                        .cloned()
                        .unwrap_or_else(|| Value::Array(Vec::new()));
                    return Ok(apps);
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: timeout.as_secs(),
            })?
    }

    async fn run_app(&mut self, app_id: &str, app_type: &str, meta_tag: &str) -> Result<Value, Error> {
        let ws = self.stream(Channel::Remote).await?;
        send_json(
            ws,
            &json!({
                "method": "ms.channel.emit",
                "params": {
                    "event": "ed.apps.launch",
                    "to": "host",
                    "data": {
                        "appId": app_id,
                        "action_type": app_type,
                        "metaTag": meta_tag,
                    }
                }
            }),
        )
        .await?;
        Ok(Value::Null)
    }
}

#[async_trait]
impl LocalConnection for TvSession {
    async fn invoke(&mut self, method: &str, params: Value) -> Result<Value, Error> {
        match method {
            "app_list" => self.app_list().await,
            "run_app" => {
                let app_id = str_param(&params, "app_id")
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| missing_param(method, "app_id"))?;
                let app_type = str_param(&params, "app_type").unwrap_or("DEEP_LINK");
                let meta_tag = str_param(&params, "meta_tag").unwrap_or_default();
                self.run_app(app_id, app_type, meta_tag).await
            }
            "open_browser" => {
                let url = str_param(&params, "url").ok_or_else(|| missing_param(method, "url"))?;
                self.run_app(BROWSER_APP_ID, "NATIVE_LAUNCH", url).await
            }
            op => self.art_request(op, params).await,
        }
    }

    async fn close(&mut self) {
        for mut ws in [self.art.take(), self.remote.take()].into_iter().flatten() {
            if let Err(e) = ws.close(None).await {
                trace!(error = %e, "ignoring error while closing TV channel");
            }
        }
    }
}

// ── Frame helpers ────────────────────────────────────────────────────

async fn handshake(ws: &mut WsStream, channel: Channel) -> Result<Option<String>, Error> {
    let mut token = None;
    loop {
        let frame = next_json(ws).await?;
        let event = frame.get("event").and_then(Value::as_str).unwrap_or_default();
        match event {
            "ms.channel.unauthorized" => {
                return Err(Error::Authentication {
                    message: "TV rejected the connection; accept the prompt on screen".into(),
                });
            }
            "ms.channel.timeOut" => {
                return Err(Error::WebSocketConnect("TV pairing prompt timed out".into()));
            }
            "ms.channel.connect" => {
                token = frame
                    .pointer("/data/token")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                if channel.ready_event() == event {
                    return Ok(token);
                }
            }
            e if e == channel.ready_event() => return Ok(token),
            _ => trace!(event, "ignoring pre-handshake event"),
        }
    }
}

async fn wait_for_art_reply(ws: &mut WsStream, request: &str, id: &str) -> Result<Value, Error> {
    loop {
        let frame = next_json(ws).await?;
        if frame.get("event").and_then(Value::as_str) != Some("d2d_service_message") {
            continue;
        }
        let Some(inner) = frame.get("data").map(decode_inner) else {
            continue;
        };
        let matches = [inner.get("id"), inner.get("request_id")]
            .into_iter()
            .flatten()
            .any(|v| v.as_str() == Some(id));
        if !matches {
            continue;
        }

        if inner.get("event").and_then(Value::as_str) == Some("error") {
            let code = inner.get("error_code").and_then(|v| {
                v.as_i64()
                    .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            });
            let code_text = inner
                .get("error_code")
                .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_owned))
                .unwrap_or_default();
            return Err(Error::Rpc {
                method: request.to_owned(),
                code,
                message: format!("`{request}` request failed with error number {code_text}"),
            });
        }
        return Ok(inner);
    }
}

/// `data` arrives either as a JSON-encoded string or an inline object.
fn decode_inner(data: &Value) -> Value {
    match data {
        Value::String(s) => serde_json::from_str(s).unwrap_or(Value::Null),
        other => other.clone(),
    }
}

async fn send_json(ws: &mut WsStream, value: &Value) -> Result<(), Error> {
    ws.send(Message::text(value.to_string()))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))
}

/// Next text frame parsed as JSON. Non-JSON text and control frames are skipped.
async fn next_json(ws: &mut WsStream) -> Result<Value, Error> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<Value>(text.as_str()) {
                Ok(value) => return Ok(value),
                Err(e) => trace!(error = %e, "skipping non-JSON frame"),
            },
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = frame.map_or((1005, String::new()), |cf| {
                    (u16::from(cf.code), cf.reason.as_str().to_owned())
                });
                return Err(Error::WebSocketClosed { code, reason });
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
            None => {
                return Err(Error::WebSocketClosed {
                    code: 1006,
                    reason: "stream ended".into(),
                });
            }
        }
    }
}

fn into_object(method: &str, params: Value) -> Result<Map<String, Value>, Error> {
    match params {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(Error::Rpc {
            method: method.to_owned(),
            code: None,
            message: format!("invalid params: expected an object, got {other}"),
        }),
    }
}

fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

fn missing_param(method: &str, key: &str) -> Error {
    Error::Rpc {
        method: method.to_owned(),
        code: None,
        message: format!("missing `{key}` parameter"),
    }
}
