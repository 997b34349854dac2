//! LAN protocols for Samsung devices.
//!
//! Each device family exposes a different local API, but the reliability
//! layer only needs one shape: open a session on a port, invoke named
//! operations with JSON parameters, close. [`LocalTransport`] and
//! [`LocalConnection`] are that seam; `samst-core` drives them through its
//! multi-port endpoint client.
//!
//! - [`tv`] -- Frame TV art channel and remote-control channel over WebSocket.
//! - [`soundbar`] -- Wi-Fi soundbar JSON-RPC over HTTPS on port 1516.

pub mod soundbar;
pub mod tv;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Error;

/// Factory for per-port sessions with one device.
#[async_trait]
pub trait LocalTransport: Send + Sync {
    type Connection: LocalConnection;

    /// Open a session on `port`. Errors here are always connection-class.
    async fn connect(&self, port: u16) -> Result<Self::Connection, Error>;
}

/// One open session with a device.
#[async_trait]
pub trait LocalConnection: Send {
    /// Invoke a named operation. `params` is a JSON object (or `Null`).
    async fn invoke(&mut self, method: &str, params: Value) -> Result<Value, Error>;

    /// Release the session. Never fails; errors are logged and dropped.
    async fn close(&mut self);
}

pub use soundbar::{SoundbarRpc, SoundbarSession, SOUNDBAR_PORT};
pub use tv::{TvSession, TvTransport};
