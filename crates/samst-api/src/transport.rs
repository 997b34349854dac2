// Shared transport configuration for building reqwest::Client instances.
//
// The cloud client and the soundbar JSON-RPC client share timeout and TLS
// settings through this module. The Frame art channel reuses the TLS mode
// for its WebSocket connector.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;

/// TLS verification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the bundled web PKI roots.
    System,
    /// Accept any certificate (Samsung LAN endpoints are self-signed).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
        }
    }
}

const USER_AGENT: &str = concat!("samst/", env!("CARGO_PKG_VERSION"));

impl TransportConfig {
    /// Config for a LAN device with a self-signed certificate.
    pub fn local(timeout: Duration) -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            timeout,
        }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        self.build_client_with_headers(reqwest::header::HeaderMap::new())
    }

    /// Build a `reqwest::Client` with additional default headers.
    ///
    /// Used by the cloud client to inject the bearer `Authorization` header.
    pub fn build_client_with_headers(
        &self,
        headers: reqwest::header::HeaderMap,
    ) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers);

        if self.tls == TlsMode::DangerAcceptInvalid {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// WebSocket TLS connector for this mode.
    ///
    /// `None` lets tungstenite fall back to its bundled web PKI roots.
    pub fn ws_connector(&self) -> Result<Option<tokio_tungstenite::Connector>, Error> {
        match self.tls {
            TlsMode::System => Ok(None),
            TlsMode::DangerAcceptInvalid => {
                let config = crate::tls::insecure_client_config()?;
                Ok(Some(tokio_tungstenite::Connector::Rustls(Arc::new(config))))
            }
        }
    }
}
