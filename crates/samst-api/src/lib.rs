// samst-api: Async Rust clients for the SmartThings cloud API and Samsung LAN protocols

pub mod cloud;
pub mod error;
pub mod local;
mod tls;
pub mod transport;

pub use cloud::CloudClient;
pub use error::Error;
pub use local::{LocalConnection, LocalTransport};
pub use transport::{TlsMode, TransportConfig};
