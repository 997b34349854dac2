// ── LAN facades ──
//
// Frame TV art and Wi-Fi soundbar control, both layered on the shared
// multi-port endpoint client.

pub mod endpoint;
pub mod frame;
pub mod soundbar;

pub use endpoint::{EndpointState, LocalEndpointClient, candidate_ports};
pub use frame::{FrameArt, FrameState};
pub use soundbar::{SoundbarLocal, SoundbarStatus};
