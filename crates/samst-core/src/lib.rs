//! Reliability layer between `samst-api` and its consumers (CLI, automations).
//!
//! This crate keeps Samsung SmartThings devices usable while the cloud
//! rate-limits, races commands, and drops LAN connections:
//!
//! - **[`Hub`]**: per-device table plus discovery. Each registered device
//!   gets a [`DeviceHandle`] bundling its dispatcher, polling coordinator,
//!   and (for OCF soundbars) the execute-feature poller and prober.
//!
//! - **[`PollingCoordinator`]**: one task per device that reads the full
//!   status, publishes an immutable [`AttributeStore`] snapshot through a
//!   `watch` channel, and backs off on rate limits.
//!
//! - **[`CommandDispatcher`]**: serialises commands per device and retries
//!   conflicts and rate limits on a fixed schedule ([`RetryPolicy`]).
//!
//! - **[`FeatureProber`]**: validates which sound modes a soundbar really
//!   accepts, with idle guard, throttling, and cached results.
//!
//! - **Local facades** ([`local`]): Frame TV art channel and soundbar
//!   JSON-RPC behind [`LocalEndpointClient`], which handles port fallback,
//!   per-operation retries, and unsupported-operation memory.

pub mod apps;
pub mod backend;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod local;
pub mod model;
pub mod prober;
pub mod retry;
pub mod soundbar;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backend::CloudBackend;
pub use samst_api::cloud::UserInfo;
pub use config::{EndpointConfig, HubConfig, PollConfig, ProbeConfig};
pub use coordinator::{BackoffState, PollingCoordinator, RefreshHook, RefreshOutcome};
pub use dispatcher::CommandDispatcher;
pub use error::CoreError;
pub use hub::{DeviceHandle, Hub};
pub use local::{FrameArt, FrameState, LocalEndpointClient, SoundbarLocal, SoundbarStatus};
pub use prober::{FeatureProber, ProbeOutcome, SkipReason, ValidatedOptionSet};
pub use retry::{ErrorClass, RetryFailure, RetryPolicy};
pub use soundbar::{RearSpeakerMode, SoundbarExecuteState, SoundbarFeatures, SpeakerIdentifier};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Attribute, AttributeRow, AttributeStore, CapabilityId, CapabilityIndex, CommandRequest, Device,
    DeviceFamily,
};
