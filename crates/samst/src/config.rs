//! CLI configuration: thin wrapper around `samst_config` shared types.
//!
//! Re-exports the shared types and adds resolution that respects
//! `GlobalOpts` flag overrides (--token, --api-base, --timeout).

use secrecy::SecretString;

use samst_core::HubConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use samst_config::{
    Config, FrameProfile, Profile, SoundbarProfile, config_path, load_config_or_default,
    save_config, store_token,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `HubConfig` from the config file, profile, and CLI overrides.
///
/// With no matching profile, a `--token` / `SAMST_TOKEN` alone is enough.
pub fn build_hub_config(global: &GlobalOpts) -> Result<HubConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);
    let fallback = Profile::default();
    let profile = cfg.profiles.get(&profile_name).unwrap_or(&fallback);

    // 1. Token (flag > env chain > keyring > plaintext)
    let token = match global.token {
        Some(ref token) => SecretString::from(token.clone()),
        None => samst_config::resolve_token(profile, &profile_name)?,
    };

    // 2. Profile values, then flag overrides
    let mut hub = samst_config::hub_config(profile, &cfg.defaults, token)?;
    if let Some(ref base) = global.api_base {
        samst_config::validate_api_base(base)?;
        hub.api_base = base.clone();
    }
    if let Some(secs) = global.timeout {
        hub.timeout = std::time::Duration::from_secs(secs.max(1));
    }
    Ok(hub)
}

/// The active profile, if the config file defines it.
pub fn active_profile(global: &GlobalOpts) -> Option<Profile> {
    let cfg = load_config_or_default();
    let name = active_profile_name(global, &cfg);
    cfg.profiles.get(&name).cloned()
}

/// Whether the active profile asks for every component to be shown.
pub fn expose_all(global: &GlobalOpts) -> bool {
    active_profile(global).is_some_and(|p| p.expose_all)
}
