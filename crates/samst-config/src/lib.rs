//! Shared configuration for samst.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation to `samst_core::HubConfig`. The CLI adds flag-aware
//! wrappers on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use samst_core::HubConfig;

/// Keyring service name; entries are keyed `{profile}/token`.
pub const KEYRING_SERVICE: &str = "samst";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named SmartThings accounts.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Profile names, sorted.
    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.profiles.keys().cloned().collect();
        names.sort();
        names
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named SmartThings account with its tuning and optional LAN devices.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Token in plaintext (prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name holding the token.
    pub token_env: Option<String>,

    /// API root override.
    pub api_base: Option<String>,

    /// Poll interval in seconds (never below 5).
    pub scan_interval: Option<u64>,

    /// Expose capabilities without a dedicated mapping.
    #[serde(default)]
    pub expose_all: bool,

    /// Keep non-Samsung devices during discovery.
    #[serde(default)]
    pub include_non_samsung: bool,

    /// Discovery period in seconds (never below 60).
    pub discovery_interval: Option<u64>,

    /// Extra sound modes to try when probing soundbars.
    #[serde(default)]
    pub soundmode_overrides: Vec<String>,

    /// Override timeout.
    pub timeout: Option<u64>,

    pub frame: Option<FrameProfile>,

    pub soundbar: Option<SoundbarProfile>,
}

/// LAN access to a Frame TV art channel.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FrameProfile {
    pub host: String,

    #[serde(default = "default_frame_port")]
    pub port: u16,

    /// Pairing token issued by the TV on first connection.
    pub token: Option<String>,
}

fn default_frame_port() -> u16 {
    8002
}

/// LAN access to a Wi-Fi soundbar.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SoundbarProfile {
    pub host: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_soundbar_timeout")]
    pub timeout: u64,
}

fn default_soundbar_timeout() -> u64 {
    8
}

impl SoundbarProfile {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "samst", "samst").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("samst");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. `SAMST_` variables override file values;
/// nested keys use `__` (`SAMST_DEFAULTS__TIMEOUT=10`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SAMST_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution ────────────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))?)
}

/// Resolve the SmartThings token: `token_env`, then keyring, then plaintext.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            if !val.trim().is_empty() {
                return Ok(SecretString::from(val));
            }
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a token in the system keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(token)?;
    Ok(())
}

// ── Translation to runtime config ───────────────────────────────────

/// Accept only absolute http(s) URLs for the API root.
pub fn validate_api_base(base: &str) -> Result<(), ConfigError> {
    let url: url::Url = base.parse().map_err(|_| ConfigError::Validation {
        field: "api_base".into(),
        reason: format!("invalid URL: {base}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "api_base".into(),
            reason: format!("expected an http(s) URL, got {base}"),
        });
    }
    Ok(())
}

/// Build a `HubConfig` from a profile with an already-resolved token.
pub fn hub_config(
    profile: &Profile,
    defaults: &Defaults,
    token: SecretString,
) -> Result<HubConfig, ConfigError> {
    let mut cfg = HubConfig::new(token);

    if let Some(ref base) = profile.api_base {
        validate_api_base(base)?;
        cfg.api_base = base.clone();
    }

    cfg.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout).max(1));
    if let Some(secs) = profile.scan_interval {
        // The floor applies when the interval is used.
        cfg.poll.scan_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = profile.discovery_interval {
        cfg.discovery_interval = Duration::from_secs(secs);
    }
    cfg.include_non_samsung = profile.include_non_samsung;
    cfg.probe.soundmode_overrides = profile
        .soundmode_overrides
        .iter()
        .map(|m| m.trim().to_owned())
        .filter(|m| !m.is_empty())
        .collect();

    Ok(cfg)
}

/// Resolve the token and build a `HubConfig`, no CLI overrides.
pub fn profile_to_hub_config(
    config: &Config,
    profile_name: &str,
) -> Result<HubConfig, ConfigError> {
    let profile = config
        .profiles
        .get(profile_name)
        .ok_or_else(|| ConfigError::ProfileNotFound {
            name: profile_name.into(),
        })?;
    let token = resolve_token(profile, profile_name)?;
    hub_config(profile, &config.defaults, token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.timeout, 30);
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profile_with_lan_devices_parses() {
        let (_dir, path) = write_config(
            r#"
default_profile = "home"

[profiles.home]
token = "plain"
scan_interval = 2
soundmode_overrides = ["movie", "  "]

[profiles.home.frame]
host = "192.168.1.20"

[profiles.home.soundbar]
host = "192.168.1.30"
timeout = 4
"#,
        );
        let cfg = load_config_from(&path).unwrap();
        let home = &cfg.profiles["home"];
        assert_eq!(home.frame.as_ref().unwrap().port, 8002);
        assert_eq!(home.soundbar.as_ref().unwrap().timeout(), Duration::from_secs(4));

        let hub = hub_config(home, &cfg.defaults, SecretString::from("t".to_owned())).unwrap();
        assert_eq!(hub.poll.scan_interval, Duration::from_secs(2));
        assert_eq!(hub.poll.base_interval(), Duration::from_secs(5));
        assert_eq!(hub.probe.soundmode_overrides, ["movie"]);
        assert_eq!(hub.timeout, Duration::from_secs(30));
    }

    #[test]
    fn plaintext_token_is_last_resort() {
        let profile = Profile {
            token: Some("from-file".into()),
            token_env: Some("SAMST_TEST_TOKEN_THAT_IS_NEVER_SET".into()),
            ..Profile::default()
        };
        // The keyring lookup fails in a headless test environment.
        let token = resolve_token(&profile, "samst-config-test-profile").unwrap();
        assert_eq!(token.expose_secret(), "from-file");
    }

    #[test]
    fn no_token_is_an_error() {
        let err = resolve_token(&Profile::default(), "samst-config-test-empty").unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { .. }));
    }

    #[test]
    fn invalid_api_base_is_rejected() {
        let profile = Profile {
            api_base: Some("not a url".into()),
            ..Profile::default()
        };
        let err = hub_config(&profile, &Defaults::default(), SecretString::from("t".to_owned()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "api_base"));
    }

    #[test]
    fn unknown_profile_is_reported() {
        let err = profile_to_hub_config(&Config::default(), "nope").unwrap_err();
        assert!(matches!(err, ConfigError::ProfileNotFound { .. }));
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                token_env: Some("HOME_TOKEN".into()),
                discovery_interval: Some(120),
                ..Profile::default()
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profile_names(), ["home"]);
        assert_eq!(loaded.profiles["home"].discovery_interval, Some(120));
    }
}
