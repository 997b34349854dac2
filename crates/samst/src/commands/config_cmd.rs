//! Config subcommand handlers.

use std::io::BufRead;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, FrameProfile, Profile, SoundbarProfile};
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

const VALID_KEYS: &str = "token, token_env, api_base, scan_interval, expose_all, \
    include_non_samsung, discovery_interval, soundmode_overrides, timeout, \
    frame.host, frame.port, frame.token, soundbar.host, soundbar.timeout";

// ── Helpers ─────────────────────────────────────────────────────────

/// A copy of the config with every stored secret masked.
fn redacted(cfg: &Config) -> Config {
    let mut out = cfg.clone();
    for profile in out.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(MASK.into());
        }
        if let Some(frame) = profile.frame.as_mut() {
            if frame.token.is_some() {
                frame.token = Some(MASK.into());
            }
        }
    }
    out
}

fn format_config(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("error: serialization failed: {e}"))
}

fn parse<T: std::str::FromStr>(key: &str, value: &str, expected: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: key.into(),
        reason: format!("must be {expected}"),
    })
}

fn frame_mut(profile: &mut Profile) -> &mut FrameProfile {
    profile.frame.get_or_insert_with(|| FrameProfile {
        host: String::new(),
        port: 8002,
        token: None,
    })
}

fn soundbar_mut(profile: &mut Profile) -> &mut SoundbarProfile {
    profile.soundbar.get_or_insert_with(|| SoundbarProfile {
        host: String::new(),
        timeout: 8,
    })
}

/// Apply one `key = value` pair to a profile.
fn set_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "token" => profile.token = Some(value),
        "token_env" | "token-env" => profile.token_env = Some(value),
        "api_base" | "api-base" => {
            samst_config::validate_api_base(&value)?;
            profile.api_base = Some(value);
        }
        "scan_interval" | "scan-interval" => {
            profile.scan_interval = Some(parse(key, &value, "a number (seconds)")?);
        }
        "expose_all" | "expose-all" => profile.expose_all = parse(key, &value, "'true' or 'false'")?,
        "include_non_samsung" | "include-non-samsung" => {
            profile.include_non_samsung = parse(key, &value, "'true' or 'false'")?;
        }
        "discovery_interval" | "discovery-interval" => {
            profile.discovery_interval = Some(parse(key, &value, "a number (seconds)")?);
        }
        "soundmode_overrides" | "soundmode-overrides" => {
            profile.soundmode_overrides = value
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_owned)
                .collect();
        }
        "timeout" => profile.timeout = Some(parse(key, &value, "a number (seconds)")?),
        "frame.host" => frame_mut(profile).host = value,
        "frame.port" => frame_mut(profile).port = parse(key, &value, "a port number")?,
        "frame.token" => frame_mut(profile).token = Some(value),
        "soundbar.host" => soundbar_mut(profile).host = value,
        "soundbar.timeout" => {
            soundbar_mut(profile).timeout = parse(key, &value, "a number (seconds)")?;
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!("unknown config key '{other}'. Valid keys: {VALID_KEYS}"),
            });
        }
    }
    Ok(())
}

fn read_token_from_stdin() -> Result<String, CliError> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let token = line.trim().to_owned();
    if token.is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "token cannot be empty".into(),
        });
    }
    Ok(token)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config, |_| {
                "config".into()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            set_key(profile, &key, value)?;
            config::save_config(&cfg)?;
            output::done(&format!("Set {key} on profile '{profile_name}'"), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            let names = cfg.profile_names();
            if names.is_empty() {
                eprintln!("No profiles configured. Run: samst config set-token");
            } else {
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();

            if !cfg.profiles.contains_key(&name) {
                let available = cfg.profile_names();
                return Err(CliError::ProfileNotFound {
                    name,
                    available: if available.is_empty() {
                        "(none)".into()
                    } else {
                        available.join(", ")
                    },
                });
            }

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            output::done(&format!("Default profile set to '{name}'"), global.quiet);
            Ok(())
        }

        ConfigCommand::SetToken { token } => {
            let token = match token {
                Some(t) => t,
                None => read_token_from_stdin()?,
            };
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            config::store_token(&profile_name, &token)?;

            // Keep a profile entry so `config use` and `profiles` see it.
            if !cfg.profiles.contains_key(&profile_name) {
                cfg.profiles.insert(profile_name.clone(), Profile::default());
                config::save_config(&cfg)?;
            }
            output::done(
                &format!("Token for '{profile_name}' stored in the system keyring"),
                global.quiet,
            );
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn nested_keys_create_sections() {
        let mut profile = Profile::default();
        set_key(&mut profile, "frame.host", "10.0.0.20".into()).unwrap();
        set_key(&mut profile, "soundbar.timeout", "12".into()).unwrap();

        let frame = profile.frame.unwrap();
        assert_eq!(frame.host, "10.0.0.20");
        assert_eq!(frame.port, 8002);
        assert_eq!(profile.soundbar.unwrap().timeout, 12);
    }

    #[test]
    fn overrides_split_on_commas() {
        let mut profile = Profile::default();
        set_key(&mut profile, "soundmode_overrides", "movie, , night".into()).unwrap();
        assert_eq!(profile.soundmode_overrides, vec!["movie", "night"]);
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut profile = Profile::default();
        assert!(matches!(
            set_key(&mut profile, "scan_interval", "soon".into()),
            Err(CliError::Validation { .. })
        ));
        assert!(matches!(
            set_key(&mut profile, "colour", "red".into()),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn show_masks_secrets() {
        let mut cfg = Config::default();
        let mut profile = Profile::default();
        profile.token = Some("secret".into());
        profile.frame = Some(FrameProfile {
            host: "tv".into(),
            port: 8002,
            token: Some("pairing".into()),
        });
        cfg.profiles.insert("home".into(), profile);

        let shown = format_config(&redacted(&cfg));
        assert!(!shown.contains("secret"));
        assert!(!shown.contains("pairing"));
        assert!(shown.contains(MASK));
    }
}
