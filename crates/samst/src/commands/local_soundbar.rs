//! Wi-Fi soundbar JSON-RPC over the LAN.

use std::time::Duration;

use samst_core::{SoundbarLocal, SoundbarStatus, prober};

use crate::cli::{GlobalOpts, LocalSoundbarArgs, LocalSoundbarCommand};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

fn detail(s: &SoundbarStatus) -> String {
    [
        format!("Power:      {}", s.power),
        format!("Volume:     {}", s.volume),
        format!("Mute:       {}", util::on_off(Some(s.mute))),
        format!("Input:      {}", s.input),
        format!("Sound mode: {}", s.sound_mode),
        format!("Codec:      {}", s.codec.as_deref().unwrap_or("-")),
        format!("Identifier: {}", s.identifier.as_deref().unwrap_or("-")),
    ]
    .join("\n")
}

pub async fn handle(args: LocalSoundbarArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let profile = config::active_profile(global);
    let local = profile.as_ref().and_then(|p| p.soundbar.clone());
    let host = util::require_host(
        args.host,
        local.as_ref().map(|s| s.host.clone()),
        "soundbar.host",
        "soundbar host",
    )?;
    let timeout = local.as_ref().map_or(DEFAULT_TIMEOUT, |s| s.timeout());
    tracing::debug!(host = %host, timeout_secs = timeout.as_secs(), "connecting to soundbar");
    let soundbar = SoundbarLocal::connect(host, timeout)?;
    let quiet = global.quiet;

    match args.command {
        LocalSoundbarCommand::Status => {
            let status = soundbar.status().await?;
            let out = output::render_single(&global.output, &status, detail, |s| s.power.clone());
            output::print_output(&out, quiet);
        }

        LocalSoundbarCommand::Power { state } => {
            if state.is_on() {
                soundbar.power_on().await?;
            } else {
                soundbar.power_off().await?;
            }
            output::done(&format!("power {}", util::on_off(Some(state.is_on()))), quiet);
        }

        LocalSoundbarCommand::Volume { level: None } => {
            output::print_output(&soundbar.volume().await?.to_string(), quiet);
        }
        LocalSoundbarCommand::Volume { level: Some(level) } => {
            soundbar.set_volume(level).await?;
            output::done(&format!("volume set to {level}"), quiet);
        }

        LocalSoundbarCommand::Mute => {
            soundbar.mute_toggle().await?;
            let muted = soundbar.is_muted().await?;
            output::done(&format!("mute {}", util::on_off(Some(muted))), quiet);
        }

        LocalSoundbarCommand::Input { source: None } => {
            output::print_output(&soundbar.input().await?, quiet);
        }
        LocalSoundbarCommand::Input { source: Some(source) } => {
            soundbar.select_input(&source).await?;
            output::done(&format!("input set to {source}"), quiet);
        }

        LocalSoundbarCommand::SoundMode { mode: None } => {
            output::print_output(&soundbar.sound_mode().await?, quiet);
        }
        LocalSoundbarCommand::SoundMode { mode: Some(mode) } => {
            soundbar.set_sound_mode(&mode).await?;
            output::done(&format!("sound mode set to {mode}"), quiet);
        }

        LocalSoundbarCommand::SoundModes => {
            // The identifier doubles as the model hint for the candidate list.
            let model = soundbar.identifier().await.ok().flatten();
            let overrides = profile.map(|p| p.soundmode_overrides).unwrap_or_default();
            let candidates = prober::candidate_modes(model.as_deref(), &overrides);
            let modes = soundbar.detect_sound_modes(&candidates).await?;
            let out = output::render_single(
                &global.output,
                &modes,
                |m| m.join("\n"),
                |m| m.join("\n"),
            );
            output::print_output(&out, quiet);
        }
    }
    Ok(())
}
