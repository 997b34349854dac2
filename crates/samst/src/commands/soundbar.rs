//! Soundbar execute features over the cloud.

use std::sync::Arc;

use samst_core::{
    DeviceHandle, Hub, RearSpeakerMode, SoundbarExecuteState, SoundbarFeatures, SpeakerIdentifier,
};
use serde::Serialize;
use serde_json::Value;

use crate::cli::{GlobalOpts, SoundbarArgs, SoundbarCommand};
use crate::error::CliError;
use crate::output;

use super::util;

const INPUT_CAP: &str = "samsungvd.audioInputSource";

#[derive(Serialize)]
struct SoundbarReport {
    input_source: Option<String>,
    supported_input_sources: Vec<String>,
    #[serde(flatten)]
    execute: SoundbarExecuteState,
}

fn detail(r: &SoundbarReport) -> String {
    let e = &r.execute;
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
    [
        format!("Input:           {}", opt(&r.input_source)),
        format!("Inputs:          {}", r.supported_input_sources.join(", ")),
        format!("Execute:         {}", util::on_off(e.supported)),
        format!("Sound mode:      {}", opt(&e.sound_mode)),
        format!("Sound modes:     {}", e.supported_sound_modes.join(", ")),
        format!(
            "Woofer:          {}",
            e.woofer_level.map_or_else(|| "-".into(), |l| l.to_string())
        ),
        format!("Woofer link:     {}", opt(&e.woofer_connection)),
        format!("EQ preset:       {}", opt(&e.eq_preset)),
        format!("EQ presets:      {}", e.eq_presets.join(", ")),
        format!("Night mode:      {}", util::on_off(e.night_mode)),
        format!("Bass boost:      {}", util::on_off(e.bass_boost)),
        format!("Voice amplifier: {}", util::on_off(e.voice_amplifier)),
    ]
    .join("\n")
}

fn features(handle: &DeviceHandle) -> Result<&Arc<SoundbarFeatures>, CliError> {
    handle.soundbar().ok_or_else(|| CliError::Unsupported {
        operation: "soundbar execute features".into(),
    })
}

fn parse_speaker(raw: &str) -> Result<SpeakerIdentifier, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "speaker".into(),
        reason: format!(
            "unknown speaker {raw:?}; expected Spk_Center, Spk_Side, Spk_Wide, \
             Spk_Front_Top, Spk_Rear or Spk_Rear_Top"
        ),
    })
}

fn parse_rear_mode(raw: &str) -> Result<RearSpeakerMode, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "mode".into(),
        reason: format!("unknown rear speaker mode {raw:?}; expected Front or Rear"),
    })
}

async fn state(handle: &DeviceHandle, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = util::fresh_snapshot(handle).await?;
    let execute = match handle.soundbar() {
        Some(features) => {
            features.poll().await?;
            SoundbarExecuteState::clone(&features.state())
        }
        None => SoundbarExecuteState::default(),
    };
    let report = SoundbarReport {
        input_source: snapshot.main_str(INPUT_CAP, "inputSource").map(str::to_owned),
        supported_input_sources: snapshot
            .main(INPUT_CAP, "supportedInputSources")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_owned).collect())
            .unwrap_or_default(),
        execute,
    };
    let out = output::render_single(&global.output, &report, detail, |r| {
        r.execute.sound_mode.clone().unwrap_or_default()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle(hub: &Hub, args: SoundbarArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let handle = util::resolve_device(hub, &args.device).await?;

    let message = match args.command {
        SoundbarCommand::State => return state(&handle, global).await,

        SoundbarCommand::Input { source } => {
            util::fresh_snapshot(&handle).await?;
            let steps = handle.select_input_source(&source).await?;
            format!("input {source} selected after {steps} steps")
        }

        SoundbarCommand::SoundMode { mode } => {
            features(&handle)?.set_sound_mode(&mode).await?;
            format!("sound mode set to {mode}")
        }
        SoundbarCommand::Woofer { level } => {
            features(&handle)?.set_woofer_level(level).await?;
            format!("woofer level set to {level}")
        }
        SoundbarCommand::Eq { preset } => {
            features(&handle)?.set_eq_preset(&preset).await?;
            format!("EQ preset set to {preset}")
        }
        SoundbarCommand::Night { state } => {
            features(&handle)?.set_night_mode(state.is_on()).await?;
            format!("night mode {}", util::on_off(Some(state.is_on())))
        }
        SoundbarCommand::BassBoost { state } => {
            features(&handle)?.set_bass_boost(state.is_on()).await?;
            format!("bass boost {}", util::on_off(Some(state.is_on())))
        }
        SoundbarCommand::VoiceAmp { state } => {
            features(&handle)?.set_voice_amplifier(state.is_on()).await?;
            format!("voice amplifier {}", util::on_off(Some(state.is_on())))
        }
        SoundbarCommand::ActiveVoiceAmp { state } => {
            features(&handle)?
                .set_active_voice_amplifier(state.is_on())
                .await?;
            format!("active voice amplifier {}", util::on_off(Some(state.is_on())))
        }
        SoundbarCommand::SpaceFit { state } => {
            features(&handle)?.set_space_fit_sound(state.is_on()).await?;
            format!("SpaceFit sound {}", util::on_off(Some(state.is_on())))
        }
        SoundbarCommand::SpeakerLevel { speaker, level } => {
            let id = parse_speaker(&speaker)?;
            features(&handle)?.set_speaker_level(id, level).await?;
            format!("{id} level set to {level}")
        }
        SoundbarCommand::RearSpeaker { mode } => {
            let parsed = parse_rear_mode(&mode)?;
            features(&handle)?.set_rear_speaker_mode(parsed).await?;
            format!("rear speakers set to {parsed}")
        }
    };
    output::done(&message, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_ids_use_wire_names() {
        assert_eq!(parse_speaker("Spk_Center").ok(), Some(SpeakerIdentifier::Center));
        assert!(matches!(
            parse_speaker("center"),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn rear_mode_parses() {
        assert_eq!(parse_rear_mode("Rear").ok(), Some(RearSpeakerMode::Rear));
        assert!(parse_rear_mode("side").is_err());
    }
}
