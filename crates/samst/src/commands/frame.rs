//! Frame TV art channel over the LAN.

use samst_core::{FrameArt, FrameState, apps};
use serde_json::{Map, Value};
use tabled::Tabled;

use crate::cli::{FrameArgs, FrameCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

const DEFAULT_PORT: u16 = 8002;

type Entry = Map<String, Value>;

// ── Table rows ──────────────────────────────────────────────────────

fn text(entry: &Entry, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| entry.get(*k))
        .map(util::cell)
        .unwrap_or_default()
}

#[derive(Tabled)]
struct ArtworkRow {
    #[tabled(rename = "Content ID")]
    content_id: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Matte")]
    matte: String,
}

impl From<&Entry> for ArtworkRow {
    fn from(e: &Entry) -> Self {
        Self {
            content_id: text(e, &["content_id", "contentId", "id"]),
            category: text(e, &["category_id", "categoryId"]),
            matte: text(e, &["matte_id", "matteId"]),
        }
    }
}

#[derive(Tabled)]
struct AppRow {
    #[tabled(rename = "App ID")]
    app_id: String,
    #[tabled(rename = "Name")]
    name: String,
}

impl From<&Entry> for AppRow {
    fn from(e: &Entry) -> Self {
        Self {
            app_id: text(e, &["appId", "app_id"]),
            name: text(e, &["name"]),
        }
    }
}

fn state_detail(s: &FrameState) -> String {
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
    let mut lines = vec![
        format!("Online:        {}", if s.online { "yes" } else { "no" }),
        format!("API version:   {}", opt(&s.api_version)),
        format!("Art mode:      {}", util::on_off(s.art_mode)),
        format!(
            "Brightness:    {}",
            s.brightness.map_or_else(|| "-".into(), |b| b.to_string())
        ),
        format!("Artwork:       {}", opt(&s.current_artwork_id)),
        format!("Matte:         {}", opt(&s.current_matte)),
        format!("Filter:        {}", opt(&s.current_filter)),
        format!("Artworks:      {}", s.artwork_ids.len()),
        format!("Mattes:        {}", s.matte_options.join(", ")),
        format!("Filters:       {}", s.photo_filter_options.join(", ")),
        format!("Settings:      {}", s.artmode_settings.join(", ")),
    ];
    for error in &s.last_errors {
        lines.push(format!("Error:         {error}"));
    }
    lines.join("\n")
}

fn entry_detail(entry: &Entry) -> String {
    entry
        .iter()
        .map(|(k, v)| format!("{k}: {}", util::cell(v)))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Argument parsing ────────────────────────────────────────────────

fn parse_brightness(level: i64) -> Result<u8, CliError> {
    u8::try_from(level)
        .ok()
        .filter(|l| (1..=10).contains(l))
        .ok_or_else(|| CliError::Validation {
            field: "brightness".into(),
            reason: format!("{level} is outside 1-10"),
        })
}

/// Minutes between slideshow images; "off" and 0 disable it.
fn parse_slideshow_minutes(raw: &str) -> Result<u32, CliError> {
    if raw.eq_ignore_ascii_case("off") {
        return Ok(0);
    }
    raw.parse().map_err(|_| CliError::Validation {
        field: "duration".into(),
        reason: format!("expected minutes or \"off\", got {raw:?}"),
    })
}

// ── Handler ─────────────────────────────────────────────────────────

fn connect(args: &FrameArgs, global: &GlobalOpts) -> Result<FrameArt, CliError> {
    let profile = config::active_profile(global).and_then(|p| p.frame);
    let host = util::require_host(
        args.host.clone(),
        profile.as_ref().map(|f| f.host.clone()),
        "frame.host",
        "Frame TV host",
    )?;
    let port = args
        .port
        .or_else(|| profile.as_ref().map(|f| f.port))
        .unwrap_or(DEFAULT_PORT);
    let token = profile.and_then(|f| f.token);
    tracing::debug!(host = %host, port, "connecting to Frame TV");
    Ok(FrameArt::connect(host, port, token))
}

#[allow(clippy::too_many_lines)]
pub async fn handle(args: FrameArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let frame = connect(&args, global)?;
    let quiet = global.quiet;

    match args.command {
        FrameCommand::State => {
            let state = frame.state().await;
            if !state.online {
                return Err(CliError::ConnectionFailed {
                    target: "Frame TV".into(),
                    reason: state.last_errors.join("; "),
                });
            }
            let out = output::render_single(&global.output, &state, state_detail, |s| {
                s.current_artwork_id.clone().unwrap_or_default()
            });
            output::print_output(&out, quiet);
        }

        FrameCommand::ArtMode { state: None } => {
            let mode = frame.art_mode().await?;
            output::print_output(util::on_off(mode), quiet);
        }
        FrameCommand::ArtMode { state: Some(state) } => {
            frame.set_art_mode(state.is_on()).await?;
            output::done(&format!("art mode {}", util::on_off(Some(state.is_on()))), quiet);
        }

        FrameCommand::Brightness { level: None } => {
            let level = frame.brightness().await?;
            output::print_output(&level.map_or_else(|| "-".into(), |l| l.to_string()), quiet);
        }
        FrameCommand::Brightness { level: Some(level) } => {
            frame.set_brightness(parse_brightness(level)?).await?;
            output::done(&format!("brightness set to {level}"), quiet);
        }

        FrameCommand::Artworks { category } => {
            let artworks: Vec<Entry> = frame
                .artworks()
                .await?
                .into_iter()
                .filter(|e| {
                    category
                        .as_deref()
                        .is_none_or(|c| text(e, &["category_id", "categoryId"]) == c)
                })
                .collect();
            let out = output::render_list(&global.output, &artworks, |e| ArtworkRow::from(e), |e| {
                text(e, &["content_id", "contentId", "id"])
            });
            output::print_output(&out, quiet);
        }

        FrameCommand::Current => {
            let current = frame.current_artwork().await?;
            let out = output::render_single(&global.output, &current, entry_detail, |e| {
                text(e, &["content_id", "contentId"])
            });
            output::print_output(&out, quiet);
        }

        FrameCommand::Select { content_id, show } => {
            frame.select_image(&content_id, show).await?;
            output::done(&format!("{content_id} selected"), quiet);
        }

        FrameCommand::Delete { content_ids } => {
            frame.delete_list(&content_ids).await?;
            output::done(&format!("deleted {} artworks", content_ids.len()), quiet);
        }

        FrameCommand::Matte {
            content_id,
            matte_id,
        } => {
            frame.change_matte(&content_id, &matte_id).await?;
            output::done(&format!("{content_id} matte set to {matte_id}"), quiet);
        }

        FrameCommand::Filter {
            content_id,
            filter_id,
        } => {
            frame.set_photo_filter(&content_id, &filter_id).await?;
            output::done(&format!("{content_id} filter set to {filter_id}"), quiet);
        }

        FrameCommand::Slideshow {
            duration,
            shuffle,
            category,
        } => {
            let minutes = parse_slideshow_minutes(&duration)?;
            frame
                .set_slideshow_status(minutes, shuffle, category.as_deref())
                .await?;
            let message = if minutes == 0 {
                "slideshow off".to_owned()
            } else {
                format!("slideshow every {minutes} min")
            };
            output::done(&message, quiet);
        }

        FrameCommand::MotionTimer { value } => {
            frame.set_motion_timer(&value).await?;
            output::done(&format!("motion timer set to {value}"), quiet);
        }

        FrameCommand::MotionSensitivity { value } => {
            frame.set_motion_sensitivity(&value).await?;
            output::done(&format!("motion sensitivity set to {value}"), quiet);
        }

        FrameCommand::BrightnessSensor { state } => {
            frame.set_brightness_sensor(state.is_on()).await?;
            output::done(
                &format!("brightness sensor {}", util::on_off(Some(state.is_on()))),
                quiet,
            );
        }

        FrameCommand::Apps => {
            let installed = frame.app_list().await?;
            let out = output::render_list(&global.output, &installed, |e| AppRow::from(e), |e| {
                text(e, &["appId", "app_id"])
            });
            output::print_output(&out, quiet);
        }

        FrameCommand::Launch { app } => {
            let app_id = apps::resolve(&app).map_or(app.as_str(), |a| a.app_id);
            frame.run_app(app_id, "DEEP_LINK", "").await?;
            output::done(&format!("launched {app_id}"), quiet);
        }

        FrameCommand::OpenUrl { url } => {
            frame.open_url(&url).await?;
            output::done(&format!("opened {url}"), quiet);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn brightness_is_bounded() {
        assert_eq!(parse_brightness(10).ok(), Some(10));
        assert!(parse_brightness(0).is_err());
        assert!(parse_brightness(11).is_err());
        assert!(parse_brightness(-1).is_err());
    }

    #[test]
    fn slideshow_off_means_zero() {
        assert_eq!(parse_slideshow_minutes("off").ok(), Some(0));
        assert_eq!(parse_slideshow_minutes("15").ok(), Some(15));
        assert!(parse_slideshow_minutes("soon").is_err());
    }

    #[test]
    fn artwork_rows_accept_either_key_style() {
        let Value::Object(entry) = json!({ "contentId": "MY_F0001", "category_id": "MY-C0002" }) else {
            unreachable!()
        };
        let row = ArtworkRow::from(&entry);
        assert_eq!(row.content_id, "MY_F0001");
        assert_eq!(row.category, "MY-C0002");
        assert_eq!(row.matte, "");
    }
}
