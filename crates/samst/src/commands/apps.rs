//! TV app catalog and launching.

use samst_core::{Hub, apps};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{AppsArgs, AppsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct AppEntry {
    name: &'static str,
    app_id: &'static str,
}

#[derive(Tabled)]
struct AppRow {
    #[tabled(rename = "Name")]
    name: &'static str,
    #[tabled(rename = "App ID")]
    app_id: &'static str,
}

pub fn list(global: &GlobalOpts) {
    let entries: Vec<AppEntry> = apps::CATALOG
        .iter()
        .map(|a| AppEntry {
            name: a.name,
            app_id: a.app_id,
        })
        .collect();
    let out = output::render_list(
        &global.output,
        &entries,
        |e| AppRow {
            name: e.name,
            app_id: e.app_id,
        },
        |e| e.app_id.to_owned(),
    );
    output::print_output(&out, global.quiet);
}

pub async fn handle(hub: &Hub, args: AppsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        AppsCommand::List => {
            list(global);
            Ok(())
        }
        AppsCommand::Launch { device, app } => {
            let handle = util::resolve_device(hub, &device).await?;
            handle.launch_app(&app).await?;
            let name = apps::resolve(&app).map_or(app.as_str(), |a| a.name);
            output::done(&format!("launched {name}"), global.quiet);
            Ok(())
        }
    }
}
