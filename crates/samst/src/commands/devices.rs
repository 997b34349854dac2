//! Device command handlers.

use samst_core::{Device, Hub};
use tabled::Tabled;

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Family")]
    family: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Manufacturer")]
    manufacturer: String,
    #[tabled(rename = "Caps")]
    capabilities: usize,
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            id: d.device_id.clone(),
            name: d.display_name().to_owned(),
            family: d.family().to_string(),
            model: d.model.clone().unwrap_or_default(),
            manufacturer: d.manufacturer_name.clone().unwrap_or_default(),
            capabilities: d.capabilities.len(),
        }
    }
}

fn detail(d: &Device) -> String {
    let mut lines = vec![
        format!("ID:           {}", d.device_id),
        format!("Name:         {}", d.display_name()),
        format!("Family:       {}", d.family()),
        format!("Manufacturer: {}", d.manufacturer_name.as_deref().unwrap_or("-")),
        format!("Model:        {}", d.model.as_deref().unwrap_or("-")),
        format!("Type:         {}", d.device_type_name.as_deref().unwrap_or("-")),
        format!("OCF type:     {}", d.ocf_device_type.as_deref().unwrap_or("-")),
        format!("Components:   {}", d.components.join(", ")),
        "Capabilities:".to_owned(),
    ];
    lines.extend(
        d.capabilities
            .iter()
            .map(|c| format!("  {} (v{})", c.id, c.version)),
    );
    lines.join("\n")
}

/// `devices list --all` widens the scan filter.
pub fn wants_all(args: &DevicesArgs) -> bool {
    matches!(args.command, DevicesCommand::List { all: true })
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(hub: &Hub, args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List { .. } => {
            let devices = hub.scan().await?;
            let out = output::render_list(&global.output, &devices, |d| DeviceRow::from(d), |d| {
                d.device_id.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { device } => {
            let handle = util::resolve_device(hub, &device).await?;
            let out = output::render_single(&global.output, handle.device(), detail, |d| {
                d.device_id.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
