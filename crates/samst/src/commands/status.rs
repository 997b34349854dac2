//! One-shot status read.

use samst_core::{AttributeRow, Hub};
use tabled::Tabled;

use crate::cli::{GlobalOpts, StatusArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct AttributeTableRow {
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "Capability")]
    capability: String,
    #[tabled(rename = "Attribute")]
    attribute: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Unit")]
    unit: String,
}

impl From<&AttributeRow<'_>> for AttributeTableRow {
    fn from(row: &AttributeRow<'_>) -> Self {
        Self {
            component: row.component.to_owned(),
            capability: row.capability.to_owned(),
            attribute: row.attribute.to_owned(),
            value: util::cell(row.value),
            unit: row.unit.unwrap_or_default().to_owned(),
        }
    }
}

/// Which components to show: an explicit one, all of them, or `main`.
fn component_filter(args: &StatusArgs, expose_all: bool) -> Option<String> {
    match args.component {
        Some(ref c) => Some(c.clone()),
        None if args.all || expose_all => None,
        None => Some("main".into()),
    }
}

pub async fn handle(hub: &Hub, args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let handle = util::resolve_device(hub, &args.device).await?;
    let snapshot = util::fresh_snapshot(&handle).await?;

    let filter = component_filter(&args, config::expose_all(global));
    let rows: Vec<AttributeRow<'_>> = snapshot
        .flatten()
        .into_iter()
        .filter(|r| filter.as_deref().is_none_or(|c| r.component == c))
        .collect();

    let out = output::render_list(&global.output, &rows, |r| AttributeTableRow::from(r), |r| {
        format!("{}.{}.{}={}", r.component, r.capability, r.attribute, util::cell(r.value))
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
