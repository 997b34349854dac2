//! Sound-mode validation on demand.

use samst_core::{Hub, ProbeOutcome};
use serde::Serialize;

use crate::cli::{GlobalOpts, ProbeArgs};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct ProbeReport {
    device_id: String,
    outcome: String,
    validated: Option<Vec<String>>,
}

fn describe(outcome: &ProbeOutcome) -> String {
    match outcome {
        ProbeOutcome::Skipped(reason) => format!("skipped ({reason})"),
        ProbeOutcome::Cached => "cached".into(),
        ProbeOutcome::Validated(n) => format!("validated {n} modes"),
    }
}

fn detail(report: &ProbeReport) -> String {
    let modes = report
        .validated
        .as_ref()
        .map_or_else(|| "-".into(), |m| m.join(", "));
    format!(
        "Device:    {}\nOutcome:   {}\nValidated: {modes}",
        report.device_id, report.outcome
    )
}

pub async fn handle(hub: &Hub, args: ProbeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let handle = util::resolve_device(hub, &args.device).await?;
    let prober = handle.prober().ok_or_else(|| CliError::Unsupported {
        operation: "sound mode probe".into(),
    })?;
    if args.force {
        prober.invalidate().await;
    }

    let snapshot = util::fresh_snapshot(&handle).await?;
    let outcome = prober.probe(&snapshot).await?;

    let report = ProbeReport {
        device_id: handle.device_id().to_owned(),
        outcome: describe(&outcome),
        validated: prober.validated_modes(),
    };
    let out = output::render_single(&global.output, &report, detail, |r| {
        r.validated.clone().unwrap_or_default().join("\n")
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
