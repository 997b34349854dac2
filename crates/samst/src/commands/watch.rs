//! Follow a device's poll loop.
//!
//! The first snapshot is printed in full; later ones only print the
//! attributes whose value changed.

use std::collections::BTreeMap;

use chrono::Local;
use samst_core::{AttributeStore, Hub};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

type Flat = BTreeMap<String, String>;

fn flatten(store: &AttributeStore) -> Flat {
    store
        .flatten()
        .into_iter()
        .map(|r| {
            (
                format!("{}.{}.{}", r.component, r.capability, r.attribute),
                util::cell(r.value),
            )
        })
        .collect()
}

/// Lines for every attribute that is new or changed since `previous`.
fn diff(previous: &Flat, current: &Flat) -> Vec<(String, String)> {
    current
        .iter()
        .filter(|(k, v)| previous.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub async fn handle(hub: &Hub, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let handle = util::resolve_device(hub, &args.device).await?;
    let mut rx = handle.subscribe();
    let mut previous = Flat::new();
    let mut seen = 0usize;

    if !global.quiet {
        eprintln!(
            "Watching {} every {}s (Ctrl-C to stop)",
            handle.device().display_name(),
            handle.coordinator().interval().await.as_secs()
        );
    }

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let Some(snapshot) = rx.borrow_and_update().clone() else {
            continue;
        };
        let current = flatten(&snapshot);
        let stamp = Local::now().format("%H:%M:%S").to_string();
        for (key, value) in diff(&previous, &current) {
            let value = if previous.is_empty() {
                value
            } else {
                output::changed(&value, color)
            };
            println!("{} {key} = {value}", output::dim(&stamp, color));
        }
        previous = current;

        seen += 1;
        if args.count.is_some_and(|n| seen >= n) {
            break;
        }
    }
    Ok(())
}
