//! Command dispatch: bridges CLI args -> hub operations -> output formatting.

pub mod apps;
pub mod command;
pub mod config_cmd;
pub mod devices;
pub mod frame;
pub mod local_soundbar;
pub mod probe;
pub mod soundbar;
pub mod status;
pub mod util;
pub mod watch;
pub mod whoami;

use samst_core::Hub;

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Connect a hub for one cloud command and run it.
///
/// Only `watch` keeps the poll loops running. Everything else is one-shot:
/// the handler refreshes explicitly and the hub is shut down afterwards.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let mut hub_config = config::build_hub_config(global)?;
    hub_config.background = matches!(cmd, Command::Watch(_));
    // Definitions are only needed to reject unknown commands up front.
    hub_config.fetch_capability_defs = matches!(cmd, Command::Command(_));
    if let Command::Devices(ref args) = cmd {
        hub_config.include_non_samsung |= devices::wants_all(args);
    }
    if let Command::Watch(ref args) = cmd {
        if let Some(secs) = args.interval {
            hub_config.poll.scan_interval = std::time::Duration::from_secs(secs);
        }
    }

    let hub = Hub::connect(hub_config)?;
    let result = match cmd {
        Command::Devices(args) => devices::handle(&hub, args, global).await,
        Command::Status(args) => status::handle(&hub, args, global).await,
        Command::Command(args) => command::handle(&hub, args, global).await,
        Command::Watch(args) => watch::handle(&hub, args, global).await,
        Command::Probe(args) => probe::handle(&hub, args, global).await,
        Command::Apps(args) => apps::handle(&hub, args, global).await,
        Command::Soundbar(args) => soundbar::handle(&hub, args, global).await,
        Command::Whoami => whoami::handle(&hub, global).await,
        // Handled before dispatch
        Command::Config(_)
        | Command::Completions(_)
        | Command::Frame(_)
        | Command::LocalSoundbar(_) => unreachable!(),
    };
    hub.shutdown().await;
    result
}
