mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;
    match command {
        // Config commands never touch the network
        Command::Config(args) => commands::config_cmd::handle(args, &global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "samst", &mut std::io::stdout());
            Ok(())
        }

        // The app catalog is static
        Command::Apps(cli::AppsArgs {
            command: cli::AppsCommand::List,
        }) => {
            commands::apps::list(&global);
            Ok(())
        }

        // LAN commands talk to one host directly
        Command::Frame(args) => commands::frame::handle(args, &global).await,
        Command::LocalSoundbar(args) => commands::local_soundbar::handle(args, &global).await,

        cmd => {
            tracing::debug!(command = ?cmd, "dispatching cloud command");
            commands::dispatch(cmd, &global).await
        }
    }
}
