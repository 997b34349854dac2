//! Raw capability commands.

use samst_core::{CommandRequest, Hub};

use crate::cli::{CommandArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(hub: &Hub, args: CommandArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let request =
        CommandRequest::from_json_args(&args.component, &args.capability, &args.command, &args.args)?;
    let handle = util::resolve_device(hub, &args.device).await?;
    handle.send(&request).await?;
    output::done(
        &format!(
            "{}.{} sent to {}",
            request.capability,
            request.command,
            handle.device().display_name()
        ),
        global.quiet,
    );
    Ok(())
}
