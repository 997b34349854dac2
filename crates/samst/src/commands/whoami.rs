//! Token check.

use samst_core::{Hub, UserInfo};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

fn detail(user: &UserInfo) -> String {
    format!(
        "Username:  {}\nFull name: {}",
        user.username.as_deref().unwrap_or("-"),
        user.full_name.as_deref().unwrap_or("-")
    )
}

pub async fn handle(hub: &Hub, global: &GlobalOpts) -> Result<(), CliError> {
    let user = hub.validate_token().await?;
    let out = output::render_single(&global.output, &user, detail, |u| {
        u.username.clone().unwrap_or_default()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
