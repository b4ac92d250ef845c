//! Delete command implementation

use anyhow::{bail, Result};
use dialoguer::Confirm;

use crate::output::{print_info, print_success};

pub async fn execute(ctx: &super::Context, app_name: &str, yes: bool) -> Result<()> {
    if !yes {
        if !atty::is(atty::Stream::Stdin) {
            bail!("Refusing to delete {} without --yes in a non-interactive shell", app_name);
        }
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete {} and its service? This cannot be undone",
                app_name
            ))
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirmed {
            print_info("Aborted");
            return Ok(());
        }
    }

    let message = ctx.client()?.delete(app_name).await?;
    print_success(&format!("{}: {}", app_name, message));
    Ok(())
}
