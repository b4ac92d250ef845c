//! Register command implementation

use anyhow::{bail, Result};
use capstan_core::validate_app_name;

use crate::cli::RegisterArgs;
use crate::output::{print_info, print_success};

pub async fn execute(ctx: &super::Context, args: RegisterArgs) -> Result<()> {
    if !validate_app_name(&args.app) {
        bail!(
            "Invalid app name '{}': use lowercase letters, digits and single dashes",
            args.app
        );
    }

    if !args.detached {
        print_info(&format!("Registering {} and deploying the placeholder...", args.app));
    }

    let message = ctx
        .client()?
        .register(&args.app, args.project.as_deref(), args.persistent, args.detached)
        .await?;

    print_success(&format!("{}: {}", args.app, message));
    Ok(())
}
