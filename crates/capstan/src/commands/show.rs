//! Show command implementation

use anyhow::Result;

use crate::output::print_app_detail;

pub async fn execute(ctx: &super::Context, app_name: &str) -> Result<()> {
    let client = ctx.client()?;
    let view = client.apps().await?;

    let info = view
        .app_definitions
        .iter()
        .find(|a| a.definition.app_name == app_name)
        .ok_or_else(|| anyhow::anyhow!("App not found: {}", app_name))?;

    print_app_detail(info, &view.root_domain);
    Ok(())
}
