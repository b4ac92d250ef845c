//! Apps command implementation

use anyhow::Result;

use crate::output::print_apps_table;

pub async fn execute(ctx: &super::Context) -> Result<()> {
    let view = ctx.client()?.apps().await?;
    print_apps_table(&view.app_definitions, &view.root_domain);
    Ok(())
}
