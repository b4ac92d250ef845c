//! Health command implementation

use anyhow::{bail, Result};

use crate::output::{is_json_mode, print_error, print_json, print_success};

pub async fn execute(ctx: &super::Context) -> Result<()> {
    let client = ctx.client()?;

    match client.health().await {
        Ok(data) if is_json_mode() => {
            print_json(&data);
            Ok(())
        }
        Ok(data) => {
            let version = data["version"].as_str().unwrap_or("unknown");
            print_success(&format!("Server is healthy (v{}) at {}", version, ctx.url));
            Ok(())
        }
        Err(e) => {
            print_error(&format!("Server is not reachable: {}", e));
            bail!("Server not reachable")
        }
    }
}
