//! Patch command implementation

use anyhow::{bail, Context as _, Result};

use crate::cli::PatchArgs;
use crate::output::print_success;

/// Read the JSON object from `--data` or `--file`
fn read_fields(args: &PatchArgs) -> Result<serde_json::Value> {
    let raw = match (&args.data, &args.file) {
        (Some(data), _) => data.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => bail!("Pass the fields with --data or --file"),
    };

    let fields: serde_json::Value = serde_json::from_str(&raw).context("Fields are not valid JSON")?;
    if !fields.is_object() {
        bail!("Fields must be a JSON object");
    }
    Ok(fields)
}

pub async fn execute(ctx: &super::Context, args: PatchArgs) -> Result<()> {
    let fields = read_fields(&args)?;
    let message = ctx.client()?.patch(&args.app, fields, args.full).await?;
    print_success(&format!("{}: {}", args.app, message));
    Ok(())
}
