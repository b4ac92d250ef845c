//! Logs command implementation

use anyhow::{bail, Result};
use capstan_core::DEFAULT_LOG_POLL_INTERVAL_MS;
use capstan_logs::LogFollower;
use std::time::Duration;

use crate::cli::LogsArgs;
use crate::client::ApiClient;
use crate::output::{is_json_mode, print_error, print_info, print_json, print_logs, print_success};

/// Poll the build log and print new lines until the build ends.
/// Returns true when the build failed.
pub async fn follow(client: &ApiClient, app_name: &str) -> Result<bool> {
    let mut follower = LogFollower::new();
    let interval = Duration::from_millis(DEFAULT_LOG_POLL_INTERVAL_MS);

    loop {
        let data = client.app_data(app_name, Some(follower.since())).await?;
        print_logs(&follower.process(&data.logs));

        if !data.is_app_building {
            return Ok(data.is_build_failed);
        }
        tokio::time::sleep(interval).await;
    }
}

pub async fn execute(ctx: &super::Context, args: LogsArgs) -> Result<()> {
    let client = ctx.client()?;

    if args.follow {
        if follow(&client, &args.app).await? {
            print_error("Build failed");
            bail!("Build failed");
        }
        print_success("Build finished");
        return Ok(());
    }

    let data = client.app_data(&args.app, None).await?;
    if is_json_mode() {
        print_json(&data);
        return Ok(());
    }

    print_logs(&LogFollower::new().process(&data.logs));
    if data.is_app_building {
        print_info("Build in progress, use --follow to keep watching");
    } else if data.is_build_failed {
        print_error("Last build failed");
    }
    Ok(())
}
