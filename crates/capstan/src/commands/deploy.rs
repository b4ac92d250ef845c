//! Deploy command implementation

use anyhow::{bail, Context as _, Result};

use crate::cli::DeployArgs;
use crate::output::{print_error, print_info, print_success};

/// Request body for the chosen source
fn build_body(args: &DeployArgs) -> Result<serde_json::Value> {
    let mut body = serde_json::Map::new();

    match (&args.image, &args.dockerfile) {
        (Some(image), None) => {
            body.insert("imageName".to_string(), image.clone().into());
        }
        (None, Some(path)) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            body.insert("dockerfileContent".to_string(), content.into());
        }
        _ => bail!("Pass exactly one of --image or --dockerfile"),
    }

    if let Some(hash) = &args.git_hash {
        body.insert("gitHash".to_string(), hash.clone().into());
    }
    Ok(serde_json::Value::Object(body))
}

pub async fn execute(ctx: &super::Context, args: DeployArgs) -> Result<()> {
    let body = build_body(&args)?;
    let client = ctx.client()?;

    // Following needs the call to return as soon as the build is scheduled
    let detached = args.detached || args.follow;
    if !detached {
        print_info(&format!("Deploying {}...", args.app));
    }

    let message = client.deploy(&args.app, body, detached).await?;
    print_success(&format!("{}: {}", args.app, message));

    if args.follow {
        if super::logs::follow(&client, &args.app).await? {
            print_error("Deploy failed");
            bail!("Deploy failed");
        }
        print_success("Deploy finished");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(image: Option<&str>, dockerfile: Option<std::path::PathBuf>) -> DeployArgs {
        DeployArgs {
            app: "web".to_string(),
            image: image.map(str::to_string),
            dockerfile,
            git_hash: Some("abc123".to_string()),
            detached: false,
            follow: false,
        }
    }

    #[test]
    fn test_image_body() {
        let body = build_body(&args(Some("nginx:1.25"), None)).unwrap();
        assert_eq!(body["imageName"], "nginx:1.25");
        assert_eq!(body["gitHash"], "abc123");
        assert!(body.get("dockerfileContent").is_none());
    }

    #[test]
    fn test_dockerfile_body() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"FROM nginx\n").unwrap();
        let body = build_body(&args(None, Some(file.path().to_path_buf()))).unwrap();
        assert_eq!(body["dockerfileContent"], "FROM nginx\n");
    }

    #[test]
    fn test_missing_dockerfile() {
        let result = build_body(&args(None, Some("/nonexistent/Dockerfile".into())));
        assert!(result.is_err());
    }
}
