//! Deployer that runs operator-configured shell hooks

use async_trait::async_trait;
use capstan_core::{image_name, service_name, AppDefinition, Error, HooksConfig, Result};
use capstan_logs::BuildLogWriter;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::deployer::{Deployer, ImageSource};

/// Runs each pipeline step as `sh -c <hook>`.
///
/// Hooks get the app in `CAPSTAN_*` environment variables. Their output is
/// streamed into the app's build log. The build hook reads the Dockerfile
/// from stdin and must tag the result as `$CAPSTAN_IMAGE_NAME`.
pub struct CmdDeployer {
    hooks: HooksConfig,
    root_domain: String,
    default_nginx_config: String,
}

impl CmdDeployer {
    pub fn new(hooks: HooksConfig, root_domain: impl Into<String>) -> Self {
        Self {
            hooks,
            root_domain: root_domain.into(),
            default_nginx_config: String::new(),
        }
    }

    pub fn with_default_nginx_config(mut self, config: impl Into<String>) -> Self {
        self.default_nginx_config = config.into();
        self
    }

    fn app_env(&self, app: &AppDefinition) -> Result<Vec<(String, String)>> {
        Ok(vec![
            ("CAPSTAN_APP_NAME".to_string(), app.app_name.clone()),
            ("CAPSTAN_SERVICE_NAME".to_string(), service_name(&app.app_name)),
            ("CAPSTAN_INSTANCE_COUNT".to_string(), app.instance_count.to_string()),
            ("CAPSTAN_ROOT_DOMAIN".to_string(), self.root_domain.clone()),
            ("CAPSTAN_APP_DEFINITION".to_string(), serde_json::to_string(app)?),
        ])
    }

    async fn run_hook(
        &self,
        hook: &str,
        script: &str,
        env: Vec<(String, String)>,
        stdin: Option<String>,
        log: Option<&BuildLogWriter>,
    ) -> Result<()> {
        info!("Running {} hook", hook);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(script)
            .envs(env)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::deployment(format!("Failed to run {} hook: {}", hook, e)))?;

        let captures: Vec<_> = [
            child.stdout.take().map(|s| capture(BufReader::new(s), log.cloned())),
            child.stderr.take().map(|s| capture(BufReader::new(s), log.cloned())),
        ]
        .into_iter()
        .flatten()
        .collect();

        // Fed from its own task so a hook that never reads cannot stall the timeout
        let feeder = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => {
                let hook = hook.to_string();
                Some(tokio::spawn(async move {
                    // Hooks are free to ignore their input
                    if let Err(e) = pipe.write_all(input.as_bytes()).await {
                        debug!("{} hook did not read its input: {}", hook, e);
                    }
                }))
            }
            _ => None,
        };

        let timeout = Duration::from_secs(self.hooks.timeout_secs);
        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                child.kill().await.ok();
                // Grandchildren may still hold the pipes open
                feeder.iter().for_each(|f| f.abort());
                captures.iter().for_each(|c| c.abort());
                return Err(Error::Timeout(format!(
                    "{} hook did not finish within {}s",
                    hook, self.hooks.timeout_secs
                )));
            }
        };

        if let Some(feeder) = feeder {
            feeder.abort();
        }
        for handle in captures {
            handle.await.ok();
        }

        if !status.success() {
            return Err(Error::deployment(format!("{} hook failed: {}", hook, status)));
        }
        Ok(())
    }
}

/// Forward every line of a hook's output to the build log
fn capture<R>(reader: BufReader<R>, log: Option<BuildLogWriter>) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = reader.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match &log {
                Some(log) => log.line(line),
                None => debug!("hook: {}", line),
            }
        }
    })
}

#[async_trait]
impl Deployer for CmdDeployer {
    async fn prepare(&self, _app: &AppDefinition, source: &ImageSource) -> Result<()> {
        match source {
            ImageSource::Image { image_name, .. } if image_name.trim().is_empty() => {
                return Err(Error::deployment("image name is empty"));
            }
            ImageSource::Dockerfile { content, .. } => {
                if content.trim().is_empty() {
                    return Err(Error::deployment("Dockerfile is empty"));
                }
                if self.hooks.build.is_none() {
                    return Err(Error::deployment(
                        "no build hook configured, cannot build from a Dockerfile",
                    ));
                }
            }
            _ => {}
        }

        let configured = [&self.hooks.build, &self.hooks.apply, &self.hooks.remove, &self.hooks.proxy]
            .iter()
            .any(|h| h.is_some());
        if configured && which::which("sh").is_err() {
            return Err(Error::deployment("sh not found in PATH"));
        }
        Ok(())
    }

    async fn build(
        &self,
        app: &AppDefinition,
        source: &ImageSource,
        log: &BuildLogWriter,
    ) -> Result<String> {
        if let Some(image) = source.fixed_image(app) {
            log.line(format!("Using image {}", image));
            return Ok(image);
        }

        let (ImageSource::Dockerfile { content, .. }, Some(script)) = (source, &self.hooks.build)
        else {
            return Err(Error::deployment("nothing to build"));
        };

        let image = image_name(&app.app_name, app.next_version());
        let mut env = self.app_env(app)?;
        env.push(("CAPSTAN_IMAGE_NAME".to_string(), image.clone()));
        if let Some(hash) = source.git_hash() {
            env.push(("CAPSTAN_GIT_HASH".to_string(), hash.to_string()));
        }

        log.line(format!("Building {}", image));
        self.run_hook("build", script, env, Some(content.clone()), Some(log))
            .await?;
        Ok(image)
    }

    async fn apply(
        &self,
        app: &AppDefinition,
        image_name: &str,
        log: &BuildLogWriter,
    ) -> Result<()> {
        let Some(script) = &self.hooks.apply else {
            log.line("No apply hook configured, skipping service update");
            return Ok(());
        };

        let mut env = self.app_env(app)?;
        env.push(("CAPSTAN_IMAGE_NAME".to_string(), image_name.to_string()));

        log.line(format!("Updating service {}", service_name(&app.app_name)));
        self.run_hook("apply", script, env, None, Some(log)).await
    }

    async fn remove(&self, app_name: &str) -> Result<()> {
        let Some(script) = &self.hooks.remove else {
            debug!("No remove hook configured, skipping removal of {}", app_name);
            return Ok(());
        };

        let env = vec![
            ("CAPSTAN_APP_NAME".to_string(), app_name.to_string()),
            ("CAPSTAN_SERVICE_NAME".to_string(), service_name(app_name)),
        ];
        self.run_hook("remove", script, env, None, None).await
    }

    async fn reload_proxy(&self, apps: &[AppDefinition]) -> Result<()> {
        let Some(script) = &self.hooks.proxy else {
            debug!("No proxy hook configured, skipping proxy reload");
            return Ok(());
        };

        let env = vec![
            ("CAPSTAN_ROOT_DOMAIN".to_string(), self.root_domain.clone()),
            (
                "CAPSTAN_DEFAULT_NGINX_CONFIG".to_string(),
                self.default_nginx_config.clone(),
            ),
        ];
        let result = self
            .run_hook("proxy", script, env, Some(serde_json::to_string(apps)?), None)
            .await;
        if let Err(e) = &result {
            warn!("Proxy reload failed: {}", e);
        }
        result
    }

    fn name(&self) -> &'static str {
        "cmd"
    }
}
