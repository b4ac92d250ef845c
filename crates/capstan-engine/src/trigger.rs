//! Deployment trigger - at most one deployment per app at a time

use capstan_core::{AppDefinition, Error, Result};
use capstan_db::AppDefinitionStore;
use capstan_logs::{BuildLogRegistry, BuildLogWriter};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::deployer::{Deployer, ImageSource};
use crate::locks::AppLocks;

/// Transient build state of one app. Never persisted.
struct BuildState {
    building: bool,
    build_failed: bool,
    generation: u64,
    token: CancellationToken,
    /// Cancelled by the pipeline task when it exits
    done: CancellationToken,
}

/// How a pipeline ended without error
enum Outcome {
    Deployed,
    Cancelled,
}

/// Run one pipeline step unless the deployment is cancelled first.
/// A cancelled step is dropped, which kills any hook it started.
async fn step<T>(token: &CancellationToken, fut: impl std::future::Future<Output = T>) -> Option<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}

/// A deployment that was accepted and is running in the background
pub struct DeploymentHandle {
    app_name: String,
    done: oneshot::Receiver<Result<()>>,
}

impl DeploymentHandle {
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Detached: return right away. Otherwise wait for the pipeline and report
    /// its failure as `DeploymentFailed`.
    pub async fn finish(self, detached: bool) -> Result<()> {
        if detached {
            return Ok(());
        }
        match self.done.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(Error::DeploymentFailed(msg))) => Err(Error::DeploymentFailed(msg)),
            Ok(Err(e)) => Err(Error::deployment(e.to_string())),
            Err(_) => Err(Error::deployment(format!(
                "deployment of {} was dropped",
                self.app_name
            ))),
        }
    }
}

/// Schedules deployments and runs their pipelines
pub struct DeploymentTrigger {
    store: Arc<dyn AppDefinitionStore>,
    deployer: Arc<dyn Deployer>,
    logs: Arc<BuildLogRegistry>,
    locks: Arc<AppLocks>,
    states: RwLock<HashMap<String, BuildState>>,
    next_generation: AtomicU64,
}

impl DeploymentTrigger {
    pub fn new(
        store: Arc<dyn AppDefinitionStore>,
        deployer: Arc<dyn Deployer>,
        logs: Arc<BuildLogRegistry>,
        locks: Arc<AppLocks>,
    ) -> Self {
        Self {
            store,
            deployer,
            logs,
            locks,
            states: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Schedule a deployment and, unless detached, wait for it
    pub async fn schedule_deployment(
        self: &Arc<Self>,
        app_name: &str,
        source: ImageSource,
        detached: bool,
    ) -> Result<()> {
        self.schedule(app_name, source).await?.finish(detached).await
    }

    /// Accept a deployment for `app_name` and start its pipeline.
    ///
    /// Fails with `BuildInProgress` when the app already has one in flight,
    /// and with `DeploymentFailed` when the deployer rejects the source.
    pub async fn schedule(
        self: &Arc<Self>,
        app_name: &str,
        source: ImageSource,
    ) -> Result<DeploymentHandle> {
        let app = self
            .store
            .get(app_name)
            .await?
            .ok_or_else(|| Error::AppNotFound(app_name.to_string()))?;

        let (generation, token, done) = self.claim(app_name)?;

        if let Err(e) = self.deployer.prepare(&app, &source).await {
            self.release(app_name, generation, None);
            warn!("Deployment of {} rejected: {}", app_name, e);
            return Err(match e {
                Error::DeploymentFailed(_) => e,
                other => Error::deployment(other.to_string()),
            });
        }

        info!(
            "Deployment of {} scheduled from {} (generation {})",
            app_name,
            source.describe(),
            generation
        );

        let (tx, rx) = oneshot::channel();
        let this = Arc::clone(self);
        let log = self.logs.writer(app_name);
        let name = app_name.to_string();

        tokio::spawn(async move {
            let _done = done.drop_guard();
            let result = match this.run_pipeline(&app, &source, &token, &log).await {
                Ok(Outcome::Deployed) => {
                    this.release(&name, generation, Some(true));
                    Ok(())
                }
                Ok(Outcome::Cancelled) => {
                    log.line("Deploy cancelled");
                    info!("Deploy of {} was cancelled", name);
                    this.release(&name, generation, None);
                    Err(Error::deployment(format!("deployment of {} was cancelled", name)))
                }
                Err(e) => {
                    log.line("----------------------");
                    log.line("Deploy failed!");
                    log.line(e.to_string());
                    error!("Deploy of {} failed: {}", name, e);
                    this.release(&name, generation, Some(false));
                    Err(e)
                }
            };

            // The receiver is gone for detached deployments
            let _ = tx.send(result);
        });

        Ok(DeploymentHandle {
            app_name: app_name.to_string(),
            done: rx,
        })
    }

    fn claim(&self, app_name: &str) -> Result<(u64, CancellationToken, CancellationToken)> {
        let mut states = self.states.write();
        if states.get(app_name).map(|s| s.building).unwrap_or(false) {
            return Err(Error::BuildInProgress(app_name.to_string()));
        }

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        let done = CancellationToken::new();
        states.insert(
            app_name.to_string(),
            BuildState {
                building: true,
                build_failed: false,
                generation,
                token: token.clone(),
                done: done.clone(),
            },
        );
        Ok((generation, token, done))
    }

    /// Clear the building flag, unless a newer deployment or a cancel took over
    fn release(&self, app_name: &str, generation: u64, succeeded: Option<bool>) {
        let mut states = self.states.write();
        if let Some(state) = states.get_mut(app_name) {
            if state.generation == generation {
                state.building = false;
                if let Some(ok) = succeeded {
                    state.build_failed = !ok;
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        app: &AppDefinition,
        source: &ImageSource,
        token: &CancellationToken,
        log: &BuildLogWriter,
    ) -> Result<Outcome> {
        let app_name = &app.app_name;
        log.line(format!("Deploying {} from {}", app_name, source.describe()));

        let Some(image) = step(token, self.deployer.build(app, source, log)).await else {
            return Ok(Outcome::Cancelled);
        };
        let image = image?;

        match step(token, self.deployer.apply(app, &image, log)).await {
            Some(applied) => applied?,
            None => return Ok(Outcome::Cancelled),
        }

        if source.creates_version() {
            let Some(_guard) = step(token, self.locks.lock(app_name)).await else {
                return Ok(Outcome::Cancelled);
            };
            match self.store.get(app_name).await? {
                Some(mut current) => {
                    let version = current.push_version(
                        source.git_hash().map(str::to_string),
                        image.clone(),
                    );
                    self.store.save(&current).await?;
                    log.line(format!("Deployed version {} ({})", version, image));
                }
                None => {
                    warn!("{} was deleted during its deployment", app_name);
                    return Ok(Outcome::Cancelled);
                }
            }
        }

        // The new image is live and recorded, a stale proxy does not undo that
        let apps = self.store.get_all().await?;
        match step(token, self.deployer.reload_proxy(&apps)).await {
            Some(Err(e)) => {
                log.line(format!("Proxy reload failed: {}", e));
                warn!("Proxy reload after deploying {} failed: {}", app_name, e);
            }
            Some(Ok(())) => {}
            None => return Ok(Outcome::Cancelled),
        }

        log.line(format!("Deployed {} successfully", app_name));
        info!("Deployed {} with image {}", app_name, image);
        Ok(Outcome::Deployed)
    }

    /// Discard the in-flight deployment of `app_name` and forget its state.
    /// Returns once its pipeline has stopped, so no step of it runs afterwards.
    pub async fn cancel(&self, app_name: &str) {
        let Some(state) = self.states.write().remove(app_name) else {
            return;
        };
        state.token.cancel();
        if state.building {
            info!("Cancelled deployment of {}", app_name);
        }
        state.done.cancelled().await;
    }

    pub fn is_building(&self, app_name: &str) -> bool {
        self.states
            .read()
            .get(app_name)
            .map(|s| s.building)
            .unwrap_or(false)
    }

    pub fn build_failed(&self, app_name: &str) -> bool {
        self.states
            .read()
            .get(app_name)
            .map(|s| s.build_failed)
            .unwrap_or(false)
    }

    pub fn logs(&self) -> &Arc<BuildLogRegistry> {
        &self.logs
    }
}
