//! App definition handler - register, patch, update, list, delete and deploy

use capstan_core::{
    ensure_app_name, merge, AppDefinition, AppDefinitionInfo, AppDefinitionPatch,
    AppDefinitionUpdate, ChangeImpact, Error, Project, Result, StatusCode,
};
use capstan_db::{AppDefinitionStore, ProjectStore};
use capstan_logs::{BuildLogRegistry, LogChunk};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::deployer::{Deployer, ImageSource};
use crate::locks::AppLocks;
use crate::trigger::DeploymentTrigger;

/// Status and message of a successful operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub status: StatusCode,
    pub description: String,
}

impl Ack {
    pub fn ok(description: impl Into<String>) -> Self {
        Self {
            status: StatusCode::Ok,
            description: description.into(),
        }
    }

    pub fn deploy_started() -> Self {
        Self {
            status: StatusCode::OkDeployStarted,
            description: "Deploy is started".to_string(),
        }
    }
}

/// Every app plus the settings a dashboard needs to render them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppDefinitionsView {
    pub app_definitions: Vec<AppDefinitionInfo>,
    pub root_domain: String,
    pub default_nginx_config: String,
}

/// Live build status and log of one app
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    pub is_app_building: bool,
    pub is_build_failed: bool,
    pub logs: LogChunk,
}

/// Handler wiring
pub struct HandlerConfig {
    pub root_domain: String,
    pub default_nginx_config: String,
}

/// Orchestrates every mutation of app definitions. All writes to one app go
/// through that app's lock.
pub struct AppDefinitionHandler {
    apps: Arc<dyn AppDefinitionStore>,
    projects: Arc<dyn ProjectStore>,
    deployer: Arc<dyn Deployer>,
    trigger: Arc<DeploymentTrigger>,
    logs: Arc<BuildLogRegistry>,
    locks: Arc<AppLocks>,
    config: HandlerConfig,
}

impl AppDefinitionHandler {
    pub fn new(
        apps: Arc<dyn AppDefinitionStore>,
        projects: Arc<dyn ProjectStore>,
        deployer: Arc<dyn Deployer>,
        logs: Arc<BuildLogRegistry>,
        config: HandlerConfig,
    ) -> Self {
        let locks = Arc::new(AppLocks::new());
        let trigger = Arc::new(DeploymentTrigger::new(
            apps.clone(),
            deployer.clone(),
            logs.clone(),
            locks.clone(),
        ));
        Self {
            apps,
            projects,
            deployer,
            trigger,
            logs,
            locks,
            config,
        }
    }

    pub fn trigger(&self) -> &Arc<DeploymentTrigger> {
        &self.trigger
    }

    /// Create an app and deploy the placeholder image on it
    pub async fn register_app_definition(
        &self,
        app_name: &str,
        project_id: Option<String>,
        has_persistent_data: bool,
        detached: bool,
    ) -> Result<Ack> {
        ensure_app_name(app_name)?;
        let guard = self.locks.lock(app_name).await;

        if self.apps.exists(app_name).await? {
            return Err(Error::AppAlreadyExists(app_name.to_string()));
        }
        if let Some(id) = &project_id {
            self.ensure_project(id).await?;
        }

        let definition = AppDefinition::try_new(app_name, project_id, has_persistent_data)?;
        self.apps.insert(&definition).await?;
        info!("Registered app {}", app_name);

        let handle = match self.trigger.schedule(app_name, ImageSource::Placeholder).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Rolling back registration of {}: {}", app_name, e);
                self.rollback_registration(app_name).await;
                return Err(e);
            }
        };
        drop(guard);

        if let Err(e) = handle.finish(detached).await {
            warn!("Initial deploy of {} failed, rolling back: {}", app_name, e);
            let _guard = self.locks.lock(app_name).await;
            self.rollback_registration(app_name).await;
            return Err(e);
        }

        Ok(Ack::ok("App Definition Saved"))
    }

    async fn rollback_registration(&self, app_name: &str) {
        self.trigger.cancel(app_name).await;
        if let Err(e) = self.deployer.remove(app_name).await {
            warn!("Failed to remove service of {}: {}", app_name, e);
        }
        if let Err(e) = self.apps.delete(app_name).await {
            warn!("Failed to delete record of {}: {}", app_name, e);
        }
        self.logs.remove(app_name);
    }

    /// Merge a partial update onto the stored definition
    pub async fn patch_app_definition(
        &self,
        app_name: &str,
        patch: AppDefinitionPatch,
    ) -> Result<Ack> {
        self.apply_change(app_name, patch).await?;
        Ok(Ack::ok("Updated App Definition Saved"))
    }

    /// Replace every mutable field of the stored definition
    pub async fn update_app_definition(
        &self,
        app_name: &str,
        update: AppDefinitionUpdate,
    ) -> Result<Ack> {
        self.apply_change(app_name, update.into_patch()).await?;
        Ok(Ack::ok("Updated App Definition Saved"))
    }

    async fn apply_change(&self, app_name: &str, patch: AppDefinitionPatch) -> Result<ChangeImpact> {
        ensure_app_name(app_name)?;
        let _guard = self.locks.lock(app_name).await;

        let existing = self
            .apps
            .get(app_name)
            .await?
            .ok_or_else(|| Error::AppNotFound(app_name.to_string()))?;

        let merged = merge(&existing, &patch);
        merged.validate()?;
        if let Some(Some(id)) = &patch.project_id {
            self.ensure_project(id).await?;
        }

        let impact = ChangeImpact::between(&existing, &merged);
        if impact.needs_deploy() && self.trigger.is_building(app_name) {
            return Err(Error::BuildInProgress(app_name.to_string()));
        }

        self.apps.save(&merged).await?;
        info!("Saved definition of {} (impact: {})", app_name, impact);

        match impact {
            ChangeImpact::Service => {
                if let Err(e) = self.trigger.schedule(app_name, ImageSource::Current).await {
                    warn!("Restoring previous definition of {}: {}", app_name, e);
                    self.apps.save(&existing).await?;
                    return Err(e);
                }
            }
            ChangeImpact::ProxyOnly => self.reload_proxy().await,
            ChangeImpact::None => {}
        }

        Ok(impact)
    }

    /// Point-in-time view of every app with its live build flag
    pub async fn get_all_app_definitions(&self) -> Result<AppDefinitionsView> {
        let app_definitions = self
            .apps
            .get_all()
            .await?
            .into_iter()
            .map(|def| {
                let building = self.trigger.is_building(&def.app_name);
                AppDefinitionInfo::new(def, building)
            })
            .collect();

        Ok(AppDefinitionsView {
            app_definitions,
            root_domain: self.config.root_domain.clone(),
            default_nginx_config: self.config.default_nginx_config.clone(),
        })
    }

    /// Build status plus the build log. With `since`, only newer lines.
    pub async fn get_app_data(&self, app_name: &str, since: Option<i64>) -> Result<AppData> {
        ensure_app_name(app_name)?;
        if !self.apps.exists(app_name).await? {
            return Err(Error::AppNotFound(app_name.to_string()));
        }

        let logs = match since {
            Some(last_seen) => self.logs.fetch_since(app_name, last_seen),
            None => self.logs.snapshot(app_name),
        };

        Ok(AppData {
            is_app_building: self.trigger.is_building(app_name),
            is_build_failed: self.trigger.build_failed(app_name),
            logs,
        })
    }

    /// Deploy a new image or Dockerfile
    pub async fn deploy(&self, app_name: &str, source: ImageSource, detached: bool) -> Result<Ack> {
        ensure_app_name(app_name)?;
        let guard = self.locks.lock(app_name).await;
        let handle = self.trigger.schedule(app_name, source).await?;
        drop(guard);

        handle.finish(detached).await?;
        if detached {
            Ok(Ack::deploy_started())
        } else {
            Ok(Ack::ok("Deploy is done"))
        }
    }

    /// Remove an app, its service and its build log
    pub async fn delete_app_definition(&self, app_name: &str) -> Result<Ack> {
        ensure_app_name(app_name)?;
        let guard = self.locks.lock(app_name).await;

        if !self.apps.exists(app_name).await? {
            return Err(Error::AppNotFound(app_name.to_string()));
        }

        self.trigger.cancel(app_name).await;
        self.deployer.remove(app_name).await?;
        self.apps.delete(app_name).await?;
        self.logs.remove(app_name);
        info!("Deleted app {}", app_name);

        drop(guard);
        self.locks.prune(app_name);
        self.reload_proxy().await;

        Ok(Ack::ok("App is deleted"))
    }

    pub async fn register_project(
        &self,
        name: &str,
        description: String,
        parent_project_id: Option<String>,
    ) -> Result<Project> {
        if name.trim().is_empty() {
            return Err(Error::validation("project name must not be empty"));
        }
        if let Some(parent) = &parent_project_id {
            self.ensure_project(parent).await?;
        }

        let project = Project {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            description,
            parent_project_id,
        };
        self.projects.insert_project(&project).await?;
        info!("Registered project {} ({})", project.name, project.id);
        Ok(project)
    }

    pub async fn get_all_projects(&self) -> Result<Vec<Project>> {
        self.projects.get_all_projects().await
    }

    async fn ensure_project(&self, id: &str) -> Result<()> {
        match self.projects.get_project(id).await? {
            Some(_) => Ok(()),
            None => Err(Error::ProjectNotFound(id.to_string())),
        }
    }

    /// Regenerate the proxy config. Failures are logged only, the change
    /// that caused the reload is already committed.
    pub async fn reload_proxy(&self) {
        let apps = match self.apps.get_all().await {
            Ok(apps) => apps,
            Err(e) => {
                warn!("Cannot load apps for proxy reload: {}", e);
                return;
            }
        };
        if let Err(e) = self.deployer.reload_proxy(&apps).await {
            warn!("Proxy reload failed: {}", e);
        }
    }
}
