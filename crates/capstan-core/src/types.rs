//! Core types for Capstan

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

fn default_instance_count() -> u32 {
    1
}

fn default_container_http_port() -> u16 {
    DEFAULT_CONTAINER_HTTP_PORT
}

/// Maximum length of an app name (it ends up in service and host names)
pub const MAX_APP_NAME_LEN: usize = 50;

/// Lowercase alphanumerics separated by single hyphens
static APP_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("Invalid app name regex")
});

/// Validate an app name. Names become part of service names, image tags and
/// subdomains, so only lowercase letters, digits and single inner hyphens pass.
pub fn validate_app_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_APP_NAME_LEN && APP_NAME_REGEX.is_match(name)
}

/// Like [`validate_app_name`] but returns the error the API reports
pub fn ensure_app_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidAppName("app name is missing".to_string()));
    }
    if !validate_app_name(name) {
        return Err(Error::InvalidAppName(format!(
            "'{}': only lowercase letters, digits and single hyphens are allowed (max {} chars)",
            name, MAX_APP_NAME_LEN
        )));
    }
    Ok(())
}

/// Environment variable passed to the app's containers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Volume mounted into the app's containers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub container_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl Volume {
    pub fn named(volume_name: impl Into<String>, container_path: impl Into<String>) -> Self {
        Self {
            container_path: container_path.into(),
            volume_name: Some(volume_name.into()),
            host_path: None,
            mode: None,
        }
    }
}

/// Host port published for the app
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppTag {
    pub tag_name: String,
}

impl AppTag {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
        }
    }
}

/// Basic auth put in front of the app by the reverse proxy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HttpAuth {
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hashed: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CustomDomain {
    pub public_domain: String,
    #[serde(default)]
    pub has_ssl: bool,
}

/// Token that allows deploying the app without an admin session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppDeployTokenConfig {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_deploy_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepoInfo {
    pub repo: String,
    pub branch: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<String>,
}

/// Git push webhook wiring for the app
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppPushWebhook {
    pub repo_info: RepoInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_webhook_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_version: Option<String>,
}

/// One entry of the append-only deploy history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_image_name: Option<String>,
}

/// Canonical record describing how one application is deployed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppDefinition {
    pub app_name: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub has_persistent_data: bool,
    #[serde(default = "default_instance_count")]
    pub instance_count: u32,
    #[serde(default)]
    pub env_vars: Vec<EnvVar>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub tags: Vec<AppTag>,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub not_expose_as_web_app: bool,
    #[serde(default = "default_container_http_port")]
    pub container_http_port: u16,
    #[serde(default)]
    pub http_auth: Option<HttpAuth>,
    #[serde(default)]
    pub force_ssl: bool,
    #[serde(default)]
    pub custom_domain: Vec<CustomDomain>,
    #[serde(default)]
    pub custom_nginx_config: Option<String>,
    #[serde(default)]
    pub redirect_domain: Option<String>,
    #[serde(default)]
    pub pre_deploy_function: Option<String>,
    #[serde(default)]
    pub service_update_override: Option<String>,
    #[serde(default)]
    pub websocket_support: bool,
    #[serde(default)]
    pub app_deploy_token_config: Option<AppDeployTokenConfig>,
    #[serde(default)]
    pub app_push_webhook: Option<AppPushWebhook>,
    #[serde(default)]
    pub deployed_version: Option<u32>,
    #[serde(default)]
    pub versions: Vec<Version>,
}

impl AppDefinition {
    /// Create a freshly registered app. Fails if the name is not allowed.
    pub fn try_new(
        app_name: impl Into<String>,
        project_id: Option<String>,
        has_persistent_data: bool,
    ) -> Result<Self> {
        let app_name = app_name.into();
        ensure_app_name(&app_name)?;

        Ok(Self {
            app_name,
            project_id,
            description: String::new(),
            has_persistent_data,
            instance_count: 1,
            env_vars: Vec::new(),
            volumes: Vec::new(),
            ports: Vec::new(),
            tags: Vec::new(),
            node_id: None,
            not_expose_as_web_app: false,
            container_http_port: DEFAULT_CONTAINER_HTTP_PORT,
            http_auth: None,
            force_ssl: false,
            custom_domain: Vec::new(),
            custom_nginx_config: None,
            redirect_domain: None,
            pre_deploy_function: None,
            service_update_override: None,
            websocket_support: false,
            app_deploy_token_config: None,
            app_push_webhook: None,
            deployed_version: None,
            versions: Vec::new(),
        })
    }

    pub fn with_instance_count(mut self, count: u32) -> Self {
        self.instance_count = count;
        self
    }

    pub fn with_env_vars(mut self, env_vars: Vec<EnvVar>) -> Self {
        self.env_vars = env_vars;
        self
    }

    pub fn with_volumes(mut self, volumes: Vec<Volume>) -> Self {
        self.volumes = volumes;
        self
    }

    pub fn with_tags(mut self, tags: Vec<AppTag>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_force_ssl(mut self, force_ssl: bool) -> Self {
        self.force_ssl = force_ssl;
        self
    }

    /// The version entry `deployed_version` points at
    pub fn deployed(&self) -> Option<&Version> {
        let current = self.deployed_version?;
        self.versions.iter().find(|v| v.version == current)
    }

    /// Image currently running for this app, if any deploy succeeded
    pub fn deployed_image_name(&self) -> Option<&str> {
        self.deployed()
            .and_then(|v| v.deployed_image_name.as_deref())
    }

    /// Number the next appended version will get
    pub fn next_version(&self) -> u32 {
        self.versions
            .iter()
            .map(|v| v.version + 1)
            .max()
            .unwrap_or(0)
    }

    /// Append a version and point `deployed_version` at it.
    /// Existing entries are never touched.
    pub fn push_version(&mut self, git_hash: Option<String>, image_name: String) -> u32 {
        let version = self.next_version();
        self.versions.push(Version {
            version,
            timestamp: Utc::now(),
            git_hash,
            deployed_image_name: Some(image_name),
        });
        self.deployed_version = Some(version);
        version
    }

    /// Check the invariants a stored definition must hold
    pub fn validate(&self) -> Result<()> {
        ensure_app_name(&self.app_name)?;

        if !self.has_persistent_data && !self.volumes.is_empty() {
            return Err(Error::validation(format!(
                "{} has no persistent data, volumes cannot be set",
                self.app_name
            )));
        }

        if let Some(env) = self.env_vars.iter().find(|e| e.key.trim().is_empty()) {
            return Err(Error::validation(format!(
                "environment variable with value '{}' has an empty key",
                env.value
            )));
        }

        if self.volumes.iter().any(|v| v.container_path.trim().is_empty()) {
            return Err(Error::validation("volume container path must not be empty"));
        }

        if self.ports.iter().any(|p| p.host_port == 0 || p.container_port == 0) {
            return Err(Error::validation("port mappings must use ports between 1 and 65535"));
        }

        if self.container_http_port == 0 {
            return Err(Error::validation("containerHttpPort must be between 1 and 65535"));
        }

        if let Some(auth) = &self.http_auth {
            if auth.user.trim().is_empty() {
                return Err(Error::validation("httpAuth user must not be empty"));
            }
        }

        if let Some(current) = self.deployed_version {
            let matches = self.versions.iter().filter(|v| v.version == current).count();
            if matches != 1 {
                return Err(Error::validation(format!(
                    "deployedVersion {} does not reference exactly one version",
                    current
                )));
            }
        }

        Ok(())
    }
}

/// Group of apps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_project_id: Option<String>,
}

/// App definition annotated with its live build status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppDefinitionInfo {
    #[serde(flatten)]
    pub definition: AppDefinition,
    pub is_app_building: bool,
}

impl AppDefinitionInfo {
    pub fn new(definition: AppDefinition, is_app_building: bool) -> Self {
        Self {
            definition,
            is_app_building,
        }
    }
}
