//! Partial and full updates of app definitions
//!
//! Key presence is tracked explicitly. For a non-nullable field `None` means the
//! caller did not send the key. For a nullable field `Some(None)` means the caller
//! sent `null` and the stored value is cleared.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::types::*;

/// Deserialize a key that is present. `null` is rejected for non-nullable fields.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Deserialize a key that is present and may be `null`
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update of the mutable fields of an [`AppDefinition`].
///
/// Server-managed keys (`appName`, `hasPersistentData`, `versions`,
/// `deployedVersion`) are not part of the schema and are ignored when sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDefinitionPatch {
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub instance_count: Option<u32>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub env_vars: Option<Vec<EnvVar>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<Volume>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<PortMapping>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<AppTag>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub node_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub not_expose_as_web_app: Option<bool>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub container_http_port: Option<u16>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub http_auth: Option<Option<HttpAuth>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub force_ssl: Option<bool>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub custom_domain: Option<Vec<CustomDomain>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub custom_nginx_config: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub redirect_domain: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub pre_deploy_function: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub service_update_override: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub websocket_support: Option<bool>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub app_deploy_token_config: Option<Option<AppDeployTokenConfig>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub app_push_webhook: Option<Option<AppPushWebhook>>,
}

impl AppDefinitionPatch {
    /// Parse a request body. Type errors (a negative `instanceCount`, a string
    /// where a list belongs, `null` for a non-nullable key) become validation errors.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::validation(e.to_string()))
    }

    /// True when the patch mentions no field at all
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Full update: every non-nullable mutable field is required.
/// An omitted nullable field is the same as sending `null`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDefinitionUpdate {
    #[serde(default)]
    pub project_id: Option<String>,
    pub description: String,
    pub instance_count: u32,
    pub env_vars: Vec<EnvVar>,
    pub volumes: Vec<Volume>,
    pub ports: Vec<PortMapping>,
    pub tags: Vec<AppTag>,
    #[serde(default)]
    pub node_id: Option<String>,
    pub not_expose_as_web_app: bool,
    pub container_http_port: u16,
    #[serde(default)]
    pub http_auth: Option<HttpAuth>,
    pub force_ssl: bool,
    pub custom_domain: Vec<CustomDomain>,
    #[serde(default)]
    pub custom_nginx_config: Option<String>,
    #[serde(default)]
    pub redirect_domain: Option<String>,
    #[serde(default)]
    pub pre_deploy_function: Option<String>,
    #[serde(default)]
    pub service_update_override: Option<String>,
    pub websocket_support: bool,
    #[serde(default)]
    pub app_deploy_token_config: Option<AppDeployTokenConfig>,
    #[serde(default)]
    pub app_push_webhook: Option<AppPushWebhook>,
}

impl AppDefinitionUpdate {
    /// Parse a request body. A missing required field is a validation error.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::validation(e.to_string()))
    }

    /// The equivalent patch, with every field present
    pub fn into_patch(self) -> AppDefinitionPatch {
        AppDefinitionPatch {
            project_id: Some(self.project_id),
            description: Some(self.description),
            instance_count: Some(self.instance_count),
            env_vars: Some(self.env_vars),
            volumes: Some(self.volumes),
            ports: Some(self.ports),
            tags: Some(self.tags),
            node_id: Some(self.node_id),
            not_expose_as_web_app: Some(self.not_expose_as_web_app),
            container_http_port: Some(self.container_http_port),
            http_auth: Some(self.http_auth),
            force_ssl: Some(self.force_ssl),
            custom_domain: Some(self.custom_domain),
            custom_nginx_config: Some(self.custom_nginx_config),
            redirect_domain: Some(self.redirect_domain),
            pre_deploy_function: Some(self.pre_deploy_function),
            service_update_override: Some(self.service_update_override),
            websocket_support: Some(self.websocket_support),
            app_deploy_token_config: Some(self.app_deploy_token_config),
            app_push_webhook: Some(self.app_push_webhook),
        }
    }
}

fn pick<T: Clone>(patched: &Option<T>, current: &T) -> T {
    match patched {
        Some(value) => value.clone(),
        None => current.clone(),
    }
}

/// Apply `patch` on top of `existing`. Fields the patch does not mention keep
/// their stored value. Server-managed fields are always carried over.
pub fn merge(existing: &AppDefinition, patch: &AppDefinitionPatch) -> AppDefinition {
    AppDefinition {
        app_name: existing.app_name.clone(),
        project_id: pick(&patch.project_id, &existing.project_id),
        description: pick(&patch.description, &existing.description),
        has_persistent_data: existing.has_persistent_data,
        instance_count: pick(&patch.instance_count, &existing.instance_count),
        env_vars: pick(&patch.env_vars, &existing.env_vars),
        volumes: pick(&patch.volumes, &existing.volumes),
        ports: pick(&patch.ports, &existing.ports),
        tags: pick(&patch.tags, &existing.tags),
        node_id: pick(&patch.node_id, &existing.node_id),
        not_expose_as_web_app: pick(&patch.not_expose_as_web_app, &existing.not_expose_as_web_app),
        container_http_port: pick(&patch.container_http_port, &existing.container_http_port),
        http_auth: pick(&patch.http_auth, &existing.http_auth),
        force_ssl: pick(&patch.force_ssl, &existing.force_ssl),
        custom_domain: pick(&patch.custom_domain, &existing.custom_domain),
        custom_nginx_config: pick(&patch.custom_nginx_config, &existing.custom_nginx_config),
        redirect_domain: pick(&patch.redirect_domain, &existing.redirect_domain),
        pre_deploy_function: pick(&patch.pre_deploy_function, &existing.pre_deploy_function),
        service_update_override: pick(
            &patch.service_update_override,
            &existing.service_update_override,
        ),
        websocket_support: pick(&patch.websocket_support, &existing.websocket_support),
        app_deploy_token_config: pick(
            &patch.app_deploy_token_config,
            &existing.app_deploy_token_config,
        ),
        app_push_webhook: pick(&patch.app_push_webhook, &existing.app_push_webhook),
        deployed_version: existing.deployed_version,
        versions: existing.versions.clone(),
    }
}

/// What a change to a definition requires from the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeImpact {
    /// Metadata only, nothing to redeploy
    None,
    /// Reverse proxy config must be regenerated
    ProxyOnly,
    /// The service must be redeployed
    Service,
}

impl ChangeImpact {
    pub fn between(old: &AppDefinition, new: &AppDefinition) -> Self {
        let service = old.instance_count != new.instance_count
            || old.env_vars != new.env_vars
            || old.volumes != new.volumes
            || old.ports != new.ports
            || old.node_id != new.node_id
            || old.pre_deploy_function != new.pre_deploy_function
            || old.service_update_override != new.service_update_override;
        if service {
            return ChangeImpact::Service;
        }

        let proxy = old.force_ssl != new.force_ssl
            || old.custom_domain != new.custom_domain
            || old.custom_nginx_config != new.custom_nginx_config
            || old.redirect_domain != new.redirect_domain
            || old.http_auth != new.http_auth
            || old.websocket_support != new.websocket_support
            || old.not_expose_as_web_app != new.not_expose_as_web_app
            || old.container_http_port != new.container_http_port;
        if proxy {
            return ChangeImpact::ProxyOnly;
        }

        ChangeImpact::None
    }

    pub fn needs_deploy(&self) -> bool {
        *self == ChangeImpact::Service
    }
}

impl std::fmt::Display for ChangeImpact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeImpact::None => write!(f, "none"),
            ChangeImpact::ProxyOnly => write!(f, "proxy-only"),
            ChangeImpact::Service => write!(f, "service"),
        }
    }
}
