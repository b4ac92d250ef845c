//! HTTP client for the Capstan API

use anyhow::{bail, Context, Result};
use capstan_core::{AppDefinitionInfo, Project, StatusCode};
use capstan_logs::LogChunk;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Response envelope shared by every endpoint
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub status: u32,
    pub description: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.status == StatusCode::Ok.code() || self.status == StatusCode::OkDeployStarted.code()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppsView {
    pub app_definitions: Vec<AppDefinitionInfo>,
    pub root_domain: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    pub is_app_building: bool,
    pub is_build_failed: bool,
    pub logs: LogChunk,
}

#[derive(Debug, Deserialize)]
struct ProjectList {
    projects: Vec<Project>,
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        // Builds can run for a long time on non-detached calls
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(capstan_core::DEFAULT_HOOK_TIMEOUT_SECS * 2))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Envelope<T>> {
        debug!("{} {}", method, path);
        let mut request = self.client.request(method, self.url(path));
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Cannot reach Capstan server at {}", self.base_url))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            bail!("Unauthorized: check --api-key or CAPSTAN_API_KEY");
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .context("Invalid response from server")?;

        if !envelope.is_success() {
            bail!("{} (status {})", envelope.description, envelope.status);
        }
        Ok(envelope)
    }

    /// Call an endpoint that answers with a status message only
    async fn ack(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<String> {
        let envelope: Envelope<serde_json::Value> = self.call(method, path, body).await?;
        Ok(envelope.description)
    }

    async fn data<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let envelope: Envelope<T> = self.call(Method::GET, path, None).await?;
        envelope
            .data
            .ok_or_else(|| anyhow::anyhow!("Server response has no data"))
    }

    pub async fn health(&self) -> Result<serde_json::Value> {
        self.data("/api/health").await
    }

    pub async fn apps(&self) -> Result<AppsView> {
        self.data("/api/v2/user/apps/appDefinitions").await
    }

    pub async fn register(
        &self,
        app_name: &str,
        project_id: Option<&str>,
        has_persistent_data: bool,
        detached: bool,
    ) -> Result<String> {
        let body = serde_json::json!({
            "appName": app_name,
            "projectId": project_id,
            "hasPersistentData": has_persistent_data,
        });
        let path = format!(
            "/api/v2/user/apps/appDefinitions/register{}",
            detached_query(detached)
        );
        self.ack(Method::POST, &path, Some(&body)).await
    }

    /// Merge `fields` into the app, or replace all mutable fields when `full`
    pub async fn patch(&self, app_name: &str, fields: serde_json::Value, full: bool) -> Result<String> {
        let mut body = match fields {
            serde_json::Value::Object(map) => map,
            _ => bail!("App fields must be a JSON object"),
        };
        body.insert("appName".to_string(), app_name.into());

        let method = if full { Method::PUT } else { Method::PATCH };
        self.ack(
            method,
            "/api/v2/user/apps/appDefinitions",
            Some(&serde_json::Value::Object(body)),
        )
        .await
    }

    pub async fn deploy(&self, app_name: &str, body: serde_json::Value, detached: bool) -> Result<String> {
        let path = format!(
            "/api/v2/user/apps/appData/{}{}",
            app_name,
            detached_query(detached)
        );
        self.ack(Method::POST, &path, Some(&body)).await
    }

    pub async fn app_data(&self, app_name: &str, since: Option<i64>) -> Result<AppData> {
        let path = match since {
            Some(since) => format!("/api/v2/user/apps/appData/{}?since={}", app_name, since),
            None => format!("/api/v2/user/apps/appData/{}", app_name),
        };
        self.data(&path).await
    }

    pub async fn delete(&self, app_name: &str) -> Result<String> {
        let path = format!("/api/v2/user/apps/appDefinitions/{}", app_name);
        self.ack(Method::DELETE, &path, None).await
    }

    pub async fn projects(&self) -> Result<Vec<Project>> {
        let list: ProjectList = self.data("/api/v2/user/projects").await?;
        Ok(list.projects)
    }

    pub async fn create_project(
        &self,
        name: &str,
        description: &str,
        parent_project_id: Option<&str>,
    ) -> Result<Project> {
        let body = serde_json::json!({
            "name": name,
            "description": description,
            "parentProjectId": parent_project_id,
        });
        let envelope: Envelope<Project> = self
            .call(Method::POST, "/api/v2/user/projects", Some(&body))
            .await?;
        envelope
            .data
            .ok_or_else(|| anyhow::anyhow!("Server response has no data"))
    }
}

fn detached_query(detached: bool) -> &'static str {
    if detached {
        "?detached=1"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = ApiClient::new("http://localhost:3000/", None).unwrap();
        assert_eq!(client.url("/api/health"), "http://localhost:3000/api/health");
    }

    #[test]
    fn test_envelope_success_codes() {
        let ok: Envelope<()> = serde_json::from_str(r#"{"status":100,"description":"x","data":null}"#).unwrap();
        let started: Envelope<()> = serde_json::from_str(r#"{"status":101,"description":"x","data":null}"#).unwrap();
        let failed: Envelope<()> = serde_json::from_str(r#"{"status":1108,"description":"x","data":null}"#).unwrap();
        assert!(ok.is_success());
        assert!(started.is_success());
        assert!(!failed.is_success());
    }

    #[test]
    fn test_app_data_parses_server_shape() {
        let data: AppData = serde_json::from_str(
            r#"{"isAppBuilding":true,"isBuildFailed":false,"logs":{"firstLineNumber":-3,"lines":["","","a"]}}"#,
        )
        .unwrap();
        assert!(data.is_app_building);
        assert_eq!(data.logs.first_line_number, -3);
        assert_eq!(data.logs.lines.len(), 3);
    }

    #[tokio::test]
    async fn test_patch_rejects_non_object() {
        let client = ApiClient::new("http://127.0.0.1:9", None).unwrap();
        let result = client.patch("web", serde_json::json!([1, 2]), false).await;
        assert!(result.is_err());
    }
}
