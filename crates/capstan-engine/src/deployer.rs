//! Deployer trait and image sources

use async_trait::async_trait;
use capstan_core::{AppDefinition, Result, PLACEHOLDER_IMAGE};
use capstan_logs::BuildLogWriter;

/// Where the image of a deployment comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Placeholder image deployed right after registration
    Placeholder,
    /// Prebuilt image
    Image {
        image_name: String,
        git_hash: Option<String>,
    },
    /// Dockerfile to build
    Dockerfile {
        content: String,
        git_hash: Option<String>,
    },
    /// Re-apply the definition with whatever image is deployed now
    Current,
}

impl ImageSource {
    /// Image to use without running a build, if the source needs none
    pub fn fixed_image(&self, app: &AppDefinition) -> Option<String> {
        match self {
            ImageSource::Placeholder => Some(PLACEHOLDER_IMAGE.to_string()),
            ImageSource::Image { image_name, .. } => Some(image_name.clone()),
            ImageSource::Current => Some(
                app.deployed_image_name()
                    .unwrap_or(PLACEHOLDER_IMAGE)
                    .to_string(),
            ),
            ImageSource::Dockerfile { .. } => None,
        }
    }

    /// Whether a successful deploy from this source adds a version
    pub fn creates_version(&self) -> bool {
        matches!(
            self,
            ImageSource::Image { .. } | ImageSource::Dockerfile { .. }
        )
    }

    pub fn git_hash(&self) -> Option<&str> {
        match self {
            ImageSource::Image { git_hash, .. } | ImageSource::Dockerfile { git_hash, .. } => {
                git_hash.as_deref()
            }
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ImageSource::Placeholder => "placeholder image",
            ImageSource::Image { .. } => "prebuilt image",
            ImageSource::Dockerfile { .. } => "Dockerfile",
            ImageSource::Current => "current image",
        }
    }
}

/// Realizes app definitions on the container runtime and the reverse proxy
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Cheap checks run before a deployment is accepted
    async fn prepare(&self, app: &AppDefinition, source: &ImageSource) -> Result<()>;

    /// Produce the image to deploy and return its name
    async fn build(
        &self,
        app: &AppDefinition,
        source: &ImageSource,
        log: &BuildLogWriter,
    ) -> Result<String>;

    /// Create or update the app's service to run `image_name`
    async fn apply(&self, app: &AppDefinition, image_name: &str, log: &BuildLogWriter)
        -> Result<()>;

    /// Tear down the app's service
    async fn remove(&self, app_name: &str) -> Result<()>;

    /// Regenerate the reverse proxy config for all apps
    async fn reload_proxy(&self, apps: &[AppDefinition]) -> Result<()>;

    /// Get the deployer name
    fn name(&self) -> &'static str;
}
