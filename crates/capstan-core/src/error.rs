//! Error types for Capstan

use std::path::PathBuf;

/// Capstan error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("App not found: {0}")]
    AppNotFound(String),

    #[error("App already exists: {0}")]
    AppAlreadyExists(String),

    #[error("Invalid app name: {0}")]
    InvalidAppName(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("A build is already in progress for {0}")]
    BuildInProgress(String),

    #[error("Deployment failed: {0}")]
    DeploymentFailed(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Database error: {0}")]
    DbError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Result type alias for Capstan
pub type Result<T> = std::result::Result<T, Error>;

/// Stable status code carried by every API response.
///
/// The numeric values follow the CapRover status code families so existing
/// clients keep interpreting them the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    OkDeployStarted,
    Generic,
    AlreadyExists,
    BadName,
    BuildInProgress,
    DeploymentFailed,
    IllegalParameter,
    NotFound,
    ProjectNotFound,
}

impl StatusCode {
    pub fn code(&self) -> u32 {
        match self {
            StatusCode::Ok => 100,
            StatusCode::OkDeployStarted => 101,
            StatusCode::Generic => 1000,
            StatusCode::AlreadyExists => 1103,
            StatusCode::BadName => 1104,
            StatusCode::BuildInProgress => 1108,
            StatusCode::DeploymentFailed => 1109,
            StatusCode::IllegalParameter => 1110,
            StatusCode::NotFound => 1111,
            StatusCode::ProjectNotFound => 1112,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::OkDeployStarted => "OK_DEPLOY_STARTED",
            StatusCode::Generic => "GENERIC",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::BadName => "BAD_NAME",
            StatusCode::BuildInProgress => "BUILD_IN_PROGRESS",
            StatusCode::DeploymentFailed => "DEPLOYMENT_FAILED",
            StatusCode::IllegalParameter => "ILLEGAL_PARAMETER",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::ProjectNotFound => "PROJECT_NOT_FOUND",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Ok | StatusCode::OkDeployStarted)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }

    pub fn db<S: Into<String>>(msg: S) -> Self {
        Error::DbError(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::ValidationError(msg.into())
    }

    pub fn deployment<S: Into<String>>(msg: S) -> Self {
        Error::DeploymentFailed(msg.into())
    }

    /// Status code reported to API clients for this error
    pub fn status(&self) -> StatusCode {
        match self {
            Error::AppNotFound(_) => StatusCode::NotFound,
            Error::AppAlreadyExists(_) => StatusCode::AlreadyExists,
            Error::InvalidAppName(_) => StatusCode::BadName,
            Error::ProjectNotFound(_) => StatusCode::ProjectNotFound,
            Error::BuildInProgress(_) => StatusCode::BuildInProgress,
            Error::DeploymentFailed(_) => StatusCode::DeploymentFailed,
            Error::ValidationError(_) => StatusCode::IllegalParameter,
            _ => StatusCode::Generic,
        }
    }
}
