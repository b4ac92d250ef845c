//! Server configuration for Capstan
//!
//! Supports multiple configuration file formats:
//! - TOML (.toml)
//! - YAML (.yaml, .yml)
//! - JSON (.json)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{Error, Result};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(ConfigFormat::Toml),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Detect format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

fn default_db_path() -> PathBuf {
    db_path()
}

fn default_root_domain() -> String {
    DEFAULT_ROOT_DOMAIN.to_string()
}

fn default_build_log_size() -> usize {
    DEFAULT_BUILD_LOG_SIZE
}

fn default_hook_timeout() -> u64 {
    DEFAULT_HOOK_TIMEOUT_SECS
}

/// Shell commands the default deployer runs for each pipeline step.
///
/// Every hook is optional. A missing hook is skipped and counts as success.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HooksConfig {
    /// Builds the Dockerfile read on stdin and tags it `$CAPSTAN_IMAGE_NAME`
    pub build: Option<String>,
    /// Creates or updates the app's service
    pub apply: Option<String>,
    /// Removes the app's service
    pub remove: Option<String>,
    /// Regenerates and reloads the reverse proxy
    pub proxy: Option<String>,
    #[serde(default = "default_hook_timeout")]
    pub timeout_secs: u64,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            build: None,
            apply: None,
            remove: None,
            proxy: None,
            timeout_secs: DEFAULT_HOOK_TIMEOUT_SECS,
        }
    }
}

/// Daemon configuration file (capstan.toml/yaml/json)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_root_domain")]
    pub root_domain: String,
    #[serde(default)]
    pub default_nginx_config: String,
    /// Lines kept per app in the build log
    #[serde(default = "default_build_log_size")]
    pub build_log_size: usize,
    /// When set, every API call except health must send it as `X-API-Key`
    #[serde(default)]
    pub api_key: Option<String>,
    /// Allowed CORS origin, http://localhost:3000 when unset
    #[serde(default)]
    pub cors_origin: Option<String>,
    #[serde(default)]
    pub hooks: HooksConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            root_domain: default_root_domain(),
            default_nginx_config: String::new(),
            build_log_size: DEFAULT_BUILD_LOG_SIZE,
            api_key: None,
            cors_origin: None,
            hooks: HooksConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load config from file, automatically detecting format from extension
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            Error::ConfigError(format!(
                "Unsupported config file extension: {}. Expected .toml, .yaml, .yml, or .json",
                path.display()
            ))
        })?;

        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content, format)?;

        // Relative database paths are relative to the config file
        let config = match path.parent() {
            Some(dir) if config.db_path.is_relative() => Self {
                db_path: dir.join(&config.db_path),
                ..config
            },
            _ => config,
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse config content with specified format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let config: ServerConfig = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        Ok(config)
    }

    /// Find a config file in `dir`. Falls back to defaults when none exists.
    pub fn find_and_load(dir: &Path) -> Result<(Self, Option<PathBuf>)> {
        for name in CONFIG_FILES {
            let path = dir.join(name);
            if path.exists() {
                let config = Self::load(&path)?;
                return Ok((config, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    pub fn validate(&self) -> Result<()> {
        if self.build_log_size == 0 {
            return Err(Error::config("build_log_size must be at least 1"));
        }
        if self.hooks.timeout_secs == 0 {
            return Err(Error::config("hooks.timeout_secs must be at least 1"));
        }
        if self.root_domain.trim().is_empty() {
            return Err(Error::config("root_domain must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_format_detection() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("yaml"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("yml"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("JSON"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("txt"), None);
    }

    #[test]
    fn test_config_parse_toml() {
        let config_content = r#"
bind_addr = "0.0.0.0:8080"
db_path = "/var/lib/capstan/capstan.db"
root_domain = "apps.example.com"
build_log_size = 200
api_key = "secret"

[hooks]
apply = "/opt/capstan/apply.sh"
proxy = "nginx -s reload"
timeout_secs = 60
"#;
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.db_path, PathBuf::from("/var/lib/capstan/capstan.db"));
        assert_eq!(config.root_domain, "apps.example.com");
        assert_eq!(config.build_log_size, 200);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.hooks.apply.as_deref(), Some("/opt/capstan/apply.sh"));
        assert_eq!(config.hooks.proxy.as_deref(), Some("nginx -s reload"));
        assert!(config.hooks.build.is_none());
        assert_eq!(config.hooks.timeout_secs, 60);
    }

    #[test]
    fn test_config_parse_yaml() {
        let config_content = r#"
root_domain: apps.example.com
cors_origin: "https://dash.example.com"
hooks:
  build: "docker build -t img ."
"#;
        let mut file = NamedTempFile::with_suffix(".yml").unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.root_domain, "apps.example.com");
        assert_eq!(config.cors_origin.as_deref(), Some("https://dash.example.com"));
        assert_eq!(config.hooks.build.as_deref(), Some("docker build -t img ."));
        assert_eq!(config.hooks.timeout_secs, DEFAULT_HOOK_TIMEOUT_SECS);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
    }

    #[test]
    fn test_config_parse_json() {
        let config = ServerConfig::parse(
            r#"{"bind_addr": "127.0.0.1:9000", "default_nginx_config": "server {}"}"#,
            ConfigFormat::Json,
        )
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.default_nginx_config, "server {}");
        assert_eq!(config.build_log_size, DEFAULT_BUILD_LOG_SIZE);
    }

    #[test]
    fn test_relative_db_path_resolved_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capstan.toml");
        std::fs::write(&path, "db_path = \"data/capstan.db\"\n").unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.db_path, dir.path().join("data/capstan.db"));
    }

    #[test]
    fn test_config_not_found() {
        let result = ServerConfig::load(Path::new("/nonexistent/capstan.toml"));
        assert!(matches!(result, Err(Error::ConfigNotFound(_))));
    }

    #[test]
    fn test_config_rejects_zero_log_size() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(b"build_log_size = 0\n").unwrap();

        let result = ServerConfig::load(file.path());
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_find_and_load_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (config, path) = ServerConfig::find_and_load(dir.path()).unwrap();
        assert!(path.is_none());
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_find_and_load_prefers_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("capstan.toml"), "root_domain = \"a.test\"\n").unwrap();
        std::fs::write(dir.path().join("capstan.json"), r#"{"root_domain": "b.test"}"#).unwrap();

        let (config, path) = ServerConfig::find_and_load(dir.path()).unwrap();
        assert_eq!(config.root_domain, "a.test");
        assert!(path.unwrap().ends_with("capstan.toml"));
    }
}
