//! Constants and default values for Capstan

use std::path::PathBuf;

/// Default Capstan home directory name
pub const CAPSTAN_DIR: &str = ".capstan";

/// Default database file name
pub const DB_FILE: &str = "capstan.db";

/// Default config file names to search for (in priority order)
pub const CONFIG_FILES: &[&str] = &[
    "capstan.toml",
    "capstan.yaml",
    "capstan.yml",
    "capstan.json",
];

/// Default address the daemon binds the HTTP API to
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Default URL the CLI talks to
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";

/// Default root domain apps are exposed under
pub const DEFAULT_ROOT_DOMAIN: &str = "captain.localhost";

/// Number of lines kept per app in the build log
pub const DEFAULT_BUILD_LOG_SIZE: usize = 50;

/// How often the CLI re-polls build logs in milliseconds
pub const DEFAULT_LOG_POLL_INTERVAL_MS: u64 = 2000;

/// Initial "last printed" line for a poller that has seen nothing yet
pub const LOG_FOLLOWER_START: i64 = -10000;

/// Default timeout for a single deploy hook in seconds
pub const DEFAULT_HOOK_TIMEOUT_SECS: u64 = 1800;

/// Default HTTP port inside the container
pub const DEFAULT_CONTAINER_HTTP_PORT: u16 = 80;

/// Image deployed when an app is registered, before any real build
pub const PLACEHOLDER_IMAGE: &str = "caprover/caprover-placeholder-app:latest";

/// Marker line printed by log pollers when lines were lost between polls
pub const TRUNCATED_MARKER: &str = "[[ TRUNCATED ]]";

/// Get the Capstan home directory
pub fn capstan_home() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(CAPSTAN_DIR))
        .unwrap_or_else(|| PathBuf::from(CAPSTAN_DIR))
}

/// Get the database path
pub fn db_path() -> PathBuf {
    capstan_home().join(DB_FILE)
}

/// Docker service name for an app
pub fn service_name(app_name: &str) -> String {
    format!("srv-capstan--{}", app_name)
}

/// Image name produced by a build of the given version
pub fn image_name(app_name: &str, version: u32) -> String {
    format!("img-capstan--{}:{}", app_name, version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capstan_home() {
        let home = capstan_home();
        assert!(home.to_string_lossy().contains(".capstan"));
    }

    #[test]
    fn test_db_path() {
        let path = db_path();
        assert!(path.to_string_lossy().ends_with("capstan.db"));
    }

    #[test]
    fn test_service_and_image_names() {
        assert_eq!(service_name("blog"), "srv-capstan--blog");
        assert_eq!(image_name("blog", 3), "img-capstan--blog:3");
    }
}
