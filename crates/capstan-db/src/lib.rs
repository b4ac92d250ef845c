//! Capstan Database - SQLite persistence for app definitions and projects

pub mod apps;
pub mod memory;
pub mod projects;
pub mod schema;
pub mod store;

use capstan_core::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

pub use apps::AppsRepository;
pub use memory::MemoryStore;
pub use projects::ProjectsRepository;
pub use store::{AppDefinitionStore, ProjectStore};

/// Row counts reported at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DbStats {
    pub apps: u64,
    pub projects: u64,
}

/// Pool over the definitions database
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database file at `path` and apply the schema
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::DbError(e.to_string()))?;
        }

        // Concurrent patches of different apps write from separate connections
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        info!("Opening definitions database {}", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        // Definitions may hold credentials in env vars
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
                warn!("Cannot restrict permissions of {}: {}", path.display(), e);
            }
        }

        Self::init(pool).await
    }

    /// Private in-memory database, gone once the pool closes
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| Error::DbError(e.to_string()))?;

        // Every connection to :memory: is its own database, so keep exactly one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self> {
        sqlx::query(schema::SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        let db = Self { pool };
        let stats = db.stats().await?;
        info!(
            "Definitions database ready ({} apps, {} projects)",
            stats.apps, stats.projects
        );
        Ok(db)
    }

    pub async fn stats(&self) -> Result<DbStats> {
        let (apps, projects): (i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM app_definitions), (SELECT COUNT(*) FROM projects)",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(DbStats {
            apps: apps as u64,
            projects: projects as u64,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Store of app definitions sharing this pool
    pub fn apps(&self) -> AppsRepository {
        AppsRepository::new(self.pool.clone())
    }

    /// Store of projects sharing this pool
    pub fn projects(&self) -> ProjectsRepository {
        ProjectsRepository::new(self.pool.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
