//! Storage traits shared by the SQLite and in-memory backends

use async_trait::async_trait;
use capstan_core::{AppDefinition, Project, Result};

/// Persisted app definitions, keyed by app name
#[async_trait]
pub trait AppDefinitionStore: Send + Sync {
    async fn get(&self, app_name: &str) -> Result<Option<AppDefinition>>;

    /// All definitions in registration order
    async fn get_all(&self) -> Result<Vec<AppDefinition>>;

    /// Insert a new definition. Fails with `AppAlreadyExists` when the name is taken.
    async fn insert(&self, definition: &AppDefinition) -> Result<()>;

    /// Overwrite an existing definition. Fails with `AppNotFound` when it is gone.
    async fn save(&self, definition: &AppDefinition) -> Result<()>;

    /// Returns false when nothing was stored under that name
    async fn delete(&self, app_name: &str) -> Result<bool>;

    async fn exists(&self, app_name: &str) -> Result<bool> {
        Ok(self.get(app_name).await?.is_some())
    }
}

/// Persisted projects
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get_project(&self, id: &str) -> Result<Option<Project>>;

    async fn insert_project(&self, project: &Project) -> Result<()>;

    async fn get_all_projects(&self) -> Result<Vec<Project>>;
}
