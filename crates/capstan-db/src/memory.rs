//! In-memory store backend, used by tests and ephemeral daemons

use async_trait::async_trait;
use capstan_core::{AppDefinition, Error, Project, Result};
use parking_lot::RwLock;

use crate::store::{AppDefinitionStore, ProjectStore};

/// Keeps everything in process memory. Registration order is preserved.
#[derive(Default)]
pub struct MemoryStore {
    apps: RwLock<Vec<AppDefinition>>,
    projects: RwLock<Vec<Project>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppDefinitionStore for MemoryStore {
    async fn get(&self, app_name: &str) -> Result<Option<AppDefinition>> {
        Ok(self
            .apps
            .read()
            .iter()
            .find(|d| d.app_name == app_name)
            .cloned())
    }

    async fn get_all(&self) -> Result<Vec<AppDefinition>> {
        Ok(self.apps.read().clone())
    }

    async fn insert(&self, definition: &AppDefinition) -> Result<()> {
        let mut apps = self.apps.write();
        if apps.iter().any(|d| d.app_name == definition.app_name) {
            return Err(Error::AppAlreadyExists(definition.app_name.clone()));
        }
        apps.push(definition.clone());
        Ok(())
    }

    async fn save(&self, definition: &AppDefinition) -> Result<()> {
        let mut apps = self.apps.write();
        match apps.iter_mut().find(|d| d.app_name == definition.app_name) {
            Some(slot) => {
                *slot = definition.clone();
                Ok(())
            }
            None => Err(Error::AppNotFound(definition.app_name.clone())),
        }
    }

    async fn delete(&self, app_name: &str) -> Result<bool> {
        let mut apps = self.apps.write();
        let before = apps.len();
        apps.retain(|d| d.app_name != app_name);
        Ok(apps.len() != before)
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        Ok(self.projects.read().iter().find(|p| p.id == id).cloned())
    }

    async fn insert_project(&self, project: &Project) -> Result<()> {
        self.projects.write().push(project.clone());
        Ok(())
    }

    async fn get_all_projects(&self) -> Result<Vec<Project>> {
        Ok(self.projects.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_crud() {
        let store = MemoryStore::new();
        let def = AppDefinition::try_new("api", None, false).unwrap();

        store.insert(&def).await.unwrap();
        assert!(matches!(
            store.insert(&def).await,
            Err(Error::AppAlreadyExists(_))
        ));

        let mut changed = def.clone();
        changed.description = "changed".to_string();
        store.save(&changed).await.unwrap();
        assert_eq!(store.get("api").await.unwrap(), Some(changed));

        assert!(store.delete("api").await.unwrap());
        assert!(!store.exists("api").await.unwrap());
        assert!(matches!(store.save(&def).await, Err(Error::AppNotFound(_))));
    }

    #[tokio::test]
    async fn test_memory_store_keeps_order() {
        let store = MemoryStore::new();
        for name in ["b", "a", "c"] {
            store
                .insert(&AppDefinition::try_new(name, None, false).unwrap())
                .await
                .unwrap();
        }
        let names: Vec<_> = store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.app_name)
            .collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }
}
