//! Apps repository - app definitions stored as JSON documents

use async_trait::async_trait;
use capstan_core::{AppDefinition, Error, Result};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::store::AppDefinitionStore;

/// Repository for app definition operations
#[derive(Clone)]
pub struct AppsRepository {
    pool: SqlitePool,
}

impl AppsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of stored definitions
    pub async fn count(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM app_definitions")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(row.0 as u64)
    }
}

#[async_trait]
impl AppDefinitionStore for AppsRepository {
    async fn get(&self, app_name: &str) -> Result<Option<AppDefinition>> {
        let row = sqlx::query("SELECT definition FROM app_definitions WHERE name = ?")
            .bind(app_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(row_to_definition(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_all(&self) -> Result<Vec<AppDefinition>> {
        let rows = sqlx::query("SELECT definition FROM app_definitions ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        rows.iter().map(row_to_definition).collect()
    }

    async fn insert(&self, definition: &AppDefinition) -> Result<()> {
        let json = serde_json::to_string(definition)?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO app_definitions (name, definition) VALUES (?, ?)",
        )
        .bind(&definition.app_name)
        .bind(&json)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::AppAlreadyExists(definition.app_name.clone()));
        }
        Ok(())
    }

    async fn save(&self, definition: &AppDefinition) -> Result<()> {
        let json = serde_json::to_string(definition)?;

        let result = sqlx::query(
            "UPDATE app_definitions SET definition = ?, updated_at = ? WHERE name = ?",
        )
        .bind(&json)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&definition.app_name)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::AppNotFound(definition.app_name.clone()));
        }
        Ok(())
    }

    async fn delete(&self, app_name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM app_definitions WHERE name = ?")
            .bind(app_name)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, app_name: &str) -> Result<bool> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM app_definitions WHERE name = ?")
            .bind(app_name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(row.0 > 0)
    }
}

fn row_to_definition(row: &sqlx::sqlite::SqliteRow) -> Result<AppDefinition> {
    let json: String = row.get("definition");
    let definition: AppDefinition = serde_json::from_str(&json)?;
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use capstan_core::EnvVar;
    use tempfile::{tempdir, TempDir};

    // Return both Database and TempDir to keep the directory alive
    async fn setup_db() -> (Database, TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).await.unwrap();
        (db, dir)
    }

    fn definition(name: &str) -> AppDefinition {
        AppDefinition::try_new(name, None, false).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let (db, _dir) = setup_db().await;
        let apps = db.apps();

        let def = definition("test-app").with_env_vars(vec![EnvVar::new("PORT", "80")]);
        apps.insert(&def).await.unwrap();

        let retrieved = apps.get("test-app").await.unwrap();
        assert_eq!(retrieved, Some(def));
        assert!(apps.get("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate() {
        let (db, _dir) = setup_db().await;
        let apps = db.apps();

        apps.insert(&definition("dup")).await.unwrap();
        let result = apps.insert(&definition("dup")).await;
        assert!(matches!(result, Err(Error::AppAlreadyExists(_))));
        assert_eq!(apps.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let (db, _dir) = setup_db().await;
        let apps = db.apps();

        let mut def = definition("web");
        apps.insert(&def).await.unwrap();

        def.instance_count = 4;
        def.push_version(Some("abc".to_string()), "img-capstan--web:0".to_string());
        apps.save(&def).await.unwrap();

        let retrieved = apps.get("web").await.unwrap().unwrap();
        assert_eq!(retrieved.instance_count, 4);
        assert_eq!(retrieved.versions.len(), 1);
        assert_eq!(retrieved.deployed_version, Some(0));
    }

    #[tokio::test]
    async fn test_save_missing() {
        let (db, _dir) = setup_db().await;
        let result = db.apps().save(&definition("ghost")).await;
        assert!(matches!(result, Err(Error::AppNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let (db, _dir) = setup_db().await;
        let apps = db.apps();

        apps.insert(&definition("to-delete")).await.unwrap();
        assert!(apps.exists("to-delete").await.unwrap());
        assert!(apps.delete("to-delete").await.unwrap());
        assert!(!apps.delete("to-delete").await.unwrap());
        assert!(apps.get("to-delete").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_all_in_insert_order() {
        let (db, _dir) = setup_db().await;
        let apps = db.apps();

        for name in ["zeta", "alpha", "mid"] {
            apps.insert(&definition(name)).await.unwrap();
        }

        let all = apps.get_all().await.unwrap();
        let names: Vec<_> = all.iter().map(|d| d.app_name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }
}
