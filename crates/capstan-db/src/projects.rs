//! Projects repository - grouping of apps

use async_trait::async_trait;
use capstan_core::{Error, Project, Result};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::store::ProjectStore;

/// Repository for project operations
#[derive(Clone)]
pub struct ProjectsRepository {
    pool: SqlitePool,
}

impl ProjectsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectStore for ProjectsRepository {
    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, parent_project_id
            FROM projects WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(row.as_ref().map(row_to_project))
    }

    async fn insert_project(&self, project: &Project) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, name, description, parent_project_id)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.parent_project_id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(())
    }

    async fn get_all_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, parent_project_id
            FROM projects ORDER BY created_at, name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(rows.iter().map(row_to_project).collect())
    }
}

fn row_to_project(row: &sqlx::sqlite::SqliteRow) -> Project {
    Project {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        parent_project_id: row.get("parent_project_id"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[tokio::test]
    async fn test_insert_and_list_projects() {
        let db = Database::in_memory().await.unwrap();
        let projects = db.projects();

        let root = Project {
            id: "p-root".to_string(),
            name: "root".to_string(),
            description: "top level".to_string(),
            parent_project_id: None,
        };
        let child = Project {
            id: "p-child".to_string(),
            name: "child".to_string(),
            description: String::new(),
            parent_project_id: Some("p-root".to_string()),
        };
        projects.insert_project(&root).await.unwrap();
        projects.insert_project(&child).await.unwrap();

        assert_eq!(projects.get_project("p-child").await.unwrap(), Some(child));
        assert!(projects.get_project("missing").await.unwrap().is_none());
        assert_eq!(projects.get_all_projects().await.unwrap().len(), 2);
    }
}
