use crate::error::CoreError;
use crate::models::Project;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ProjectRepository {
    pool: PgPool,
}

impl ProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn get(&self, project_id: &Uuid) -> Result<Option<Project>, CoreError> {
        let result = sqlx::query_as!(
            Project,
            r#"
            SELECT id, owner_id, main_domain, credentials_ref, created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
            project_id
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }
}
