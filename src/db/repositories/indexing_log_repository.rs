use crate::error::CoreError;
use crate::models::{IndexingLog, LogStatus};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct IndexingLogRepository {
    pool: PgPool,
}

impl IndexingLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn insert_with_executor(
        &self,
        url_id: &Uuid,
        method: &str,
        status: LogStatus,
        response_code: Option<i32>,
        response_body: Option<&str>,
        credentials_id: Option<Uuid>,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<IndexingLog, CoreError> {
        let truncated = response_body.map(|b| {
            if b.len() > 2000 {
                let boundary = b.char_indices().nth(2000).map(|(i, _)| i).unwrap_or(b.len());
                format!("{}...(truncated)", &b[..boundary])
            } else {
                b.to_string()
            }
        });

        let result = sqlx::query_as!(
            IndexingLog,
            r#"
            INSERT INTO indexing_logs (id, url_id, method, status, response_code, response_body, credentials_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING id, url_id, method, status as "status: LogStatus", response_code, response_body, credentials_id, created_at
            "#,
            Uuid::new_v4(),
            url_id,
            method,
            status as LogStatus,
            response_code,
            truncated,
            credentials_id
        )
        .fetch_one(&mut **executor)
        .await?;

        Ok(result)
    }
}
