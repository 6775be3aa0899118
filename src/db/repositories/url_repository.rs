use crate::error::CoreError;
use crate::models::{IndexedUrl, Method, UrlStatus};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UrlRepository {
    pool: PgPool,
}

impl UrlRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create(
        &self,
        project_id: &Uuid,
        text: &str,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<IndexedUrl, CoreError> {
        let result = sqlx::query_as!(
            IndexedUrl,
            r#"
            INSERT INTO urls (
                id, project_id, text, status,
                indexnow_attempts, pingomatic_attempts, websub_attempts,
                archive_org_attempts, backlink_attempts, google_api_attempts,
                is_indexed, check_count, credit_debited, credit_refunded,
                pre_indexed, verified_not_indexed, created_at, updated_at
            )
            VALUES ($1, $2, $3, 'pending', 0, 0, 0, 0, 0, 0, false, 0, false, false, false, false, NOW(), NOW())
            RETURNING
                id, project_id, text, status as "status: UrlStatus",
                indexnow_attempts, indexnow_last_status,
                pingomatic_attempts, pingomatic_last_status,
                websub_attempts, websub_last_status,
                archive_org_attempts, archive_org_last_status,
                backlink_attempts, backlink_last_status,
                google_api_attempts, google_api_last_status,
                is_indexed, indexed_at, indexed_title, indexed_snippet,
                last_checked_at, check_count, check_method,
                credit_debited, credit_refunded, pre_indexed, verified_not_indexed,
                submitted_at, created_at, updated_at
            "#,
            Uuid::new_v4(),
            project_id,
            text
        )
        .fetch_one(&mut **executor)
        .await?;

        Ok(result)
    }

    /// Compensating action for a submission whose credit debit failed after
    /// the URL rows were already created; only ever called on freshly
    /// created, never-dispatched rows.
    pub async fn delete_batch(
        &self,
        url_ids: &[Uuid],
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), CoreError> {
        sqlx::query!(r#"DELETE FROM urls WHERE id = ANY($1)"#, url_ids)
            .execute(&mut **executor)
            .await?;
        Ok(())
    }

    pub async fn get(&self, url_id: &Uuid) -> Result<Option<IndexedUrl>, CoreError> {
        let result = sqlx::query_as!(
            IndexedUrl,
            r#"
            SELECT
                id, project_id, text, status as "status: UrlStatus",
                indexnow_attempts, indexnow_last_status,
                pingomatic_attempts, pingomatic_last_status,
                websub_attempts, websub_last_status,
                archive_org_attempts, archive_org_last_status,
                backlink_attempts, backlink_last_status,
                google_api_attempts, google_api_last_status,
                is_indexed, indexed_at, indexed_title, indexed_snippet,
                last_checked_at, check_count, check_method,
                credit_debited, credit_refunded, pre_indexed, verified_not_indexed,
                submitted_at, created_at, updated_at
            FROM urls
            WHERE id = $1
            "#,
            url_id
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    pub async fn get_for_update(
        &self,
        url_id: &Uuid,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<Option<IndexedUrl>, CoreError> {
        let result = sqlx::query_as!(
            IndexedUrl,
            r#"
            SELECT
                id, project_id, text, status as "status: UrlStatus",
                indexnow_attempts, indexnow_last_status,
                pingomatic_attempts, pingomatic_last_status,
                websub_attempts, websub_last_status,
                archive_org_attempts, archive_org_last_status,
                backlink_attempts, backlink_last_status,
                google_api_attempts, google_api_last_status,
                is_indexed, indexed_at, indexed_title, indexed_snippet,
                last_checked_at, check_count, check_method,
                credit_debited, credit_refunded, pre_indexed, verified_not_indexed,
                submitted_at, created_at, updated_at
            FROM urls
            WHERE id = $1
            FOR UPDATE
            "#,
            url_id
        )
        .fetch_optional(&mut **executor)
        .await?;

        Ok(result)
    }

    pub async fn set_status(
        &self,
        url_id: &Uuid,
        status: UrlStatus,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), CoreError> {
        sqlx::query!(
            r#"UPDATE urls SET status = $2, updated_at = NOW() WHERE id = $1"#,
            url_id,
            status as UrlStatus
        )
        .execute(&mut **executor)
        .await?;
        Ok(())
    }

    pub async fn mark_submitted(
        &self,
        url_id: &Uuid,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), CoreError> {
        sqlx::query!(
            r#"
            UPDATE urls
            SET status = 'submitted', submitted_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
            url_id
        )
        .execute(&mut **executor)
        .await?;
        Ok(())
    }

    pub async fn mark_indexed(
        &self,
        url_id: &Uuid,
        title: Option<&str>,
        snippet: Option<&str>,
        pre_indexed: bool,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), CoreError> {
        sqlx::query!(
            r#"
            UPDATE urls
            SET status = 'indexed', is_indexed = true, indexed_at = NOW(),
                indexed_title = $2, indexed_snippet = $3, pre_indexed = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
            url_id,
            title,
            snippet,
            pre_indexed
        )
        .execute(&mut **executor)
        .await?;
        Ok(())
    }

    pub async fn mark_not_indexed(
        &self,
        url_id: &Uuid,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), CoreError> {
        sqlx::query!(
            r#"
            UPDATE urls
            SET status = 'not_indexed', verified_not_indexed = true, updated_at = NOW()
            WHERE id = $1
            "#,
            url_id
        )
        .execute(&mut **executor)
        .await?;
        Ok(())
    }

    pub async fn record_check(
        &self,
        url_id: &Uuid,
        check_method: &str,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), CoreError> {
        sqlx::query!(
            r#"
            UPDATE urls
            SET last_checked_at = NOW(), check_count = check_count + 1,
                check_method = $2, updated_at = NOW()
            WHERE id = $1
            "#,
            url_id,
            check_method
        )
        .execute(&mut **executor)
        .await?;
        Ok(())
    }

    /// Per-method attempt counters are modeled as six flat columns rather
    /// than a child table, matching the `Method` sum type: one UPDATE branch
    /// per variant, never a dynamic column name built from a string.
    pub async fn record_method_attempt(
        &self,
        url_id: &Uuid,
        method: Method,
        last_status: &str,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), CoreError> {
        match method {
            Method::IndexNow => {
                sqlx::query!(
                    r#"UPDATE urls SET indexnow_attempts = indexnow_attempts + 1, indexnow_last_status = $2, updated_at = NOW() WHERE id = $1"#,
                    url_id, last_status
                ).execute(&mut **executor).await?;
            }
            Method::Pingomatic => {
                sqlx::query!(
                    r#"UPDATE urls SET pingomatic_attempts = pingomatic_attempts + 1, pingomatic_last_status = $2, updated_at = NOW() WHERE id = $1"#,
                    url_id, last_status
                ).execute(&mut **executor).await?;
            }
            Method::WebSub => {
                sqlx::query!(
                    r#"UPDATE urls SET websub_attempts = websub_attempts + 1, websub_last_status = $2, updated_at = NOW() WHERE id = $1"#,
                    url_id, last_status
                ).execute(&mut **executor).await?;
            }
            Method::ArchiveOrg => {
                sqlx::query!(
                    r#"UPDATE urls SET archive_org_attempts = archive_org_attempts + 1, archive_org_last_status = $2, updated_at = NOW() WHERE id = $1"#,
                    url_id, last_status
                ).execute(&mut **executor).await?;
            }
            Method::Backlink => {
                sqlx::query!(
                    r#"UPDATE urls SET backlink_attempts = backlink_attempts + 1, backlink_last_status = $2, updated_at = NOW() WHERE id = $1"#,
                    url_id, last_status
                ).execute(&mut **executor).await?;
            }
            Method::GoogleApi => {
                sqlx::query!(
                    r#"UPDATE urls SET google_api_attempts = google_api_attempts + 1, google_api_last_status = $2, updated_at = NOW() WHERE id = $1"#,
                    url_id, last_status
                ).execute(&mut **executor).await?;
            }
        }
        Ok(())
    }

    pub async fn set_credit_debited(
        &self,
        url_id: &Uuid,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), CoreError> {
        sqlx::query!(
            r#"UPDATE urls SET credit_debited = true, updated_at = NOW() WHERE id = $1"#,
            url_id
        )
        .execute(&mut **executor)
        .await?;
        Ok(())
    }

    pub async fn set_credit_refunded(
        &self,
        url_id: &Uuid,
        mark_recredited: bool,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), CoreError> {
        if mark_recredited {
            sqlx::query!(
                r#"
                UPDATE urls
                SET credit_refunded = true, status = 'recredited', updated_at = NOW()
                WHERE id = $1
                "#,
                url_id
            )
            .execute(&mut **executor)
            .await?;
        } else {
            sqlx::query!(
                r#"UPDATE urls SET credit_refunded = true, updated_at = NOW() WHERE id = $1"#,
                url_id
            )
            .execute(&mut **executor)
            .await?;
        }
        Ok(())
    }

    /// Candidate selection for one verification tier. `min_age`/`max_age` bound
    /// `submitted_at`; `min_stale` is the minimum time since `last_checked_at`
    /// (or "never checked").
    pub async fn select_for_verification(
        &self,
        min_age: Duration,
        max_age: Duration,
        min_stale: Duration,
        limit: i64,
    ) -> Result<Vec<IndexedUrl>, CoreError> {
        let now = Utc::now();
        let min_submitted = now - max_age;
        let max_submitted = now - min_age;
        let stale_before = now - min_stale;

        let rows = sqlx::query_as!(
            IndexedUrl,
            r#"
            SELECT
                id, project_id, text, status as "status: UrlStatus",
                indexnow_attempts, indexnow_last_status,
                pingomatic_attempts, pingomatic_last_status,
                websub_attempts, websub_last_status,
                archive_org_attempts, archive_org_last_status,
                backlink_attempts, backlink_last_status,
                google_api_attempts, google_api_last_status,
                is_indexed, indexed_at, indexed_title, indexed_snippet,
                last_checked_at, check_count, check_method,
                credit_debited, credit_refunded, pre_indexed, verified_not_indexed,
                submitted_at, created_at, updated_at
            FROM urls
            WHERE status IN ('submitted', 'indexing', 'verifying', 'not_indexed')
              AND submitted_at IS NOT NULL
              AND submitted_at >= $1 AND submitted_at <= $2
              AND (last_checked_at IS NULL OR last_checked_at <= $3)
            ORDER BY submitted_at ASC
            LIMIT $4
            "#,
            min_submitted,
            max_submitted,
            stale_before,
            limit
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn select_for_refund_sweep(&self, cutoff_days: i64) -> Result<Vec<IndexedUrl>, CoreError> {
        let cutoff: DateTime<Utc> = Utc::now() - Duration::days(cutoff_days);

        let rows = sqlx::query_as!(
            IndexedUrl,
            r#"
            SELECT
                id, project_id, text, status as "status: UrlStatus",
                indexnow_attempts, indexnow_last_status,
                pingomatic_attempts, pingomatic_last_status,
                websub_attempts, websub_last_status,
                archive_org_attempts, archive_org_last_status,
                backlink_attempts, backlink_last_status,
                google_api_attempts, google_api_last_status,
                is_indexed, indexed_at, indexed_title, indexed_snippet,
                last_checked_at, check_count, check_method,
                credit_debited, credit_refunded, pre_indexed, verified_not_indexed,
                submitted_at, created_at, updated_at
            FROM urls
            WHERE credit_debited = true AND credit_refunded = false AND is_indexed = false
              AND submitted_at IS NOT NULL AND submitted_at <= $1
              AND status IN ('submitted', 'indexing', 'verifying', 'not_indexed')
            "#,
            cutoff
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
