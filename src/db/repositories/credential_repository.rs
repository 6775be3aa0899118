use crate::error::CoreError;
use crate::models::Credential;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CredentialRepository {
    pool: PgPool,
}

impl CredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn get(&self, credential_id: &Uuid) -> Result<Option<Credential>, CoreError> {
        let result = sqlx::query_as!(
            Credential,
            r#"
            SELECT id, name, email, key_material, daily_quota, used_today,
                   is_active, disabled_for_quota, last_reset_at, created_at
            FROM credentials
            WHERE id = $1
            "#,
            credential_id
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    /// Least-used-first selection among usable credentials: smooths load
    /// across the pool instead of hammering the first one until it's spent.
    pub async fn next_available(&self) -> Result<Option<Credential>, CoreError> {
        let result = sqlx::query_as!(
            Credential,
            r#"
            SELECT id, name, email, key_material, daily_quota, used_today,
                   is_active, disabled_for_quota, last_reset_at, created_at
            FROM credentials
            WHERE is_active = true AND used_today < daily_quota
            ORDER BY used_today ASC
            LIMIT 1
            "#
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    pub async fn total_remaining_quota(&self) -> Result<i64, CoreError> {
        let row = sqlx::query!(
            r#"
            SELECT COALESCE(SUM(daily_quota - used_today), 0) as "total!"
            FROM credentials
            WHERE is_active = true
            "#
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row.total)
    }

    pub async fn increment_usage(&self, credential_id: &Uuid, n: i32) -> Result<(), CoreError> {
        sqlx::query!(
            r#"UPDATE credentials SET used_today = used_today + $2 WHERE id = $1"#,
            credential_id,
            n
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Rate-limit disable: fires on a 401/403/429 from the search API for
    /// the remainder of the day. Distinct from an admin disabling the
    /// credential outright.
    pub async fn disable_for_quota(&self, credential_id: &Uuid) -> Result<(), CoreError> {
        sqlx::query!(
            r#"UPDATE credentials SET is_active = false, disabled_for_quota = true WHERE id = $1"#,
            credential_id
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn admin_disable(&self, credential_id: &Uuid) -> Result<(), CoreError> {
        sqlx::query!(
            r#"UPDATE credentials SET is_active = false, disabled_for_quota = false WHERE id = $1"#,
            credential_id
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Zeroes usage for every credential and re-enables only the ones the
    /// pool itself disabled for hitting quota; admin-disabled credentials
    /// keep `is_active = false` across the reset.
    pub async fn reset_all(&self) -> Result<u64, CoreError> {
        sqlx::query!(r#"UPDATE credentials SET used_today = 0, last_reset_at = NOW()"#)
            .execute(&self.pool)
            .await?;

        let result = sqlx::query!(
            r#"
            UPDATE credentials
            SET is_active = true, disabled_for_quota = false
            WHERE disabled_for_quota = true
            "#
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
