use crate::error::CoreError;
use crate::models::User;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn get(&self, user_id: &Uuid) -> Result<Option<User>, CoreError> {
        let mut tx = self.pool.begin().await?;
        let result = self.get_with_executor(user_id, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    pub async fn get_with_executor(
        &self,
        user_id: &Uuid,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<Option<User>, CoreError> {
        let result = sqlx::query_as!(
            User,
            r#"
            SELECT id, credit_balance, is_admin, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
            user_id
        )
        .fetch_optional(&mut **executor)
        .await?;

        Ok(result)
    }

    /// Locks the user's row for the duration of the caller's transaction so
    /// concurrent debits/refunds against the same user serialize.
    pub async fn get_for_update(
        &self,
        user_id: &Uuid,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<Option<User>, CoreError> {
        let result = sqlx::query_as!(
            User,
            r#"
            SELECT id, credit_balance, is_admin, created_at, updated_at
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
            user_id
        )
        .fetch_optional(&mut **executor)
        .await?;

        Ok(result)
    }

    pub async fn increment_balance_with_executor(
        &self,
        user_id: &Uuid,
        amount_change: i64,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<User, CoreError> {
        let result = sqlx::query_as!(
            User,
            r#"
            UPDATE users
            SET credit_balance = credit_balance + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, credit_balance, is_admin, created_at, updated_at
            "#,
            user_id,
            amount_change
        )
        .fetch_one(&mut **executor)
        .await?;

        Ok(result)
    }
}
