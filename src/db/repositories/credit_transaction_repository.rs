use crate::error::CoreError;
use crate::models::{CreditTransaction, TransactionKind};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreditTransactionRepository {
    pool: PgPool,
}

impl CreditTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn insert_with_executor(
        &self,
        user_id: &Uuid,
        amount: i64,
        kind: TransactionKind,
        description: &str,
        url_id: Option<Uuid>,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<CreditTransaction, CoreError> {
        let result = sqlx::query_as!(
            CreditTransaction,
            r#"
            INSERT INTO credit_transactions (id, user_id, amount, kind, description, url_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING id, user_id, amount, kind as "kind: TransactionKind", description, url_id, created_at
            "#,
            Uuid::new_v4(),
            user_id,
            amount,
            kind as TransactionKind,
            description,
            url_id
        )
        .fetch_one(&mut **executor)
        .await?;

        Ok(result)
    }

    /// A refund transaction for `url_id` exists iff the URL's
    /// `credit_refunded` flag is true — used to enforce the no-double-refund
    /// invariant at the boundary, on top of the flag itself.
    pub async fn refund_exists_for_url(
        &self,
        url_id: &Uuid,
        executor: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<bool, CoreError> {
        let row = sqlx::query!(
            r#"
            SELECT COUNT(*) as "count!" FROM credit_transactions
            WHERE url_id = $1 AND kind = 'refund'
            "#,
            url_id
        )
        .fetch_one(&mut **executor)
        .await?;

        Ok(row.count > 0)
    }

    /// Sum of all transactions per user, for the reconciliation self-check.
    pub async fn all_user_totals(&self) -> Result<HashMap<Uuid, (i64, Option<DateTime<Utc>>, i64)>, CoreError> {
        let rows = sqlx::query!(
            r#"
            SELECT user_id, SUM(amount) as total, MAX(created_at) as last_at, COUNT(*) as "count!"
            FROM credit_transactions
            GROUP BY user_id
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.user_id, (r.total.unwrap_or(0), r.last_at, r.count)))
            .collect())
    }
}
