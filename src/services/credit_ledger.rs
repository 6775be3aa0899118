use crate::db::repositories::{CreditTransactionRepository, UrlRepository, UserRepository};
use crate::error::{CoreError, CoreResult};
use crate::models::TransactionKind;
use log::{info, warn};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Append-only credit ledger: every balance change is backed by exactly one
/// `credit_transactions` row, and `debit`/`refund` are all-or-nothing against
/// a row-locked user balance.
#[derive(Debug, Clone)]
pub struct CreditLedger {
    users: Arc<UserRepository>,
    transactions: Arc<CreditTransactionRepository>,
    urls: Arc<UrlRepository>,
    pool: PgPool,
}

impl CreditLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: Arc::new(UserRepository::new(pool.clone())),
            transactions: Arc::new(CreditTransactionRepository::new(pool.clone())),
            urls: Arc::new(UrlRepository::new(pool.clone())),
            pool,
        }
    }

    pub async fn get_balance(&self, user_id: &Uuid) -> CoreResult<i64> {
        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {} not found", user_id)))?;
        Ok(user.credit_balance)
    }

    /// Debits one credit per URL, atomically. Fails entirely (no partial
    /// debit) if the user's balance can't cover every URL.
    pub async fn debit(&self, user_id: &Uuid, url_ids: &[Uuid], description: &str) -> CoreResult<i64> {
        let mut tx = self.pool.begin().await?;

        let user = self
            .users
            .get_for_update(user_id, &mut tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {} not found", user_id)))?;

        let amount = url_ids.len() as i64;
        if user.credit_balance < amount {
            return Err(CoreError::InsufficientCredits(format!(
                "user {} has {} credits, needs {}",
                user_id, user.credit_balance, amount
            )));
        }

        for url_id in url_ids {
            self.transactions
                .insert_with_executor(user_id, -1, TransactionKind::Debit, description, Some(*url_id), &mut tx)
                .await?;
            self.urls.set_credit_debited(url_id, &mut tx).await?;
        }

        let updated = self
            .users
            .increment_balance_with_executor(user_id, -amount, &mut tx)
            .await?;

        tx.commit().await?;
        info!("Debited {} credits from user {} for {} URLs", amount, user_id, url_ids.len());
        Ok(updated.credit_balance)
    }

    /// Refunds only URLs eligible per the no-double-refund invariant:
    /// `credit_debited ∧ ¬credit_refunded ∧ ¬is_indexed`. Ineligible URLs are
    /// silently skipped rather than erroring the whole batch.
    pub async fn refund(
        &self,
        user_id: &Uuid,
        url_ids: &[Uuid],
        description: &str,
        mark_recredited: bool,
    ) -> CoreResult<usize> {
        let mut tx = self.pool.begin().await?;
        let refunded = self.refund_with_executor(user_id, url_ids, description, mark_recredited, &mut tx).await?;
        tx.commit().await?;
        if refunded > 0 {
            info!("Refunded {} credits to user {} ({})", refunded, user_id, description);
        }
        Ok(refunded)
    }

    /// Same contract as `refund`, but runs against the caller's transaction
    /// so it can be composed atomically with other writes — e.g. the
    /// dispatcher's pre-indexed refund has to commit together with the
    /// URL's `indexed` mark, not as two independent transactions.
    pub async fn refund_with_executor(
        &self,
        user_id: &Uuid,
        url_ids: &[Uuid],
        description: &str,
        mark_recredited: bool,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> CoreResult<usize> {
        let mut refunded = 0usize;

        for url_id in url_ids {
            let Some(url) = self.urls.get_for_update(url_id, tx).await? else {
                continue;
            };
            if !url.credit_debited || url.credit_refunded || url.is_indexed {
                continue;
            }
            if self.transactions.refund_exists_for_url(url_id, tx).await? {
                warn!("URL {} has credit_refunded=false but a refund transaction already exists, skipping", url_id);
                continue;
            }

            self.transactions
                .insert_with_executor(user_id, 1, TransactionKind::Refund, description, Some(*url_id), tx)
                .await?;
            self.urls.set_credit_refunded(url_id, mark_recredited, tx).await?;
            refunded += 1;
        }

        if refunded > 0 {
            self.users.increment_balance_with_executor(user_id, refunded as i64, tx).await?;
        }

        Ok(refunded)
    }

    pub async fn grant(&self, user_id: &Uuid, amount: i64, description: &str) -> CoreResult<i64> {
        let mut tx = self.pool.begin().await?;
        self.transactions
            .insert_with_executor(user_id, amount, TransactionKind::Bonus, description, None, &mut tx)
            .await?;
        let updated = self
            .users
            .increment_balance_with_executor(user_id, amount, &mut tx)
            .await?;
        tx.commit().await?;
        Ok(updated.credit_balance)
    }
}
