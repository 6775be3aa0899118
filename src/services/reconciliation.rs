use crate::db::repositories::CreditTransactionRepository;
use crate::error::CoreResult;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use sqlx::PgPool;
use uuid::Uuid;

/// Ambient financial self-check: not user-facing, just a periodic assertion
/// that `users.credit_balance` still agrees with the transaction ledger it's
/// derived from.
#[derive(Debug, Clone)]
pub struct ReconciliationService {
    transactions: CreditTransactionRepository,
    pool: PgPool,
}

#[derive(Debug, Clone)]
pub struct UserBalanceDiscrepancy {
    pub user_id: Uuid,
    pub expected_balance: i64,
    pub actual_balance: i64,
    pub last_transaction_date: Option<DateTime<Utc>>,
    pub transaction_count: i64,
}

impl ReconciliationService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            transactions: CreditTransactionRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn verify_all_balances(&self) -> CoreResult<Vec<UserBalanceDiscrepancy>> {
        info!("Starting balance verification against transaction history");

        let actual_balances = sqlx::query!(r#"SELECT id as user_id, credit_balance FROM users"#)
            .fetch_all(&self.pool)
            .await?;
        let transaction_totals = self.transactions.all_user_totals().await?;

        let mut discrepancies = Vec::new();
        for row in actual_balances {
            let (expected, last_date, count) = transaction_totals
                .get(&row.user_id)
                .cloned()
                .unwrap_or((0, None, 0));

            if row.credit_balance != expected {
                error!(
                    "Balance discrepancy for user {}: expected {}, actual {}",
                    row.user_id, expected, row.credit_balance
                );
                discrepancies.push(UserBalanceDiscrepancy {
                    user_id: row.user_id,
                    expected_balance: expected,
                    actual_balance: row.credit_balance,
                    last_transaction_date: last_date,
                    transaction_count: count,
                });
            } else {
                debug!("Balance verified for user {}", row.user_id);
            }
        }

        if discrepancies.is_empty() {
            info!("Balance verification completed - no discrepancies found");
        } else {
            warn!("Balance verification found {} discrepancies", discrepancies.len());
        }

        Ok(discrepancies)
    }
}
