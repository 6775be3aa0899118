use crate::error::CoreError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::env;
use std::time::Duration;

/// Creates the PostgreSQL connection pool, with session-level guardrails set
/// on every new connection and a bounded number of connect retries.
pub async fn create_pool() -> Result<PgPool, CoreError> {
    let database_url = env::var("DATABASE_URL")
        .map_err(|_| CoreError::Configuration("DATABASE_URL must be set".to_string()))?;

    let max_connections = env::var("DB_POOL_MAX")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(20);
    let min_connections = env::var("DB_POOL_MIN")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(2);
    let acquire_timeout_ms = env::var("DB_POOL_ACQUIRE_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(5000);
    let statement_timeout_ms = env::var("DB_STATEMENT_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30000);
    let lock_timeout_ms = env::var("DB_LOCK_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(5000);

    let max_retries = 3;
    let mut last_error = None;

    for attempt in 1..=max_retries {
        log::info!("Database pool connection attempt {} of {}", attempt, max_retries);

        match PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_millis(acquire_timeout_ms))
            .test_before_acquire(true)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    sqlx::query("SET TIME ZONE 'UTC'").execute(&mut *conn).await?;
                    if let Err(err) = sqlx::query(&format!(
                        "SET statement_timeout TO '{}ms'",
                        statement_timeout_ms
                    ))
                    .execute(&mut *conn)
                    .await
                    {
                        log::warn!("Unable to set statement_timeout: {}", err);
                    }
                    if let Err(err) =
                        sqlx::query(&format!("SET lock_timeout TO '{}ms'", lock_timeout_ms))
                            .execute(&mut *conn)
                            .await
                    {
                        log::warn!("Unable to set lock_timeout: {}", err);
                    }
                    Ok(())
                })
            })
            .connect(&database_url)
            .await
        {
            Ok(pool) => {
                log::info!(
                    "Database pool ready (max: {}, min: {}, acquire_timeout: {}ms)",
                    max_connections,
                    min_connections,
                    acquire_timeout_ms
                );
                return Ok(pool);
            }
            Err(e) => {
                log::warn!("Database connection attempt {} failed: {}", attempt, e);
                last_error = Some(e);
                if attempt < max_retries {
                    let delay = Duration::from_secs(2 * attempt as u64);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    let error = last_error.unwrap_or_else(|| {
        sqlx::Error::Configuration("Unknown database connection error".into())
    });
    log::error!("All database connection attempts failed: {}", error);
    Err(CoreError::Database(error.to_string()))
}

pub async fn verify_connection(pool: &PgPool) -> Result<(), CoreError> {
    sqlx::query_as::<_, (i32,)>("SELECT 1")
        .fetch_optional(pool)
        .await
        .map(|_| ())
        .map_err(|e| {
            log::error!("Database connection verification failed: {}", e);
            CoreError::Database(e.to_string())
        })?;
    log::info!("Database connection verified successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_verify_connection() {
        if env::var("DATABASE_URL").is_ok() {
            if let Ok(pool) = create_pool().await {
                let _ = verify_connection(&pool).await;
            }
        }
    }
}
