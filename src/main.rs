use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger, web};
use dotenv::dotenv;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

mod config;
mod db;
mod error;
mod handlers;
mod models;
mod routes;
mod services;

use crate::config::AppSettings;
use crate::db::connection::{create_pool, verify_connection};
use crate::db::repositories::{CredentialRepository, IndexingLogRepository, ProjectRepository, UrlRepository};
use crate::routes::configure_routes;
use crate::services::credentials_pool::CredentialsPool;
use crate::services::credit_ledger::CreditLedger;
use crate::services::dispatcher::Dispatcher;
use crate::services::method_queue::{JobQueue, RedisJobQueue};
use crate::services::notifier::{NoopNotifier, Notifier, WebhookNotifier};
use crate::services::probes::PropertyCache;
use crate::services::queue_worker::QueueWorker;
use crate::services::reconciliation::ReconciliationService;
use crate::services::refund_sweeper::RefundSweeper;
use crate::services::verification_scheduler::{VerificationScheduler, VerificationTier};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let app_settings = match AppSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load application settings from environment: {}", e);
            log::error!("Cannot start server without valid settings");
            std::process::exit(1);
        }
    };
    let settings = Arc::new(app_settings);

    let db_pool = match create_pool().await {
        Ok(pool) => {
            if let Err(e) = verify_connection(&pool).await {
                log::error!("Database connection verification failed: {}", e);
                std::process::exit(1);
            }
            log::info!("Database connection established successfully");
            pool
        }
        Err(e) => {
            log::error!("Failed to create database connection pool: {}", e);
            std::process::exit(1);
        }
    };

    let queue: Arc<dyn JobQueue> = match RedisJobQueue::connect(&settings.redis.url).await {
        Ok(q) => {
            log::info!("Redis method queue connected");
            Arc::new(q)
        }
        Err(e) => {
            log::error!("Failed to connect to redis: {}", e);
            std::process::exit(1);
        }
    };

    let http_client = reqwest::Client::new();

    let urls = UrlRepository::new(db_pool.clone());
    let projects = ProjectRepository::new(db_pool.clone());
    let credentials = CredentialRepository::new(db_pool.clone());
    let credentials_pool = CredentialsPool::new(db_pool.clone());
    let ledger = Arc::new(CreditLedger::new(db_pool.clone()));

    let notifier: Arc<dyn Notifier> = match &settings.notifier.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(http_client.clone(), url.clone())),
        None => Arc::new(NoopNotifier),
    };

    // Shared across the dispatcher's pre-check and the verification
    // scheduler's sweeps so a credential's owned-properties list is fetched
    // at most once per TTL window regardless of which caller hits it first.
    let property_cache = Arc::new(PropertyCache::new());

    let dispatcher = web::Data::new(Dispatcher::new(
        urls.clone(),
        projects.clone(),
        credentials.clone(),
        ledger.clone(),
        queue.clone(),
        notifier.clone(),
        http_client.clone(),
        settings.clone(),
        property_cache.clone(),
    ));

    let queue_worker = Arc::new(QueueWorker::new(
        queue.clone(),
        urls.clone(),
        IndexingLogRepository::new(db_pool.clone()),
        credentials_pool.clone(),
        http_client.clone(),
        settings.clone(),
    ));

    let verification_scheduler = Arc::new(VerificationScheduler::new(
        urls.clone(),
        projects.clone(),
        credentials.clone(),
        notifier.clone(),
        http_client.clone(),
        settings.clone(),
        property_cache.clone(),
    ));

    let refund_sweeper = Arc::new(RefundSweeper::new(urls.clone(), projects.clone(), (*ledger).clone()));
    let reconciliation = Arc::new(ReconciliationService::new(db_pool.clone()));

    let mut scheduler = match JobScheduler::new().await {
        Ok(s) => s,
        Err(e) => {
            log::error!("Failed to create job scheduler: {}", e);
            std::process::exit(1);
        }
    };

    {
        let worker = queue_worker.clone();
        let job = Job::new_async("0 */2 * * * *", move |_uuid, _l| {
            let worker = worker.clone();
            Box::pin(async move {
                match worker.tick().await {
                    Ok(n) if n > 0 => log::info!("queue worker tick processed {} jobs", n),
                    Ok(_) => {}
                    Err(e) => log::error!("queue worker tick failed: {}", e),
                }
            })
        });
        match job {
            Ok(job) => {
                if let Err(e) = scheduler.add(job).await {
                    log::error!("failed to register queue worker job: {}", e);
                }
            }
            Err(e) => log::error!("failed to build queue worker job: {}", e),
        }
    }

    let verification_tiers: [(&str, VerificationTier); 5] = [
        ("0 0 * * * *", VerificationTier::FRESH),
        ("0 0 */6 * * *", VerificationTier::RECENT),
        ("0 0 */12 * * *", VerificationTier::AGING),
        ("0 0 6 * * *", VerificationTier::STALE),
        ("0 0 8 * * *", VerificationTier::FINAL),
    ];
    for (cron_expr, tier) in verification_tiers {
        let scheduler_ref = verification_scheduler.clone();
        let job = Job::new_async(cron_expr, move |_uuid, _l| {
            let scheduler_ref = scheduler_ref.clone();
            Box::pin(async move {
                match scheduler_ref.run_sweep(tier).await {
                    Ok(n) => log::info!("verification sweep [{}] checked {} URLs", tier.name, n),
                    Err(e) => log::error!("verification sweep [{}] failed: {}", tier.name, e),
                }
            })
        });
        match job {
            Ok(job) => {
                if let Err(e) = scheduler.add(job).await {
                    log::error!("failed to register verification sweep [{}]: {}", tier.name, e);
                }
            }
            Err(e) => log::error!("failed to build verification sweep job [{}]: {}", tier.name, e),
        }
    }

    {
        let sweeper = refund_sweeper.clone();
        let job = Job::new_async("0 0 2 * * *", move |_uuid, _l| {
            let sweeper = sweeper.clone();
            Box::pin(async move {
                match sweeper.sweep().await {
                    Ok(n) => log::info!("refund sweep auto-refunded {} credits", n),
                    Err(e) => log::error!("refund sweep failed: {}", e),
                }
            })
        });
        match job {
            Ok(job) => {
                if let Err(e) = scheduler.add(job).await {
                    log::error!("failed to register refund sweep job: {}", e);
                }
            }
            Err(e) => log::error!("failed to build refund sweep job: {}", e),
        }
    }

    {
        let pool = credentials_pool.clone();
        let job = Job::new_async("0 0 0 * * *", move |_uuid, _l| {
            let pool = pool.clone();
            Box::pin(async move {
                if let Err(e) = pool.reset_all().await {
                    log::error!("credential daily reset failed: {}", e);
                }
            })
        });
        match job {
            Ok(job) => {
                if let Err(e) = scheduler.add(job).await {
                    log::error!("failed to register credential reset job: {}", e);
                }
            }
            Err(e) => log::error!("failed to build credential reset job: {}", e),
        }
    }

    {
        let reconciliation = reconciliation.clone();
        let job = Job::new_async("0 30 * * * *", move |_uuid, _l| {
            let reconciliation = reconciliation.clone();
            Box::pin(async move {
                match reconciliation.verify_all_balances().await {
                    Ok(discrepancies) if discrepancies.is_empty() => {}
                    Ok(discrepancies) => log::warn!("balance reconciliation found {} discrepancies", discrepancies.len()),
                    Err(e) => log::error!("balance reconciliation failed: {}", e),
                }
            })
        });
        match job {
            Ok(job) => {
                if let Err(e) = scheduler.add(job).await {
                    log::error!("failed to register reconciliation job: {}", e);
                }
            }
            Err(e) => log::error!("failed to build reconciliation job: {}", e),
        }
    }

    if let Err(e) = scheduler.start().await {
        log::error!("Failed to start job scheduler: {}", e);
        std::process::exit(1);
    }
    log::info!("Cron scheduler started (queue worker, 5 verification tiers, refund sweeper, credential reset, hourly reconciliation)");

    let host = settings.server.host.clone();
    let port = settings.server.port;
    log::info!("Starting server at http://{}:{}", host, port);

    let urls_data = web::Data::new(urls);
    let projects_data = web::Data::new(projects);
    let ledger_data = web::Data::new((*ledger).clone());
    let cors_origins = settings.server.cors_origins.clone();

    HttpServer::new(move || {
        let mut cors = Cors::default().supports_credentials();
        if cors_origins.contains(&"*".to_string()) {
            cors = cors.allow_any_origin();
        } else {
            for origin in &cors_origins {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header();

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(urls_data.clone())
            .app_data(projects_data.clone())
            .app_data(ledger_data.clone())
            .app_data(dispatcher.clone())
            .configure(configure_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
