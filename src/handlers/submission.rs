use crate::db::pool_ext::AcquireRetry;
use crate::db::repositories::{ProjectRepository, UrlRepository};
use crate::error::{CoreError, CoreResult};
use crate::services::credit_ledger::CreditLedger;
use crate::services::dispatcher::Dispatcher;
use crate::services::method_queue::IndexNowJobConfig;
use actix_web::{HttpResponse, web};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmissionRequest {
    pub project_id: Uuid,
    pub url_list: Vec<String>,
    pub indexnow_config: Option<IndexNowJobConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmissionResponse {
    pub url_ids: Vec<Uuid>,
}

/// The one thin HTTP route: validate input shape, call the submission
/// dispatcher, translate `CoreError` to a status code. No business logic
/// lives here — it all lives in `UrlRepository`, `CreditLedger`, and
/// `Dispatcher`.
pub async fn create_submission(
    body: web::Json<CreateSubmissionRequest>,
    urls: web::Data<UrlRepository>,
    projects: web::Data<ProjectRepository>,
    ledger: web::Data<CreditLedger>,
    dispatcher: web::Data<Dispatcher>,
) -> CoreResult<HttpResponse> {
    let body = body.into_inner();

    if body.url_list.is_empty() {
        return Err(CoreError::Validation("url_list must not be empty".to_string()));
    }

    let Some(project) = projects.get(&body.project_id).await? else {
        return Err(CoreError::NotFound(format!("project {} not found", body.project_id)));
    };

    let mut url_ids = Vec::with_capacity(body.url_list.len());
    {
        // Submission is the one path a caller is actually waiting on, so it's
        // the one spot worth absorbing a transient pool-exhaustion timeout
        // with a couple of retries rather than failing the whole request.
        let mut tx = AcquireRetry::begin_with_retry(urls.get_pool(), 3, 100).await?;
        for text in &body.url_list {
            let created = urls.create(&project.id, text, &mut tx).await?;
            url_ids.push(created.id);
        }
        tx.commit().await?;
    }

    // Debit happens after creation since each transaction row references its
    // URL. A failed debit aborts the whole submission: the just-created URL
    // rows are deleted rather than left dangling un-debited.
    if let Err(e) = ledger.debit(&project.owner_id, &url_ids, "Submission").await {
        let mut tx = urls.get_pool().begin().await?;
        if let Err(cleanup_err) = urls.delete_batch(&url_ids, &mut tx).await {
            error!("failed to roll back urls after debit failure: {}", cleanup_err);
        } else {
            tx.commit().await?;
        }
        return Err(e);
    }

    for url_id in &url_ids {
        if let Err(e) = dispatcher.submit_url(*url_id, body.indexnow_config.clone()).await {
            error!("submission dispatch failed for url {}: {}", url_id, e);
            warn!("url {} remains pending after dispatch failure, will be retried", url_id);
        }
    }

    Ok(HttpResponse::Accepted().json(CreateSubmissionResponse { url_ids }))
}
