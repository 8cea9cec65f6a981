//! Fetch and reply handlers

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use replybox_common::types::{EmailId, JobId};
use replybox_common::Error;
use replybox_core::ReplyJob;
use replybox_storage::EmailRecord;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Fetch response
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchResponse {
    pub status: String,
    pub fetched: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// Reply query parameters
#[derive(Debug, Deserialize)]
pub struct ReplyQuery {
    pub reply_content: Option<String>,
}

/// Reply request body, used when the query parameter is absent
#[derive(Debug, Deserialize)]
pub struct ReplyBody {
    pub reply_content: String,
}

/// Reply response
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyResponse {
    pub status: String,
    pub job_id: JobId,
}

/// Pull the inbox into storage
pub async fn fetch_emails(State(state): State<AppState>) -> Result<Json<FetchResponse>, ApiError> {
    let summary = state.fetch.fetch_inbox().await?;

    Ok(Json(FetchResponse {
        status: "Emails Fetched".to_string(),
        fetched: summary.fetched,
        inserted: summary.inserted,
        skipped: summary.skipped,
    }))
}

/// Schedule a reply. The record is not looked up here; a missing email is
/// reported by the worker.
pub async fn reply_email(
    State(state): State<AppState>,
    Path(email_id): Path<EmailId>,
    Query(query): Query<ReplyQuery>,
    body: Bytes,
) -> Result<Json<ReplyResponse>, ApiError> {
    let reply_content = match query.reply_content {
        Some(content) => content,
        None if !body.is_empty() => {
            serde_json::from_slice::<ReplyBody>(&body)
                .map_err(|e| Error::Validation(format!("Invalid reply body: {}", e)))?
                .reply_content
        }
        None => {
            return Err(Error::Validation("reply_content is required".to_string()).into());
        }
    };

    let job_id = state
        .queue
        .enqueue(ReplyJob {
            email_id,
            reply_content,
        })
        .await?;
    state.metrics.replies_scheduled.inc();
    info!(email_id, job_id = %job_id, "Reply scheduled");

    Ok(Json(ReplyResponse {
        status: "Reply Scheduled".to_string(),
        job_id,
    }))
}

/// Get a stored email
pub async fn get_email(
    State(state): State<AppState>,
    Path(email_id): Path<EmailId>,
) -> Result<Json<EmailRecord>, ApiError> {
    let email = state
        .emails
        .find_by_id(email_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Email {} not found", email_id)))?;

    Ok(Json(email))
}
