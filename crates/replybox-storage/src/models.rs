//! Database models

use chrono::{DateTime, Utc};
use replybox_common::types::{EmailId, JobId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One observed inbox message and its reply status
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: EmailId,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub replied: bool,
    pub provider_message_id: Option<String>,
    pub thread_id: Option<String>,
    pub message_id_header: Option<String>,
    pub created_at: DateTime<Utc>,
    pub replied_at: Option<DateTime<Utc>>,
}

impl EmailRecord {
    /// Record a confirmed send. The flag never goes back to false and the
    /// first `replied_at` is kept.
    pub fn mark_replied(&mut self, at: DateTime<Utc>) {
        self.replied = true;
        if self.replied_at.is_none() {
            self.replied_at = Some(at);
        }
    }
}

/// Create email input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEmailRecord {
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub provider_message_id: Option<String>,
    pub thread_id: Option<String>,
    pub message_id_header: Option<String>,
}

/// Result of inserting an email
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// A new row was written
    Inserted(EmailRecord),
    /// A row with the same provider message id already exists
    Duplicate,
}

/// Job model (broker row)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
