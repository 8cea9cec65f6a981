//! Reply job queue
//!
//! `JobQueue` is the broker interface: the API enqueues reply jobs and the
//! worker claims them and reports an explicit outcome for each one.

mod manager;

pub use manager::PgJobQueue;

use async_trait::async_trait;
use chrono::Duration;
use replybox_common::types::{EmailId, JobId};
use replybox_common::Result;
use serde::{Deserialize, Serialize};

/// Job payload for sending a reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyJob {
    pub email_id: EmailId,
    pub reply_content: String,
}

/// A job handed to a worker
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: JobId,
    pub payload: serde_json::Value,
    /// Attempts made before this one
    pub attempts: i32,
    pub max_attempts: i32,
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Broker operations
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a reply job, runnable immediately
    async fn enqueue(&self, job: ReplyJob) -> Result<JobId>;

    /// Claim up to `limit` due jobs and mark them processing
    async fn claim(&self, limit: u32) -> Result<Vec<ClaimedJob>>;

    /// Mark a job as completed
    async fn complete(&self, id: JobId) -> Result<()>;

    /// Mark a job as permanently failed
    async fn fail(&self, id: JobId, error: &str) -> Result<()>;

    /// Put a job back as pending after `delay`
    async fn retry(&self, id: JobId, attempts: i32, error: &str, delay: Duration) -> Result<()>;

    /// Get queue statistics
    async fn stats(&self) -> Result<QueueStats>;
}

/// Calculate exponential backoff delay
pub fn calculate_backoff(attempts: i32) -> Duration {
    // Base: 1 minute, max: 4 hours
    let minutes = std::cmp::min(2_i64.pow(attempts.clamp(0, 16) as u32), 240);
    Duration::minutes(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_backoff() {
        assert_eq!(calculate_backoff(0), Duration::minutes(1));
        assert_eq!(calculate_backoff(1), Duration::minutes(2));
        assert_eq!(calculate_backoff(2), Duration::minutes(4));
        assert_eq!(calculate_backoff(3), Duration::minutes(8));
        assert_eq!(calculate_backoff(10), Duration::minutes(240)); // Max capped at 4 hours
        assert_eq!(calculate_backoff(64), Duration::minutes(240));
    }

    #[test]
    fn test_reply_job_payload() {
        let job = ReplyJob {
            email_id: 42,
            reply_content: "Thanks, see you then".to_string(),
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["email_id"], 42);
        assert_eq!(value["reply_content"], "Thanks, see you then");
    }
}
