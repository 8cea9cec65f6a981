//! PostgreSQL-backed job queue

use super::{ClaimedJob, JobQueue, QueueStats, ReplyJob};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use replybox_common::types::{JobId, JobStatus};
use replybox_common::{Error, Result};
use replybox_storage::db::DatabasePool;
use replybox_storage::models::Job;
use tracing::{debug, info};
use uuid::Uuid;

/// Job queue stored in the `jobs` table
///
/// Claiming uses `FOR UPDATE SKIP LOCKED`, so several workers can share one
/// queue without processing the same job twice.
pub struct PgJobQueue {
    db_pool: DatabasePool,
    queue: String,
    max_attempts: i32,
}

impl PgJobQueue {
    /// Create a new queue
    pub fn new(db_pool: DatabasePool, queue: impl Into<String>, max_attempts: i32) -> Self {
        Self {
            db_pool,
            queue: queue.into(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Put jobs stuck in `processing` (a worker died mid-job) back to pending
    pub async fn requeue_stale(&self, older_than: Duration) -> Result<u64> {
        let cutoff = Utc::now() - older_than;
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending', scheduled_at = NOW()
            WHERE queue = $1 AND status = 'processing' AND started_at < $2
            "#,
        )
        .bind(&self.queue)
        .bind(cutoff)
        .execute(self.db_pool.pool())
        .await
        .map_err(|e| Error::Queue(e.to_string()))?;

        if result.rows_affected() > 0 {
            info!(count = result.rows_affected(), "Requeued stale jobs");
        }
        Ok(result.rows_affected())
    }

    async fn count(&self, status: JobStatus) -> Result<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE status = $1 AND queue = $2")
                .bind(status.as_str())
                .bind(&self.queue)
                .fetch_one(self.db_pool.pool())
                .await
                .map_err(|e| Error::Queue(e.to_string()))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, job: ReplyJob) -> Result<JobId> {
        let job_id = Uuid::now_v7();
        let payload = serde_json::to_value(&job)
            .map_err(|e| Error::Internal(format!("Failed to encode job: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, queue, payload, status, attempts, max_attempts, scheduled_at, created_at)
            VALUES ($1, $2, $3, 'pending', 0, $4, NOW(), NOW())
            "#,
        )
        .bind(job_id)
        .bind(&self.queue)
        .bind(&payload)
        .bind(self.max_attempts)
        .execute(self.db_pool.pool())
        .await
        .map_err(|e| Error::Queue(e.to_string()))?;

        info!(job_id = %job_id, email_id = job.email_id, "Enqueued reply job");
        Ok(job_id)
    }

    async fn claim(&self, limit: u32) -> Result<Vec<ClaimedJob>> {
        let jobs: Vec<Job> = sqlx::query_as(
            r#"
            UPDATE jobs
            SET status = 'processing', started_at = NOW()
            WHERE id IN (
                SELECT id FROM jobs
                WHERE status = 'pending'
                AND queue = $1
                AND scheduled_at <= NOW()
                ORDER BY scheduled_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(&self.queue)
        .bind(i64::from(limit))
        .fetch_all(self.db_pool.pool())
        .await
        .map_err(|e| Error::Queue(e.to_string()))?;

        if !jobs.is_empty() {
            debug!(count = jobs.len(), "Claimed jobs");
        }

        Ok(jobs
            .into_iter()
            .map(|job| ClaimedJob {
                id: job.id,
                payload: job.payload,
                attempts: job.attempts,
                max_attempts: job.max_attempts,
            })
            .collect())
    }

    async fn complete(&self, id: JobId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', attempts = attempts + 1, completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(self.db_pool.pool())
        .await
        .map_err(|e| Error::Queue(e.to_string()))?;

        Ok(())
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', attempts = attempts + 1, last_error = $2, completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(self.db_pool.pool())
        .await
        .map_err(|e| Error::Queue(e.to_string()))?;

        Ok(())
    }

    async fn retry(&self, id: JobId, attempts: i32, error: &str, delay: Duration) -> Result<()> {
        let scheduled_at = Utc::now() + delay;

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending',
                attempts = $2,
                last_error = $3,
                scheduled_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempts)
        .bind(error)
        .bind(scheduled_at)
        .execute(self.db_pool.pool())
        .await
        .map_err(|e| Error::Queue(e.to_string()))?;

        info!(
            "Job {} scheduled for retry at {} (attempt {})",
            id,
            scheduled_at,
            attempts + 1
        );

        Ok(())
    }

    async fn stats(&self) -> Result<QueueStats> {
        Ok(QueueStats {
            pending: self.count(JobStatus::Pending).await?,
            processing: self.count(JobStatus::Processing).await?,
            completed: self.count(JobStatus::Completed).await?,
            failed: self.count(JobStatus::Failed).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use replybox_storage::testing::test_pool;

    /// Each test uses its own queue name so tests sharing the database do
    /// not claim each other's jobs
    fn queue(pool: DatabasePool) -> PgJobQueue {
        PgJobQueue::new(pool, format!("test-{}", Uuid::new_v4()), 3)
    }

    fn reply(email_id: i64) -> ReplyJob {
        ReplyJob {
            email_id,
            reply_content: "Thanks".to_string(),
        }
    }

    async fn job_row(queue: &PgJobQueue, id: JobId) -> Job {
        sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_one(queue.db_pool.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_claim_marks_processing_once() {
        let Some(pool) = test_pool().await else { return };
        let queue = queue(pool);
        let id = queue.enqueue(reply(1)).await.unwrap();

        let claimed = queue.claim(10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, id);
        assert_eq!(claimed[0].attempts, 0);
        assert_eq!(claimed[0].max_attempts, 3);
        let payload: ReplyJob = serde_json::from_value(claimed[0].payload.clone()).unwrap();
        assert_eq!(payload, reply(1));

        let row = job_row(&queue, id).await;
        assert_eq!(row.status, "processing");
        assert!(row.started_at.is_some());

        assert!(queue.claim(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_claims_do_not_overlap() {
        let Some(pool) = test_pool().await else { return };
        let queue = queue(pool);
        for email_id in 0..6 {
            queue.enqueue(reply(email_id)).await.unwrap();
        }

        let (a, b) = tokio::join!(queue.claim(6), queue.claim(6));
        let mut ids: Vec<JobId> = a
            .unwrap()
            .into_iter()
            .chain(b.unwrap())
            .map(|job| job.id)
            .collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();

        assert_eq!(total, 6);
        assert_eq!(ids.len(), 6);
    }

    #[tokio::test]
    async fn test_claim_respects_limit() {
        let Some(pool) = test_pool().await else { return };
        let queue = queue(pool);
        for email_id in 0..3 {
            queue.enqueue(reply(email_id)).await.unwrap();
        }

        assert_eq!(queue.claim(2).await.unwrap().len(), 2);
        assert_eq!(queue.claim(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_counts_attempts_and_delays() {
        let Some(pool) = test_pool().await else { return };
        let queue = queue(pool);
        let id = queue.enqueue(reply(1)).await.unwrap();
        queue.claim(1).await.unwrap();

        queue.retry(id, 1, "503 from provider", Duration::zero()).await.unwrap();
        let row = job_row(&queue, id).await;
        assert_eq!(row.status, "pending");
        assert_eq!(row.attempts, 1);
        assert_eq!(row.last_error.as_deref(), Some("503 from provider"));

        let claimed = queue.claim(1).await.unwrap();
        assert_eq!(claimed[0].attempts, 1);

        queue.retry(id, 2, "503 again", Duration::minutes(2)).await.unwrap();
        assert!(queue.claim(1).await.unwrap().is_empty());
        assert_eq!(queue.stats().await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn test_complete_and_fail_are_terminal() {
        let Some(pool) = test_pool().await else { return };
        let queue = queue(pool);
        let done = queue.enqueue(reply(1)).await.unwrap();
        let dropped = queue.enqueue(reply(999)).await.unwrap();
        queue.claim(10).await.unwrap();

        queue.complete(done).await.unwrap();
        queue.fail(dropped, "Email 999 not found").await.unwrap();

        let done_row = job_row(&queue, done).await;
        assert_eq!(done_row.status, "completed");
        assert_eq!(done_row.attempts, 1);
        assert!(done_row.completed_at.is_some());

        let dropped_row = job_row(&queue, dropped).await;
        assert_eq!(dropped_row.status, "failed");
        assert_eq!(dropped_row.attempts, 1);
        assert_eq!(dropped_row.last_error.as_deref(), Some("Email 999 not found"));

        assert!(queue.claim(10).await.unwrap().is_empty());
        assert_eq!(
            queue.stats().await.unwrap(),
            QueueStats {
                pending: 0,
                processing: 0,
                completed: 1,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn test_requeue_stale() {
        let Some(pool) = test_pool().await else { return };
        let queue = queue(pool);
        let id = queue.enqueue(reply(1)).await.unwrap();
        queue.claim(1).await.unwrap();

        // Not stale yet
        assert_eq!(queue.requeue_stale(Duration::minutes(15)).await.unwrap(), 0);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(queue.requeue_stale(Duration::milliseconds(1)).await.unwrap(), 1);
        assert_eq!(job_row(&queue, id).await.status, "pending");
        assert_eq!(queue.claim(1).await.unwrap().len(), 1);
    }
}
