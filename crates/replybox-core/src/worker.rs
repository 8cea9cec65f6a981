//! Reply worker
//!
//! Claims reply jobs from the queue, sends the reply through the provider
//! and flags the email as replied.

use crate::metrics::Metrics;
use crate::provider::{MailProvider, OutgoingMessage};
use crate::queue::{calculate_backoff, ClaimedJob, JobQueue, ReplyJob};
use crate::reply::compose_reply;
use chrono::{Duration, Utc};
use replybox_common::config::WorkerConfig;
use replybox_common::types::{EmailId, JobId};
use replybox_common::Error;
use replybox_storage::{EmailRecord, EmailRepositoryTrait};
use std::sync::Arc;
use tokio::time::{interval, Duration as TokioDuration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why a reply could not be completed
#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    #[error("Email {0} not found")]
    NotFound(EmailId),

    #[error("Failed to load email: {0}")]
    Lookup(Error),

    #[error("Failed to compose reply: {0}")]
    Compose(Error),

    #[error("Failed to send reply: {0}")]
    Send(Error),

    /// The provider accepted the reply but the flag could not be stored
    #[error("Reply sent but not recorded: {0}")]
    Record(Error),
}

impl ReplyError {
    /// Only failures that happened before anything was sent are retried
    pub fn is_retryable(&self) -> bool {
        match self {
            ReplyError::Lookup(e) | ReplyError::Send(e) => e.is_transient(),
            ReplyError::NotFound(_) | ReplyError::Compose(_) | ReplyError::Record(_) => false,
        }
    }
}

/// What happened to a claimed job
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed,
    Retried { attempt: i32, delay: Duration },
    Failed(String),
}

/// Reply worker
pub struct ReplyWorker {
    emails: Arc<dyn EmailRepositoryTrait>,
    queue: Arc<dyn JobQueue>,
    provider: Arc<dyn MailProvider>,
    metrics: Arc<Metrics>,
    config: WorkerConfig,
    from_address: Option<String>,
}

impl ReplyWorker {
    /// Create a new worker
    pub fn new(
        emails: Arc<dyn EmailRepositoryTrait>,
        queue: Arc<dyn JobQueue>,
        provider: Arc<dyn MailProvider>,
        metrics: Arc<Metrics>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            emails,
            queue,
            provider,
            metrics,
            config,
            from_address: None,
        }
    }

    /// Set the `From` address written on replies
    pub fn with_from_address(mut self, from_address: Option<String>) -> Self {
        self.from_address = from_address;
        self
    }

    /// Run until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = interval(TokioDuration::from_secs(self.config.poll_interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Reply worker started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Drain the queue before waiting for the next tick
            loop {
                if shutdown.is_cancelled() {
                    break;
                }
                match self.run_once().await {
                    Ok(0) => break,
                    Ok(count) => debug!(count, "Processed reply jobs"),
                    Err(e) => {
                        error!("Error processing queue: {}", e);
                        break;
                    }
                }
            }
        }

        info!("Reply worker stopped");
    }

    /// Claim and process one batch. Returns the number of jobs handled.
    pub async fn run_once(&self) -> replybox_common::Result<usize> {
        let jobs = self.queue.claim(self.config.batch_size).await?;
        let count = jobs.len();

        for job in jobs {
            self.process_job(job).await;
        }

        Ok(count)
    }

    /// Process a single job and record its outcome in the queue
    pub async fn process_job(&self, job: ClaimedJob) -> JobOutcome {
        let job_id = job.id;
        debug!("Processing job {}", job_id);

        // Parse job payload
        let reply_job: ReplyJob = match serde_json::from_value(job.payload) {
            Ok(j) => j,
            Err(e) => {
                error!("Failed to parse job {} payload: {}", job_id, e);
                return self.finish_failed(job_id, e.to_string()).await;
            }
        };

        match self.send_reply(&reply_job).await {
            Ok(_) => {
                info!(job_id = %job_id, email_id = reply_job.email_id, "Reply job completed");
                if let Err(e) = self.queue.complete(job_id).await {
                    error!("Failed to mark job {} as completed: {}", job_id, e);
                }
                JobOutcome::Completed
            }
            Err(e) => {
                let attempts = job.attempts + 1;
                if e.is_retryable() && attempts < job.max_attempts {
                    warn!(job_id = %job_id, attempt = attempts, "Reply job failed, will retry: {}", e);
                    let delay = calculate_backoff(attempts - 1);
                    if let Err(qe) = self
                        .queue
                        .retry(job_id, attempts, &e.to_string(), delay)
                        .await
                    {
                        error!("Failed to schedule retry for job {}: {}", job_id, qe);
                    }
                    JobOutcome::Retried {
                        attempt: attempts,
                        delay,
                    }
                } else {
                    error!(job_id = %job_id, email_id = reply_job.email_id, "Reply job failed: {}", e);
                    self.finish_failed(job_id, e.to_string()).await
                }
            }
        }
    }

    async fn finish_failed(&self, job_id: JobId, reason: String) -> JobOutcome {
        self.metrics.reply_jobs_failed.inc();
        if let Err(e) = self.queue.fail(job_id, &reason).await {
            error!("Failed to mark job {} as failed: {}", job_id, e);
        }
        JobOutcome::Failed(reason)
    }

    /// Send the reply for one job and flag the email.
    ///
    /// Nothing is written when the email does not exist. When the provider
    /// accepts the reply but the flag cannot be stored the reply stays sent.
    pub async fn send_reply(&self, job: &ReplyJob) -> Result<EmailRecord, ReplyError> {
        let mut email = self
            .emails
            .find_by_id(job.email_id)
            .await
            .map_err(ReplyError::Lookup)?
            .ok_or(ReplyError::NotFound(job.email_id))?;

        let raw = compose_reply(&email, &job.reply_content, self.from_address.as_deref())
            .map_err(ReplyError::Compose)?;

        let sent = self
            .provider
            .send(OutgoingMessage {
                raw,
                thread_id: email.thread_id.clone(),
            })
            .await
            .map_err(ReplyError::Send)?;

        self.metrics.replies_sent.inc();
        info!(email_id = email.id, provider_id = %sent.id, "Reply sent");

        email.mark_replied(Utc::now());
        self.emails.update(&email).await.map_err(|e| {
            error!(email_id = email.id, "Reply sent but replied flag not stored: {}", e);
            ReplyError::Record(e)
        })?;

        Ok(email)
    }
}
