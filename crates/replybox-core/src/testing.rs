//! In-memory implementations of the repository, queue and provider traits
//! for tests

use crate::provider::{MailProvider, MessageRef, OutgoingMessage, ProviderMessage, SentMessage};
use crate::queue::{ClaimedJob, JobQueue, QueueStats, ReplyJob};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use replybox_common::types::{EmailId, JobId, JobStatus};
use replybox_common::{Error, Result};
use replybox_storage::{EmailRecord, EmailRepositoryTrait, InsertOutcome, NewEmailRecord};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Build a provider message with predictable fields
pub fn sample_message(id: &str, sender: &str, subject: &str) -> ProviderMessage {
    ProviderMessage {
        id: id.to_string(),
        thread_id: Some(format!("thread-{}", id)),
        sender: sender.to_string(),
        subject: subject.to_string(),
        body: format!("Body of {}", subject),
        message_id_header: Some(format!("{}@mail.example.com", id)),
    }
}

/// Email repository backed by a vector. Ids start at 1.
#[derive(Default)]
pub struct MemoryEmailRepository {
    rows: Mutex<Vec<EmailRecord>>,
    fail_updates: bool,
}

impl MemoryEmailRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `update` fail with a database error
    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    /// Snapshot of all rows in id order
    pub fn all(&self) -> Vec<EmailRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn get(&self, id: EmailId) -> Option<EmailRecord> {
        self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }
}

#[async_trait]
impl EmailRepositoryTrait for MemoryEmailRepository {
    async fn insert(&self, input: NewEmailRecord) -> Result<InsertOutcome> {
        let mut rows = self.rows.lock().unwrap();
        if input.provider_message_id.is_some()
            && rows
                .iter()
                .any(|r| r.provider_message_id == input.provider_message_id)
        {
            return Ok(InsertOutcome::Duplicate);
        }

        let record = EmailRecord {
            id: rows.len() as EmailId + 1,
            sender: input.sender,
            subject: input.subject,
            body: input.body,
            replied: false,
            provider_message_id: input.provider_message_id,
            thread_id: input.thread_id,
            message_id_header: input.message_id_header,
            created_at: Utc::now(),
            replied_at: None,
        };
        rows.push(record.clone());
        Ok(InsertOutcome::Inserted(record))
    }

    async fn find_by_id(&self, id: EmailId) -> Result<Option<EmailRecord>> {
        Ok(self.get(id))
    }

    async fn update(&self, record: &EmailRecord) -> Result<()> {
        if self.fail_updates {
            return Err(Error::Database("connection reset".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| Error::NotFound(format!("Email {} not found", record.id)))?;

        row.sender = record.sender.clone();
        row.subject = record.subject.clone();
        row.body = record.body.clone();
        row.replied = row.replied || record.replied;
        row.replied_at = row.replied_at.or(record.replied_at);
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.rows.lock().unwrap().len() as i64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct MemoryJob {
    id: JobId,
    payload: serde_json::Value,
    status: JobStatus,
    attempts: i32,
    last_error: Option<String>,
    scheduled_at: DateTime<Utc>,
}

/// Job queue kept in a vector, in enqueue order
pub struct MemoryJobQueue {
    jobs: Mutex<Vec<MemoryJob>>,
    max_attempts: i32,
    fail_enqueue: bool,
}

impl MemoryJobQueue {
    pub fn new(max_attempts: i32) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            max_attempts,
            fail_enqueue: false,
        }
    }

    /// Make every `enqueue` fail with a queue error
    pub fn failing_enqueue(mut self) -> Self {
        self.fail_enqueue = true;
        self
    }

    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == id)
            .map(|j| j.status)
    }

    pub fn last_error(&self, id: JobId) -> Option<String> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == id)
            .and_then(|j| j.last_error.clone())
    }

    /// Payloads of every job, in enqueue order
    pub fn payloads(&self) -> Vec<ReplyJob> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter_map(|j| serde_json::from_value(j.payload.clone()).ok())
            .collect()
    }

    fn set(&self, id: JobId, f: impl FnOnce(&mut MemoryJob)) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| Error::Queue(format!("Job {} not found", id)))?;
        f(job);
        Ok(())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: ReplyJob) -> Result<JobId> {
        if self.fail_enqueue {
            return Err(Error::Queue("broker unavailable".to_string()));
        }
        let id = Uuid::now_v7();
        let payload = serde_json::to_value(&job).map_err(|e| Error::Internal(e.to_string()))?;
        self.jobs.lock().unwrap().push(MemoryJob {
            id,
            payload,
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
            scheduled_at: Utc::now(),
        });
        Ok(id)
    }

    async fn claim(&self, limit: u32) -> Result<Vec<ClaimedJob>> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Pending && j.scheduled_at <= now)
            .take(limit as usize)
            .map(|j| {
                j.status = JobStatus::Processing;
                ClaimedJob {
                    id: j.id,
                    payload: j.payload.clone(),
                    attempts: j.attempts,
                    max_attempts: self.max_attempts,
                }
            })
            .collect())
    }

    async fn complete(&self, id: JobId) -> Result<()> {
        self.set(id, |j| {
            j.status = JobStatus::Completed;
            j.attempts += 1;
        })
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<()> {
        self.set(id, |j| {
            j.status = JobStatus::Failed;
            j.attempts += 1;
            j.last_error = Some(error.to_string());
        })
    }

    async fn retry(&self, id: JobId, attempts: i32, error: &str, delay: Duration) -> Result<()> {
        self.set(id, |j| {
            j.status = JobStatus::Pending;
            j.attempts = attempts;
            j.last_error = Some(error.to_string());
            j.scheduled_at = Utc::now() + delay;
        })
    }

    async fn stats(&self) -> Result<QueueStats> {
        let jobs = self.jobs.lock().unwrap();
        let count = |status: JobStatus| jobs.iter().filter(|j| j.status == status).count() as u64;
        Ok(QueueStats {
            pending: count(JobStatus::Pending),
            processing: count(JobStatus::Processing),
            completed: count(JobStatus::Completed),
            failed: count(JobStatus::Failed),
        })
    }
}

/// Provider serving a fixed inbox and recording sent messages
#[derive(Default)]
pub struct MockProvider {
    messages: Vec<ProviderMessage>,
    sent: Mutex<Vec<OutgoingMessage>>,
    get_failures: HashMap<String, u16>,
    send_failure: Option<u16>,
}

impl MockProvider {
    pub fn with_messages(messages: Vec<ProviderMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Make `get_message(id)` fail with the given HTTP status
    pub fn failing_get(mut self, id: &str, status: u16) -> Self {
        self.get_failures.insert(id.to_string(), status);
        self
    }

    /// Make every `send` fail with the given HTTP status
    pub fn failing_send(mut self, status: u16) -> Self {
        self.send_failure = Some(status);
        self
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailProvider for MockProvider {
    async fn list_inbox(&self) -> Result<Vec<MessageRef>> {
        Ok(self
            .messages
            .iter()
            .map(|m| MessageRef {
                id: m.id.clone(),
                thread_id: m.thread_id.clone(),
            })
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<ProviderMessage> {
        if let Some(status) = self.get_failures.get(id) {
            return Err(Error::provider(Some(*status), "injected failure"));
        }
        self.messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| Error::provider(Some(404), format!("Message {} not found", id)))
    }

    async fn send(&self, message: OutgoingMessage) -> Result<SentMessage> {
        if let Some(status) = self.send_failure {
            return Err(Error::provider(Some(status), "injected failure"));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(SentMessage {
            id: format!("sent-{}", sent.len()),
            thread_id: message.thread_id,
        })
    }
}
