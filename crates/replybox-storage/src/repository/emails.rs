//! Email repository

use crate::db::DatabasePool;
use crate::models::{EmailRecord, InsertOutcome, NewEmailRecord};
use async_trait::async_trait;
use replybox_common::types::EmailId;
use replybox_common::{Error, Result};

/// Email repository trait
#[async_trait]
pub trait EmailRepository: Send + Sync {
    /// Insert a new email. Rows carrying an already stored provider message
    /// id are skipped.
    async fn insert(&self, input: NewEmailRecord) -> Result<InsertOutcome>;

    /// Get an email by ID
    async fn find_by_id(&self, id: EmailId) -> Result<Option<EmailRecord>>;

    /// Persist a modified record. `replied` can only be raised.
    async fn update(&self, record: &EmailRecord) -> Result<()>;

    /// Count stored emails
    async fn count(&self) -> Result<i64>;

    /// Check the backing store is reachable
    async fn ping(&self) -> Result<()>;
}

/// PostgreSQL email repository implementation
pub struct DbEmailRepository {
    pool: DatabasePool,
}

impl DbEmailRepository {
    /// Create a new repository
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailRepository for DbEmailRepository {
    async fn insert(&self, input: NewEmailRecord) -> Result<InsertOutcome> {
        let inserted = sqlx::query_as::<_, EmailRecord>(
            r#"
            INSERT INTO emails (sender, subject, body, replied, provider_message_id, thread_id, message_id_header, created_at)
            VALUES ($1, $2, $3, false, $4, $5, $6, NOW())
            ON CONFLICT (provider_message_id) WHERE provider_message_id IS NOT NULL DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&input.sender)
        .bind(&input.subject)
        .bind(&input.body)
        .bind(&input.provider_message_id)
        .bind(&input.thread_id)
        .bind(&input.message_id_header)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(match inserted {
            Some(record) => InsertOutcome::Inserted(record),
            None => InsertOutcome::Duplicate,
        })
    }

    async fn find_by_id(&self, id: EmailId) -> Result<Option<EmailRecord>> {
        sqlx::query_as::<_, EmailRecord>("SELECT * FROM emails WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn update(&self, record: &EmailRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE emails
            SET sender = $2,
                subject = $3,
                body = $4,
                replied = replied OR $5,
                replied_at = COALESCE(replied_at, $6)
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(&record.sender)
        .bind(&record.subject)
        .bind(&record.body)
        .bind(record.replied)
        .bind(record.replied_at)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Email {} not found", record.id)));
        }

        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM emails")
            .fetch_one(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count)
    }

    async fn ping(&self) -> Result<()> {
        self.pool.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_pool;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn new_email(provider_id: Option<String>) -> NewEmailRecord {
        NewEmailRecord {
            sender: "Alice <alice@example.com>".to_string(),
            subject: "Lunch".to_string(),
            body: "Are you free Friday?".to_string(),
            provider_message_id: provider_id,
            thread_id: Some("thread-1".to_string()),
            message_id_header: Some("lunch-1@example.com".to_string()),
        }
    }

    fn unique_provider_id() -> Option<String> {
        Some(format!("msg-{}", Uuid::new_v4()))
    }

    async fn inserted(repo: &DbEmailRepository, input: NewEmailRecord) -> EmailRecord {
        match repo.insert(input).await.unwrap() {
            InsertOutcome::Inserted(record) => record,
            InsertOutcome::Duplicate => panic!("expected a new row"),
        }
    }

    #[tokio::test]
    async fn test_insert_skips_duplicate_provider_id() {
        let Some(pool) = test_pool().await else { return };
        let repo = DbEmailRepository::new(pool);
        let provider_id = unique_provider_id();

        let record = inserted(&repo, new_email(provider_id.clone())).await;
        assert!(!record.replied);
        assert_eq!(record.provider_message_id, provider_id);

        let second = repo.insert(new_email(provider_id)).await.unwrap();
        assert_eq!(second, InsertOutcome::Duplicate);

        let stored = repo.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_rows_without_provider_id_are_not_deduplicated() {
        let Some(pool) = test_pool().await else { return };
        let repo = DbEmailRepository::new(pool);

        let first = inserted(&repo, new_email(None)).await;
        let second = inserted(&repo, new_email(None)).await;
        assert_ne!(first.id, second.id);
        assert!(repo.count().await.unwrap() >= 2);
    }

    #[tokio::test]
    async fn test_update_never_clears_replied() {
        let Some(pool) = test_pool().await else { return };
        let repo = DbEmailRepository::new(pool);
        let mut record = inserted(&repo, new_email(unique_provider_id())).await;

        record.mark_replied(Utc::now());
        repo.update(&record).await.unwrap();
        let replied = repo.find_by_id(record.id).await.unwrap().unwrap();
        assert!(replied.replied);
        assert!(replied.replied_at.is_some());

        // A stale copy written back must not lower the flag or move the timestamp
        let mut stale = replied.clone();
        stale.replied = false;
        stale.replied_at = None;
        repo.update(&stale).await.unwrap();

        let stored = repo.find_by_id(record.id).await.unwrap().unwrap();
        assert!(stored.replied);
        assert_eq!(stored.replied_at, replied.replied_at);
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let Some(pool) = test_pool().await else { return };
        let repo = DbEmailRepository::new(pool);
        let mut record = inserted(&repo, new_email(unique_provider_id())).await;
        record.id = -1;

        let err = repo.update(&record).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(repo.find_by_id(-1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ping() {
        let Some(pool) = test_pool().await else { return };
        DbEmailRepository::new(pool).ping().await.unwrap();
    }
}
