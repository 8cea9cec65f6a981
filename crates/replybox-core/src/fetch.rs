//! Inbox fetch

use crate::metrics::Metrics;
use crate::provider::MailProvider;
use replybox_common::Result;
use replybox_storage::{EmailRepositoryTrait, InsertOutcome};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Counts reported by a fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchSummary {
    /// Messages listed in the inbox
    pub fetched: usize,
    /// New rows written
    pub inserted: usize,
    /// Messages already stored
    pub skipped: usize,
}

/// Pulls inbox messages from the provider into the email table
pub struct FetchService {
    provider: Arc<dyn MailProvider>,
    emails: Arc<dyn EmailRepositoryTrait>,
    metrics: Arc<Metrics>,
}

impl FetchService {
    pub fn new(
        provider: Arc<dyn MailProvider>,
        emails: Arc<dyn EmailRepositoryTrait>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            provider,
            emails,
            metrics,
        }
    }

    /// Fetch every inbox message and store the ones not seen before.
    ///
    /// Each insert commits on its own. A failure part way through returns
    /// the error and keeps the rows written so far.
    pub async fn fetch_inbox(&self) -> Result<FetchSummary> {
        let refs = self.provider.list_inbox().await?;
        let mut summary = FetchSummary {
            fetched: refs.len(),
            ..FetchSummary::default()
        };
        self.metrics.emails_fetched.inc_by(refs.len() as u64);

        for message_ref in refs {
            let message = self.provider.get_message(&message_ref.id).await?;

            match self.emails.insert(message.into_new_record()).await? {
                InsertOutcome::Inserted(record) => {
                    debug!(email_id = record.id, provider_id = %message_ref.id, "Stored email");
                    summary.inserted += 1;
                    self.metrics.emails_inserted.inc();
                }
                InsertOutcome::Duplicate => {
                    debug!(provider_id = %message_ref.id, "Email already stored");
                    summary.skipped += 1;
                }
            }
        }

        info!(
            fetched = summary.fetched,
            inserted = summary.inserted,
            skipped = summary.skipped,
            "Inbox fetch completed"
        );

        Ok(summary)
    }
}
