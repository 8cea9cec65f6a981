//! Prometheus metrics

use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use replybox_common::{Error, Result};

/// Service counters, registered on a private registry
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub emails_fetched: IntCounter,
    pub emails_inserted: IntCounter,
    pub replies_scheduled: IntCounter,
    pub replies_sent: IntCounter,
    pub reply_jobs_failed: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let emails_fetched = counter(
            &registry,
            "replybox_emails_fetched_total",
            "Inbox messages observed by fetches",
        )?;
        let emails_inserted = counter(
            &registry,
            "replybox_emails_inserted_total",
            "Email records inserted",
        )?;
        let replies_scheduled = counter(
            &registry,
            "replybox_replies_scheduled_total",
            "Reply jobs enqueued",
        )?;
        let replies_sent = counter(
            &registry,
            "replybox_replies_sent_total",
            "Replies accepted by the provider",
        )?;
        let reply_jobs_failed = counter(
            &registry,
            "replybox_reply_jobs_failed_total",
            "Reply jobs that ended in a permanent failure",
        )?;

        Ok(Self {
            registry,
            emails_fetched,
            emails_inserted,
            replies_scheduled,
            replies_sent,
            reply_jobs_failed,
        })
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| Error::Internal(format!("Failed to encode metrics: {}", e)))?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(e.to_string()))
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter> {
    let counter = IntCounter::new(name, help)
        .map_err(|e| Error::Internal(format!("Invalid metric {}: {}", name, e)))?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|e| Error::Internal(format!("Failed to register {}: {}", name, e)))?;
    Ok(counter)
}
