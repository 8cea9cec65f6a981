//! ReplyBox Core - inbox fetching, reply dispatch and provider client
//!
//! This crate provides the fetch service, the reply job queue and worker,
//! and the Gmail provider client.

pub mod fetch;
pub mod metrics;
pub mod provider;
pub mod queue;
pub mod reply;
pub mod worker;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use fetch::{FetchService, FetchSummary};
pub use metrics::Metrics;
pub use provider::{GmailProvider, MailProvider};
pub use queue::{JobQueue, PgJobQueue, QueueStats, ReplyJob};
pub use worker::{JobOutcome, ReplyError, ReplyWorker};
