//! Shared handler state

use replybox_core::{FetchService, JobQueue, Metrics};
use replybox_storage::EmailRepositoryTrait;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub fetch: Arc<FetchService>,
    pub emails: Arc<dyn EmailRepositoryTrait>,
    pub queue: Arc<dyn JobQueue>,
    pub metrics: Arc<Metrics>,
}
