//! Mailbox provider abstraction
//!
//! The provider lists inbox message ids, fetches single messages and sends
//! raw RFC 5322 messages. `GmailProvider` talks to the Gmail REST API.

mod credentials;
mod gmail;

pub use credentials::{AuthorizedUser, TokenCache};
pub use gmail::GmailProvider;

use async_trait::async_trait;
use replybox_common::Result;
use replybox_storage::NewEmailRecord;
use serde::{Deserialize, Serialize};

/// Reference to an inbox message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: String,
    pub thread_id: Option<String>,
}

/// A fetched message, normalized from the provider representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub id: String,
    pub thread_id: Option<String>,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub message_id_header: Option<String>,
}

impl ProviderMessage {
    /// Row to insert for this message
    pub fn into_new_record(self) -> NewEmailRecord {
        NewEmailRecord {
            sender: self.sender,
            subject: self.subject,
            body: self.body,
            provider_message_id: Some(self.id),
            thread_id: self.thread_id,
            message_id_header: self.message_id_header,
        }
    }
}

/// A composed message ready to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    /// RFC 5322 bytes
    pub raw: Vec<u8>,
    /// Provider thread the message belongs to
    pub thread_id: Option<String>,
}

/// Provider acknowledgement of a sent message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: String,
    pub thread_id: Option<String>,
}

/// Mailbox provider operations
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// List messages currently in the inbox
    async fn list_inbox(&self) -> Result<Vec<MessageRef>>;

    /// Fetch and normalize a single message
    async fn get_message(&self, id: &str) -> Result<ProviderMessage>;

    /// Send a message
    async fn send(&self, message: OutgoingMessage) -> Result<SentMessage>;
}
