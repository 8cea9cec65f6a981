//! Gmail REST API client

use super::credentials::TokenCache;
use super::{MailProvider, MessageRef, OutgoingMessage, ProviderMessage, SentMessage};
use async_trait::async_trait;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use replybox_common::config::ProviderConfig;
use replybox_common::{Error, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Gmail emits URL-safe base64 with or without padding
const GMAIL_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMessagesResponse {
    messages: Option<Vec<ListedMessage>>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedMessage {
    id: String,
    thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    id: String,
    thread_id: Option<String>,
    #[serde(default)]
    snippet: String,
    raw: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    id: String,
    thread_id: Option<String>,
}

/// Gmail provider
pub struct GmailProvider {
    config: ProviderConfig,
    client: Client,
    tokens: Arc<TokenCache>,
}

impl GmailProvider {
    /// Create a provider from an existing client and token cache
    pub fn new(config: ProviderConfig, client: Client, tokens: Arc<TokenCache>) -> Self {
        Self {
            config,
            client,
            tokens,
        }
    }

    /// Build the HTTP client and load credentials from the configured file
    pub async fn from_config(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let tokens = TokenCache::load(
            &config.credentials_path,
            config.token_url.clone(),
            client.clone(),
        )
        .await?;

        Ok(Self::new(config.clone(), client, Arc::new(tokens)))
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/gmail/v1/users/{}/messages",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.user_id
        )
    }

    /// Send an authorized request. A 401 invalidates the cached token and
    /// the request is repeated once with a fresh one.
    async fn execute<F>(&self, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let token = self.tokens.access_token().await?;
        let mut response = build()
            .bearer_auth(&token)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Provider rejected access token, refreshing");
            self.tokens.invalidate(&token).await;
            let token = self.tokens.access_token().await?;
            response = build()
                .bearer_auth(token)
                .send()
                .await
                .map_err(transport_error)?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::provider(
                Some(status.as_u16()),
                format!("Gmail API returned {}: {}", status, body),
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl MailProvider for GmailProvider {
    async fn list_inbox(&self) -> Result<Vec<MessageRef>> {
        let url = self.messages_url();
        let mut refs = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let remaining = self.config.max_messages.saturating_sub(refs.len());
            if remaining == 0 {
                break;
            }
            let page_size = remaining.min(self.config.page_size as usize).to_string();

            let response = self
                .execute(|| {
                    let mut request = self.client.get(&url).query(&[
                        ("labelIds", self.config.inbox_label.as_str()),
                        ("maxResults", page_size.as_str()),
                    ]);
                    if let Some(token) = &page_token {
                        request = request.query(&[("pageToken", token.as_str())]);
                    }
                    request
                })
                .await?;

            let page: ListMessagesResponse = response
                .json()
                .await
                .map_err(|e| Error::provider(None, format!("Invalid list response: {}", e)))?;

            refs.extend(page.messages.unwrap_or_default().into_iter().map(|m| MessageRef {
                id: m.id,
                thread_id: m.thread_id,
            }));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        refs.truncate(self.config.max_messages);
        debug!(count = refs.len(), label = %self.config.inbox_label, "Listed inbox messages");
        Ok(refs)
    }

    async fn get_message(&self, id: &str) -> Result<ProviderMessage> {
        let url = format!("{}/{}", self.messages_url(), id);

        let response = self
            .execute(|| self.client.get(&url).query(&[("format", "raw")]))
            .await?;

        let message: RawMessage = response
            .json()
            .await
            .map_err(|e| Error::provider(None, format!("Invalid message response: {}", e)))?;

        let raw = message
            .raw
            .as_deref()
            .ok_or_else(|| Error::provider(None, format!("Message {} has no raw content", id)))?;

        let bytes = GMAIL_BASE64
            .decode(raw.trim())
            .map_err(|e| Error::provider(None, format!("Message {} is not valid base64: {}", id, e)))?;

        Ok(normalize_message(
            message.id,
            message.thread_id,
            &bytes,
            &message.snippet,
        ))
    }

    async fn send(&self, message: OutgoingMessage) -> Result<SentMessage> {
        let url = format!("{}/send", self.messages_url());
        let body = SendRequest {
            raw: URL_SAFE_NO_PAD.encode(&message.raw),
            thread_id: message.thread_id.as_deref(),
        };

        let response = self.execute(|| self.client.post(&url).json(&body)).await?;
        let status = response.status();

        // The message is already accepted here, so a bad body must not
        // look transient to the retry policy
        let sent: SendResponse = response.json().await.map_err(|e| {
            Error::provider(
                Some(status.as_u16()),
                format!("Message accepted but send response is invalid: {}", e),
            )
        })?;

        debug!(id = %sent.id, "Message sent");

        Ok(SentMessage {
            id: sent.id,
            thread_id: sent.thread_id,
        })
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    Error::provider(e.status().map(|s| s.as_u16()), format!("Gmail request failed: {}", e))
}

/// Extract sender, subject and text body from raw RFC 5322 bytes.
///
/// The snippet stands in for the subject or body only when the message
/// has none.
pub(crate) fn normalize_message(
    id: String,
    thread_id: Option<String>,
    raw: &[u8],
    snippet: &str,
) -> ProviderMessage {
    let parsed = mail_parser::MessageParser::default().parse(raw);

    let Some(parsed) = parsed else {
        warn!(id = %id, "Failed to parse message, storing snippet only");
        return ProviderMessage {
            id,
            thread_id,
            sender: String::new(),
            subject: snippet.to_string(),
            body: snippet.to_string(),
            message_id_header: None,
        };
    };

    let sender = parsed
        .from()
        .and_then(|a| a.first())
        .map(|addr| match (addr.name(), addr.address()) {
            (Some(name), Some(address)) => format!("{} <{}>", name, address),
            (None, Some(address)) => address.to_string(),
            (Some(name), None) => name.to_string(),
            (None, None) => String::new(),
        })
        .unwrap_or_default();

    let subject = parsed
        .subject()
        .map(|s| s.to_string())
        .unwrap_or_else(|| snippet.to_string());

    let body = parsed
        .body_text(0)
        .map(|s| s.into_owned())
        .unwrap_or_else(|| snippet.to_string());

    ProviderMessage {
        id,
        thread_id,
        sender,
        subject,
        body,
        message_id_header: parsed.message_id().map(|s| s.to_string()),
    }
}
