use anyhow::Context as _;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Deserialize;
use serde_json::json;

use cadence_domain::id::{MailboxId, UserId};
use cadence_sequencer_schema::mailboxes;

use crate::domain::repository::{CredentialProvider, MailboxClient};
use crate::domain::types::{
    MessageHeaders, ProviderError, ProviderMessageRef, Sender, ThreadContext,
};
use crate::error::SequencerError;

pub const DEFAULT_GMAIL_API_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

const METADATA_HEADERS: [&str; 4] = ["Message-ID", "References", "Subject", "In-Reply-To"];

// ── API response types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadResponse {
    #[serde(default)]
    messages: Vec<MessageDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDetail {
    #[serde(default)]
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    payload: Option<MessagePayload>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRefResponse {
    id: String,
    #[serde(default)]
    thread_id: String,
}

impl MessageDetail {
    fn header(&self, name: &str) -> Option<&str> {
        self.payload.as_ref().and_then(|p| {
            p.headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.as_str())
        })
    }
}

/// Reply context of a thread: subject of the first message, reply target and
/// References chain from the last one.
fn thread_context_from(messages: &[MessageDetail]) -> Result<ThreadContext, ProviderError> {
    let (first, last) = match (messages.first(), messages.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(ProviderError::NotFound),
    };
    let message_id = last
        .header("Message-ID")
        .map(str::to_owned)
        .ok_or_else(|| ProviderError::Api {
            status: 200,
            message: format!("message {} has no Message-ID header", last.id),
        })?;

    let mut references: Vec<String> = last
        .header("References")
        .map(|r| r.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default();
    if !references.contains(&message_id) {
        references.push(message_id.clone());
    }

    Ok(ThreadContext {
        message_id,
        references,
        subject: first.header("Subject").unwrap_or_default().to_owned(),
    })
}

fn metadata_query() -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("format", "metadata");
    for header in METADATA_HEADERS {
        query.append_pair("metadataHeaders", header);
    }
    query.finish()
}

async fn error_from(response: Response) -> ProviderError {
    match response.status() {
        StatusCode::UNAUTHORIZED => ProviderError::Unauthenticated,
        StatusCode::NOT_FOUND => ProviderError::NotFound,
        status => ProviderError::Api {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        },
    }
}

fn transport(e: reqwest::Error) -> ProviderError {
    ProviderError::Transport(e.to_string())
}

// ── Mailbox client ───────────────────────────────────────────────────────────

/// Gmail v1 REST client bound to one user's access token.
#[derive(Clone)]
pub struct GmailMailbox {
    pub http: Client,
    pub base_url: String,
    pub access_token: String,
    pub sender: Sender,
}

impl GmailMailbox {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/users/me/{path}", self.base_url.trim_end_matches('/'));
        self.http.request(method, url).bearer_auth(&self.access_token)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        let response = request.send().await.map_err(transport)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from(response).await)
        }
    }

    async fn post_raw(
        &self,
        path: &str,
        raw: &str,
        thread_id: Option<&str>,
        label_ids: Option<&[&str]>,
    ) -> Result<ProviderMessageRef, ProviderError> {
        let mut body = json!({ "raw": raw });
        if let Some(thread_id) = thread_id {
            body["threadId"] = json!(thread_id);
        }
        if let Some(labels) = label_ids {
            body["labelIds"] = json!(labels);
        }
        let response = self
            .execute(self.request(Method::POST, path).json(&body))
            .await?;
        let sent: MessageRefResponse = response.json().await.map_err(transport)?;
        Ok(ProviderMessageRef {
            id: sent.id,
            thread_id: sent.thread_id,
        })
    }
}

impl MailboxClient for GmailMailbox {
    fn sender(&self) -> &Sender {
        &self.sender
    }

    async fn thread_context(&self, thread_id: &str) -> Result<ThreadContext, ProviderError> {
        let path = format!("threads/{thread_id}?{}", metadata_query());
        let response = self.execute(self.request(Method::GET, &path)).await?;
        let thread: ThreadResponse = response.json().await.map_err(transport)?;
        thread_context_from(&thread.messages)
    }

    async fn send(
        &self,
        raw: &str,
        thread_id: Option<&str>,
    ) -> Result<ProviderMessageRef, ProviderError> {
        self.post_raw("messages/send", raw, thread_id, None).await
    }

    async fn get_headers(&self, message_id: &str) -> Result<MessageHeaders, ProviderError> {
        let path = format!("messages/{message_id}?{}", metadata_query());
        let response = self.execute(self.request(Method::GET, &path)).await?;
        let message: MessageDetail = response.json().await.map_err(transport)?;
        Ok(MessageHeaders {
            message_id: message.header("Message-ID").map(str::to_owned),
            subject: message.header("Subject").map(str::to_owned),
            id: message.id,
            thread_id: message.thread_id,
        })
    }

    async fn insert_sent(
        &self,
        raw: &str,
        thread_id: Option<&str>,
    ) -> Result<ProviderMessageRef, ProviderError> {
        self.post_raw("messages", raw, thread_id, Some(&["SENT"]))
            .await
    }

    async fn delete(&self, message_id: &str) -> Result<(), ProviderError> {
        let path = format!("messages/{message_id}");
        self.execute(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }
}

// ── Credentials ──────────────────────────────────────────────────────────────

/// Builds a [`GmailMailbox`] from the stored `mailboxes` row. Token refresh is
/// owned by the account-linking service; anything unusable here is expired.
#[derive(Clone)]
pub struct DbCredentialProvider {
    pub db: DatabaseConnection,
    pub http: Client,
    pub api_base_url: String,
}

impl CredentialProvider for DbCredentialProvider {
    type Mailbox = GmailMailbox;

    async fn get_valid_credential(
        &self,
        user_id: UserId,
        mailbox_id: MailboxId,
    ) -> Result<GmailMailbox, SequencerError> {
        let mailbox = mailboxes::Entity::find_by_id(mailbox_id.0)
            .one(&self.db)
            .await
            .context("find mailbox")?;
        let Some(mailbox) = mailbox else {
            tracing::warn!(%mailbox_id, "mailbox not found");
            return Err(SequencerError::CredentialExpired);
        };
        if mailbox.user_id != user_id.0 {
            tracing::warn!(%mailbox_id, %user_id, "mailbox belongs to another user");
            return Err(SequencerError::CredentialExpired);
        }
        if mailbox.access_token.is_empty()
            || mailbox.token_expires_at.is_some_and(|at| at <= Utc::now())
        {
            return Err(SequencerError::CredentialExpired);
        }

        Ok(GmailMailbox {
            http: self.http.clone(),
            base_url: self.api_base_url.clone(),
            access_token: mailbox.access_token,
            sender: Sender {
                email: mailbox.email,
                display_name: mailbox.display_name,
            },
        })
    }
}
