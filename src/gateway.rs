//! HTTP gateway to a conversation backend.
//!
//! Stateless apart from the HTTP client: every call goes to the network, nothing
//! is cached and nothing is retried.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::model::ConversationRecord;

/// Any failure talking to a backend.
///
/// Timeouts, refused connections and non-2xx answers all land here; the only
/// distinction kept is the HTTP status when one was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub status: Option<u16>,
    pub message: String,
}

impl GatewayError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Message with the status code prefixed when there is one.
    pub fn describe(&self) -> String {
        match self.status {
            Some(status) => format!("HTTP {}: {}", status, self.message),
            None => self.message.clone(),
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::new(err.status().map(|s| s.as_u16()), err.to_string())
    }
}

/// Operations a conversation backend offers.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    /// Send a new prompt; returns the assistant's reply.
    async fn ask(&self, message: &str) -> Result<String, GatewayError>;

    /// Every stored conversation, deleted ones included.
    async fn list(&self) -> Result<Vec<ConversationRecord>, GatewayError>;

    async fn find_by_id(&self, id: i64) -> Result<ConversationRecord, GatewayError>;

    /// Remove a conversation from storage. Irreversible.
    async fn delete_physical(&self, id: i64) -> Result<(), GatewayError>;

    /// Mark a conversation inactive.
    async fn delete_logical(&self, id: i64) -> Result<(), GatewayError>;

    async fn restore(&self, id: i64) -> Result<(), GatewayError>;

    /// Replace the question of a conversation; returns the regenerated reply.
    async fn update_question(&self, id: i64, message: &str) -> Result<String, GatewayError>;
}

/// reqwest-backed gateway for one backend base URL
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(%method, %url, "gateway request");
        self.client.request(method, url)
    }

    fn text_body(builder: RequestBuilder, body: &str) -> RequestBuilder {
        builder
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body.to_string())
    }

    fn empty_json_body(builder: RequestBuilder) -> RequestBuilder {
        builder.json(&serde_json::json!({}))
    }

    /// Send and turn transport failures and non-2xx answers into `GatewayError`.
    async fn send(builder: RequestBuilder) -> Result<Response, GatewayError> {
        let response = builder.send().await.map_err(|err| {
            warn!(error = %err, "gateway transport failure");
            GatewayError::from(err)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        warn!(status = status.as_u16(), %message, "gateway request rejected");
        Err(GatewayError::new(Some(status.as_u16()), message))
    }

    async fn send_text(builder: RequestBuilder) -> Result<String, GatewayError> {
        let response = Self::send(builder).await?;
        Ok(response.text().await?)
    }

    async fn send_empty(builder: RequestBuilder) -> Result<(), GatewayError> {
        Self::send(builder).await.map(|_| ())
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

#[async_trait]
impl ConversationApi for HttpGateway {
    async fn ask(&self, message: &str) -> Result<String, GatewayError> {
        let builder = Self::text_body(self.request(Method::POST, "ask"), message);
        Self::send_text(builder).await
    }

    async fn list(&self) -> Result<Vec<ConversationRecord>, GatewayError> {
        let response = Self::send(self.request(Method::GET, "list")).await?;
        let records: Vec<ConversationRecord> = response.json().await?;
        debug!(count = records.len(), "listed conversations");
        Ok(records)
    }

    async fn find_by_id(&self, id: i64) -> Result<ConversationRecord, GatewayError> {
        let response = Self::send(self.request(Method::GET, &id.to_string())).await?;
        Ok(response.json().await?)
    }

    async fn delete_physical(&self, id: i64) -> Result<(), GatewayError> {
        Self::send_empty(self.request(Method::DELETE, &id.to_string())).await
    }

    async fn delete_logical(&self, id: i64) -> Result<(), GatewayError> {
        let builder = self.request(Method::PUT, &format!("{}/logical-delete", id));
        Self::send_empty(Self::empty_json_body(builder)).await
    }

    async fn restore(&self, id: i64) -> Result<(), GatewayError> {
        let builder = self.request(Method::PUT, &format!("{}/restore", id));
        Self::send_empty(Self::empty_json_body(builder)).await
    }

    async fn update_question(&self, id: i64, message: &str) -> Result<String, GatewayError> {
        let builder = self.request(Method::PUT, &format!("{}/update-question", id));
        Self::send_text(Self::text_body(builder, message)).await
    }
}
