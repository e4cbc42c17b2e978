//! REST API Module
//!
//! Thin typed client over the support desk backend. Every call carries the
//! operator's bearer token and the configured request timeout; non-success
//! answers become [`ClientError::Status`] with the backend error code kept.

pub mod queue_options;

use async_trait::async_trait;
use log::{debug, error, trace};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::about::BackendVersion;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::{Queue, Ticket};

pub use queue_options::{
    Attachment, MediaRef, ParentFilter, QueueOptionPayload, QueueOptionRecord, QueueOptionsApi,
};

/// Ticket and settings endpoints used by the notification panel and the
/// ticket dialog.
#[async_trait]
pub trait TicketsApi: Send + Sync {
    async fn get_ticket(&self, ticket_id: i64) -> ClientResult<Ticket>;
    async fn list_unread_tickets(&self) -> ClientResult<Vec<Ticket>>;
    async fn get_setting(&self, key: &str) -> ClientResult<Option<String>>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TicketPage {
    Paged { tickets: Vec<Ticket> },
    Bare(Vec<Ticket>),
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("deskclient/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.config.endpoint(path);
        trace!("{} {}", method, url);
        let builder = self.client.request(method, url);
        match &self.config.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub(crate) async fn execute(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Request failed with {}: {}", status, body);
            return Err(ClientError::from_status(status, &body));
        }
        Ok(response)
    }

    pub(crate) async fn fetch_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> ClientResult<T> {
        let text = self.execute(builder).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn list_queues(&self) -> ClientResult<Vec<Queue>> {
        self.fetch_json(self.request(Method::GET, "/queue")).await
    }

    pub async fn backend_info(&self) -> ClientResult<BackendVersion> {
        self.fetch_json(self.request(Method::GET, "/")).await
    }
}

#[async_trait]
impl TicketsApi for ApiClient {
    async fn get_ticket(&self, ticket_id: i64) -> ClientResult<Ticket> {
        self.fetch_json(self.request(Method::GET, &format!("/tickets/{ticket_id}")))
            .await
    }

    async fn list_unread_tickets(&self) -> ClientResult<Vec<Ticket>> {
        let builder = self
            .request(Method::GET, "/tickets")
            .query(&[("notClosed", "true"), ("withUnreadMessages", "true")]);
        let page: TicketPage = self.fetch_json(builder).await?;
        let tickets = match page {
            TicketPage::Paged { tickets } => tickets,
            TicketPage::Bare(tickets) => tickets,
        };
        debug!("Loaded {} tickets with unread messages", tickets.len());
        Ok(tickets)
    }

    async fn get_setting(&self, key: &str) -> ClientResult<Option<String>> {
        let path = format!("/settings/{}", urlencoding::encode(key));
        let text = self
            .execute(self.request(Method::GET, &path))
            .await?
            .text()
            .await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) => return Ok(Some(text.trim().to_string())),
        };
        Ok(match value {
            Value::String(s) => Some(s),
            Value::Object(map) => map.get("value").and_then(|v| v.as_str()).map(str::to_string),
            _ => None,
        })
    }
}
