use async_trait::async_trait;
use log::{debug, info};
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;

use super::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::models::Queue;

/// Which level of the option tree to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentFilter {
    Roots,
    Children(i64),
}

impl ParentFilter {
    pub fn as_query(&self) -> i64 {
        match self {
            Self::Roots => -1,
            Self::Children(id) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueOptionRecord {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "de_ordinal")]
    pub option: u32,
    pub queue_id: i64,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub media_path: Option<String>,
    #[serde(default)]
    pub media_name: Option<String>,
    #[serde(default, deserialize_with = "de_forward_queue")]
    pub forward_queue_id: String,
    #[serde(default)]
    pub exit_chatbot: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueOptionPayload {
    pub title: String,
    pub message: String,
    pub option: u32,
    pub queue_id: i64,
    pub parent_id: Option<i64>,
    pub forward_queue_id: Option<String>,
    pub exit_chatbot: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::Invalid(format!("{} has no file name", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(file_name, bytes))
    }
}

/// Media fields the backend stores once an upload went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub media_path: String,
    pub media_name: String,
}

#[derive(Debug, Deserialize)]
struct CreatedOption {
    id: i64,
}

/// Remote collection behind the chatbot option tree.
#[async_trait]
pub trait QueueOptionsApi: Send + Sync {
    async fn list_options(
        &self,
        queue_id: i64,
        parent: ParentFilter,
    ) -> ClientResult<Vec<QueueOptionRecord>>;
    async fn create_option(&self, payload: &QueueOptionPayload) -> ClientResult<i64>;
    async fn update_option(&self, id: i64, payload: &QueueOptionPayload) -> ClientResult<()>;
    async fn delete_option(&self, id: i64) -> ClientResult<()>;
    async fn upload_media(&self, id: i64, attachment: &Attachment) -> ClientResult<MediaRef>;
    async fn delete_media(&self, id: i64) -> ClientResult<()>;
    async fn list_queues(&self) -> ClientResult<Vec<Queue>>;
}

#[async_trait]
impl QueueOptionsApi for ApiClient {
    async fn list_options(
        &self,
        queue_id: i64,
        parent: ParentFilter,
    ) -> ClientResult<Vec<QueueOptionRecord>> {
        let builder = self.request(Method::GET, "/queue-options").query(&[
            ("queueId", queue_id.to_string()),
            ("parentId", parent.as_query().to_string()),
        ]);
        let options: Vec<QueueOptionRecord> = self.fetch_json(builder).await?;
        debug!(
            "Queue {} parent {} has {} options",
            queue_id,
            parent.as_query(),
            options.len()
        );
        Ok(options)
    }

    async fn create_option(&self, payload: &QueueOptionPayload) -> ClientResult<i64> {
        let builder = self.request(Method::POST, "/queue-options").json(payload);
        let created: CreatedOption = self.fetch_json(builder).await?;
        info!("Created queue option {}", created.id);
        Ok(created.id)
    }

    async fn update_option(&self, id: i64, payload: &QueueOptionPayload) -> ClientResult<()> {
        let builder = self
            .request(Method::PUT, &format!("/queue-options/{id}"))
            .json(payload);
        self.execute(builder).await?;
        Ok(())
    }

    async fn delete_option(&self, id: i64) -> ClientResult<()> {
        self.execute(self.request(Method::DELETE, &format!("/queue-options/{id}")))
            .await?;
        info!("Deleted queue option {}", id);
        Ok(())
    }

    async fn upload_media(&self, id: i64, attachment: &Attachment) -> ClientResult<MediaRef> {
        let part = reqwest::multipart::Part::bytes(attachment.bytes.clone())
            .file_name(attachment.file_name.clone())
            .mime_str(&attachment.content_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let builder = self
            .request(Method::POST, &format!("/queue-options/{id}/media-upload"))
            .multipart(form);
        let text = self.execute(builder).await?.text().await?;

        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        let media_path = body
            .get("mediaPath")
            .and_then(Value::as_str)
            .unwrap_or(&attachment.file_name)
            .to_string();
        let media_name = body
            .get("mediaName")
            .and_then(Value::as_str)
            .unwrap_or(&attachment.file_name)
            .to_string();

        info!("Uploaded {} to queue option {}", media_name, id);
        Ok(MediaRef {
            media_path,
            media_name,
        })
    }

    async fn delete_media(&self, id: i64) -> ClientResult<()> {
        self.execute(self.request(Method::DELETE, &format!("/queue-options/{id}/media-upload")))
            .await?;
        Ok(())
    }

    async fn list_queues(&self) -> ClientResult<Vec<Queue>> {
        ApiClient::list_queues(self).await
    }
}

fn de_forward_queue<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s,
        _ => String::new(),
    })
}

fn de_ordinal<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let ordinal = match &value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => Some(0),
    };
    ordinal.ok_or_else(|| serde::de::Error::custom(format!("invalid option ordinal {value}")))
}
