use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ClientResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub profile_pic_url: Option<String>,
    #[serde(default)]
    pub is_group: bool,
}

impl Contact {
    /// Overlays the fields present in `patch` on top of this contact.
    pub fn merged_with(&self, patch: &Value) -> ClientResult<Contact> {
        let mut current = serde_json::to_value(self)?;
        if let (Value::Object(target), Value::Object(source)) = (&mut current, patch) {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(serde_json::from_value(current)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: i64,
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub queue_id: Option<i64>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub unread_messages: Option<u32>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub contact: Option<Contact>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn is_closed(&self) -> bool {
        self.status == "closed"
    }

    pub fn is_unclaimed(&self) -> bool {
        self.user_id.is_none()
    }

    pub fn is_assigned_to(&self, user_id: i64) -> bool {
        self.user_id == Some(user_id)
    }

    /// Route the dashboard navigates to when the ticket is opened.
    pub fn route(&self) -> String {
        match self.uuid {
            Some(uuid) => format!("/tickets/{uuid}"),
            None => format!("/tickets/{}", self.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub ticket_id: i64,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub from_me: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Queue {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// The operator currently signed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub queues: Vec<Queue>,
}

impl Viewer {
    pub fn is_admin(&self) -> bool {
        self.profile == "admin"
    }

    pub fn can_access_queue(&self, queue_id: Option<i64>) -> bool {
        self.is_admin() || self.queues.iter().any(|q| Some(q.id) == queue_id)
    }
}
