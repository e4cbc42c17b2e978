//! Realtime feed
//!
//! Tenant-scoped ticket, message and contact change events. The transport
//! itself belongs to the host; it pushes decoded frames into a
//! [`SocketProvider`] which fans them out to subscribers.

pub mod hub;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ClientResult;
use crate::models::{Contact, Message, Ticket};

pub use hub::{OutboundFrame, SocketHub};

pub const JOIN_NOTIFICATION: &str = "joinNotification";
pub const JOIN_CHAT_BOX: &str = "joinChatBox";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Ticket,
    AppMessage,
    Contact,
}

impl Channel {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Ticket => "ticket",
            Self::AppMessage => "appMessage",
            Self::Contact => "contact",
        }
    }

    /// Socket event name for a tenant, e.g. `company-7-ticket`.
    pub fn event_name(&self, company_id: &str) -> String {
        format!("company-{}-{}", company_id, self.suffix())
    }

    pub fn parse(company_id: &str, event_name: &str) -> Option<Self> {
        let prefix = format!("company-{company_id}-");
        let suffix = event_name.strip_prefix(&prefix)?;
        [Self::Ticket, Self::AppMessage, Self::Contact]
            .into_iter()
            .find(|c| c.suffix() == suffix)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketEvent {
    pub action: String,
    #[serde(default)]
    pub ticket: Option<Ticket>,
    #[serde(default)]
    pub ticket_id: Option<i64>,
}

impl TicketEvent {
    /// Ticket id the event is about, whichever field carries it.
    pub fn target_id(&self) -> Option<i64> {
        self.ticket.as_ref().map(|t| t.id).or(self.ticket_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMessageEvent {
    pub action: String,
    pub message: Message,
    pub ticket: Ticket,
    #[serde(default)]
    pub contact: Option<Contact>,
}

/// Contact payloads may be partial, so they stay as raw JSON until merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactEvent {
    pub action: String,
    #[serde(default)]
    pub contact: Value,
}

impl ContactEvent {
    pub fn contact_id(&self) -> Option<i64> {
        self.contact.get("id").and_then(Value::as_i64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    Connected,
    Ticket(TicketEvent),
    AppMessage(AppMessageEvent),
    Contact(ContactEvent),
}

pub fn decode_frame(
    company_id: &str,
    event_name: &str,
    payload: &str,
) -> ClientResult<Option<RealtimeEvent>> {
    let event = match Channel::parse(company_id, event_name) {
        Some(Channel::Ticket) => Some(RealtimeEvent::Ticket(serde_json::from_str(payload)?)),
        Some(Channel::AppMessage) => {
            Some(RealtimeEvent::AppMessage(serde_json::from_str(payload)?))
        }
        Some(Channel::Contact) => Some(RealtimeEvent::Contact(serde_json::from_str(payload)?)),
        None => None,
    };
    Ok(event)
}

/// Per-subscriber queue of decoded events, in arrival order. Yields `None`
/// once the tenant feed is disconnected and drained.
pub type EventStream = mpsc::UnboundedReceiver<RealtimeEvent>;

/// Connection-provider capability handed to components that listen to the
/// realtime feed.
#[async_trait]
pub trait SocketProvider: Send + Sync {
    fn subscribe(&self, company_id: &str) -> EventStream;
    async fn emit(&self, company_id: &str, event: &str, payload: Value) -> ClientResult<()>;
    fn disconnect(&self, company_id: &str);
}
