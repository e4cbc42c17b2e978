use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

use super::{decode_frame, EventStream, RealtimeEvent, SocketProvider};
use crate::error::{ClientError, ClientResult};

/// Frame a component asked to send upstream (`joinNotification`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    pub company_id: String,
    pub event: String,
    pub payload: Value,
}

/// In-process fan-out between the host's socket bridge and subscribers.
///
/// Every subscriber owns an unbounded queue, so a burst is never evicted
/// before it is read. Emitted frames go out through the receiver returned
/// by [`SocketHub::new`].
pub struct SocketHub {
    tenants: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<RealtimeEvent>>>>,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
}

impl SocketHub {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        (
            Self {
                tenants: Mutex::new(HashMap::new()),
                outbound,
            },
            rx,
        )
    }

    /// Delivers an event to every current subscriber of the tenant and
    /// returns how many received it. Dropped subscribers are pruned.
    pub fn publish(&self, company_id: &str, event: RealtimeEvent) -> usize {
        let mut tenants = self.tenants.lock().unwrap_or_else(|e| e.into_inner());
        let Some(senders) = tenants.get_mut(company_id) else {
            return 0;
        };
        senders.retain(|sender| sender.send(event.clone()).is_ok());
        if senders.is_empty() {
            debug!("No active subscribers for company {}", company_id);
        }
        senders.len()
    }

    pub fn publish_frame(&self, company_id: &str, event_name: &str, payload: &str) -> ClientResult<usize> {
        match decode_frame(company_id, event_name, payload)? {
            Some(event) => Ok(self.publish(company_id, event)),
            None => {
                debug!("Ignoring frame {} for company {}", event_name, company_id);
                Ok(0)
            }
        }
    }

    /// Signals that the underlying socket (re)connected.
    pub fn connected(&self, company_id: &str) -> usize {
        self.publish(company_id, RealtimeEvent::Connected)
    }

    pub fn subscriber_count(&self, company_id: &str) -> usize {
        let tenants = self.tenants.lock().unwrap_or_else(|e| e.into_inner());
        tenants
            .get(company_id)
            .map(|senders| senders.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl SocketProvider for SocketHub {
    fn subscribe(&self, company_id: &str) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut tenants = self.tenants.lock().unwrap_or_else(|e| e.into_inner());
        tenants.entry(company_id.to_string()).or_default().push(tx);
        rx
    }

    async fn emit(&self, company_id: &str, event: &str, payload: Value) -> ClientResult<()> {
        self.outbound
            .send(OutboundFrame {
                company_id: company_id.to_string(),
                event: event.to_string(),
                payload,
            })
            .map_err(|_| ClientError::Invalid(format!("socket bridge closed, {event} dropped")))
    }

    fn disconnect(&self, company_id: &str) {
        let mut tenants = self.tenants.lock().unwrap_or_else(|e| e.into_inner());
        if tenants.remove(company_id).is_some() {
            info!("Disconnected realtime feed for company {}", company_id);
        } else {
            warn!("Disconnect requested for unknown company {}", company_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::JOIN_NOTIFICATION;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let (hub, _outbound) = SocketHub::new();
        let mut rx = hub.subscribe("1");

        let delivered = hub
            .publish_frame("1", "company-1-ticket", r#"{"action":"updateUnread","ticketId":3}"#)
            .unwrap();

        assert_eq!(delivered, 1);
        assert!(matches!(rx.recv().await.unwrap(), RealtimeEvent::Ticket(_)));
    }

    #[tokio::test]
    async fn test_burst_is_delivered_in_full() {
        let (hub, _outbound) = SocketHub::new();
        let mut rx = hub.subscribe("1");

        for id in 0..1000 {
            let payload = format!(r#"{{"action":"update","contact":{{"id":{id}}}}}"#);
            hub.publish_frame("1", "company-1-contact", &payload).unwrap();
        }

        for id in 0..1000 {
            match rx.recv().await {
                Some(RealtimeEvent::Contact(event)) => assert_eq!(event.contact_id(), Some(id)),
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let (hub, _outbound) = SocketHub::new();
        let rx = hub.subscribe("1");
        let _kept = hub.subscribe("1");
        drop(rx);

        assert_eq!(hub.subscriber_count("1"), 1);
        assert_eq!(hub.connected("1"), 1);
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let (hub, _outbound) = SocketHub::new();
        let _rx = hub.subscribe("1");
        assert_eq!(hub.connected("2"), 0);
        assert_eq!(hub.connected("1"), 1);
    }

    #[tokio::test]
    async fn test_emit_goes_outbound() {
        let (hub, mut outbound) = SocketHub::new();
        hub.emit("1", JOIN_NOTIFICATION, Value::Null).await.unwrap();
        let frame = outbound.recv().await.unwrap();
        assert_eq!(frame.event, JOIN_NOTIFICATION);
        assert_eq!(frame.company_id, "1");
    }

    #[tokio::test]
    async fn test_disconnect_closes_subscribers() {
        let (hub, _outbound) = SocketHub::new();
        let mut rx = hub.subscribe("1");
        hub.connected("1");
        hub.disconnect("1");
        assert_eq!(rx.recv().await, Some(RealtimeEvent::Connected));
        assert_eq!(rx.recv().await, None);
        assert_eq!(hub.subscriber_count("1"), 0);
    }
}
