use crate::models::Ticket;
use crate::realtime::{AppMessageEvent, TicketEvent};

/// Distinct tickets with unread messages, identified by ticket id.
///
/// Every transition builds a fresh sequence; a list handed out earlier never
/// changes underneath its holder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationList {
    tickets: Vec<Ticket>,
}

impl NotificationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from a backend listing, keeping the first occurrence of
    /// each ticket id.
    pub fn seeded(tickets: Vec<Ticket>) -> Self {
        let mut distinct: Vec<Ticket> = Vec::with_capacity(tickets.len());
        for ticket in tickets {
            if !distinct.iter().any(|t| t.id == ticket.id) {
                distinct.push(ticket);
            }
        }
        Self { tickets: distinct }
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn contains(&self, ticket_id: i64) -> bool {
        self.tickets.iter().any(|t| t.id == ticket_id)
    }

    pub fn get(&self, ticket_id: i64) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.id == ticket_id)
    }

    /// Replaces the entry with the same id in place, or prepends.
    pub fn upserted(&self, ticket: Ticket) -> Self {
        if self.contains(ticket.id) {
            return self.refreshed(ticket);
        }
        let mut tickets = Vec::with_capacity(self.tickets.len() + 1);
        tickets.push(ticket);
        tickets.extend(self.tickets.iter().cloned());
        Self { tickets }
    }

    /// Replaces the entry with the same id; unknown tickets are not added.
    pub fn refreshed(&self, ticket: Ticket) -> Self {
        let tickets = self
            .tickets
            .iter()
            .map(|t| if t.id == ticket.id { ticket.clone() } else { t.clone() })
            .collect();
        Self { tickets }
    }

    pub fn without(&self, ticket_id: i64) -> Self {
        let tickets = self
            .tickets
            .iter()
            .filter(|t| t.id != ticket_id)
            .cloned()
            .collect();
        Self { tickets }
    }
}

/// What the panel knows about the viewer when a message arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertContext {
    pub viewer_id: i64,
    pub active_ticket_id: Option<i64>,
    pub page_visible: bool,
    pub group_sound_alerts: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    ActiveView,
    AssignedElsewhere,
    GroupMuted,
}

/// Whether a message event belongs in the viewer's notification list.
pub fn tracks_message(event: &AppMessageEvent, viewer_id: i64) -> bool {
    event.action == "create"
        && !event.message.read
        && (event.ticket.is_unclaimed() || event.ticket.is_assigned_to(viewer_id))
}

pub fn suppression(event: &AppMessageEvent, ctx: &AlertContext) -> Option<SuppressReason> {
    if ctx.page_visible && ctx.active_ticket_id == Some(event.message.ticket_id) {
        return Some(SuppressReason::ActiveView);
    }
    if matches!(event.ticket.user_id, Some(owner) if owner != ctx.viewer_id) {
        return Some(SuppressReason::AssignedElsewhere);
    }
    if event.ticket.is_group && !ctx.group_sound_alerts {
        return Some(SuppressReason::GroupMuted);
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketChange {
    /// Drop the entry and retire its desktop notification.
    Clear(i64),
    /// Keep the entry but take the newer payload.
    Refresh(i64),
    Ignore,
}

pub fn classify_ticket_event(event: &TicketEvent, viewer_id: i64) -> TicketChange {
    if let Some(ticket) = &event.ticket {
        if ticket.is_closed() {
            return TicketChange::Clear(ticket.id);
        }
    }

    match event.action.as_str() {
        "updateUnread" | "delete" => match event.target_id() {
            Some(id) => TicketChange::Clear(id),
            None => TicketChange::Ignore,
        },
        "update" => match &event.ticket {
            Some(ticket) => {
                let reassigned = matches!(ticket.user_id, Some(owner) if owner != viewer_id);
                let read = ticket.unread_messages == Some(0);
                if reassigned || read {
                    TicketChange::Clear(ticket.id)
                } else {
                    TicketChange::Refresh(ticket.id)
                }
            }
            None => TicketChange::Ignore,
        },
        _ => TicketChange::Ignore,
    }
}
