//! Ticket Messages Dialog
//!
//! Loads a ticket after a short debounce, checks the operator may see its
//! queue and keeps it current from the realtime feed.

use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::TicketsApi;
use crate::error::{ClientError, ClientResult};
use crate::i18n::Translations;
use crate::models::{Contact, Ticket, Viewer};
use crate::realtime::{
    ContactEvent, EventStream, RealtimeEvent, SocketProvider, TicketEvent, JOIN_CHAT_BOX,
};
use crate::toast::{toast_error, ToastKind, Toaster};

pub const TICKETS_ROUTE: &str = "/tickets";

/// What the dialog currently shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DialogView {
    pub ticket_id: Option<i64>,
    pub loading: bool,
    pub ticket: Option<Ticket>,
    pub contact: Option<Contact>,
    /// Set when the host should navigate away.
    pub redirect: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogUpdate {
    Joined,
    TicketReplaced,
    TicketDeleted,
    ContactMerged,
    Ignored,
}

#[derive(Clone)]
struct Shared {
    api: Arc<dyn TicketsApi>,
    toaster: Arc<dyn Toaster>,
    translations: Translations,
    viewer: Viewer,
    view: Arc<RwLock<DialogView>>,
}

pub struct TicketDialog {
    shared: Shared,
    socket: Arc<dyn SocketProvider>,
    company_id: String,
    debounce: Duration,
    pending: Option<CancellationToken>,
}

impl TicketDialog {
    pub fn new(
        company_id: impl Into<String>,
        viewer: Viewer,
        translations: Translations,
        api: Arc<dyn TicketsApi>,
        socket: Arc<dyn SocketProvider>,
        toaster: Arc<dyn Toaster>,
        debounce: Duration,
    ) -> Self {
        Self {
            shared: Shared {
                api,
                toaster,
                translations,
                viewer,
                view: Arc::new(RwLock::new(DialogView::default())),
            },
            socket,
            company_id: company_id.into(),
            debounce,
            pending: None,
        }
    }

    pub async fn view(&self) -> DialogView {
        self.shared.view.read().await.clone()
    }

    /// Schedules the fetch of `ticket_id` after the debounce; any fetch
    /// still waiting is abandoned.
    pub async fn open(&mut self, ticket_id: i64) -> JoinHandle<()> {
        if let Some(previous) = self.pending.take() {
            previous.cancel();
        }
        {
            let mut view = self.shared.view.write().await;
            *view = DialogView {
                ticket_id: Some(ticket_id),
                loading: true,
                ..DialogView::default()
            };
        }

        let token = CancellationToken::new();
        self.pending = Some(token.clone());
        let shared = self.shared.clone();
        let debounce = self.debounce;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Fetch of ticket {} abandoned", ticket_id);
                    return;
                }
                _ = tokio::time::sleep(debounce) => {}
            }

            let result = shared.api.get_ticket(ticket_id).await;
            if token.is_cancelled() {
                return;
            }
            shared.apply_fetch(ticket_id, result).await;
        })
    }

    pub async fn close(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
        *self.shared.view.write().await = DialogView::default();
    }

    pub fn subscribe(&self) -> EventStream {
        self.socket.subscribe(&self.company_id)
    }

    pub async fn run(&self, mut events: EventStream, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = events.recv() => match received {
                    Some(event) => {
                        if let Err(e) = self.handle_event(event).await {
                            warn!("Ticket dialog event failed: {}", e);
                        }
                    }
                    None => break,
                }
            }
        }
    }

    pub async fn handle_event(&self, event: RealtimeEvent) -> ClientResult<DialogUpdate> {
        let Some(ticket_id) = self.shared.view.read().await.ticket_id else {
            return Ok(DialogUpdate::Ignored);
        };

        match event {
            RealtimeEvent::Connected => {
                self.socket
                    .emit(
                        &self.company_id,
                        JOIN_CHAT_BOX,
                        Value::String(ticket_id.to_string()),
                    )
                    .await?;
                Ok(DialogUpdate::Joined)
            }
            RealtimeEvent::Ticket(event) => Ok(self.shared.on_ticket(ticket_id, event).await),
            RealtimeEvent::Contact(event) => self.shared.on_contact(event).await,
            RealtimeEvent::AppMessage(_) => Ok(DialogUpdate::Ignored),
        }
    }
}

impl Shared {
    async fn apply_fetch(&self, ticket_id: i64, result: ClientResult<Ticket>) {
        let mut view = self.view.write().await;
        if view.ticket_id != Some(ticket_id) {
            return;
        }
        view.loading = false;

        let ticket = match result {
            Ok(ticket) => ticket,
            Err(e) => {
                toast_error(self.toaster.as_ref(), &self.translations, &e);
                return;
            }
        };

        if !self.viewer.can_access_queue(ticket.queue_id) {
            let denied = ClientError::AccessDenied(format!(
                "user {} may not open ticket {} in queue {:?}",
                self.viewer.id, ticket.id, ticket.queue_id
            ));
            toast_error(self.toaster.as_ref(), &self.translations, &denied);
            view.redirect = Some(TICKETS_ROUTE.to_string());
            return;
        }

        view.contact = ticket.contact.clone();
        view.ticket = Some(ticket);
    }

    async fn on_ticket(&self, ticket_id: i64, event: TicketEvent) -> DialogUpdate {
        if event.target_id() != Some(ticket_id) {
            return DialogUpdate::Ignored;
        }

        let mut view = self.view.write().await;
        match (event.action.as_str(), event.ticket) {
            ("update", Some(ticket)) => {
                if ticket.contact.is_some() {
                    view.contact = ticket.contact.clone();
                }
                view.ticket = Some(ticket);
                DialogUpdate::TicketReplaced
            }
            ("delete", _) => {
                self.toaster
                    .show(ToastKind::Success, &self.translations.t("tickets.toasts.deleted"));
                view.ticket = None;
                view.redirect = Some(TICKETS_ROUTE.to_string());
                DialogUpdate::TicketDeleted
            }
            _ => DialogUpdate::Ignored,
        }
    }

    async fn on_contact(&self, event: ContactEvent) -> ClientResult<DialogUpdate> {
        if event.action != "update" {
            return Ok(DialogUpdate::Ignored);
        }

        let mut view = self.view.write().await;
        let merged = match &view.contact {
            Some(contact) if Some(contact.id) == event.contact_id() => {
                contact.merged_with(&event.contact)?
            }
            _ => return Ok(DialogUpdate::Ignored),
        };
        view.contact = Some(merged);
        Ok(DialogUpdate::ContactMerged)
    }
}
