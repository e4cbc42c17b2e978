use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::badge::Badge;
use super::coalescer::{
    classify_ticket_event, suppression, tracks_message, AlertContext, NotificationList,
    SuppressReason, TicketChange,
};
use super::desktop::{DesktopNotification, DesktopNotifier, DesktopRegistry, Permission, SoundPlayer};
use crate::api::TicketsApi;
use crate::error::ClientResult;
use crate::i18n::Translations;
use crate::models::{Ticket, Viewer};
use crate::realtime::{
    AppMessageEvent, EventStream, RealtimeEvent, SocketProvider, TicketEvent, JOIN_NOTIFICATION,
};
use crate::storage::{KeyValueStore, ALERT_VOLUME_KEY};

pub const SOUND_GROUP_NOTIFICATIONS: &str = "soundGroupNotifications";
pub const CHECK_MSG_IS_GROUP: &str = "CheckMsgIsGroup";
pub const GROUPS_TAB: &str = "groupsTab";

/// Tenant settings that shape how the panel alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelPreferences {
    pub group_sound_alerts: bool,
    /// Hosts hide per-ticket group actions when this is false.
    pub show_group_tab: bool,
}

impl PanelPreferences {
    pub fn from_settings(
        sound_group: Option<&str>,
        check_msg_is_group: Option<&str>,
        groups_tab: Option<&str>,
    ) -> Self {
        Self {
            group_sound_alerts: sound_group == Some("enabled"),
            show_group_tab: check_msg_is_group == Some("disabled") && groups_tab == Some("enabled"),
        }
    }

    /// Reads the three settings; a failed lookup counts as unset.
    pub async fn load(api: &dyn TicketsApi) -> Self {
        let mut values = Vec::with_capacity(3);
        for key in [SOUND_GROUP_NOTIFICATIONS, CHECK_MSG_IS_GROUP, GROUPS_TAB] {
            let value = match api.get_setting(key).await {
                Ok(value) => value,
                Err(e) => {
                    warn!("Could not read setting {}: {}", key, e);
                    None
                }
            };
            values.push(value);
        }
        Self::from_settings(values[0].as_deref(), values[1].as_deref(), values[2].as_deref())
    }
}

/// What handling a single realtime event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Joined,
    Alerted(i64),
    Suppressed(i64, SuppressReason),
    Cleared(i64),
    Refreshed(i64),
    Ignored,
}

type Clock = Box<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Unread-ticket popover state fed by the realtime feed.
pub struct NotificationPanel {
    company_id: String,
    viewer: Viewer,
    translations: Translations,
    app_name: String,
    volume: f32,
    socket: Arc<dyn SocketProvider>,
    notifier: Arc<dyn DesktopNotifier>,
    player: Arc<dyn SoundPlayer>,
    list: NotificationList,
    registry: DesktopRegistry,
    prefs: PanelPreferences,
    active_ticket_id: Option<i64>,
    page_visible: bool,
    open: bool,
    clock: Clock,
}

impl NotificationPanel {
    pub fn new(
        company_id: impl Into<String>,
        viewer: Viewer,
        translations: Translations,
        socket: Arc<dyn SocketProvider>,
        notifier: Arc<dyn DesktopNotifier>,
        player: Arc<dyn SoundPlayer>,
    ) -> Self {
        Self {
            company_id: company_id.into(),
            viewer,
            translations,
            app_name: String::new(),
            volume: 1.0,
            socket,
            notifier,
            player,
            list: NotificationList::new(),
            registry: DesktopRegistry::new(),
            prefs: PanelPreferences::default(),
            active_ticket_id: None,
            page_visible: true,
            open: false,
            clock: Box::new(Local::now),
        }
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    /// Uses the stored alert volume when one was saved.
    pub fn with_stored_volume(self, store: &dyn KeyValueStore) -> Self {
        match store.get(ALERT_VOLUME_KEY).and_then(|v| v.parse::<f32>().ok()) {
            Some(volume) => self.with_volume(volume),
            None => self,
        }
    }

    pub fn with_preferences(mut self, prefs: PanelPreferences) -> Self {
        self.prefs = prefs;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Local> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn request_permission(&self) -> Permission {
        let permission = self.notifier.request_permission();
        if permission != Permission::Granted {
            info!("Desktop notifications not granted: {:?}", permission);
        }
        permission
    }

    pub async fn load_preferences(&mut self, api: &dyn TicketsApi) -> PanelPreferences {
        self.prefs = PanelPreferences::load(api).await;
        self.prefs
    }

    /// Replaces the list with the backend's unread, not-closed tickets.
    pub async fn seed(&mut self, api: &dyn TicketsApi) -> ClientResult<usize> {
        let tickets = api.list_unread_tickets().await?;
        self.list = NotificationList::seeded(tickets);
        info!(
            "Notification panel seeded with {} tickets for company {}",
            self.list.len(),
            self.company_id
        );
        Ok(self.list.len())
    }

    pub fn subscribe(&self) -> EventStream {
        self.socket.subscribe(&self.company_id)
    }

    /// Processes events in arrival order until cancelled or the feed closes,
    /// then tears the subscription down.
    pub async fn run(
        &mut self,
        mut events: EventStream,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Notification panel cancelled");
                    break;
                }
                received = events.recv() => match received {
                    Some(event) => {
                        if let Err(e) = self.handle_event(event).await {
                            warn!("Notification event failed: {}", e);
                        }
                    }
                    None => {
                        debug!("Realtime feed closed for company {}", self.company_id);
                        break;
                    }
                }
            }
        }
        self.dispose();
    }

    pub async fn handle_event(&mut self, event: RealtimeEvent) -> ClientResult<EventOutcome> {
        match event {
            RealtimeEvent::Connected => {
                self.socket
                    .emit(&self.company_id, JOIN_NOTIFICATION, Value::Null)
                    .await?;
                Ok(EventOutcome::Joined)
            }
            RealtimeEvent::Ticket(event) => Ok(self.on_ticket(&event)),
            RealtimeEvent::AppMessage(event) => Ok(self.on_message(&event)),
            RealtimeEvent::Contact(_) => Ok(EventOutcome::Ignored),
        }
    }

    fn on_ticket(&mut self, event: &TicketEvent) -> EventOutcome {
        match classify_ticket_event(event, self.viewer.id) {
            TicketChange::Clear(ticket_id) => {
                self.clear(ticket_id);
                EventOutcome::Cleared(ticket_id)
            }
            TicketChange::Refresh(ticket_id) => match &event.ticket {
                Some(ticket) if self.list.contains(ticket_id) => {
                    self.list = self.list.refreshed(ticket.clone());
                    EventOutcome::Refreshed(ticket_id)
                }
                _ => EventOutcome::Ignored,
            },
            TicketChange::Ignore => EventOutcome::Ignored,
        }
    }

    fn on_message(&mut self, event: &AppMessageEvent) -> EventOutcome {
        if !tracks_message(event, self.viewer.id) {
            return EventOutcome::Ignored;
        }

        let ticket_id = event.ticket.id;
        let mut ticket = event.ticket.clone();
        if ticket.contact.is_none() {
            ticket.contact = event.contact.clone();
        }
        self.list = self.list.upserted(ticket);

        if let Some(reason) = suppression(event, &self.alert_context()) {
            debug!("Alert for ticket {} suppressed: {:?}", ticket_id, reason);
            return EventOutcome::Suppressed(ticket_id, reason);
        }

        self.alert(event);
        EventOutcome::Alerted(ticket_id)
    }

    fn alert(&mut self, event: &AppMessageEvent) {
        let now = (self.clock)();
        let notification = DesktopNotification::for_message(event, &self.translations, &now);
        match self.notifier.show(&notification) {
            Ok(handle) => self.registry.register(handle),
            Err(e) => error!("Desktop notification for ticket {} failed: {}", notification.tag, e),
        }
        self.player.play(self.volume);
    }

    fn clear(&mut self, ticket_id: i64) {
        self.list = self.list.without(ticket_id);
        self.registry.retire(&ticket_id.to_string());
    }

    fn alert_context(&self) -> AlertContext {
        AlertContext {
            viewer_id: self.viewer.id,
            active_ticket_id: self.active_ticket_id,
            page_visible: self.page_visible,
            group_sound_alerts: self.prefs.group_sound_alerts,
        }
    }

    /// Closes every live desktop notification and disconnects the feed.
    pub fn dispose(&mut self) {
        self.registry.retire_all();
        self.socket.disconnect(&self.company_id);
    }

    pub fn list(&self) -> &NotificationList {
        &self.list
    }

    pub fn tickets(&self) -> &[Ticket] {
        self.list.tickets()
    }

    pub fn registry(&self) -> &DesktopRegistry {
        &self.registry
    }

    pub fn preferences(&self) -> PanelPreferences {
        self.prefs
    }

    pub fn badge(&self) -> Badge {
        Badge::new(self.list.len(), &self.app_name)
    }

    pub fn empty_text(&self) -> Option<String> {
        if self.list.is_empty() {
            Some(self.translations.t("notifications.noTickets"))
        } else {
            None
        }
    }

    pub fn set_active_ticket(&mut self, ticket_id: Option<i64>) {
        self.active_ticket_id = ticket_id;
    }

    pub fn set_page_visible(&mut self, visible: bool) {
        self.page_visible = visible;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn toggle_open(&mut self) -> bool {
        self.open = !self.open;
        self.open
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    /// Route for a clicked entry; the popover closes.
    pub fn open_ticket(&mut self, ticket_id: i64) -> Option<String> {
        let route = self.list.get(ticket_id).map(Ticket::route)?;
        self.open = false;
        Some(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::i18n::Locale;
    use crate::models::{Message, Queue};
    use crate::notifications::desktop::{NotificationHandle, NotifyError};
    use crate::realtime::SocketHub;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeNotifier {
        shown: Mutex<Vec<DesktopNotification>>,
        closed: Arc<AtomicUsize>,
        fail: bool,
    }

    struct FakeHandle {
        tag: String,
        closed: Arc<AtomicUsize>,
    }

    impl NotificationHandle for FakeHandle {
        fn tag(&self) -> &str {
            &self.tag
        }

        fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl DesktopNotifier for FakeNotifier {
        fn request_permission(&self) -> Permission {
            Permission::Granted
        }

        fn show(
            &self,
            notification: &DesktopNotification,
        ) -> Result<Box<dyn NotificationHandle>, NotifyError> {
            if self.fail {
                return Err(NotifyError::PermissionDenied);
            }
            self.shown.lock().unwrap().push(notification.clone());
            Ok(Box::new(FakeHandle {
                tag: notification.tag.clone(),
                closed: self.closed.clone(),
            }))
        }
    }

    #[derive(Default)]
    struct FakePlayer {
        plays: AtomicUsize,
    }

    impl SoundPlayer for FakePlayer {
        fn play(&self, _volume: f32) {
            self.plays.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeApi {
        tickets: Vec<Ticket>,
    }

    #[async_trait]
    impl TicketsApi for FakeApi {
        async fn get_ticket(&self, ticket_id: i64) -> ClientResult<Ticket> {
            Err(ClientError::NotFound(format!("ticket {ticket_id}")))
        }

        async fn list_unread_tickets(&self) -> ClientResult<Vec<Ticket>> {
            Ok(self.tickets.clone())
        }

        async fn get_setting(&self, key: &str) -> ClientResult<Option<String>> {
            match key {
                SOUND_GROUP_NOTIFICATIONS => Ok(Some("enabled".to_string())),
                CHECK_MSG_IS_GROUP => Ok(Some("disabled".to_string())),
                _ => Err(ClientError::Invalid("setting unavailable".to_string())),
            }
        }
    }

    fn viewer() -> Viewer {
        Viewer {
            id: 1,
            name: "op".to_string(),
            profile: "user".to_string(),
            queues: vec![Queue { id: 2, name: "Support".to_string(), color: None }],
        }
    }

    fn ticket(id: i64) -> Ticket {
        Ticket {
            id,
            uuid: None,
            status: "pending".to_string(),
            user_id: None,
            queue_id: Some(2),
            is_group: false,
            unread_messages: Some(1),
            last_message: None,
            contact: None,
            updated_at: None,
        }
    }

    fn message(ticket: Ticket, body: &str) -> RealtimeEvent {
        let mut ticket = ticket;
        ticket.last_message = Some(body.to_string());
        RealtimeEvent::AppMessage(AppMessageEvent {
            action: "create".to_string(),
            message: Message {
                id: body.to_string(),
                ticket_id: ticket.id,
                body: body.to_string(),
                read: false,
                from_me: false,
            },
            ticket,
            contact: None,
        })
    }

    fn panel(
        notifier: Arc<FakeNotifier>,
        player: Arc<FakePlayer>,
    ) -> (NotificationPanel, Arc<SocketHub>) {
        let (hub, _outbound) = SocketHub::new();
        let hub = Arc::new(hub);
        let panel = NotificationPanel::new(
            "1",
            viewer(),
            Translations::for_locale(&Locale::default()),
            hub.clone(),
            notifier,
            player,
        )
        .with_app_name("Desk")
        .with_clock(|| Local.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap());
        (panel, hub)
    }

    #[tokio::test]
    async fn test_preferences_from_settings() {
        let api = FakeApi { tickets: vec![] };
        let prefs = PanelPreferences::load(&api).await;
        assert!(prefs.group_sound_alerts);
        assert!(!prefs.show_group_tab);

        let prefs = PanelPreferences::from_settings(None, Some("disabled"), Some("enabled"));
        assert!(prefs.show_group_tab);
        assert!(!prefs.group_sound_alerts);
    }

    #[tokio::test]
    async fn test_seed_and_badge() {
        let (mut panel, _hub) = panel(Arc::default(), Arc::default());
        assert_eq!(panel.empty_text().as_deref(), Some("Nenhuma notificação."));

        let api = FakeApi { tickets: vec![ticket(1), ticket(2), ticket(1)] };
        assert_eq!(panel.seed(&api).await.unwrap(), 2);
        assert_eq!(panel.badge().title, "➋ - Desk");
        assert!(panel.empty_text().is_none());
    }

    #[tokio::test]
    async fn test_desktop_failure_still_plays_sound() {
        let notifier = Arc::new(FakeNotifier { fail: true, ..Default::default() });
        let player = Arc::new(FakePlayer::default());
        let (mut panel, _hub) = panel(notifier, player.clone());

        let outcome = panel.handle_event(message(ticket(9), "Oi")).await.unwrap();

        assert_eq!(outcome, EventOutcome::Alerted(9));
        assert_eq!(player.plays.load(Ordering::SeqCst), 1);
        assert!(panel.registry().is_empty());
        assert_eq!(panel.tickets().len(), 1);
    }

    #[tokio::test]
    async fn test_active_ticket_is_tracked_but_silent() {
        let player = Arc::new(FakePlayer::default());
        let (mut panel, _hub) = panel(Arc::default(), player.clone());
        panel.set_active_ticket(Some(9));

        let outcome = panel.handle_event(message(ticket(9), "Oi")).await.unwrap();

        assert_eq!(outcome, EventOutcome::Suppressed(9, SuppressReason::ActiveView));
        assert_eq!(player.plays.load(Ordering::SeqCst), 0);
        assert!(panel.list().contains(9));
    }

    #[tokio::test]
    async fn test_refresh_keeps_position() {
        let (mut panel, _hub) = panel(Arc::default(), Arc::default());
        panel.seed(&FakeApi { tickets: vec![ticket(1), ticket(2)] }).await.unwrap();

        let mut newer = ticket(2);
        newer.unread_messages = Some(4);
        let outcome = panel
            .handle_event(RealtimeEvent::Ticket(TicketEvent {
                action: "update".to_string(),
                ticket: Some(newer),
                ticket_id: None,
            }))
            .await
            .unwrap();

        assert_eq!(outcome, EventOutcome::Refreshed(2));
        assert_eq!(panel.tickets()[1].unread_messages, Some(4));
    }

    #[tokio::test]
    async fn test_connected_joins_notification_room() {
        let (hub, mut outbound) = SocketHub::new();
        let mut panel = NotificationPanel::new(
            "3",
            viewer(),
            Translations::for_locale(&Locale::default()),
            Arc::new(hub),
            Arc::new(FakeNotifier::default()),
            Arc::new(FakePlayer::default()),
        );

        let outcome = panel.handle_event(RealtimeEvent::Connected).await.unwrap();

        assert_eq!(outcome, EventOutcome::Joined);
        let frame = outbound.recv().await.unwrap();
        assert_eq!(frame.event, JOIN_NOTIFICATION);
        assert_eq!(frame.company_id, "3");
    }

    #[tokio::test]
    async fn test_open_ticket_closes_popover() {
        let (mut panel, _hub) = panel(Arc::default(), Arc::default());
        panel.seed(&FakeApi { tickets: vec![ticket(5)] }).await.unwrap();
        assert!(panel.toggle_open());

        assert_eq!(panel.open_ticket(5).as_deref(), Some("/tickets/5"));
        assert!(!panel.is_open());
        assert!(panel.open_ticket(6).is_none());
    }

    #[test]
    fn test_stored_volume() {
        let store = MemoryStore::new();
        store.set(ALERT_VOLUME_KEY, "0.4").unwrap();
        let (panel, _hub) = panel(Arc::default(), Arc::default());
        let panel = panel.with_stored_volume(&store);
        assert!((panel.volume - 0.4).abs() < f32::EPSILON);
    }
}
