use chrono::{DateTime, TimeZone};
use log::{debug, info};
use std::fmt::Display;

use crate::i18n::Translations;
use crate::realtime::AppMessageEvent;

const VCARD_PREFIX: &str = r#"{"ticketzvCard""#;
const VCARD_GLYPH: &str = "🪪";

/// OS-level notification to raise for an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopNotification {
    pub tag: String,
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub renotify: bool,
    /// Route to open when the operator clicks the notification.
    pub route: String,
}

impl DesktopNotification {
    pub fn for_message<Tz>(
        event: &AppMessageEvent,
        translations: &Translations,
        at: &DateTime<Tz>,
    ) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let contact = event.contact.as_ref().or(event.ticket.contact.as_ref());
        let contact_name = contact.map(|c| c.name.as_str()).unwrap_or_default();

        let body = if event.message.body.starts_with(VCARD_PREFIX) {
            VCARD_GLYPH
        } else {
            event.message.body.as_str()
        };

        Self {
            tag: event.ticket.id.to_string(),
            title: format!(
                "{} {}",
                translations.t("tickets.notification.message"),
                contact_name
            ),
            body: format!("{}\n{}", at.format("%H:%M"), body),
            icon: contact.and_then(|c| c.profile_pic_url.clone()),
            renotify: true,
            route: event.ticket.route(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    Default,
    Unsupported,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification permission denied")]
    PermissionDenied,
    #[error("Desktop notifications are not supported")]
    Unsupported,
    #[error("Failed to show notification: {0}")]
    Failed(String),
}

/// A live OS notification.
pub trait NotificationHandle: Send + Sync {
    fn tag(&self) -> &str;
    fn close(&self);
}

pub trait DesktopNotifier: Send + Sync {
    fn request_permission(&self) -> Permission;
    fn show(
        &self,
        notification: &DesktopNotification,
    ) -> Result<Box<dyn NotificationHandle>, NotifyError>;
}

pub trait SoundPlayer: Send + Sync {
    fn play(&self, volume: f32);
}

/// Live handles, at most one per tag.
#[derive(Default)]
pub struct DesktopRegistry {
    handles: Vec<Box<dyn NotificationHandle>>,
}

impl DesktopRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a handle, closing and replacing any live one with the same tag.
    pub fn register(&mut self, handle: Box<dyn NotificationHandle>) {
        match self.handles.iter().position(|h| h.tag() == handle.tag()) {
            Some(index) => {
                debug!("Superseding desktop notification {}", handle.tag());
                self.handles[index].close();
                self.handles[index] = handle;
            }
            None => self.handles.insert(0, handle),
        }
    }

    /// Closes and forgets the handle for `tag`.
    pub fn retire(&mut self, tag: &str) -> bool {
        match self.handles.iter().position(|h| h.tag() == tag) {
            Some(index) => {
                let handle = self.handles.remove(index);
                handle.close();
                true
            }
            None => false,
        }
    }

    pub fn retire_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.close();
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.handles.iter().any(|h| h.tag() == tag)
    }

    pub fn tags(&self) -> Vec<String> {
        self.handles.iter().map(|h| h.tag().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl std::fmt::Debug for DesktopRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesktopRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

/// Notifier for hosts without an OS notification center.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

struct LogHandle {
    tag: String,
}

impl NotificationHandle for LogHandle {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn close(&self) {
        debug!("Closed notification {}", self.tag);
    }
}

impl DesktopNotifier for LogNotifier {
    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn show(
        &self,
        notification: &DesktopNotification,
    ) -> Result<Box<dyn NotificationHandle>, NotifyError> {
        info!("{} | {}", notification.title, notification.body.replace('\n', " "));
        Ok(Box::new(LogHandle {
            tag: notification.tag.clone(),
        }))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPlayer;

impl SoundPlayer for SilentPlayer {
    fn play(&self, volume: f32) {
        debug!("Alert sound suppressed (volume {})", volume);
    }
}
