//! Notification Panel
//!
//! Keeps the list of tickets with unread messages for the signed-in operator,
//! raises desktop and audible alerts for new messages and retires them when
//! the ticket is closed, read or reassigned elsewhere.

pub mod badge;
pub mod coalescer;
pub mod desktop;
pub mod panel;

pub use badge::{window_title, Badge};
pub use coalescer::{AlertContext, NotificationList, SuppressReason, TicketChange};
pub use desktop::{
    DesktopNotification, DesktopNotifier, DesktopRegistry, LogNotifier, NotificationHandle,
    NotifyError, Permission, SilentPlayer, SoundPlayer,
};
pub use panel::{EventOutcome, NotificationPanel, PanelPreferences};
