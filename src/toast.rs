use log::{error, info};
use std::sync::Mutex;

use crate::error::ClientError;
use crate::i18n::Translations;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Error,
}

/// Transient operator-facing notice.
pub trait Toaster: Send + Sync {
    fn show(&self, kind: ToastKind, message: &str);

    fn error(&self, message: &str) {
        self.show(ToastKind::Error, message);
    }
}

/// Toaster for headless hosts: notices end up in the log. This is the only
/// place a toasted failure is logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogToaster;

impl Toaster for LogToaster {
    fn show(&self, kind: ToastKind, message: &str) {
        match kind {
            ToastKind::Info | ToastKind::Success => info!("{}", message),
            ToastKind::Error => error!("{}", message),
        }
    }
}

/// Keeps every notice; handy for hosts that render a toast stack.
#[derive(Debug, Default)]
pub struct ToastLog {
    entries: Mutex<Vec<(ToastKind, String)>>,
}

impl ToastLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(ToastKind, String)> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(kind, _)| *kind == ToastKind::Error)
            .map(|(_, message)| message)
            .collect()
    }
}

impl Toaster for ToastLog {
    fn show(&self, kind: ToastKind, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((kind, message.to_string()));
        }
    }
}

/// Shows the operator-facing text of `err`. Logging is left to the toaster.
pub fn toast_error(toaster: &dyn Toaster, translations: &Translations, err: &ClientError) {
    toaster.error(&err.toast_message(translations));
}
