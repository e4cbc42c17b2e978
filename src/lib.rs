//! Client core of a multi-tenant support desk: the unread-ticket
//! notification panel, the chatbot option tree editor and the ticket
//! dialog, with the REST and realtime plumbing they share.

pub mod about;
pub mod api;
pub mod config;
pub mod error;
pub mod i18n;
pub mod models;
pub mod notifications;
pub mod queue_options;
pub mod realtime;
pub mod storage;
pub mod tickets;
pub mod toast;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
