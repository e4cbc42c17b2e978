use reqwest::StatusCode;
use serde::Deserialize;

use crate::i18n::Translations;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Request failed with {status}: {message}")]
    Status {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid operation: {0}")]
    Invalid(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl ClientError {
    /// Builds a status error from a non-success response body.
    ///
    /// The backend answers with `{ "error": "ERR_..." }`; anything else is kept
    /// verbatim as the message.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<BackendErrorBody>(body) {
            Ok(parsed) => {
                let message = parsed
                    .message
                    .clone()
                    .or_else(|| parsed.error.clone())
                    .unwrap_or_else(|| body.to_string());
                Self::Status {
                    status,
                    code: parsed.error,
                    message,
                }
            }
            Err(_) => Self::Status {
                status,
                code: None,
                message: body.to_string(),
            },
        }
    }

    pub fn backend_code(&self) -> Option<&str> {
        match self {
            Self::Status { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// Text shown to the operator in a toast.
    pub fn toast_message(&self, translations: &Translations) -> String {
        if let Some(code) = self.backend_code() {
            let key = format!("backendErrors.{code}");
            if translations.contains(&key) {
                return translations.t(&key);
            }
        }
        match self {
            Self::AccessDenied(_) => translations.t("tickets.toasts.accessDenied"),
            Self::Status { message, .. } if !message.is_empty() => message.clone(),
            other => other.to_string(),
        }
    }
}
