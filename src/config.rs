use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::i18n::Locale;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub company_id: Option<String>,
    pub locale: Locale,
    pub app_name: Option<String>,
    pub request_timeout: Duration,
    pub ticket_debounce: Duration,
    pub alert_volume: f32,
    pub storage_path: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_token: None,
            company_id: None,
            locale: Locale::default(),
            app_name: None,
            request_timeout: Duration::from_secs(30),
            ticket_debounce: Duration::from_millis(500),
            alert_volume: 1.0,
            storage_path: None,
        }
    }

    pub fn load() -> anyhow::Result<Self> {
        dotenv().ok();

        let api_url = env::var("DESK_API_URL").context("DESK_API_URL is not set")?;
        let mut config = Self::new(api_url);

        config.api_token = env::var("DESK_API_TOKEN").ok().filter(|s| !s.is_empty());
        config.company_id = env::var("DESK_COMPANY_ID").ok().filter(|s| !s.is_empty());
        config.app_name = env::var("DESK_APP_NAME").ok().filter(|s| !s.is_empty());
        config.storage_path = env::var("DESK_STORAGE_PATH").ok().map(PathBuf::from);

        if let Ok(locale) = env::var("DESK_LOCALE") {
            config.locale = Locale::new(&locale).unwrap_or_default();
        }
        if let Ok(secs) = env::var("DESK_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(
                secs.parse().context("DESK_REQUEST_TIMEOUT_SECS must be a number")?,
            );
        }
        if let Ok(ms) = env::var("DESK_TICKET_DEBOUNCE_MS") {
            config.ticket_debounce = Duration::from_millis(
                ms.parse().context("DESK_TICKET_DEBOUNCE_MS must be a number")?,
            );
        }
        if let Ok(volume) = env::var("DESK_ALERT_VOLUME") {
            let volume: f32 = volume.parse().context("DESK_ALERT_VOLUME must be a number")?;
            config.alert_volume = volume.clamp(0.0, 1.0);
        }

        Ok(config)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_company(mut self, company_id: impl Into<String>) -> Self {
        self.company_id = Some(company_id.into());
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_ticket_debounce(mut self, debounce: Duration) -> Self {
        self.ticket_debounce = debounce;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("http://localhost:8080/");
        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.ticket_debounce, Duration::from_millis(500));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.locale.to_bcp47(), "pt-BR");
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let config = ClientConfig::new("http://api.local/");
        assert_eq!(config.endpoint("/queue-options"), "http://api.local/queue-options");
        assert_eq!(config.endpoint("tickets/3"), "http://api.local/tickets/3");
    }
}
