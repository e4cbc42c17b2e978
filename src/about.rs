use log::warn;
use serde::{Deserialize, Serialize};

use crate::api::ApiClient;
use crate::i18n::Translations;

/// Build info the backend publishes at its root endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendVersion {
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub build_timestamp: Option<String>,
    #[serde(default)]
    pub commit_hash: Option<String>,
    #[serde(default)]
    pub branch_name: Option<String>,
    #[serde(default)]
    pub commit_timestamp: Option<String>,
}

impl BackendVersion {
    pub fn describe(&self) -> String {
        if let Some(tag) = &self.tag_name {
            return format!(
                "Version: {} (Build: {})",
                tag,
                self.build_timestamp.as_deref().unwrap_or("")
            );
        }

        let mut parts = Vec::new();
        if let Some(hash) = &self.commit_hash {
            parts.push(format!("Commit: {hash}"));
        }
        if let Some(branch) = &self.branch_name {
            parts.push(format!("Branch: {branch}"));
        }
        if let Some(time) = &self.commit_timestamp {
            parts.push(format!("Time: {time}"));
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AboutInfo {
    pub title: String,
    pub backend_version: String,
    pub close_label: String,
}

impl AboutInfo {
    pub fn new(translations: &Translations, app_name: &str, backend: Option<&BackendVersion>) -> Self {
        let backend_version = match backend {
            Some(version) => version.describe(),
            None => translations.t("about.loadingVersion"),
        };
        Self {
            title: format!("{} {}", translations.t("about.aboutthe"), app_name),
            backend_version,
            close_label: translations.t("about.buttonclose"),
        }
    }

    /// Fetches the backend build info; a failed fetch leaves the loading text.
    pub async fn load(api: &ApiClient, translations: &Translations, app_name: &str) -> Self {
        match api.backend_info().await {
            Ok(version) => Self::new(translations, app_name, Some(&version)),
            Err(e) => {
                warn!("Backend version unavailable: {}", e);
                Self::new(translations, app_name, None)
            }
        }
    }
}
