use log::error;
use serde_json::Value;
use std::collections::HashMap;

const PT_BR: &str = include_str!("locales/pt-BR.json");
const PT_PT: &str = include_str!("locales/pt-PT.json");

const AVAILABLE_LOCALES: &[&str] = &["pt-BR", "pt-PT"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    language: String,
    region: Option<String>,
}

impl Locale {
    pub fn new(locale_str: &str) -> Option<Self> {
        if locale_str.is_empty() {
            return None;
        }

        let parts: Vec<&str> = locale_str.split(&['-', '_'][..]).collect();

        let language = parts.first()?.to_lowercase();
        if language.len() < 2 || language.len() > 3 {
            return None;
        }

        let region = parts.get(1).map(|r| r.to_uppercase());

        Some(Self { language, region })
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    #[must_use]
    pub fn to_bcp47(&self) -> String {
        match &self.region {
            Some(r) => format!("{}-{r}", self.language),
            None => self.language.clone(),
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            language: "pt".to_string(),
            region: Some("BR".to_string()),
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_bcp47())
    }
}

/// Picks the best shipped locale for a list of preferred language tags,
/// e.g. the browser's `navigator.languages`.
pub fn negotiate_locale(requested: &[&str]) -> Locale {
    for lang in requested {
        let Some(requested_locale) = Locale::new(lang) else {
            continue;
        };

        for available in AVAILABLE_LOCALES {
            if let Some(avail_locale) = Locale::new(available) {
                if requested_locale == avail_locale {
                    return avail_locale;
                }
            }
        }

        for available in AVAILABLE_LOCALES {
            if let Some(avail_locale) = Locale::new(available) {
                if requested_locale.language == avail_locale.language {
                    return avail_locale;
                }
            }
        }
    }

    Locale::default()
}

pub type MessageArgs = HashMap<String, String>;

/// Flat key path → display string dictionary for one locale, with the
/// pt-BR table as fallback.
#[derive(Debug, Clone, Default)]
pub struct Translations {
    locale: Locale,
    primary: HashMap<String, String>,
    fallback: HashMap<String, String>,
}

impl Translations {
    pub fn for_locale(locale: &Locale) -> Self {
        let base = load_dictionary("pt-BR", PT_BR);
        let is_portugal = locale.language() == "pt" && locale.region() == Some("PT");

        if is_portugal {
            Self {
                locale: locale.clone(),
                primary: load_dictionary("pt-PT", PT_PT),
                fallback: base,
            }
        } else {
            Self {
                locale: locale.clone(),
                primary: base,
                fallback: HashMap::new(),
            }
        }
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn contains(&self, key: &str) -> bool {
        self.primary.contains_key(key) || self.fallback.contains_key(key)
    }

    /// Looks up a dotted key. Unknown keys come back unchanged.
    pub fn t(&self, key: &str) -> String {
        self.t_with_args(key, None)
    }

    pub fn t_with_args(&self, key: &str, args: Option<&MessageArgs>) -> String {
        let template = self
            .primary
            .get(key)
            .or_else(|| self.fallback.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string());

        match args {
            Some(args) => args.iter().fold(template, |acc, (name, value)| {
                acc.replace(&format!("{{{{{name}}}}}"), value)
            }),
            None => template,
        }
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }
}

fn load_dictionary(name: &str, source: &str) -> HashMap<String, String> {
    let mut flat = HashMap::new();
    match serde_json::from_str::<Value>(source) {
        Ok(root) => flatten_into(&mut flat, "", &root),
        Err(e) => error!("Failed to parse {} dictionary: {}", name, e),
    }
    flat
}

fn flatten_into(out: &mut HashMap<String, String>, prefix: &str, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(out, &path, child);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}
