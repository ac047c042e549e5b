//! Per-locale message catalogs.

use std::collections::HashMap;

use crate::error::{ConfigError, ConfigResult};
use crate::requirement::{Requirement, Requirements};

/// Locale every catalog falls back to.
pub const FALLBACK_LOCALE: &str = "en";

/// Key of the per-locale fallback message.
pub const DEFAULT_MESSAGE: &str = "defaultMessage";

/// Messages keyed by locale, then by validator name. `type` messages are
/// keyed `type.<subtype>`.
#[derive(Debug, Clone)]
pub struct Catalog {
    locales: HashMap<String, HashMap<String, String>>,
    locale: String,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// An English catalog holding only the default message.
    pub fn new() -> Self {
        let mut catalog = Self {
            locales: HashMap::new(),
            locale: FALLBACK_LOCALE.to_owned(),
        };
        catalog.add_message(FALLBACK_LOCALE, DEFAULT_MESSAGE, "This value seems to be invalid.");
        catalog
    }

    /// Active locale.
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// `true` when some message exists for `locale`.
    pub fn has_locale(&self, locale: &str) -> bool {
        self.locales.contains_key(locale)
    }

    /// Switches the active locale.
    pub fn set_locale(&mut self, locale: &str) -> ConfigResult<()> {
        if !self.has_locale(locale) {
            return Err(ConfigError::MissingLocale(locale.to_owned()));
        }
        self.locale = locale.to_owned();
        Ok(())
    }

    /// Adds or replaces one message.
    pub fn add_message(&mut self, locale: &str, key: &str, message: &str) {
        self.locales
            .entry(locale.to_owned())
            .or_default()
            .insert(key.to_owned(), message.to_owned());
    }

    /// Adds or replaces several messages.
    pub fn add_messages<K, V>(&mut self, locale: &str, messages: impl IntoIterator<Item = (K, V)>)
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let table = self.locales.entry(locale.to_owned()).or_default();
        for (key, message) in messages {
            table.insert(key.as_ref().to_owned(), message.as_ref().to_owned());
        }
    }

    /// One raw message.
    pub fn message(&self, locale: &str, key: &str) -> Option<&str> {
        self.locales.get(locale)?.get(key).map(String::as_str)
    }

    /// The message for a failed constraint in the active locale.
    ///
    /// `type` looks up `type.<subtype>`; everything else is formatted with
    /// its requirements. Missing or empty messages fall back to the active
    /// locale's default message, then to the English one.
    pub fn error_message(&self, name: &str, requirements: &Requirements) -> String {
        let message = if name == "type" {
            requirements
                .first()
                .and_then(Requirement::as_str)
                .and_then(|subtype| self.message(&self.locale, &format!("type.{subtype}")))
                .map(str::to_owned)
        } else {
            self.message(&self.locale, name)
                .map(|template| format_message(template, requirements))
        };
        message
            .filter(|m| !m.is_empty())
            .or_else(|| self.message(&self.locale, DEFAULT_MESSAGE).map(str::to_owned))
            .or_else(|| self.message(FALLBACK_LOCALE, DEFAULT_MESSAGE).map(str::to_owned))
            .unwrap_or_default()
    }
}

/// Replaces each `%s` in turn with the next requirement value.
pub fn format_message(template: &str, requirements: &Requirements) -> String {
    let mut message = template.to_owned();
    for requirement in requirements.iter() {
        let Some(at) = message.find("%s").or_else(|| message.find("%S")) else {
            break;
        };
        message.replace_range(at..at + 2, &requirement.to_string());
    }
    message
}
