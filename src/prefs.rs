#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::i18n::Locale;
use crate::store::{KeyValueStore, LOCALE_KEY, THEME_KEY};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!("expected light|dark, got '{other}'")),
        }
    }
}

/// Theme and language choices, stored as plain strings.
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
    theme: ThemeMode,
    locale: Locale,
}

impl Preferences {
    /// Reads saved values, falling back to `theme`/`locale` for anything
    /// missing or unreadable.
    pub async fn load(store: Arc<dyn KeyValueStore>, theme: ThemeMode, locale: Locale) -> Self {
        let theme = load_parsed(store.as_ref(), THEME_KEY).await.unwrap_or(theme);
        let locale = load_parsed(store.as_ref(), LOCALE_KEY).await.unwrap_or(locale);
        Self {
            store,
            theme,
            locale,
        }
    }

    #[must_use]
    pub fn theme(&self) -> ThemeMode {
        self.theme
    }

    #[must_use]
    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub async fn set_theme(&mut self, theme: ThemeMode) -> Result<()> {
        self.theme = theme;
        self.store.set(THEME_KEY, theme.as_str()).await
    }

    pub async fn toggle_theme(&mut self) -> Result<ThemeMode> {
        let next = self.theme.toggled();
        self.set_theme(next).await?;
        Ok(next)
    }

    pub async fn set_locale(&mut self, locale: Locale) -> Result<()> {
        self.locale = locale;
        self.store.set(LOCALE_KEY, locale.as_str()).await
    }
}

async fn load_parsed<T: FromStr>(store: &dyn KeyValueStore, key: &str) -> Option<T>
where
    T::Err: fmt::Display,
{
    let raw = match store.get(key).await {
        Ok(raw) => raw?,
        Err(err) => {
            tracing::warn!(key, error = %err, "failed to load preference");
            return None;
        }
    };
    match raw.parse() {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::warn!(key, error = %err, "ignoring stored preference");
            None
        }
    }
}
