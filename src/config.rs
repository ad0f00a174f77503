//! # Configuration Module
//!
//! This module defines configuration structures for the ordering bot,
//! including database settings, catalog navigation tunables and the
//! literal values used by boolean client settings.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

use crate::errors::{BotResult, OrderBotError};

// Constants for bot configuration
pub const DEFAULT_LANGUAGE: &str = "ru";
pub const DEFAULT_PAGE_SIZE: usize = 5;
pub const DEFAULT_GARNISH_CATEGORY_ID: i32 = 4;
pub const DEFAULT_FLAVORING_CATEGORY_ID: i32 = 6;
pub const DEFAULT_NOTIFICATION_SETTING_TYPE_ID: i32 = 1;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const SETTING_ON_VALUE: &str = "Да";
pub const SETTING_OFF_VALUE: &str = "Нет";

/// Catalog navigation configuration
#[derive(Debug, Clone)]
pub struct MenuConfig {
    /// Dishes shown per page of a category listing
    pub page_size: usize,
    /// Child category offered for dishes served with a garnish
    pub garnish_category_id: i32,
    /// Child category offered for dishes served with a dressing
    pub flavoring_category_id: i32,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            garnish_category_id: DEFAULT_GARNISH_CATEGORY_ID,
            flavoring_category_id: DEFAULT_FLAVORING_CATEGORY_ID,
        }
    }
}

/// Literal values stored for boolean client settings
#[derive(Debug, Clone)]
pub struct SettingValues {
    pub on: String,
    pub off: String,
    /// Setting type that opts a client into order reminders
    pub notification_setting_type_id: i32,
}

impl SettingValues {
    /// Whether a stored value means "enabled" (case-insensitive)
    pub fn is_on(&self, value: &str) -> bool {
        value.to_uppercase() == self.on.to_uppercase()
    }

    /// The opposite literal of `value`
    pub fn toggled(&self, value: &str) -> &str {
        if self.is_on(value) {
            &self.off
        } else {
            &self.on
        }
    }
}

impl Default for SettingValues {
    fn default() -> Self {
        Self {
            on: SETTING_ON_VALUE.to_string(),
            off: SETTING_OFF_VALUE.to_string(),
            notification_setting_type_id: DEFAULT_NOTIFICATION_SETTING_TYPE_ID,
        }
    }
}

/// Top-level bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token
    pub bot_token: String,
    /// Postgres connection string
    pub database_url: String,
    /// Connection pool size
    pub max_connections: u32,
    /// Language used for every rendered message
    pub language: String,
    pub menu: MenuConfig,
    pub settings: SettingValues,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            database_url: String::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            language: DEFAULT_LANGUAGE.to_string(),
            menu: MenuConfig::default(),
            settings: SettingValues::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from the environment (and `.env` if present)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            bot_token: env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            language: env::var("BOT_LANGUAGE").unwrap_or(defaults.language),
            menu: MenuConfig {
                page_size: env_or("MENU_PAGE_SIZE", defaults.menu.page_size)?,
                garnish_category_id: env_or(
                    "GARNISH_CATEGORY_ID",
                    defaults.menu.garnish_category_id,
                )?,
                flavoring_category_id: env_or(
                    "FLAVORING_CATEGORY_ID",
                    defaults.menu.flavoring_category_id,
                )?,
            },
            settings: SettingValues {
                on: env::var("SETTING_ON_VALUE").unwrap_or(defaults.settings.on),
                off: env::var("SETTING_OFF_VALUE").unwrap_or(defaults.settings.off),
                notification_setting_type_id: env_or(
                    "NOTIFICATION_SETTING_TYPE_ID",
                    defaults.settings.notification_setting_type_id,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the menu and settings logic cannot work with
    pub fn validate(&self) -> BotResult<()> {
        if self.menu.page_size == 0 {
            return Err(OrderBotError::Config(
                "MENU_PAGE_SIZE must be greater than zero".to_string(),
            ));
        }
        if self.menu.garnish_category_id == self.menu.flavoring_category_id {
            return Err(OrderBotError::Config(
                "GARNISH_CATEGORY_ID and FLAVORING_CATEGORY_ID must differ".to_string(),
            ));
        }
        if self.settings.is_on(&self.settings.off) {
            return Err(OrderBotError::Config(
                "SETTING_ON_VALUE and SETTING_OFF_VALUE must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read a parsable variable, falling back to `default` when unset
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
