//! # Error Types Module
//!
//! This module defines the error taxonomy shared by the order core and the
//! Telegram glue. Each variant maps to one recovery policy:
//!
//! - `Decode`: malformed action token, folded into a no-op by the codec
//! - `LookupMiss`: catalog or store entity missing, logged and ignored
//! - `Store`: transaction failure, shown to the user as a generic error
//! - `Transport`: delivery failure from Telegram, logged and not retried

use thiserror::Error;

/// Errors raised while handling an inbound update
#[derive(Debug, Error)]
pub enum OrderBotError {
    /// Token matched no rule of the action grammar
    #[error("malformed action token: {0}")]
    Decode(String),
    /// An entity expected to exist is absent
    #[error("{entity} {id} not found")]
    LookupMiss { entity: &'static str, id: i64 },
    /// Database or transaction failure
    #[error("store failure: {0}")]
    Store(#[from] sqlx::Error),
    /// Telegram API delivery failure
    #[error("transport failure: {0}")]
    Transport(#[from] teloxide::RequestError),
    /// Invalid or missing configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl OrderBotError {
    pub fn lookup_miss(entity: &'static str, id: impl Into<i64>) -> Self {
        OrderBotError::LookupMiss {
            entity,
            id: id.into(),
        }
    }

    /// Whether the error should be reported to the user
    pub fn is_user_visible(&self) -> bool {
        matches!(self, OrderBotError::Store(_))
    }
}

pub type BotResult<T> = std::result::Result<T, OrderBotError>;
