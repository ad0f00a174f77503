//! # Data Model
//!
//! Rows of the ordering database. Catalog rows (`Category`, `Dish`) are read
//! once into the catalog cache; the remaining entities are read and written
//! per request through the store.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::MenuConfig;

/// Top-level grouping of dishes (e.g. "salads", "garnishes")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub show_in_main_menu: bool,
    pub sort: i32,
}

/// A selectable menu item; may also be chosen as a variant of another dish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Dish {
    pub id: i32,
    pub category_id: Option<i32>,
    pub name: String,
    /// Price in whole currency units
    pub price: i32,
    pub garnish_included: bool,
    pub flavoring_included: bool,
    pub sort: i32,
}

impl Dish {
    /// Child category the dish must pick a variant from before it can be
    /// added. A dressing takes precedence over a garnish.
    pub fn variant_category(&self, menu: &MenuConfig) -> Option<i32> {
        if self.flavoring_included {
            Some(menu.flavoring_category_id)
        } else if self.garnish_included {
            Some(menu.garnish_category_id)
        } else {
            None
        }
    }
}

/// A chat user known to the bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Client {
    pub id: i32,
    pub external_id: i64,
    pub user_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Name assigned by the operator, preferred over chat names
    pub system_name: Option<String>,
    pub last_message_at: DateTime<Utc>,
}

impl Client {
    /// Name used in logs and admin notifications
    pub fn display_name(&self) -> String {
        if let Some(name) = non_blank(&self.system_name) {
            return name.to_string();
        }
        let full_name = [non_blank(&self.first_name), non_blank(&self.last_name)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        match non_blank(&self.user_name) {
            Some(user) if full_name.is_empty() => user.to_string(),
            Some(user) => format!("{user} ({full_name})"),
            None if full_name.is_empty() => self.external_id.to_string(),
            None => full_name,
        }
    }

    /// Short name used on the admin's unconfirmed-order list
    pub fn short_name(&self) -> String {
        non_blank(&self.system_name)
            .or_else(|| non_blank(&self.first_name))
            .or_else(|| non_blank(&self.user_name))
            .map(str::to_string)
            .unwrap_or_else(|| self.external_id.to_string())
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Identity fields carried by every inbound update
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientProfile {
    pub external_id: i64,
    pub user_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ClientProfile {
    pub fn new(external_id: i64) -> Self {
        Self {
            external_id,
            ..Default::default()
        }
    }

    pub fn with_first_name(mut self, first_name: &str) -> Self {
        self.first_name = Some(first_name.to_string());
        self
    }

    pub fn with_user_name(mut self, user_name: &str) -> Self {
        self.user_name = Some(user_name.to_string());
        self
    }
}

/// Operator who receives new orders and collects payments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Admin {
    pub id: i32,
    pub client_id: i32,
    pub bank: String,
    pub phone_number: String,
    pub initials: String,
    pub is_active: bool,
}

/// An order; `submitted = false` marks the client's open draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub client_id: i32,
    pub created_at: DateTime<Utc>,
    pub submitted: bool,
    pub confirmed: bool,
}

/// Lifecycle stage derived from the order flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderStatus {
    Draft,
    Submitted,
    Confirmed,
}

impl Order {
    pub fn status(&self) -> OrderStatus {
        match (self.submitted, self.confirmed) {
            (false, _) => OrderStatus::Draft,
            (true, false) => OrderStatus::Submitted,
            (true, true) => OrderStatus::Confirmed,
        }
    }
}

/// One (dish, variant) pair of an order with its quantity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OrderLine {
    pub id: i64,
    pub order_id: i64,
    pub dish_id: i32,
    pub child_dish_id: Option<i32>,
    pub quantity: i32,
}

/// Kind of per-client preference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SettingType {
    pub id: i32,
    pub name: String,
}

/// A client's value for one setting type, joined with the type name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ClientSetting {
    pub id: i64,
    pub client_id: i32,
    pub setting_type_id: i32,
    pub name: String,
    pub value: String,
}
