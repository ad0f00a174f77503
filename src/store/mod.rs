//! Store module: the transactional persistence behind the order core.
//!
//! - `postgres`: sqlx/Postgres implementation used in production
//! - `memory`: in-process implementation used by tests

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::BotResult;
use crate::models::{
    Admin, Category, Client, ClientProfile, ClientSetting, Dish, Order, OrderLine,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Which of a client's orders to select
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFilter {
    /// The open, not yet submitted order
    Draft,
    /// The most recent submitted order still awaiting confirmation
    UnconfirmedSubmitted,
}

/// CRUD over the ordering entities. Every method is one request-scoped unit
/// of work; multi-statement methods run inside a single transaction.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn load_categories(&self) -> BotResult<Vec<Category>>;

    async fn load_dishes(&self) -> BotResult<Vec<Dish>>;

    /// Create the client on first contact, otherwise refresh its chat names
    /// and last-activity time
    async fn touch_client(&self, profile: &ClientProfile, now: DateTime<Utc>) -> BotResult<Client>;

    async fn client_by_id(&self, client_id: i32) -> BotResult<Option<Client>>;

    /// The active admin and its client row
    async fn active_admin(&self) -> BotResult<Option<(Admin, Client)>>;

    /// Fetch-or-create the client's draft order (stamping `now`), then
    /// fetch-or-create the line keyed by (order, dish, child) and add one
    async fn add_selection(
        &self,
        client_id: i32,
        dish_id: i32,
        child_dish_id: Option<i32>,
        now: DateTime<Utc>,
    ) -> BotResult<OrderLine>;

    /// Delete the draft order and all its lines; `false` if there was none
    async fn clear_draft(&self, client_id: i32) -> BotResult<bool>;

    /// Mark every draft of the client submitted; returns how many
    async fn submit_drafts(&self, client_id: i32, now: DateTime<Utc>) -> BotResult<u64>;

    async fn find_order(&self, client_id: i32, filter: OrderFilter) -> BotResult<Option<Order>>;

    async fn order_by_id(&self, order_id: i64) -> BotResult<Option<Order>>;

    /// Lines of an order in insertion order
    async fn order_lines(&self, order_id: i64) -> BotResult<Vec<OrderLine>>;

    /// Submitted, unconfirmed orders, oldest first
    async fn unconfirmed_orders(&self) -> BotResult<Vec<Order>>;

    /// Submitted orders stamped at or after `since`
    async fn submitted_orders_since(&self, since: DateTime<Utc>) -> BotResult<Vec<Order>>;

    /// Confirm a submitted order; `false` if absent, still a draft, or
    /// already confirmed
    async fn confirm_order(&self, order_id: i64) -> BotResult<bool>;

    /// Give the client one row per setting type it lacks, set to `default_value`
    async fn ensure_client_settings(&self, client_id: i32, default_value: &str) -> BotResult<()>;

    async fn client_settings(&self, client_id: i32) -> BotResult<Vec<ClientSetting>>;

    async fn setting_by_id(&self, setting_id: i64) -> BotResult<Option<ClientSetting>>;

    async fn update_setting_value(&self, setting_id: i64, value: &str) -> BotResult<()>;

    /// Clients whose setting of the given type equals `value` (case-insensitive)
    async fn clients_with_setting(
        &self,
        setting_type_id: i32,
        value: &str,
    ) -> BotResult<Vec<Client>>;
}
