//! # Confirmation Workflow Module
//!
//! Admin-side order handling (pending list, confirmation, daily report,
//! reminders) and the per-client settings that are toggled from chat.

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cart::{CartEngine, SummaryLine};
use crate::config::SettingValues;
use crate::errors::{BotResult, OrderBotError};
use crate::models::{Client, ClientSetting};
use crate::store::OrderStore;

/// A submitted order waiting for the admin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnconfirmedOrder {
    pub order_id: i64,
    pub client_id: i32,
    pub client_name: String,
    pub total: i64,
}

/// Result of a successful confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedOrder {
    pub order_id: i64,
    pub client: Client,
    pub total: i64,
}

/// Every dish ordered today, summed across orders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyReport {
    pub order_count: usize,
    pub lines: Vec<SummaryLine>,
    pub total: i64,
}

impl DailyReport {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub struct ConfirmationWorkflow {
    store: Arc<dyn OrderStore>,
    cart: Arc<CartEngine>,
    settings: SettingValues,
}

impl ConfirmationWorkflow {
    pub fn new(store: Arc<dyn OrderStore>, cart: Arc<CartEngine>, settings: SettingValues) -> Self {
        Self {
            store,
            cart,
            settings,
        }
    }

    pub fn setting_values(&self) -> &SettingValues {
        &self.settings
    }

    /// Every submitted, unconfirmed order with its client's short name and
    /// total. Orders whose client row is gone are skipped.
    pub async fn list_unconfirmed(&self) -> BotResult<Vec<UnconfirmedOrder>> {
        let orders = self.store.unconfirmed_orders().await?;
        let mut pending = Vec::with_capacity(orders.len());

        for order in orders {
            let Some(client) = self.store.client_by_id(order.client_id).await? else {
                warn!(
                    order_id = order.id,
                    client_id = order.client_id,
                    "Skipping unconfirmed order of unknown client"
                );
                continue;
            };
            let summary = self.cart.summarize_order(order.id).await?;
            pending.push(UnconfirmedOrder {
                order_id: order.id,
                client_id: client.id,
                client_name: client.short_name(),
                total: summary.total,
            });
        }

        Ok(pending)
    }

    /// Mark a submitted order confirmed.
    ///
    /// Returns `None` when the order is still a draft or was already
    /// confirmed, so a repeated press changes nothing.
    pub async fn confirm(&self, order_id: i64) -> BotResult<Option<ConfirmedOrder>> {
        let order = self
            .store
            .order_by_id(order_id)
            .await?
            .ok_or_else(|| OrderBotError::lookup_miss("order", order_id))?;
        let client = self
            .store
            .client_by_id(order.client_id)
            .await?
            .ok_or_else(|| OrderBotError::lookup_miss("client", order.client_id))?;

        let summary = self.cart.summarize_order(order_id).await?;
        if !self.store.confirm_order(order_id).await? {
            info!(order_id, status = ?order.status(), "Order not awaiting confirmation");
            return Ok(None);
        }

        info!(
            order_id,
            client = %client.display_name(),
            total = summary.total,
            "Order confirmed"
        );
        Ok(Some(ConfirmedOrder {
            order_id,
            client,
            total: summary.total,
        }))
    }

    /// The client's settings, creating missing ones switched on
    pub async fn list_settings(&self, client_id: i32) -> BotResult<Vec<ClientSetting>> {
        self.store
            .ensure_client_settings(client_id, &self.settings.on)
            .await?;
        self.store.client_settings(client_id).await
    }

    /// Flip a setting between the on and off literals.
    ///
    /// Only the owning client may toggle; anyone else gets `None` and the
    /// value is left as is.
    pub async fn toggle_setting(
        &self,
        client_id: i32,
        setting_id: i64,
    ) -> BotResult<Option<ClientSetting>> {
        let mut setting = self
            .store
            .setting_by_id(setting_id)
            .await?
            .ok_or_else(|| OrderBotError::lookup_miss("setting", setting_id))?;

        if setting.client_id != client_id {
            warn!(
                client_id,
                setting_id,
                owner_id = setting.client_id,
                "Refusing to toggle another client's setting"
            );
            return Ok(None);
        }

        let new_value = self.settings.toggled(&setting.value).to_string();
        self.store
            .update_setting_value(setting_id, &new_value)
            .await?;
        info!(
            client_id,
            setting = %setting.name,
            from = %setting.value,
            to = %new_value,
            "Setting changed"
        );

        setting.value = new_value;
        Ok(Some(setting))
    }

    /// Submitted orders stamped since `since`, grouped by (dish, variant)
    /// and ordered by the dish's catalog position
    pub async fn daily_report(&self, since: DateTime<Utc>) -> BotResult<DailyReport> {
        let orders = self.store.submitted_orders_since(since).await?;
        let mut lines = Vec::new();
        for order in &orders {
            lines.extend(self.store.order_lines(order.id).await?);
        }

        let mut grouped = self.cart.summary_lines(&lines);
        grouped.sort_by_key(|l| (l.sort, l.dish_id));
        let total = grouped.iter().map(SummaryLine::price).sum();

        Ok(DailyReport {
            order_count: orders.len(),
            lines: grouped,
            total,
        })
    }

    /// Clients who have order reminders switched on
    pub async fn clients_to_remind(&self) -> BotResult<Vec<Client>> {
        self.store
            .clients_with_setting(self.settings.notification_setting_type_id, &self.settings.on)
            .await
    }
}

/// Start of the local calendar day containing `now`, in UTC
pub fn start_of_local_day(now: DateTime<Local>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc))
}
