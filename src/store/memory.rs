//! In-process store used by tests and local dry runs.
//!
//! Each read and each write is applied as its own step, the way separate
//! statements behave under read-committed isolation. The fetch-or-create in
//! `add_selection` therefore yields between its lookup and its insert, and
//! callers that need a consistent read-modify-write must serialize per
//! client (which the cart engine does).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};

use super::{OrderFilter, OrderStore};
use crate::errors::BotResult;
use crate::models::{
    Admin, Category, Client, ClientProfile, ClientSetting, Dish, Order, OrderLine, SettingType,
};

#[derive(Debug, Default)]
struct MemoryState {
    categories: Vec<Category>,
    dishes: Vec<Dish>,
    clients: Vec<Client>,
    admins: Vec<Admin>,
    orders: Vec<Order>,
    lines: Vec<OrderLine>,
    setting_types: Vec<SettingType>,
    settings: Vec<ClientSetting>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// [`OrderStore`] kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given catalog
    pub fn with_catalog(categories: Vec<Category>, dishes: Vec<Dish>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state();
            state.categories = categories;
            state.dishes = dishes;
        }
        store
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register the active admin for an existing client
    pub fn add_admin(&self, client_id: i32, bank: &str, phone_number: &str, initials: &str) -> i32 {
        let mut state = self.state();
        for admin in state.admins.iter_mut() {
            admin.is_active = false;
        }
        let id = state.next_id() as i32;
        state.admins.push(Admin {
            id,
            client_id,
            bank: bank.to_string(),
            phone_number: phone_number.to_string(),
            initials: initials.to_string(),
            is_active: true,
        });
        id
    }

    pub fn add_setting_type(&self, name: &str) -> i32 {
        let mut state = self.state();
        let id = state.next_id() as i32;
        state.setting_types.push(SettingType {
            id,
            name: name.to_string(),
        });
        id
    }

    /// Assign an operator-chosen display name
    pub fn set_system_name(&self, client_id: i32, name: &str) {
        let mut state = self.state();
        if let Some(client) = state.clients.iter_mut().find(|c| c.id == client_id) {
            client.system_name = Some(name.to_string());
        }
    }

    /// Drop a client row, leaving its orders dangling
    pub fn remove_client(&self, client_id: i32) {
        self.state().clients.retain(|c| c.id != client_id);
    }

    /// Restamp an order, e.g. to move it to another day
    pub fn set_order_timestamp(&self, order_id: i64, created_at: DateTime<Utc>) {
        let mut state = self.state();
        if let Some(order) = state.orders.iter_mut().find(|o| o.id == order_id) {
            order.created_at = created_at;
        }
    }

    /// Every order of a client, in creation order
    pub fn orders_of(&self, client_id: i32) -> Vec<Order> {
        self.state()
            .orders
            .iter()
            .filter(|o| o.client_id == client_id)
            .cloned()
            .collect()
    }

    pub fn line_count(&self) -> usize {
        self.state().lines.len()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn load_categories(&self) -> BotResult<Vec<Category>> {
        Ok(self.state().categories.clone())
    }

    async fn load_dishes(&self) -> BotResult<Vec<Dish>> {
        Ok(self.state().dishes.clone())
    }

    async fn touch_client(&self, profile: &ClientProfile, now: DateTime<Utc>) -> BotResult<Client> {
        let mut state = self.state();
        if let Some(client) = state
            .clients
            .iter_mut()
            .find(|c| c.external_id == profile.external_id)
        {
            client.user_name = profile.user_name.clone();
            client.first_name = profile.first_name.clone();
            client.last_name = profile.last_name.clone();
            client.last_message_at = now;
            return Ok(client.clone());
        }

        let client = Client {
            id: state.next_id() as i32,
            external_id: profile.external_id,
            user_name: profile.user_name.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            system_name: None,
            last_message_at: now,
        };
        state.clients.push(client.clone());
        Ok(client)
    }

    async fn client_by_id(&self, client_id: i32) -> BotResult<Option<Client>> {
        Ok(self.state().clients.iter().find(|c| c.id == client_id).cloned())
    }

    async fn active_admin(&self) -> BotResult<Option<(Admin, Client)>> {
        let state = self.state();
        let Some(admin) = state.admins.iter().find(|a| a.is_active) else {
            return Ok(None);
        };
        Ok(state
            .clients
            .iter()
            .find(|c| c.id == admin.client_id)
            .map(|client| (admin.clone(), client.clone())))
    }

    async fn add_selection(
        &self,
        client_id: i32,
        dish_id: i32,
        child_dish_id: Option<i32>,
        now: DateTime<Utc>,
    ) -> BotResult<OrderLine> {
        let order_id = {
            let mut state = self.state();
            let existing = state
                .orders
                .iter_mut()
                .find(|o| o.client_id == client_id && !o.submitted);
            match existing {
                Some(order) => {
                    order.created_at = now;
                    order.id
                }
                None => {
                    let id = state.next_id();
                    state.orders.push(Order {
                        id,
                        client_id,
                        created_at: now,
                        submitted: false,
                        confirmed: false,
                    });
                    id
                }
            }
        };

        let existing_line = self
            .state()
            .lines
            .iter()
            .find(|l| {
                l.order_id == order_id && l.dish_id == dish_id && l.child_dish_id == child_dish_id
            })
            .map(|l| l.id);

        tokio::task::yield_now().await;

        let mut state = self.state();
        let updated = existing_line
            .and_then(|line_id| state.lines.iter_mut().find(|l| l.id == line_id))
            .map(|line| {
                line.quantity += 1;
                line.clone()
            });
        if let Some(line) = updated {
            return Ok(line);
        }

        let line = OrderLine {
            id: state.next_id(),
            order_id,
            dish_id,
            child_dish_id,
            quantity: 1,
        };
        state.lines.push(line.clone());
        Ok(line)
    }

    async fn clear_draft(&self, client_id: i32) -> BotResult<bool> {
        let mut state = self.state();
        let Some(order_id) = state
            .orders
            .iter()
            .find(|o| o.client_id == client_id && !o.submitted)
            .map(|o| o.id)
        else {
            return Ok(false);
        };
        state.lines.retain(|l| l.order_id != order_id);
        state.orders.retain(|o| o.id != order_id);
        Ok(true)
    }

    async fn submit_drafts(&self, client_id: i32, now: DateTime<Utc>) -> BotResult<u64> {
        let mut state = self.state();
        let mut count = 0;
        for order in state
            .orders
            .iter_mut()
            .filter(|o| o.client_id == client_id && !o.submitted)
        {
            order.submitted = true;
            order.created_at = now;
            count += 1;
        }
        Ok(count)
    }

    async fn find_order(&self, client_id: i32, filter: OrderFilter) -> BotResult<Option<Order>> {
        let state = self.state();
        let order = state
            .orders
            .iter()
            .filter(|o| o.client_id == client_id)
            .filter(|o| match filter {
                OrderFilter::Draft => !o.submitted,
                OrderFilter::UnconfirmedSubmitted => o.submitted && !o.confirmed,
            })
            .max_by_key(|o| (o.created_at, o.id))
            .cloned();
        Ok(order)
    }

    async fn order_by_id(&self, order_id: i64) -> BotResult<Option<Order>> {
        Ok(self.state().orders.iter().find(|o| o.id == order_id).cloned())
    }

    async fn order_lines(&self, order_id: i64) -> BotResult<Vec<OrderLine>> {
        let mut lines: Vec<OrderLine> = self
            .state()
            .lines
            .iter()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.id);
        Ok(lines)
    }

    async fn unconfirmed_orders(&self) -> BotResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state()
            .orders
            .iter()
            .filter(|o| o.submitted && !o.confirmed)
            .cloned()
            .collect();
        orders.sort_by_key(|o| (o.created_at, o.id));
        Ok(orders)
    }

    async fn submitted_orders_since(&self, since: DateTime<Utc>) -> BotResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state()
            .orders
            .iter()
            .filter(|o| o.submitted && o.created_at >= since)
            .cloned()
            .collect();
        orders.sort_by_key(|o| (o.created_at, o.id));
        Ok(orders)
    }

    async fn confirm_order(&self, order_id: i64) -> BotResult<bool> {
        let mut state = self.state();
        match state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id && o.submitted && !o.confirmed)
        {
            Some(order) => {
                order.confirmed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ensure_client_settings(&self, client_id: i32, default_value: &str) -> BotResult<()> {
        let mut state = self.state();
        let missing: Vec<SettingType> = state
            .setting_types
            .iter()
            .filter(|t| {
                !state
                    .settings
                    .iter()
                    .any(|s| s.client_id == client_id && s.setting_type_id == t.id)
            })
            .cloned()
            .collect();
        for setting_type in missing {
            let id = state.next_id();
            state.settings.push(ClientSetting {
                id,
                client_id,
                setting_type_id: setting_type.id,
                name: setting_type.name,
                value: default_value.to_string(),
            });
        }
        Ok(())
    }

    async fn client_settings(&self, client_id: i32) -> BotResult<Vec<ClientSetting>> {
        let mut settings: Vec<ClientSetting> = self
            .state()
            .settings
            .iter()
            .filter(|s| s.client_id == client_id)
            .cloned()
            .collect();
        settings.sort_by_key(|s| s.setting_type_id);
        Ok(settings)
    }

    async fn setting_by_id(&self, setting_id: i64) -> BotResult<Option<ClientSetting>> {
        Ok(self.state().settings.iter().find(|s| s.id == setting_id).cloned())
    }

    async fn update_setting_value(&self, setting_id: i64, value: &str) -> BotResult<()> {
        let mut state = self.state();
        if let Some(setting) = state.settings.iter_mut().find(|s| s.id == setting_id) {
            setting.value = value.to_string();
        }
        Ok(())
    }

    async fn clients_with_setting(
        &self,
        setting_type_id: i32,
        value: &str,
    ) -> BotResult<Vec<Client>> {
        let state = self.state();
        let wanted = value.to_uppercase();
        let clients = state
            .clients
            .iter()
            .filter(|c| {
                state.settings.iter().any(|s| {
                    s.client_id == c.id
                        && s.setting_type_id == setting_type_id
                        && s.value.to_uppercase() == wanted
                })
            })
            .cloned()
            .collect();
        Ok(clients)
    }
}
