//! Postgres store built on sqlx.
//!
//! Uniqueness of the open order per client and of (order, dish, variant)
//! lines is enforced by indexes, and mutations go through `ON CONFLICT`
//! upserts, so concurrent selections cannot insert duplicate rows even
//! without the engine's per-client lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

use super::{OrderFilter, OrderStore};
use crate::errors::BotResult;
use crate::models::{
    Admin, Category, Client, ClientProfile, ClientSetting, Dish, Order, OrderLine,
};

const CLIENT_COLUMNS: &str =
    "id, external_id, user_name, first_name, last_name, system_name, last_message_at";
const ORDER_COLUMNS: &str = "id, client_id, created_at, submitted, confirmed";
const LINE_COLUMNS: &str = "id, order_id, dish_id, child_dish_id, quantity";
const SETTING_SELECT: &str = "SELECT cs.id, cs.client_id, cs.setting_type_id, st.name, cs.value \
     FROM client_settings cs JOIN setting_types st ON st.id = cs.setting_type_id";

const SCHEMA: &[(&str, &str)] = &[
    (
        "categories table",
        "CREATE TABLE IF NOT EXISTS categories (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            show_in_main_menu BOOLEAN NOT NULL DEFAULT TRUE,
            sort INTEGER NOT NULL DEFAULT 0
        )",
    ),
    (
        "dishes table",
        "CREATE TABLE IF NOT EXISTS dishes (
            id SERIAL PRIMARY KEY,
            category_id INTEGER REFERENCES categories(id),
            name TEXT NOT NULL,
            price INTEGER NOT NULL CHECK (price >= 0),
            garnish_included BOOLEAN NOT NULL DEFAULT FALSE,
            flavoring_included BOOLEAN NOT NULL DEFAULT FALSE,
            sort INTEGER NOT NULL DEFAULT 0
        )",
    ),
    (
        "clients table",
        "CREATE TABLE IF NOT EXISTS clients (
            id SERIAL PRIMARY KEY,
            external_id BIGINT NOT NULL UNIQUE,
            user_name TEXT,
            first_name TEXT,
            last_name TEXT,
            system_name TEXT,
            last_message_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    ),
    (
        "admins table",
        "CREATE TABLE IF NOT EXISTS admins (
            id SERIAL PRIMARY KEY,
            client_id INTEGER NOT NULL REFERENCES clients(id),
            bank TEXT NOT NULL,
            phone_number TEXT NOT NULL,
            initials TEXT NOT NULL DEFAULT '',
            is_active BOOLEAN NOT NULL DEFAULT FALSE
        )",
    ),
    (
        "orders table",
        "CREATE TABLE IF NOT EXISTS orders (
            id BIGSERIAL PRIMARY KEY,
            client_id INTEGER NOT NULL REFERENCES clients(id),
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            submitted BOOLEAN NOT NULL DEFAULT FALSE,
            confirmed BOOLEAN NOT NULL DEFAULT FALSE
        )",
    ),
    (
        "open order index",
        "CREATE UNIQUE INDEX IF NOT EXISTS orders_one_draft_per_client
            ON orders (client_id) WHERE NOT submitted",
    ),
    (
        "order lines table",
        "CREATE TABLE IF NOT EXISTS order_lines (
            id BIGSERIAL PRIMARY KEY,
            order_id BIGINT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            dish_id INTEGER NOT NULL REFERENCES dishes(id),
            child_dish_id INTEGER REFERENCES dishes(id),
            quantity INTEGER NOT NULL CHECK (quantity >= 1)
        )",
    ),
    (
        "order line selection index",
        "CREATE UNIQUE INDEX IF NOT EXISTS order_lines_unique_selection
            ON order_lines (order_id, dish_id, (COALESCE(child_dish_id, 0)))",
    ),
    (
        "setting types table",
        "CREATE TABLE IF NOT EXISTS setting_types (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL
        )",
    ),
    (
        "client settings table",
        "CREATE TABLE IF NOT EXISTS client_settings (
            id BIGSERIAL PRIMARY KEY,
            client_id INTEGER NOT NULL REFERENCES clients(id),
            setting_type_id INTEGER NOT NULL REFERENCES setting_types(id),
            value TEXT NOT NULL,
            UNIQUE (client_id, setting_type_id)
        )",
    ),
];

/// Create a connection pool
pub async fn create_pool(database_url: &str, max_connections: u32) -> BotResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> BotResult<()> {
    info!("Initializing database schema...");

    for &(name, statement) in SCHEMA {
        debug!(object = name, "Creating schema object");
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Database schema initialized successfully");
    Ok(())
}

/// sqlx-backed [`OrderStore`]
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a catalog category, returning its id
    pub async fn insert_category(
        &self,
        name: &str,
        show_in_main_menu: bool,
        sort: i32,
    ) -> BotResult<i32> {
        let id = sqlx::query_scalar(
            "INSERT INTO categories (name, show_in_main_menu, sort) \
             VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(name)
        .bind(show_in_main_menu)
        .bind(sort)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Insert a dish, returning its id
    pub async fn insert_dish(&self, dish: &Dish) -> BotResult<i32> {
        let id = sqlx::query_scalar(
            "INSERT INTO dishes \
             (category_id, name, price, garnish_included, flavoring_included, sort) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(dish.category_id)
        .bind(&dish.name)
        .bind(dish.price)
        .bind(dish.garnish_included)
        .bind(dish.flavoring_included)
        .bind(dish.sort)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Insert a setting type, returning its id
    pub async fn insert_setting_type(&self, name: &str) -> BotResult<i32> {
        let id = sqlx::query_scalar("INSERT INTO setting_types (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    /// Register the active admin, deactivating any previous one
    pub async fn set_active_admin(
        &self,
        client_id: i32,
        bank: &str,
        phone_number: &str,
        initials: &str,
    ) -> BotResult<i32> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE admins SET is_active = FALSE WHERE is_active")
            .execute(&mut *tx)
            .await?;
        let id = sqlx::query_scalar(
            "INSERT INTO admins (client_id, bank, phone_number, initials, is_active) \
             VALUES ($1, $2, $3, $4, TRUE) RETURNING id",
        )
        .bind(client_id)
        .bind(bank)
        .bind(phone_number)
        .bind(initials)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(id)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn load_categories(&self) -> BotResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, show_in_main_menu, sort FROM categories ORDER BY sort, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn load_dishes(&self) -> BotResult<Vec<Dish>> {
        let dishes = sqlx::query_as::<_, Dish>(
            "SELECT id, category_id, name, price, garnish_included, flavoring_included, sort \
             FROM dishes ORDER BY sort, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(dishes)
    }

    async fn touch_client(&self, profile: &ClientProfile, now: DateTime<Utc>) -> BotResult<Client> {
        let client = sqlx::query_as::<_, Client>(&format!(
            "INSERT INTO clients (external_id, user_name, first_name, last_name, last_message_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (external_id) DO UPDATE SET \
                 user_name = EXCLUDED.user_name, \
                 first_name = EXCLUDED.first_name, \
                 last_name = EXCLUDED.last_name, \
                 last_message_at = EXCLUDED.last_message_at \
             RETURNING {CLIENT_COLUMNS}"
        ))
        .bind(profile.external_id)
        .bind(&profile.user_name)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(client)
    }

    async fn client_by_id(&self, client_id: i32) -> BotResult<Option<Client>> {
        let query = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1");
        let client = sqlx::query_as::<_, Client>(&query)
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    async fn active_admin(&self) -> BotResult<Option<(Admin, Client)>> {
        let admin = sqlx::query_as::<_, Admin>(
            "SELECT id, client_id, bank, phone_number, initials, is_active \
             FROM admins WHERE is_active ORDER BY id LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(admin) = admin else {
            return Ok(None);
        };
        let client = self.client_by_id(admin.client_id).await?;
        Ok(client.map(|client| (admin, client)))
    }

    async fn add_selection(
        &self,
        client_id: i32,
        dish_id: i32,
        child_dish_id: Option<i32>,
        now: DateTime<Utc>,
    ) -> BotResult<OrderLine> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders (client_id, created_at) VALUES ($1, $2) \
             ON CONFLICT (client_id) WHERE NOT submitted \
             DO UPDATE SET created_at = EXCLUDED.created_at \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(client_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let line = sqlx::query_as::<_, OrderLine>(&format!(
            "INSERT INTO order_lines (order_id, dish_id, child_dish_id, quantity) \
             VALUES ($1, $2, $3, 1) \
             ON CONFLICT (order_id, dish_id, (COALESCE(child_dish_id, 0))) \
             DO UPDATE SET quantity = order_lines.quantity + 1 \
             RETURNING {LINE_COLUMNS}"
        ))
        .bind(order.id)
        .bind(dish_id)
        .bind(child_dish_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(line)
    }

    async fn clear_draft(&self, client_id: i32) -> BotResult<bool> {
        let mut tx = self.pool.begin().await?;

        let order_id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM orders WHERE client_id = $1 AND NOT submitted FOR UPDATE",
        )
        .bind(client_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(order_id) = order_id else {
            tx.rollback().await?;
            return Ok(false);
        };

        sqlx::query("DELETE FROM order_lines WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn submit_drafts(&self, client_id: i32, now: DateTime<Utc>) -> BotResult<u64> {
        let result = sqlx::query(
            "UPDATE orders SET submitted = TRUE, created_at = $2 \
             WHERE client_id = $1 AND NOT submitted",
        )
        .bind(client_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_order(&self, client_id: i32, filter: OrderFilter) -> BotResult<Option<Order>> {
        let condition = match filter {
            OrderFilter::Draft => "NOT submitted",
            OrderFilter::UnconfirmedSubmitted => "submitted AND NOT confirmed",
        };
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE client_id = $1 AND {condition} \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    async fn order_by_id(&self, order_id: i64) -> BotResult<Option<Order>> {
        let order =
            sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(order)
    }

    async fn order_lines(&self, order_id: i64) -> BotResult<Vec<OrderLine>> {
        let lines = sqlx::query_as::<_, OrderLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM order_lines WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    async fn unconfirmed_orders(&self) -> BotResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE submitted AND NOT confirmed \
             ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    async fn submitted_orders_since(&self, since: DateTime<Utc>) -> BotResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE submitted AND created_at >= $1 \
             ORDER BY created_at, id"
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    async fn confirm_order(&self, order_id: i64) -> BotResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET confirmed = TRUE WHERE id = $1 AND submitted AND NOT confirmed",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ensure_client_settings(&self, client_id: i32, default_value: &str) -> BotResult<()> {
        sqlx::query(
            "INSERT INTO client_settings (client_id, setting_type_id, value) \
             SELECT $1, id, $2 FROM setting_types \
             ON CONFLICT (client_id, setting_type_id) DO NOTHING",
        )
        .bind(client_id)
        .bind(default_value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn client_settings(&self, client_id: i32) -> BotResult<Vec<ClientSetting>> {
        let settings = sqlx::query_as::<_, ClientSetting>(&format!(
            "{SETTING_SELECT} WHERE cs.client_id = $1 ORDER BY st.id"
        ))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(settings)
    }

    async fn setting_by_id(&self, setting_id: i64) -> BotResult<Option<ClientSetting>> {
        let setting =
            sqlx::query_as::<_, ClientSetting>(&format!("{SETTING_SELECT} WHERE cs.id = $1"))
                .bind(setting_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(setting)
    }

    async fn update_setting_value(&self, setting_id: i64, value: &str) -> BotResult<()> {
        sqlx::query("UPDATE client_settings SET value = $1 WHERE id = $2")
            .bind(value)
            .bind(setting_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clients_with_setting(
        &self,
        setting_type_id: i32,
        value: &str,
    ) -> BotResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            "SELECT c.id, c.external_id, c.user_name, c.first_name, c.last_name, c.system_name, \
                    c.last_message_at \
             FROM clients c JOIN client_settings cs ON cs.client_id = c.id \
             WHERE cs.setting_type_id = $1 AND upper(cs.value) = upper($2) \
             ORDER BY c.id",
        )
        .bind(setting_type_id)
        .bind(value)
        .fetch_all(&self.pool)
        .await?;
        Ok(clients)
    }
}
