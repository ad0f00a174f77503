//! Shared fixtures for the order core tests: a small canteen catalog held in
//! a [`MemoryStore`] and a router wired to it.

#![allow(dead_code)]

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use canteen_bot::catalog::CatalogCache;
use canteen_bot::config::BotConfig;
use canteen_bot::models::{Category, Client, ClientProfile, Dish};
use canteen_bot::router::{Inbound, NavigationRouter};
use canteen_bot::screen::Reply;
use canteen_bot::store::{MemoryStore, OrderStore};
use canteen_bot::token::TokenCodec;

pub const NAMESPACE: &str = "nstest";

pub const HOT_CATEGORY: i32 = 1;
pub const SALAD_CATEGORY: i32 = 2;
pub const GARNISH_CATEGORY: i32 = 4;
pub const FLAVORING_CATEGORY: i32 = 6;

/// Plain dish, no variant
pub const BORSCHT: i32 = 3;
/// Served with a garnish
pub const CUTLET: i32 = 10;
/// Needs a dressing
pub const CAESAR: i32 = 20;
/// Flagged for both garnish and dressing
pub const CHICKEN_SALAD: i32 = 21;
pub const MASHED_POTATOES: i32 = 40;
pub const BUCKWHEAT: i32 = 41;
pub const SOUR_CREAM: i32 = 60;
pub const OLIVE_OIL: i32 = 61;

pub const ADMIN_ID: i64 = 777;

fn category(id: i32, name: &str, show_in_main_menu: bool, sort: i32) -> Category {
    Category {
        id,
        name: name.to_string(),
        show_in_main_menu,
        sort,
    }
}

fn dish(id: i32, category_id: i32, name: &str, price: i32, sort: i32) -> Dish {
    Dish {
        id,
        category_id: Some(category_id),
        name: name.to_string(),
        price,
        garnish_included: false,
        flavoring_included: false,
        sort,
    }
}

/// Twelve hot dishes (three pages of five), two salads, two garnishes and
/// two dressings
pub fn catalog_rows() -> (Vec<Category>, Vec<Dish>) {
    let categories = vec![
        category(HOT_CATEGORY, "Горячее", true, 1),
        category(SALAD_CATEGORY, "Салаты", true, 2),
        category(GARNISH_CATEGORY, "Гарниры", false, 3),
        category(FLAVORING_CATEGORY, "Заправки", false, 4),
    ];

    let mut cutlet = dish(CUTLET, HOT_CATEGORY, "Котлета", 250, 2);
    cutlet.garnish_included = true;
    let mut caesar = dish(CAESAR, SALAD_CATEGORY, "Цезарь", 300, 1);
    caesar.flavoring_included = true;
    let mut chicken_salad = dish(CHICKEN_SALAD, SALAD_CATEGORY, "Салат с курицей", 280, 2);
    chicken_salad.garnish_included = true;
    chicken_salad.flavoring_included = true;

    let mut dishes = vec![dish(BORSCHT, HOT_CATEGORY, "Борщ", 150, 1), cutlet];
    dishes.extend((0..10).map(|i| {
        let name = format!("Суп дня {}", i + 1);
        dish(100 + i, HOT_CATEGORY, &name, 120, 3 + i)
    }));
    dishes.extend([
        caesar,
        chicken_salad,
        dish(MASHED_POTATOES, GARNISH_CATEGORY, "Пюре", 0, 1),
        dish(BUCKWHEAT, GARNISH_CATEGORY, "Гречка", 0, 2),
        dish(SOUR_CREAM, FLAVORING_CATEGORY, "Сметана", 0, 1),
        dish(OLIVE_OIL, FLAVORING_CATEGORY, "Оливковое масло", 0, 2),
    ]);

    (categories, dishes)
}

/// Store and catalog cache loaded with [`catalog_rows`]
pub async fn catalog_store() -> Result<(Arc<MemoryStore>, Arc<CatalogCache>)> {
    let (categories, dishes) = catalog_rows();
    let store = Arc::new(MemoryStore::with_catalog(categories, dishes));
    let catalog = Arc::new(CatalogCache::new());
    catalog.refresh(store.as_ref()).await?;
    Ok((store, catalog))
}

pub fn profile(external_id: i64, first_name: &str) -> ClientProfile {
    ClientProfile::new(external_id).with_first_name(first_name)
}

/// Create (or refresh) the client behind `profile`
pub async fn client(store: &MemoryStore, profile: &ClientProfile) -> Result<Client> {
    Ok(store.touch_client(profile, Utc::now()).await?)
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub router: NavigationRouter,
    /// Type id of the order reminder setting
    pub reminder_setting: i32,
}

impl Harness {
    /// Router over the fixture catalog with a fixed token namespace, one
    /// reminder setting type and no admin
    pub async fn new() -> Result<Self> {
        let (store, catalog) = catalog_store().await?;
        let reminder_setting = store.add_setting_type("Напоминания о заказе");

        let mut config = BotConfig::default();
        config.settings.notification_setting_type_id = reminder_setting;

        let dyn_store: Arc<dyn OrderStore> = store.clone();
        let router = NavigationRouter::new(dyn_store, catalog, &config)
            .with_codec(TokenCodec::with_namespace(NAMESPACE));

        Ok(Self {
            store,
            router,
            reminder_setting,
        })
    }

    /// Same as [`Harness::new`] with client [`ADMIN_ID`] as the active admin
    pub async fn with_admin() -> Result<Self> {
        let harness = Self::new().await?;
        let admin = client(&harness.store, &profile(ADMIN_ID, "Ольга")).await?;
        harness
            .store
            .add_admin(admin.id, "Сбербанк", "+79990001122", "О. П.");
        Ok(harness)
    }

    pub async fn press(&self, profile: &ClientProfile, token: &str) -> Result<Reply> {
        Ok(self.router.handle(&Inbound::callback(profile.clone(), token)).await?)
    }

    pub async fn say(&self, profile: &ClientProfile, text: &str) -> Result<Reply> {
        Ok(self.router.handle(&Inbound::text(profile.clone(), text)).await?)
    }
}
