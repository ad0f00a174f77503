//! # Catalog Cache Module
//!
//! Read-mostly snapshot of categories and dishes. The snapshot is built from
//! the store at startup and swapped whole on refresh: a reader holds an
//! `Arc<CatalogSnapshot>` and never observes a mix of old and new rows.
//! Refresh is expected from a single writer (startup); readers only clone
//! the current `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::errors::BotResult;
use crate::models::{Category, Dish};
use crate::store::OrderStore;

/// Immutable view of the catalog
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    categories: Vec<Category>,
    dishes: Vec<Dish>,
    dish_index: HashMap<i32, usize>,
    category_index: HashMap<i32, usize>,
}

impl CatalogSnapshot {
    /// Build a snapshot, ordering both lists by display sort order
    pub fn new(mut categories: Vec<Category>, mut dishes: Vec<Dish>) -> Self {
        categories.sort_by_key(|c| (c.sort, c.id));
        dishes.sort_by_key(|d| (d.sort, d.id));

        let category_index = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id, i))
            .collect();
        let dish_index = dishes.iter().enumerate().map(|(i, d)| (d.id, i)).collect();

        Self {
            categories,
            dishes,
            dish_index,
            category_index,
        }
    }

    pub fn lookup_dish(&self, id: i32) -> Option<&Dish> {
        self.dish_index.get(&id).map(|&i| &self.dishes[i])
    }

    pub fn lookup_category(&self, id: i32) -> Option<&Category> {
        self.category_index.get(&id).map(|&i| &self.categories[i])
    }

    /// Dishes of a category in display order
    pub fn dishes_of(&self, category_id: i32) -> Vec<&Dish> {
        self.dishes
            .iter()
            .filter(|d| d.category_id == Some(category_id))
            .collect()
    }

    /// Categories listed on the main menu, in display order
    pub fn main_menu_categories(&self) -> Vec<&Category> {
        self.categories
            .iter()
            .filter(|c| c.show_in_main_menu)
            .collect()
    }

    pub fn dish_count(&self) -> usize {
        self.dishes.len()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }
}

/// Shared handle to the current catalog snapshot
#[derive(Debug, Default)]
pub struct CatalogCache {
    current: RwLock<Arc<CatalogSnapshot>>,
}

impl CatalogCache {
    /// Create an empty cache; call [`CatalogCache::refresh`] before serving updates
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache around an already built snapshot
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Reload categories and dishes from the store and swap them in
    pub async fn refresh(&self, store: &dyn OrderStore) -> BotResult<()> {
        let categories = store.load_categories().await?;
        let dishes = store.load_dishes().await?;
        let snapshot = CatalogSnapshot::new(categories, dishes);

        info!(
            categories = snapshot.category_count(),
            dishes = snapshot.dish_count(),
            "Catalog cache refreshed"
        );

        self.replace(snapshot);
        Ok(())
    }

    /// Swap in a new snapshot
    pub fn replace(&self, snapshot: CatalogSnapshot) {
        let snapshot = Arc::new(snapshot);
        match self.current.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    /// The snapshot current at the time of the call
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Look up a dish, logging a data-integrity warning when absent
    pub fn expect_dish(&self, id: i32) -> Option<Dish> {
        let dish = self.snapshot().lookup_dish(id).cloned();
        if dish.is_none() {
            warn!(dish_id = id, "Dish referenced but missing from catalog cache");
        }
        dish
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i32, name: &str, sort: i32, main: bool) -> Category {
        Category {
            id,
            name: name.to_string(),
            show_in_main_menu: main,
            sort,
        }
    }

    fn dish(id: i32, category_id: i32, sort: i32) -> Dish {
        Dish {
            id,
            category_id: Some(category_id),
            name: format!("Dish {id}"),
            price: 100,
            garnish_included: false,
            flavoring_included: false,
            sort,
        }
    }

    #[test]
    fn test_lookups_over_snapshot() {
        let snapshot = CatalogSnapshot::new(
            vec![category(1, "Soups", 2, true), category(4, "Garnishes", 1, false)],
            vec![dish(10, 1, 2), dish(11, 1, 1), dish(40, 4, 1)],
        );

        assert_eq!(snapshot.lookup_dish(10).map(|d| d.id), Some(10));
        assert!(snapshot.lookup_dish(99).is_none());
        assert_eq!(snapshot.lookup_category(4).map(|c| c.name.as_str()), Some("Garnishes"));
        assert!(snapshot.lookup_category(99).is_none());

        let ids: Vec<i32> = snapshot.dishes_of(1).iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![11, 10]);
        assert!(snapshot.dishes_of(99).is_empty());

        let menu: Vec<i32> = snapshot.main_menu_categories().iter().map(|c| c.id).collect();
        assert_eq!(menu, vec![1]);
    }

    #[test]
    fn test_replace_swaps_whole_snapshot() {
        let cache = CatalogCache::from_snapshot(CatalogSnapshot::new(
            vec![category(1, "Soups", 1, true)],
            vec![dish(10, 1, 1)],
        ));

        let before = cache.snapshot();
        cache.replace(CatalogSnapshot::new(
            vec![category(2, "Salads", 1, true)],
            vec![dish(20, 2, 1)],
        ));
        let after = cache.snapshot();

        // A reader holding the old snapshot keeps a consistent view
        assert!(before.lookup_dish(10).is_some());
        assert!(before.lookup_category(2).is_none());
        assert!(after.lookup_dish(10).is_none());
        assert!(after.lookup_dish(20).is_some());
        assert!(cache.expect_dish(10).is_none());
    }
}
