//! # Cart Engine Module
//!
//! Applies cart actions to a client's orders and builds order summaries.
//!
//! Every mutation of one client's cart runs under that client's lock from
//! [`ClientLocks`], so the store's fetch-or-create of the draft order and of
//! the (order, dish, variant) line never interleaves with another press of
//! the same client. The store adds its own uniqueness constraints on top.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::CatalogCache;
use crate::client_locks::ClientLocks;
use crate::config::MenuConfig;
use crate::errors::{BotResult, OrderBotError};
use crate::localization::t_args_lang;
use crate::models::{Dish, OrderLine};
use crate::store::{OrderFilter, OrderStore};

/// One (dish, variant) row of a summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLine {
    pub dish_id: i32,
    pub child_dish_id: Option<i32>,
    pub dish_name: String,
    pub child_name: Option<String>,
    pub quantity: i32,
    pub unit_price: i32,
    /// Catalog sort order of the base dish
    pub sort: i32,
}

impl SummaryLine {
    /// `unit_price × quantity`; the variant is included in the dish price
    pub fn price(&self) -> i64 {
        i64::from(self.unit_price) * i64::from(self.quantity)
    }

    /// Dish name with the lowercased variant appended, if any
    pub fn label(&self) -> String {
        match &self.child_name {
            Some(child) => format!("{} + {}", self.dish_name, child.to_lowercase()),
            None => self.dish_name.clone(),
        }
    }
}

/// Itemized view of one order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSummary {
    pub order_id: Option<i64>,
    pub lines: Vec<SummaryLine>,
    pub total: i64,
}

impl OrderSummary {
    pub fn empty() -> Self {
        Self::default()
    }

    fn from_lines(order_id: Option<i64>, lines: Vec<SummaryLine>) -> Self {
        let total = lines.iter().map(SummaryLine::price).sum();
        Self {
            order_id,
            lines,
            total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Quantity of the given (dish, variant) pair, 0 when absent
    pub fn quantity_of(&self, dish_id: i32, child_dish_id: Option<i32>) -> i32 {
        self.lines
            .iter()
            .find(|l| l.dish_id == dish_id && l.child_dish_id == child_dish_id)
            .map_or(0, |l| l.quantity)
    }

    /// Breakdown text, one line per item followed by the total.
    ///
    /// Starts with a newline so it can follow a "Your order:" header
    /// directly; empty for an empty summary.
    pub fn render(&self, language: Option<&str>) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut text = String::new();
        for line in &self.lines {
            let quantity = line.quantity.to_string();
            let price = line.price().to_string();
            let rendered = match &line.child_name {
                Some(child) => {
                    let variant = child.to_lowercase();
                    t_args_lang(
                        "summary-line-with-variant",
                        &[
                            ("dish", line.dish_name.as_str()),
                            ("variant", variant.as_str()),
                            ("quantity", quantity.as_str()),
                            ("price", price.as_str()),
                        ],
                        language,
                    )
                }
                None => t_args_lang(
                    "summary-line",
                    &[
                        ("dish", line.dish_name.as_str()),
                        ("quantity", quantity.as_str()),
                        ("price", price.as_str()),
                    ],
                    language,
                ),
            };
            text.push('\n');
            text.push_str(&rendered);
        }
        text.push('\n');
        text.push_str(&t_args_lang(
            "summary-total",
            &[("total", self.total.to_string().as_str())],
            language,
        ));
        text
    }
}

/// Read-modify-write logic over a client's orders
pub struct CartEngine {
    store: Arc<dyn OrderStore>,
    catalog: Arc<CatalogCache>,
    menu: MenuConfig,
    locks: ClientLocks,
}

impl CartEngine {
    pub fn new(store: Arc<dyn OrderStore>, catalog: Arc<CatalogCache>, menu: MenuConfig) -> Self {
        Self {
            store,
            catalog,
            menu,
            locks: ClientLocks::new(),
        }
    }

    pub fn catalog(&self) -> &CatalogCache {
        &self.catalog
    }

    /// Add one unit of `dish_id` (with an optional variant) to the client's
    /// draft order, creating the draft if needed.
    ///
    /// Repeating a selection increments the existing line's quantity.
    /// Dishes unknown to the catalog, and variants outside the child
    /// category the dish offers, yield [`OrderBotError::LookupMiss`] and
    /// leave the cart untouched.
    pub async fn apply_selection(
        &self,
        client_id: i32,
        dish_id: i32,
        child_dish_id: Option<i32>,
    ) -> BotResult<OrderLine> {
        let dish = self
            .catalog
            .expect_dish(dish_id)
            .ok_or_else(|| OrderBotError::lookup_miss("dish", dish_id))?;
        let child = match child_dish_id {
            Some(child_id) => {
                let child = self
                    .catalog
                    .expect_dish(child_id)
                    .ok_or_else(|| OrderBotError::lookup_miss("dish", child_id))?;
                let offered = dish.variant_category(&self.menu);
                if offered.is_none() || child.category_id != offered {
                    warn!(
                        client_id,
                        dish_id,
                        variant_id = child_id,
                        "Variant is not offered for this dish"
                    );
                    return Err(OrderBotError::lookup_miss("variant", child_id));
                }
                Some(child)
            }
            None => None,
        };

        let _guard = self.locks.acquire(client_id).await;
        let line = self
            .store
            .add_selection(client_id, dish_id, child_dish_id, Utc::now())
            .await?;

        match child {
            Some(child) => info!(
                client_id,
                order_id = line.order_id,
                dish = %dish.name,
                variant = %child.name,
                quantity = line.quantity,
                "Dish with variant added to cart"
            ),
            None => info!(
                client_id,
                order_id = line.order_id,
                dish = %dish.name,
                quantity = line.quantity,
                "Dish added to cart"
            ),
        }

        Ok(line)
    }

    /// Delete the client's draft and its lines; `false` if there was none
    pub async fn clear_cart(&self, client_id: i32) -> BotResult<bool> {
        let _guard = self.locks.acquire(client_id).await;
        let cleared = self.store.clear_draft(client_id).await?;
        if cleared {
            info!(client_id, "Cart cleared");
        } else {
            debug!(client_id, "Clear requested with no draft order");
        }
        Ok(cleared)
    }

    /// Submit the client's draft and return the summary of what was
    /// submitted; `None` when there was nothing to submit.
    ///
    /// The summary is read under the same lock as the submission, so it
    /// always matches the submitted lines.
    pub async fn submit(&self, client_id: i32) -> BotResult<Option<OrderSummary>> {
        let _guard = self.locks.acquire(client_id).await;
        let summary = self.compute_order_summary(client_id, false).await?;
        if summary.is_empty() {
            debug!(client_id, "Submit requested with no draft order");
            return Ok(None);
        }

        let submitted = self.store.submit_drafts(client_id, Utc::now()).await?;
        if submitted == 0 {
            debug!(client_id, "Draft order was submitted concurrently");
            return Ok(None);
        }
        info!(client_id, orders = submitted, total = summary.total, "Order submitted");
        Ok(Some(summary))
    }

    /// Summary of the client's draft, or with `only_unconfirmed_submitted`
    /// of its most recent submitted order still awaiting confirmation
    pub async fn compute_order_summary(
        &self,
        client_id: i32,
        only_unconfirmed_submitted: bool,
    ) -> BotResult<OrderSummary> {
        let filter = if only_unconfirmed_submitted {
            OrderFilter::UnconfirmedSubmitted
        } else {
            OrderFilter::Draft
        };
        match self.store.find_order(client_id, filter).await? {
            Some(order) => self.summarize_order(order.id).await,
            None => Ok(OrderSummary::empty()),
        }
    }

    /// Summary of a specific order
    pub async fn summarize_order(&self, order_id: i64) -> BotResult<OrderSummary> {
        let lines = self.store.order_lines(order_id).await?;
        Ok(OrderSummary::from_lines(
            Some(order_id),
            self.summary_lines(&lines),
        ))
    }

    /// Group order lines by (dish, variant), summing quantities, in first-seen order.
    /// Lines whose dish is missing from the catalog are logged and skipped.
    pub fn summary_lines(&self, lines: &[OrderLine]) -> Vec<SummaryLine> {
        let snapshot = self.catalog.snapshot();
        let mut grouped: Vec<SummaryLine> = Vec::new();

        for line in lines {
            if let Some(existing) = grouped
                .iter_mut()
                .find(|g| g.dish_id == line.dish_id && g.child_dish_id == line.child_dish_id)
            {
                existing.quantity += line.quantity;
                continue;
            }

            let Some(dish) = snapshot.lookup_dish(line.dish_id) else {
                warn!(
                    order_id = line.order_id,
                    dish_id = line.dish_id,
                    "Order line references a dish missing from the catalog"
                );
                continue;
            };
            let child_name = line.child_dish_id.and_then(|child_id| {
                let child = snapshot.lookup_dish(child_id);
                if child.is_none() {
                    warn!(
                        order_id = line.order_id,
                        dish_id = child_id,
                        "Order line references a variant missing from the catalog"
                    );
                }
                child.map(|c| c.name.clone())
            });

            grouped.push(summary_line(dish, line, child_name));
        }

        grouped
    }
}

fn summary_line(dish: &Dish, line: &OrderLine, child_name: Option<String>) -> SummaryLine {
    SummaryLine {
        dish_id: dish.id,
        child_dish_id: line.child_dish_id,
        dish_name: dish.name.clone(),
        child_name,
        quantity: line.quantity,
        unit_price: dish.price,
        sort: dish.sort,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(dish: &str, child: Option<&str>, quantity: i32, unit_price: i32) -> SummaryLine {
        SummaryLine {
            dish_id: 1,
            child_dish_id: child.map(|_| 2),
            dish_name: dish.to_string(),
            child_name: child.map(str::to_string),
            quantity,
            unit_price,
            sort: 0,
        }
    }

    #[test]
    fn test_render_empty_summary() {
        assert_eq!(OrderSummary::empty().render(Some("ru")), "");
    }

    #[test]
    fn test_render_lines_and_total() {
        let summary = OrderSummary::from_lines(
            Some(1),
            vec![
                line("Котлета", Some("Пюре"), 2, 250),
                line("Борщ", None, 1, 150),
            ],
        );
        assert_eq!(summary.total, 650);
        assert_eq!(
            summary.render(Some("ru")),
            "\n— Котлета + пюре x2 (500 руб.)\n— Борщ x1 (150 руб.)\nОбщая сумма заказа: 650 руб."
        );
    }

    #[test]
    fn test_label_lowercases_variant() {
        assert_eq!(line("Котлета", Some("Гречка"), 1, 10).label(), "Котлета + гречка");
        assert_eq!(line("Борщ", None, 1, 10).label(), "Борщ");
    }
}
