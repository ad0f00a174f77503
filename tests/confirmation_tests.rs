//! # Confirmation Workflow Tests
//!
//! Pending-order list, confirmation, settings, daily report and reminder
//! recipients over the in-memory store.

mod common;

use anyhow::Result;
use chrono::{Duration, Local, Utc};
use std::sync::Arc;

use canteen_bot::cart::CartEngine;
use canteen_bot::config::{MenuConfig, SettingValues};
use canteen_bot::confirmation::{start_of_local_day, ConfirmationWorkflow};
use canteen_bot::errors::OrderBotError;
use canteen_bot::store::{MemoryStore, OrderStore};

use common::*;

struct Fixture {
    store: Arc<MemoryStore>,
    cart: Arc<CartEngine>,
    workflow: ConfirmationWorkflow,
}

async fn setup() -> Result<Fixture> {
    let (store, catalog) = catalog_store().await?;
    let reminder_setting = store.add_setting_type("Напоминания о заказе");
    let dyn_store: Arc<dyn OrderStore> = store.clone();

    let cart = Arc::new(CartEngine::new(
        Arc::clone(&dyn_store),
        catalog,
        MenuConfig::default(),
    ));
    let settings = SettingValues {
        notification_setting_type_id: reminder_setting,
        ..SettingValues::default()
    };
    let workflow = ConfirmationWorkflow::new(dyn_store, Arc::clone(&cart), settings);

    Ok(Fixture {
        store,
        cart,
        workflow,
    })
}

impl Fixture {
    /// Submit one order for `client_id`, returning its id
    async fn submit(&self, client_id: i32, selections: &[(i32, Option<i32>)]) -> Result<i64> {
        let mut order_id = None;
        for &(dish_id, child_id) in selections {
            let line = self.cart.apply_selection(client_id, dish_id, child_id).await?;
            order_id = Some(line.order_id);
        }
        self.cart.submit(client_id).await?;
        order_id.ok_or_else(|| anyhow::anyhow!("no selections to submit"))
    }
}

#[tokio::test]
async fn test_unconfirmed_list_names_and_totals() -> Result<()> {
    let fx = setup().await?;
    let anna = client(&fx.store, &profile(555, "Анна")).await?;
    let boris = client(&fx.store, &profile(556, "Борис")).await?;
    fx.store.set_system_name(boris.id, "Бухгалтерия");

    let anna_order = fx.submit(anna.id, &[(BORSCHT, None), (BORSCHT, None)]).await?;
    let boris_order = fx
        .submit(boris.id, &[(CUTLET, Some(BUCKWHEAT)), (CAESAR, Some(OLIVE_OIL))])
        .await?;
    // A draft is not awaiting confirmation
    fx.cart.apply_selection(anna.id, CUTLET, Some(MASHED_POTATOES)).await?;

    let pending = fx.workflow.list_unconfirmed().await?;
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].order_id, anna_order);
    assert_eq!(pending[0].client_name, "Анна");
    assert_eq!(pending[0].total, 300);
    assert_eq!(pending[1].order_id, boris_order);
    assert_eq!(pending[1].client_name, "Бухгалтерия");
    assert_eq!(pending[1].total, 550);
    Ok(())
}

#[tokio::test]
async fn test_confirm_removes_exactly_one_order() -> Result<()> {
    let fx = setup().await?;
    let anna = client(&fx.store, &profile(555, "Анна")).await?;
    let boris = client(&fx.store, &profile(556, "Борис")).await?;

    let anna_order = fx.submit(anna.id, &[(BORSCHT, None)]).await?;
    let boris_order = fx.submit(boris.id, &[(CUTLET, Some(BUCKWHEAT))]).await?;

    let confirmed = fx
        .workflow
        .confirm(anna_order)
        .await?
        .expect("submitted order should be confirmable");
    assert_eq!(confirmed.order_id, anna_order);
    assert_eq!(confirmed.client.external_id, 555);
    assert_eq!(confirmed.total, 150);

    let pending = fx.workflow.list_unconfirmed().await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].order_id, boris_order);

    // Repeated confirmation is a no-op
    assert!(fx.workflow.confirm(anna_order).await?.is_none());
    assert_eq!(fx.workflow.list_unconfirmed().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_confirm_rejects_drafts_and_unknown_orders() -> Result<()> {
    let fx = setup().await?;
    let anna = client(&fx.store, &profile(555, "Анна")).await?;

    let draft = fx.cart.apply_selection(anna.id, BORSCHT, None).await?;
    assert!(fx.workflow.confirm(draft.order_id).await?.is_none());

    let err = fx.workflow.confirm(9_999).await.unwrap_err();
    assert!(matches!(
        err,
        OrderBotError::LookupMiss { entity: "order", id: 9_999 }
    ));
    Ok(())
}

#[tokio::test]
async fn test_orders_of_unknown_clients_are_skipped() -> Result<()> {
    let fx = setup().await?;
    let anna = client(&fx.store, &profile(555, "Анна")).await?;
    let boris = client(&fx.store, &profile(556, "Борис")).await?;

    fx.submit(anna.id, &[(BORSCHT, None)]).await?;
    let boris_order = fx.submit(boris.id, &[(BORSCHT, None)]).await?;
    fx.store.remove_client(boris.id);

    let pending = fx.workflow.list_unconfirmed().await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].client_id, anna.id);

    let err = fx.workflow.confirm(boris_order).await.unwrap_err();
    assert!(matches!(err, OrderBotError::LookupMiss { entity: "client", .. }));
    Ok(())
}

#[tokio::test]
async fn test_daily_report_sums_todays_submitted_orders() -> Result<()> {
    let fx = setup().await?;
    let anna = client(&fx.store, &profile(555, "Анна")).await?;
    let boris = client(&fx.store, &profile(556, "Борис")).await?;
    let vera = client(&fx.store, &profile(557, "Вера")).await?;

    fx.submit(anna.id, &[(CUTLET, Some(BUCKWHEAT)), (BORSCHT, None)]).await?;
    fx.submit(boris.id, &[(BORSCHT, None), (BORSCHT, None)]).await?;
    let old_order = fx.submit(vera.id, &[(CAESAR, Some(SOUR_CREAM))]).await?;
    fx.store
        .set_order_timestamp(old_order, Utc::now() - Duration::days(2));
    // Drafts never count
    fx.cart.apply_selection(vera.id, BORSCHT, None).await?;

    let report = fx
        .workflow
        .daily_report(start_of_local_day(Local::now()))
        .await?;

    assert_eq!(report.order_count, 2);
    let lines: Vec<(String, i32)> = report
        .lines
        .iter()
        .map(|l| (l.label(), l.quantity))
        .collect();
    assert_eq!(
        lines,
        [("Борщ".to_string(), 3), ("Котлета + гречка".to_string(), 1)]
    );
    assert_eq!(report.total, 3 * 150 + 250);
    Ok(())
}

#[tokio::test]
async fn test_daily_report_empty_day() -> Result<()> {
    let fx = setup().await?;
    let report = fx
        .workflow
        .daily_report(start_of_local_day(Local::now()))
        .await?;
    assert!(report.is_empty());
    assert_eq!(report.order_count, 0);
    assert_eq!(report.total, 0);
    Ok(())
}

#[tokio::test]
async fn test_settings_default_on_and_toggle() -> Result<()> {
    let fx = setup().await?;
    let anna = client(&fx.store, &profile(555, "Анна")).await?;
    let boris = client(&fx.store, &profile(556, "Борис")).await?;

    let settings = fx.workflow.list_settings(anna.id).await?;
    assert_eq!(settings.len(), 1);
    assert_eq!(settings[0].name, "Напоминания о заказе");
    assert_eq!(settings[0].value, "Да");

    // Listing again does not duplicate rows
    assert_eq!(fx.workflow.list_settings(anna.id).await?.len(), 1);

    let setting_id = settings[0].id;
    assert!(fx.workflow.toggle_setting(boris.id, setting_id).await?.is_none());
    assert_eq!(fx.workflow.list_settings(anna.id).await?[0].value, "Да");

    let toggled = fx
        .workflow
        .toggle_setting(anna.id, setting_id)
        .await?
        .expect("owner can toggle");
    assert_eq!(toggled.value, "Нет");
    let toggled = fx
        .workflow
        .toggle_setting(anna.id, setting_id)
        .await?
        .expect("owner can toggle");
    assert_eq!(toggled.value, "Да");

    let err = fx.workflow.toggle_setting(anna.id, 9_999).await.unwrap_err();
    assert!(matches!(err, OrderBotError::LookupMiss { entity: "setting", .. }));
    Ok(())
}

#[tokio::test]
async fn test_reminder_recipients_follow_setting() -> Result<()> {
    let fx = setup().await?;
    let anna = client(&fx.store, &profile(555, "Анна")).await?;
    let boris = client(&fx.store, &profile(556, "Борис")).await?;
    let vera = client(&fx.store, &profile(557, "Вера")).await?;

    fx.workflow.list_settings(anna.id).await?;
    let boris_settings = fx.workflow.list_settings(boris.id).await?;
    fx.workflow
        .toggle_setting(boris.id, boris_settings[0].id)
        .await?;
    let vera_settings = fx.workflow.list_settings(vera.id).await?;
    // Stored values are compared case-insensitively
    fx.store
        .update_setting_value(vera_settings[0].id, "ДА")
        .await?;

    let recipients: Vec<i64> = fx
        .workflow
        .clients_to_remind()
        .await?
        .iter()
        .map(|c| c.external_id)
        .collect();
    assert_eq!(recipients, [555, 557]);
    Ok(())
}
