//! # Navigation Router Module
//!
//! Turns one inbound update (a text message or a pressed inline control)
//! into the next screen plus any out-of-band notifications.
//!
//! ## Screens
//!
//! - MainMenu: main-menu categories, plus a checkout control once the cart
//!   has something in it
//! - CategoryBrowse: paginated dishes of one category
//! - VariantBrowse: garnishes or dressings for a dish that needs one
//! - CartSummary / EmptyCart: the draft order with clear and submit controls
//! - AdminUnconfirmedList, SettingsList, TodayReport, Help
//!
//! Pressed controls edit the message they belong to; text messages and
//! reply-keyboard buttons get a new message. Undecodable tokens produce no
//! reply at all.

use chrono::{Local, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cart::{CartEngine, OrderSummary};
use crate::catalog::CatalogCache;
use crate::config::{BotConfig, MenuConfig};
use crate::confirmation::{start_of_local_day, ConfirmationWorkflow};
use crate::errors::{BotResult, OrderBotError};
use crate::localization::{t_args_lang, t_lang};
use crate::models::{Admin, Client, ClientProfile, Dish};
use crate::paginator::Paginator;
use crate::screen::{Control, Delivery, Notification, Reply, Screen, ScreenKind};
use crate::store::OrderStore;
use crate::token::{ActionToken, TokenCodec};

pub const SETTINGS_COMMAND: &str = "/settings";

const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Payload of an inbound update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// Free text, including reply-keyboard buttons and commands
    Text(String),
    /// Raw action token of a pressed inline control
    Callback(String),
}

/// One update as seen by the order core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub profile: ClientProfile,
    pub kind: InboundKind,
}

impl Inbound {
    pub fn text(profile: ClientProfile, text: &str) -> Self {
        Self {
            profile,
            kind: InboundKind::Text(text.to_string()),
        }
    }

    pub fn callback(profile: ClientProfile, token: &str) -> Self {
        Self {
            profile,
            kind: InboundKind::Callback(token.to_string()),
        }
    }
}

/// Sender of the update being handled
struct Sender {
    client: Client,
    admin: Option<(Admin, Client)>,
}

impl Sender {
    fn is_admin(&self) -> bool {
        self.admin
            .as_ref()
            .is_some_and(|(_, admin_client)| admin_client.id == self.client.id)
    }
}

pub struct NavigationRouter {
    store: Arc<dyn OrderStore>,
    catalog: Arc<CatalogCache>,
    cart: Arc<CartEngine>,
    confirmation: ConfirmationWorkflow,
    codec: TokenCodec,
    paginator: Paginator,
    menu: MenuConfig,
    language: String,
}

impl NavigationRouter {
    pub fn new(store: Arc<dyn OrderStore>, catalog: Arc<CatalogCache>, config: &BotConfig) -> Self {
        let cart = Arc::new(CartEngine::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            config.menu.clone(),
        ));
        let confirmation = ConfirmationWorkflow::new(
            Arc::clone(&store),
            Arc::clone(&cart),
            config.settings.clone(),
        );
        Self {
            store,
            catalog,
            cart,
            confirmation,
            codec: TokenCodec::new(),
            paginator: Paginator::new(config.menu.page_size),
            menu: config.menu.clone(),
            language: config.language.clone(),
        }
    }

    /// Replace the token codec, e.g. to pin the admin namespace
    pub fn with_codec(mut self, codec: TokenCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn cart(&self) -> &CartEngine {
        &self.cart
    }

    pub fn confirmation(&self) -> &ConfirmationWorkflow {
        &self.confirmation
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Handle one update.
    ///
    /// Missing catalog or store entities are logged and produce an empty
    /// reply; store failures are returned to the caller.
    pub async fn handle(&self, inbound: &Inbound) -> BotResult<Reply> {
        let client = self.store.touch_client(&inbound.profile, Utc::now()).await?;
        let admin = self.store.active_admin().await?;
        let sender = Sender { client, admin };

        let result = match &inbound.kind {
            InboundKind::Callback(raw) => self.handle_callback(&sender, raw).await,
            InboundKind::Text(text) => self.handle_text(&sender, text).await,
        };

        match result {
            Err(OrderBotError::LookupMiss { entity, id }) => {
                warn!(
                    user_id = %inbound.profile.external_id,
                    entity,
                    id,
                    "Referenced entity is missing, ignoring update"
                );
                Ok(Reply::none())
            }
            other => other,
        }
    }

    async fn handle_callback(&self, sender: &Sender, raw: &str) -> BotResult<Reply> {
        let client = &sender.client;
        let token = self.codec.decode(raw);
        debug!(user_id = %client.external_id, token = %raw, action = ?token, "Callback decoded");

        let edit = Delivery::EditCurrent;
        match token {
            ActionToken::Noop => Ok(Reply::none()),
            ActionToken::BackToMenu | ActionToken::OpenMenu => {
                info!(user = %client.display_name(), "Back to main menu");
                Ok(Reply::screen(self.main_menu(client, edit).await?))
            }
            ActionToken::ClearCart => {
                self.cart.clear_cart(client.id).await?;
                Ok(Reply::screen(self.cleared_menu()))
            }
            ActionToken::SubmitOrder => self.submit_order(sender).await,
            ActionToken::GoToCart => {
                info!(user = %client.display_name(), "Opened checkout");
                Ok(Reply::screen(self.cart_screen(client, edit).await?))
            }
            ActionToken::ConfirmOrder { order_id } => self.confirm_order(sender, order_id).await,
            ActionToken::ToggleSetting { setting_id } => {
                match self.confirmation.toggle_setting(client.id, setting_id).await? {
                    Some(_) => Ok(Reply::screen(self.settings_screen(client, edit).await?)),
                    None => Ok(Reply::none()),
                }
            }
            ActionToken::CategoryBrowse { category_id, page } => Ok(Reply::screen(
                self.category_screen(client, category_id, page).await?,
            )),
            ActionToken::VariantBrowse {
                category_id,
                dish_id,
                child_category_id,
                page,
            } => Ok(Reply::screen(
                self.variant_screen(client, category_id, dish_id, child_category_id, page)
                    .await?,
            )),
            ActionToken::DishSelect {
                category_id,
                dish_id,
                child_id,
                page,
            } => {
                self.select_dish(client, category_id, dish_id, child_id, page)
                    .await
            }
        }
    }

    async fn handle_text(&self, sender: &Sender, text: &str) -> BotResult<Reply> {
        let client = &sender.client;
        let text = text.trim();
        let send = Delivery::SendNew;

        if text == self.t("button-menu") {
            info!(user = %client.display_name(), "Opened menu");
            return Ok(Reply::screen(self.main_menu(client, send).await?));
        }
        if text == self.t("button-my-order") {
            info!(user = %client.display_name(), "Opened cart");
            return Ok(Reply::screen(self.cart_screen(client, send).await?));
        }
        if command_name(text) == Some(SETTINGS_COMMAND) {
            info!(user = %client.display_name(), "Opened settings");
            return Ok(Reply::screen(self.settings_screen(client, send).await?));
        }

        if sender.is_admin() {
            if text == self.t("button-today-orders") {
                info!(user = %client.display_name(), "Requested today's orders");
                return Ok(Reply::screen(self.today_report_screen().await?));
            }
            if text == self.t("button-unconfirmed-orders") {
                info!(user = %client.display_name(), "Requested unconfirmed orders");
                return Ok(Reply::screen(self.unconfirmed_screen(send).await?));
            }
            if text == self.t("button-send-reminders") {
                return self.send_reminders().await;
            }
        }

        info!(user = %client.display_name(), text = %text, "Free text received");
        Ok(Reply::screen(self.help_screen(sender.is_admin())))
    }

    async fn select_dish(
        &self,
        client: &Client,
        category_id: i32,
        dish_id: i32,
        child_id: Option<i32>,
        page: u32,
    ) -> BotResult<Reply> {
        self.catalog
            .snapshot()
            .lookup_category(category_id)
            .ok_or_else(|| OrderBotError::lookup_miss("category", category_id))?;
        let dish = self
            .catalog
            .expect_dish(dish_id)
            .ok_or_else(|| OrderBotError::lookup_miss("dish", dish_id))?;
        if dish.category_id != Some(category_id) {
            warn!(
                user_id = %client.external_id,
                dish_id,
                category_id,
                "Dish selected outside its category"
            );
            return Err(OrderBotError::lookup_miss("dish", dish_id));
        }

        if let Some(child_id) = child_id {
            self.cart
                .apply_selection(client.id, dish_id, Some(child_id))
                .await?;
            return Ok(Reply::screen(
                self.category_screen(client, category_id, page).await?,
            ));
        }

        if let Some(child_category_id) = dish.variant_category(&self.menu) {
            return Ok(Reply::screen(
                self.variant_screen(client, category_id, dish_id, child_category_id, page)
                    .await?,
            ));
        }

        self.cart.apply_selection(client.id, dish_id, None).await?;
        Ok(Reply::screen(
            self.category_screen(client, category_id, page).await?,
        ))
    }

    async fn submit_order(&self, sender: &Sender) -> BotResult<Reply> {
        let client = &sender.client;
        let Some(summary) = self.cart.submit(client.id).await? else {
            debug!(user_id = %client.external_id, "Submit pressed with an empty cart");
            return Ok(Reply::screen(self.empty_cart_screen(Delivery::EditCurrent)));
        };

        let rendered = summary.render(self.lang());
        info!(
            user = %client.display_name(),
            total = summary.total,
            "Order sent to admin"
        );

        let mut reply = Reply::screen(self.payment_screen(sender, &rendered));
        match &sender.admin {
            Some((_, admin_client)) => {
                let notice = self.new_order_notice(admin_client, client, &rendered);
                reply = reply.with_notification(notice);
            }
            None => warn!(
                user_id = %client.external_id,
                "No active admin to notify about new order"
            ),
        }
        Ok(reply)
    }

    /// Admin notice about a submitted order. Sent as plain text, so the
    /// summary must stay free of markup.
    fn new_order_notice(
        &self,
        admin_client: &Client,
        client: &Client,
        rendered: &str,
    ) -> Notification {
        let notice = self.t_args("new-order-notice", &[("client", &client.display_name())]);
        Notification::new(admin_client.external_id, format!("{notice}{rendered}"))
    }

    async fn confirm_order(&self, sender: &Sender, order_id: i64) -> BotResult<Reply> {
        if !sender.is_admin() {
            warn!(
                user_id = %sender.client.external_id,
                order_id,
                "Confirmation attempted by a non-admin"
            );
            return Ok(Reply::none());
        }

        let confirmed = self.confirmation.confirm(order_id).await?;
        let mut reply = Reply::screen(self.unconfirmed_screen(Delivery::EditCurrent).await?);
        if let Some(confirmed) = confirmed {
            let text = self.t_args("order-confirmed", &[("total", &confirmed.total.to_string())]);
            reply = reply.with_notification(Notification::new(confirmed.client.external_id, text));
        }
        Ok(reply)
    }

    async fn send_reminders(&self) -> BotResult<Reply> {
        let clients = self.confirmation.clients_to_remind().await?;
        let text = format!("{}\n\n{}", self.t("reminder-text"), self.t("reminder-hint"));
        let notifications: Vec<Notification> = clients
            .iter()
            .map(|c| {
                info!(user = %c.display_name(), "Order reminder sent");
                Notification::new(c.external_id, text.clone()).html()
            })
            .collect();

        let count = notifications.len().to_string();
        let screen = Screen::new(
            ScreenKind::Help,
            self.t_args("reminders-sent", &[("count", &count)]),
        );
        Ok(Reply::screen(screen).with_notifications(notifications))
    }

    async fn draft_summary(&self, client: &Client) -> BotResult<OrderSummary> {
        self.cart.compute_order_summary(client.id, false).await
    }

    /// `body` prefixed with the italic cart summary when the cart is not empty
    fn with_order_header(&self, summary: &OrderSummary, body: &str) -> String {
        if summary.is_empty() {
            body.to_string()
        } else {
            format!(
                "<i>{}{}</i>\n{}",
                self.t("your-order"),
                summary.render(self.lang()),
                body
            )
        }
    }

    fn category_rows(&self) -> Vec<Vec<Control>> {
        self.catalog
            .snapshot()
            .main_menu_categories()
            .into_iter()
            .map(|category| {
                vec![Control::new(
                    category.name.clone(),
                    self.codec.encode(&ActionToken::CategoryBrowse {
                        category_id: category.id,
                        page: 1,
                    }),
                )]
            })
            .collect()
    }

    async fn main_menu(&self, client: &Client, delivery: Delivery) -> BotResult<Screen> {
        let summary = self.draft_summary(client).await?;
        let mut rows = self.category_rows();

        let prompt = if summary.is_empty() {
            self.t("main-menu-prompt")
        } else {
            rows.push(vec![Control::new(
                self.t("go-to-checkout"),
                self.codec.encode(&ActionToken::GoToCart),
            )]);
            self.t("main-menu-prompt-more")
        };

        Ok(Screen::new(ScreenKind::MainMenu, self.with_order_header(&summary, &prompt))
            .with_inline(rows)
            .with_delivery(delivery)
            .html())
    }

    fn cleared_menu(&self) -> Screen {
        let text = format!(
            "<i>{}</i>\n\n{}",
            self.t("cart-cleared"),
            self.t("main-menu-prompt")
        );
        Screen::new(ScreenKind::MainMenu, text)
            .with_inline(self.category_rows())
            .with_delivery(Delivery::EditCurrent)
            .html()
    }

    async fn category_screen(
        &self,
        client: &Client,
        category_id: i32,
        page: u32,
    ) -> BotResult<Screen> {
        let snapshot = self.catalog.snapshot();
        let category = snapshot
            .lookup_category(category_id)
            .ok_or_else(|| OrderBotError::lookup_miss("category", category_id))?;
        let dishes = snapshot.dishes_of(category_id);
        let window = self.paginator.paginate(&dishes, page);

        let mut rows: Vec<Vec<Control>> = window
            .items
            .iter()
            .map(|dish| {
                vec![Control::new(
                    self.dish_button_text(dish),
                    self.codec.encode(&ActionToken::DishSelect {
                        category_id,
                        dish_id: dish.id,
                        child_id: None,
                        page: window.page,
                    }),
                )]
            })
            .collect();

        if let Some(controls) = window.controls {
            let page_token = |target: Option<u32>| match target {
                Some(page) => self
                    .codec
                    .encode(&ActionToken::CategoryBrowse { category_id, page }),
                None => self.codec.noop_token(),
            };
            rows.push(vec![
                Control::new(self.t("page-previous"), page_token(controls.previous)),
                Control::new(
                    format!("[{}/{}]", controls.current, controls.total),
                    self.codec.noop_token(),
                ),
                Control::new(self.t("page-next"), page_token(controls.next)),
            ]);
        }

        rows.push(vec![Control::new(
            self.t("back-to-dish-list"),
            self.codec.encode(&ActionToken::BackToMenu),
        )]);

        let summary = self.draft_summary(client).await?;
        let body = format!("{}:", category.name);
        info!(
            user = %client.display_name(),
            category = %category.name,
            page = window.page,
            "Opened category"
        );

        Ok(Screen::new(
            ScreenKind::CategoryBrowse {
                category_id,
                page: window.page,
            },
            self.with_order_header(&summary, &body),
        )
        .with_inline(rows)
        .with_delivery(Delivery::EditCurrent)
        .html())
    }

    async fn variant_screen(
        &self,
        client: &Client,
        category_id: i32,
        dish_id: i32,
        child_category_id: i32,
        page: u32,
    ) -> BotResult<Screen> {
        let snapshot = self.catalog.snapshot();
        let dish = snapshot
            .lookup_dish(dish_id)
            .ok_or_else(|| OrderBotError::lookup_miss("dish", dish_id))?;

        let mut rows: Vec<Vec<Control>> = snapshot
            .dishes_of(child_category_id)
            .into_iter()
            .map(|child| {
                vec![Control::new(
                    child.name.clone(),
                    self.codec.encode(&ActionToken::DishSelect {
                        category_id,
                        dish_id,
                        child_id: Some(child.id),
                        page,
                    }),
                )]
            })
            .collect();
        rows.push(vec![Control::new(
            self.t("back"),
            self.codec
                .encode(&ActionToken::CategoryBrowse { category_id, page }),
        )]);

        let dish_name = dish.name.to_lowercase();
        let prompt = if child_category_id == self.menu.garnish_category_id {
            self.t_args(
                "variant-garnish-prompt",
                &[("dish", &dish_name), ("price", &dish.price.to_string())],
            )
        } else if child_category_id == self.menu.flavoring_category_id {
            self.t_args("variant-flavoring-prompt", &[("dish", &dish_name)])
        } else {
            self.t_args("variant-generic-prompt", &[("dish", &dish_name)])
        };

        let summary = self.draft_summary(client).await?;
        info!(
            user = %client.display_name(),
            dish = %dish.name,
            child_category_id,
            "Opened variant selection"
        );

        Ok(Screen::new(
            ScreenKind::VariantBrowse {
                category_id,
                dish_id,
                child_category_id,
                page,
            },
            self.with_order_header(&summary, &prompt),
        )
        .with_inline(rows)
        .with_delivery(Delivery::EditCurrent)
        .html())
    }

    async fn cart_screen(&self, client: &Client, delivery: Delivery) -> BotResult<Screen> {
        let summary = self.draft_summary(client).await?;
        if summary.is_empty() {
            return Ok(self.empty_cart_screen(delivery));
        }

        let text = format!("{}{}", self.t("your-order"), summary.render(self.lang()));
        Ok(Screen::new(ScreenKind::CartSummary, text)
            .with_inline(vec![
                vec![Control::new(
                    self.t("cart-clear"),
                    self.codec.encode(&ActionToken::ClearCart),
                )],
                vec![Control::new(
                    self.t("cart-submit"),
                    self.codec.encode(&ActionToken::SubmitOrder),
                )],
            ])
            .with_delivery(delivery))
    }

    fn empty_cart_screen(&self, delivery: Delivery) -> Screen {
        Screen::new(ScreenKind::EmptyCart, self.t("cart-empty"))
            .with_inline(vec![vec![self.open_menu_control()]])
            .with_delivery(delivery)
    }

    fn open_menu_control(&self) -> Control {
        Control::new(self.t("go-to-menu"), self.codec.encode(&ActionToken::OpenMenu))
    }

    fn payment_screen(&self, sender: &Sender, rendered_summary: &str) -> Screen {
        let success = self.t("payment-success");
        let text = match &sender.admin {
            Some((admin, _)) => format!(
                "{success}{rendered_summary}\n{}\n\n<code>{}</code> {}\n\n{} {}",
                self.t_args(
                    "payment-transfer",
                    &[("bank", &admin.bank), ("initials", &admin.initials)],
                ),
                admin.phone_number,
                self.t("payment-copy-hint"),
                admin.phone_number,
                self.t("payment-android-hint"),
            ),
            None => format!("{success}{rendered_summary}\n\n{}", self.t("payment-no-admin")),
        };

        Screen::new(ScreenKind::PaymentInstructions, text)
            .with_inline(vec![vec![self.open_menu_control()]])
            .with_delivery(Delivery::EditCurrent)
            .html()
    }

    async fn unconfirmed_screen(&self, delivery: Delivery) -> BotResult<Screen> {
        let pending = self.confirmation.list_unconfirmed().await?;
        if pending.is_empty() {
            return Ok(
                Screen::new(ScreenKind::AdminUnconfirmedList, self.t("unconfirmed-empty"))
                    .with_delivery(delivery),
            );
        }

        let rows = pending
            .iter()
            .map(|order| {
                vec![Control::new(
                    self.t_args(
                        "unconfirmed-entry",
                        &[
                            ("client", &order.client_name),
                            ("total", &order.total.to_string()),
                        ],
                    ),
                    self.codec.encode(&ActionToken::ConfirmOrder {
                        order_id: order.order_id,
                    }),
                )]
            })
            .collect();

        let header = self.t_args(
            "unconfirmed-header",
            &[("timestamp", &Local::now().format(TIMESTAMP_FORMAT).to_string())],
        );
        Ok(Screen::new(ScreenKind::AdminUnconfirmedList, header)
            .with_inline(rows)
            .with_delivery(delivery))
    }

    async fn settings_screen(&self, client: &Client, delivery: Delivery) -> BotResult<Screen> {
        let settings = self.confirmation.list_settings(client.id).await?;
        if settings.is_empty() {
            return Ok(Screen::new(ScreenKind::SettingsList, self.t("settings-empty"))
                .with_delivery(delivery)
                .html());
        }

        let values = self.confirmation.setting_values();
        let rows = settings
            .iter()
            .map(|setting| {
                let mark = if values.is_on(&setting.value) { "✅" } else { "🚫" };
                vec![Control::new(
                    format!("{}: {mark}", setting.name),
                    self.codec.encode(&ActionToken::ToggleSetting {
                        setting_id: setting.id,
                    }),
                )]
            })
            .collect();

        let text = format!("{}\n\n{}", self.t("settings-intro"), self.t("settings-hint"));
        Ok(Screen::new(ScreenKind::SettingsList, text)
            .with_inline(rows)
            .with_delivery(delivery)
            .html())
    }

    async fn today_report_screen(&self) -> BotResult<Screen> {
        let report = self
            .confirmation
            .daily_report(start_of_local_day(Local::now()))
            .await?;
        if report.is_empty() {
            return Ok(Screen::new(ScreenKind::TodayReport, self.t("today-empty")));
        }

        let mut text = self.t_args(
            "today-header",
            &[("timestamp", &Local::now().format(TIMESTAMP_FORMAT).to_string())],
        );
        for line in &report.lines {
            let quantity = line.quantity.to_string();
            let rendered = match &line.child_name {
                Some(child) => self.t_args(
                    "today-line-with-variant",
                    &[
                        ("dish", &line.dish_name),
                        ("variant", &child.to_lowercase()),
                        ("quantity", &quantity),
                    ],
                ),
                None => self.t_args(
                    "today-line",
                    &[("dish", &line.dish_name), ("quantity", &quantity)],
                ),
            };
            text.push('\n');
            text.push_str(&rendered);
        }
        text.push_str("\n\n");
        text.push_str(&self.t_args("today-total", &[("total", &report.total.to_string())]));

        Ok(Screen::new(ScreenKind::TodayReport, text))
    }

    fn help_screen(&self, is_admin: bool) -> Screen {
        let mut rows = vec![vec![self.t("button-menu"), self.t("button-my-order")]];
        if is_admin {
            rows.push(vec![
                self.t("button-today-orders"),
                self.t("button-unconfirmed-orders"),
            ]);
            rows.push(vec![self.t("button-send-reminders")]);
        }
        Screen::new(ScreenKind::Help, self.t("help-text")).with_reply_keyboard(rows)
    }

    fn dish_button_text(&self, dish: &Dish) -> String {
        let key = if dish.garnish_included {
            "dish-button-with-garnish"
        } else {
            "dish-button"
        };
        self.t_args(key, &[("dish", &dish.name), ("price", &dish.price.to_string())])
    }

    fn lang(&self) -> Option<&str> {
        Some(&self.language)
    }

    fn t(&self, key: &str) -> String {
        t_lang(key, self.lang())
    }

    fn t_args(&self, key: &str, args: &[(&str, &String)]) -> String {
        let args: Vec<(&str, &str)> = args.iter().map(|(k, v)| (*k, v.as_str())).collect();
        t_args_lang(key, &args, self.lang())
    }
}

/// `/command` part of a message, without a `@botname` suffix or arguments
fn command_name(text: &str) -> Option<&str> {
    let word = text.split_whitespace().next()?;
    if !word.starts_with('/') {
        return None;
    }
    Some(word.split('@').next().unwrap_or(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_name() {
        assert_eq!(command_name("/settings"), Some("/settings"));
        assert_eq!(command_name("/settings@canteen_bot"), Some("/settings"));
        assert_eq!(command_name("/start now"), Some("/start"));
        assert_eq!(command_name("settings"), None);
        assert_eq!(command_name(""), None);
    }
}
