use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use canteen_bot::bot::{callback_handler, message_handler};
use canteen_bot::catalog::CatalogCache;
use canteen_bot::config::BotConfig;
use canteen_bot::localization::{init_localization, t_lang};
use canteen_bot::router::{NavigationRouter, SETTINGS_COMMAND};
use canteen_bot::store::postgres::{create_pool, init_database_schema};
use canteen_bot::store::{OrderStore, PgStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting canteen ordering bot");

    let config = BotConfig::from_env()?;
    init_localization()?;

    info!(max_connections = config.max_connections, "Connecting to database");
    let pool = create_pool(&config.database_url, config.max_connections)
        .await
        .context("Failed to connect to the database")?;
    init_database_schema(&pool)
        .await
        .context("Failed to initialize the database schema")?;

    let store: Arc<dyn OrderStore> = Arc::new(PgStore::new(pool));

    // The catalog must be loaded before the first update is handled
    let catalog = Arc::new(CatalogCache::new());
    catalog
        .refresh(store.as_ref())
        .await
        .context("Failed to load the catalog")?;
    if catalog.snapshot().main_menu_categories().is_empty() {
        warn!("No categories are marked for the main menu");
    }

    let router = Arc::new(NavigationRouter::new(store, catalog, &config));

    let bot = Bot::new(&config.bot_token);

    let commands = vec![BotCommand::new(
        SETTINGS_COMMAND.trim_start_matches('/'),
        t_lang("settings-command", Some(&config.language)),
    )];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!(error = %e, "Failed to register bot commands");
    }

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    // Ctrl-C stops polling for new updates; handlers already running finish first
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped");
    Ok(())
}
