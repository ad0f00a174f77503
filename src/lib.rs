//! # Canteen Ordering Telegram Bot
//!
//! A Telegram bot for ordering lunch from a small canteen menu. Clients walk
//! the catalog through inline keyboards, collect dishes in a cart and submit
//! the order; the canteen admin confirms payments and gets daily reports.
//!
//! Every inline button carries a compact action token ([`token`]) which the
//! [`router`] decodes and dispatches against the cached catalog
//! ([`catalog`]) and the client's cart ([`cart`]).

pub mod bot;
pub mod cart;
pub mod catalog;
pub mod client_locks;
pub mod config;
pub mod confirmation;
pub mod errors;
pub mod localization;
pub mod models;
pub mod paginator;
pub mod router;
pub mod screen;
pub mod store;
pub mod token;
