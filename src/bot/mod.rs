//! Bot module for handling Telegram interactions
//!
//! - `update_handler`: entry points for messages and callback queries
//! - `ui_builder`: converts screens into Telegram keyboards and sends them

pub mod ui_builder;
pub mod update_handler;

pub use ui_builder::{inline_keyboard, reply_keyboard};
pub use update_handler::{callback_handler, message_handler, profile_of};
