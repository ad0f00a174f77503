//! # Action Token Module
//!
//! Every inline button carries a short action token that Telegram echoes back
//! in the callback query. This module converts between those strings and the
//! typed [`ActionToken`] the router dispatches on.
//!
//! ## Grammar
//!
//! - `<ns>` alone: no-op control (page indicator, disabled arrows)
//! - `<ns>/confirm/<orderId>`, `<ns>/changeValue/<settingId>`: admin and
//!   settings actions, namespaced by a process-lifetime random prefix
//! - `back.to.menu`, `open.menu`, `cart.clear`, `make.order`, `open.my.order`
//! - `category:<id>`
//! - `garnishMenu:<categoryId>:<dishId>:<childCategoryId>`
//! - `<categoryId>:<dishId>[.<childId>]`
//!
//! Any of the last three may end in `/<page>`. Rules are applied in the
//! order above; the first match wins. Decoding is a pure string function.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::errors::{BotResult, OrderBotError};

pub const BACK_TO_MENU: &str = "back.to.menu";
pub const OPEN_MENU: &str = "open.menu";
pub const CLEAR_CART: &str = "cart.clear";
pub const SUBMIT_ORDER: &str = "make.order";
pub const GO_TO_CART: &str = "open.my.order";

const CONFIRM_SEGMENT: &str = "confirm";
const CHANGE_VALUE_SEGMENT: &str = "changeValue";

lazy_static! {
    static ref CATEGORY_REGEX: Regex =
        Regex::new(r"^category:(\d+)$").expect("Category token pattern should be valid");
    static ref VARIANT_MENU_REGEX: Regex = Regex::new(r"^garnishMenu:(\d+):(\d+):(\d+)$")
        .expect("Variant menu token pattern should be valid");
    static ref DISH_REGEX: Regex =
        Regex::new(r"^(\d+):(\d+)(?:\.(\d+))?$").expect("Dish token pattern should be valid");
}

/// Decoded action carried by an inline control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionToken {
    /// Unknown or deliberately inert control
    Noop,
    BackToMenu,
    OpenMenu,
    ClearCart,
    SubmitOrder,
    GoToCart,
    /// Admin confirms a submitted order
    ConfirmOrder { order_id: i64 },
    /// Owner flips one of their settings
    ToggleSetting { setting_id: i64 },
    /// List dishes of a category
    CategoryBrowse { category_id: i32, page: u32 },
    /// List the variants (garnishes, dressings) offered for a dish
    VariantBrowse {
        category_id: i32,
        dish_id: i32,
        child_category_id: i32,
        page: u32,
    },
    /// Pick a dish, optionally with an already chosen variant
    DishSelect {
        category_id: i32,
        dish_id: i32,
        child_id: Option<i32>,
        page: u32,
    },
}

/// Encoder/decoder for the action token grammar
#[derive(Debug, Clone)]
pub struct TokenCodec {
    namespace: String,
}

impl TokenCodec {
    /// Create a codec with a fresh random admin namespace
    pub fn new() -> Self {
        Self::with_namespace(&format!("ns{:016x}", rand::random::<u64>()))
    }

    /// Create a codec with a fixed namespace
    pub fn with_namespace(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Token of a control that does nothing when pressed
    pub fn noop_token(&self) -> String {
        self.namespace.clone()
    }

    /// Decode a raw token, mapping anything malformed to [`ActionToken::Noop`]
    pub fn decode(&self, raw: &str) -> ActionToken {
        match self.try_decode(raw) {
            Ok(token) => token,
            Err(e) => {
                debug!(token = %raw, error = %e, "Ignoring undecodable action token");
                ActionToken::Noop
            }
        }
    }

    /// Decode a raw token, reporting tokens that match no rule
    pub fn try_decode(&self, raw: &str) -> BotResult<ActionToken> {
        let malformed = || OrderBotError::Decode(raw.to_string());

        if raw == self.namespace {
            return Ok(ActionToken::Noop);
        }

        // The namespaced argument sits where a page suffix would be
        if let Some(rest) = raw
            .strip_prefix(self.namespace.as_str())
            .and_then(|r| r.strip_prefix('/'))
        {
            let (verb, arg) = rest.split_once('/').ok_or_else(malformed)?;
            let id: i64 = arg.parse().map_err(|_| malformed())?;
            return match verb {
                CONFIRM_SEGMENT => Ok(ActionToken::ConfirmOrder { order_id: id }),
                CHANGE_VALUE_SEGMENT => Ok(ActionToken::ToggleSetting { setting_id: id }),
                _ => Err(malformed()),
            };
        }

        let (body, page) = split_page(raw);

        match body {
            BACK_TO_MENU => return Ok(ActionToken::BackToMenu),
            OPEN_MENU => return Ok(ActionToken::OpenMenu),
            CLEAR_CART => return Ok(ActionToken::ClearCart),
            SUBMIT_ORDER => return Ok(ActionToken::SubmitOrder),
            GO_TO_CART => return Ok(ActionToken::GoToCart),
            _ => {}
        }

        if let Some(caps) = CATEGORY_REGEX.captures(body) {
            let category_id = caps[1].parse().map_err(|_| malformed())?;
            return Ok(ActionToken::CategoryBrowse { category_id, page });
        }

        if let Some(caps) = VARIANT_MENU_REGEX.captures(body) {
            return Ok(ActionToken::VariantBrowse {
                category_id: caps[1].parse().map_err(|_| malformed())?,
                dish_id: caps[2].parse().map_err(|_| malformed())?,
                child_category_id: caps[3].parse().map_err(|_| malformed())?,
                page,
            });
        }

        if let Some(caps) = DISH_REGEX.captures(body) {
            let child_id = match caps.get(3) {
                Some(m) => Some(m.as_str().parse().map_err(|_| malformed())?),
                None => None,
            };
            return Ok(ActionToken::DishSelect {
                category_id: caps[1].parse().map_err(|_| malformed())?,
                dish_id: caps[2].parse().map_err(|_| malformed())?,
                child_id,
                page,
            });
        }

        Err(malformed())
    }

    /// Encode a token into the string placed on a control
    pub fn encode(&self, token: &ActionToken) -> String {
        match *token {
            ActionToken::Noop => self.noop_token(),
            ActionToken::BackToMenu => BACK_TO_MENU.to_string(),
            ActionToken::OpenMenu => OPEN_MENU.to_string(),
            ActionToken::ClearCart => CLEAR_CART.to_string(),
            ActionToken::SubmitOrder => SUBMIT_ORDER.to_string(),
            ActionToken::GoToCart => GO_TO_CART.to_string(),
            ActionToken::ConfirmOrder { order_id } => {
                format!("{}/{CONFIRM_SEGMENT}/{order_id}", self.namespace)
            }
            ActionToken::ToggleSetting { setting_id } => {
                format!("{}/{CHANGE_VALUE_SEGMENT}/{setting_id}", self.namespace)
            }
            ActionToken::CategoryBrowse { category_id, page } => {
                format!("category:{category_id}/{page}")
            }
            ActionToken::VariantBrowse {
                category_id,
                dish_id,
                child_category_id,
                page,
            } => format!("garnishMenu:{category_id}:{dish_id}:{child_category_id}/{page}"),
            ActionToken::DishSelect {
                category_id,
                dish_id,
                child_id,
                page,
            } => match child_id {
                Some(child_id) => format!("{category_id}:{dish_id}.{child_id}/{page}"),
                None => format!("{category_id}:{dish_id}/{page}"),
            },
        }
    }
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip a trailing `/<page>` suffix; pages are 1-based
fn split_page(raw: &str) -> (&str, u32) {
    match raw.rsplit_once('/') {
        Some((body, suffix)) => (body, suffix.parse::<u32>().unwrap_or(1).max(1)),
        None => (raw, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::with_namespace("ns0123")
    }

    #[test]
    fn test_category_token_defaults_to_first_page() {
        let codec = codec();
        for category_id in [1, 4, 17, 250] {
            assert_eq!(
                codec.decode(&format!("category:{category_id}")),
                ActionToken::CategoryBrowse { category_id, page: 1 }
            );
            assert_eq!(
                codec.decode(&format!("category:{category_id}/3")),
                ActionToken::CategoryBrowse { category_id, page: 3 }
            );
        }
    }

    #[test]
    fn test_non_numeric_page_defaults_to_one() {
        let codec = codec();
        assert_eq!(
            codec.decode("category:2/abc"),
            ActionToken::CategoryBrowse { category_id: 2, page: 1 }
        );
        assert_eq!(
            codec.decode("category:2/0"),
            ActionToken::CategoryBrowse { category_id: 2, page: 1 }
        );
    }

    #[test]
    fn test_named_actions() {
        let codec = codec();
        assert_eq!(codec.decode("back.to.menu"), ActionToken::BackToMenu);
        assert_eq!(codec.decode("open.menu"), ActionToken::OpenMenu);
        assert_eq!(codec.decode("cart.clear"), ActionToken::ClearCart);
        assert_eq!(codec.decode("make.order"), ActionToken::SubmitOrder);
        assert_eq!(codec.decode("open.my.order"), ActionToken::GoToCart);
    }

    #[test]
    fn test_namespaced_admin_actions() {
        let codec = codec();
        assert_eq!(
            codec.decode("ns0123/confirm/42"),
            ActionToken::ConfirmOrder { order_id: 42 }
        );
        assert_eq!(
            codec.decode("ns0123/changeValue/7"),
            ActionToken::ToggleSetting { setting_id: 7 }
        );
        assert_eq!(codec.decode("ns0123"), ActionToken::Noop);
        // Another process's namespace is just noise
        assert_eq!(codec.decode("ns9999/confirm/42"), ActionToken::Noop);
        assert!(codec.try_decode("ns0123/confirm/x").is_err());
        assert!(codec.try_decode("ns0123/delete/1").is_err());
    }

    #[test]
    fn test_variant_menu_token() {
        let codec = codec();
        assert_eq!(
            codec.decode("garnishMenu:1:12:4/2"),
            ActionToken::VariantBrowse {
                category_id: 1,
                dish_id: 12,
                child_category_id: 4,
                page: 2
            }
        );
    }

    #[test]
    fn test_dish_selection_tokens() {
        let codec = codec();
        assert_eq!(
            codec.decode("1:3"),
            ActionToken::DishSelect {
                category_id: 1,
                dish_id: 3,
                child_id: None,
                page: 1
            }
        );
        assert_eq!(
            codec.decode("2:12.40/3"),
            ActionToken::DishSelect {
                category_id: 2,
                dish_id: 12,
                child_id: Some(40),
                page: 3
            }
        );
    }

    #[test]
    fn test_malformed_tokens_decode_to_noop() {
        let codec = codec();
        let malformed = [
            "",
            "/",
            "category:",
            "category:x",
            "1:",
            ":1",
            "1:2.",
            "hello",
            "garnishMenu:1:2",
            "99999999999:1",
        ];
        for raw in malformed {
            assert_eq!(codec.decode(raw), ActionToken::Noop, "token {raw:?}");
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let codec = codec();
        let tokens = [
            ActionToken::Noop,
            ActionToken::BackToMenu,
            ActionToken::OpenMenu,
            ActionToken::ClearCart,
            ActionToken::SubmitOrder,
            ActionToken::GoToCart,
            ActionToken::ConfirmOrder { order_id: 9 },
            ActionToken::ToggleSetting { setting_id: 3 },
            ActionToken::CategoryBrowse { category_id: 5, page: 2 },
            ActionToken::VariantBrowse {
                category_id: 1,
                dish_id: 2,
                child_category_id: 6,
                page: 4,
            },
            ActionToken::DishSelect {
                category_id: 1,
                dish_id: 2,
                child_id: Some(30),
                page: 1,
            },
            ActionToken::DishSelect {
                category_id: 1,
                dish_id: 2,
                child_id: None,
                page: 3,
            },
        ];
        for token in tokens {
            assert_eq!(codec.decode(&codec.encode(&token)), token);
        }
    }

    #[test]
    fn test_random_namespaces_differ() {
        let a = TokenCodec::new();
        let b = TokenCodec::new();
        assert_ne!(a.namespace(), b.namespace());
        assert!(a.encode(&ActionToken::ConfirmOrder { order_id: i64::MAX }).len() <= 64);
    }
}
