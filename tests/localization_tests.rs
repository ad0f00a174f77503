//! # Localization Tests
//!
//! This module contains unit tests for the localization functionality,
//! testing message retrieval and formatting with various edge cases.

use canteen_bot::localization::LocalizationManager;
use std::collections::HashMap;

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("cart-empty", "ru", None);
        assert_eq!(message, "В твоей корзине пока ничего нет!");

        let message = manager.get_message_in_language("cart-empty", "en", None);
        assert_eq!(message, "Your cart is empty!");
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "ru", None);
        assert_eq!(message, "Missing translation: nonexistent-key");
    }

    #[test]
    fn test_unsupported_language_falls_back_to_russian() {
        let manager = setup_localization();

        let russian = manager.get_message_in_language("button-menu", "ru", None);
        let fallback = manager.get_message_in_language("button-menu", "fr", None);
        assert_eq!(fallback, russian);
        assert_eq!(fallback, "📋Меню");
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("dish", "Борщ".to_string());
        args.insert("quantity", "2".to_string());
        args.insert("price", "300".to_string());

        let message = manager.get_message_in_language("summary-line", "ru", Some(&args));
        assert_eq!(message, "— Борщ x2 (300 руб.)");
    }

    #[test]
    fn test_get_message_missing_args() {
        let manager = setup_localization();

        // Missing arguments are reported by Fluent but still render
        let message = manager.get_message_in_language("summary-total", "ru", None);
        assert!(message.starts_with("Общая сумма заказа:"));
    }

    #[test]
    fn test_multiline_messages_keep_line_breaks() {
        let manager = setup_localization();

        let help = manager.get_message_in_language("help-text", "ru", None);
        assert_eq!(help.lines().count(), 2);
        assert!(help.starts_with("Чем могу помочь?"));
    }

    #[test]
    fn test_convenience_functions() {
        canteen_bot::localization::init_localization().expect("Failed to initialize localization");

        let message = canteen_bot::localization::t_lang("settings-command", Some("en"));
        assert_eq!(message, "Settings");

        let args = vec![("client", "Анна"), ("total", "150")];
        let message_with_args =
            canteen_bot::localization::t_args_lang("unconfirmed-entry", &args, None);
        assert_eq!(message_with_args, "От Анна на 150 руб.");
    }
}
