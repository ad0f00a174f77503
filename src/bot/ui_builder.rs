//! UI Builder module for turning screens into Telegram messages

use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, MessageId,
    ParseMode,
};
use teloxide::{ApiError, RequestError};
use tracing::debug;

use crate::errors::BotResult;
use crate::screen::{Control, Delivery, Keyboard, Notification, Screen};

/// Inline keyboard whose buttons echo their action token
pub fn inline_keyboard(rows: &[Vec<Control>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|control| {
                InlineKeyboardButton::callback(control.label.clone(), control.token.clone())
            })
            .collect::<Vec<_>>()
    }))
}

/// Persistent bottom keyboard
pub fn reply_keyboard(rows: &[Vec<String>]) -> KeyboardMarkup {
    KeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|label| KeyboardButton::new(label.clone()))
            .collect::<Vec<_>>()
    }))
    .resize_keyboard()
    .persistent()
}

/// Show a screen in `chat_id`, editing `message_id` when the screen asks for it
pub async fn send_screen(
    bot: &Bot,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    screen: &Screen,
) -> BotResult<()> {
    let editable = !matches!(screen.keyboard, Keyboard::Reply(_));
    match (screen.delivery, message_id) {
        (Delivery::EditCurrent, Some(message_id)) if editable => {
            let mut request = bot.edit_message_text(chat_id, message_id, screen.text.clone());
            if screen.html {
                request = request.parse_mode(ParseMode::Html);
            }
            if let Keyboard::Inline(rows) = &screen.keyboard {
                request = request.reply_markup(inline_keyboard(rows));
            }
            match request.await {
                Ok(_) => Ok(()),
                // Re-rendering an identical screen is not a failure
                Err(RequestError::Api(ApiError::MessageNotModified)) => {
                    debug!(chat_id = %chat_id, "Screen unchanged, nothing to edit");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        _ => {
            let mut request = bot.send_message(chat_id, screen.text.clone());
            if screen.html {
                request = request.parse_mode(ParseMode::Html);
            }
            match &screen.keyboard {
                Keyboard::Inline(rows) => request = request.reply_markup(inline_keyboard(rows)),
                Keyboard::Reply(rows) => request = request.reply_markup(reply_keyboard(rows)),
                Keyboard::None => {}
            }
            request.await?;
            Ok(())
        }
    }
}

/// Send an out-of-band message to another chat
pub async fn send_notification(bot: &Bot, notification: &Notification) -> BotResult<()> {
    let mut request = bot.send_message(ChatId(notification.external_id), notification.text.clone());
    if notification.html {
        request = request.parse_mode(ParseMode::Html);
    }
    request.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_inline_keyboard_keeps_grid_and_tokens() {
        let markup = inline_keyboard(&[
            vec![Control::new("⬅️ Назад", "ns1"), Control::new("[1/3]", "ns1")],
            vec![Control::new("Борщ 150р", "1:3/1")],
        ]);

        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        let button = &markup.inline_keyboard[1][0];
        assert_eq!(button.text, "Борщ 150р");
        match &button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => assert_eq!(data, "1:3/1"),
            other => panic!("unexpected button kind: {other:?}"),
        }
    }

    #[test]
    fn test_reply_keyboard_rows() {
        let markup: KeyboardMarkup = reply_keyboard(&[
            vec!["📋Меню".to_string(), "🛒Мой заказ".to_string()],
            vec!["🔔Напомнить о заказе".to_string()],
        ]);
        assert_eq!(markup.keyboard.len(), 2);
        assert_eq!(markup.keyboard[0][1].text, "🛒Мой заказ");
    }
}
