//! Update handlers: convert Telegram messages and callback queries into
//! router input, then deliver the router's reply

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, MessageId, User};
use tracing::{debug, error};

use crate::errors::OrderBotError;
use crate::localization::t_lang;
use crate::models::ClientProfile;
use crate::router::{Inbound, NavigationRouter};
use crate::screen::{Reply, Screen, ScreenKind};

use super::ui_builder::{send_notification, send_screen};

/// Identity fields of a Telegram user
pub fn profile_of(user: &User) -> ClientProfile {
    ClientProfile {
        external_id: user.id.0 as i64,
        user_name: user.username.clone(),
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
    }
}

/// Handle text messages, reply-keyboard presses and commands
pub async fn message_handler(bot: Bot, msg: Message, router: Arc<NavigationRouter>) -> Result<()> {
    let (Some(text), Some(user)) = (msg.text(), msg.from.as_ref()) else {
        debug!(chat_id = %msg.chat.id, "Ignoring message without text or sender");
        return Ok(());
    };
    debug!(user_id = %user.id, message_length = text.len(), "Received text message from user");

    let inbound = Inbound::text(profile_of(user), text);
    match router.handle(&inbound).await {
        Ok(reply) => deliver(&bot, msg.chat.id, None, reply).await,
        Err(e) => report_failure(&bot, msg.chat.id, user, text, &e, &router).await,
    }

    Ok(())
}

/// Handle inline keyboard presses
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    router: Arc<NavigationRouter>,
) -> Result<()> {
    let data = q.data.as_deref().unwrap_or("");
    debug!(user_id = %q.from.id, token = %data, "Received callback query from user");

    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or(ChatId(q.from.id.0 as i64));
    let message_id: Option<MessageId> = q.message.as_ref().map(|m| m.id());

    let inbound = Inbound::callback(profile_of(&q.from), data);
    match router.handle(&inbound).await {
        Ok(reply) => deliver(&bot, chat_id, message_id, reply).await,
        Err(e) => report_failure(&bot, chat_id, &q.from, data, &e, &router).await,
    }

    // Answer the callback query to remove the loading state
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        error!(user_id = %q.from.id, error = %e, "Failed to answer callback query");
    }

    Ok(())
}

/// Send the screen and notifications of a reply; delivery errors are logged, not retried
async fn deliver(bot: &Bot, chat_id: ChatId, message_id: Option<MessageId>, reply: Reply) {
    debug!(
        chat_id = %chat_id,
        reply = %serde_json::to_string(&reply).unwrap_or_default(),
        "Delivering reply"
    );

    if let Some(screen) = &reply.screen {
        if let Err(e) = send_screen(bot, chat_id, message_id, screen).await {
            error!(
                chat_id = %chat_id,
                screen = ?screen.kind,
                error = %e,
                "Failed to deliver screen"
            );
        }
    }

    for notification in &reply.notifications {
        if let Err(e) = send_notification(bot, notification).await {
            error!(
                user_id = notification.external_id,
                error = %e,
                "Failed to deliver notification"
            );
        }
    }
}

async fn report_failure(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    input: &str,
    e: &OrderBotError,
    router: &NavigationRouter,
) {
    error!(
        user_id = %user.id,
        token = %input,
        timestamp = %Utc::now(),
        error = %e,
        "Failed to handle update"
    );

    if e.is_user_visible() {
        let screen = Screen::new(
            ScreenKind::Error,
            t_lang("error-generic", Some(router.language())),
        );
        if let Err(e) = send_screen(bot, chat_id, None, &screen).await {
            error!(user_id = %user.id, error = %e, "Failed to send error message");
        }
    }
}
