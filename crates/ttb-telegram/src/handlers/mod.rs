//! Telegram update handlers.
//!
//! Each handler validates the chat type, resolves the session key and
//! runs its body against the app context; failures are caught centrally
//! and answered with a generic apology (naming the admin when one is
//! configured).

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{debug, error};

use ttb_core::domain::{ChatId, SessionKey, UserId};

use crate::router::AppState;

mod callback;
mod commands;
mod token;

pub use callback::handle_callback;

pub(crate) fn tg_err(e: teloxide::RequestError) -> ttb_core::Error {
    ttb_core::Error::External(format!("telegram error: {e}"))
}

fn session_key(msg: &Message) -> Option<SessionKey> {
    let user = msg.from()?;
    Some(SessionKey::new(
        ChatId(msg.chat.id.0),
        UserId(user.id.0 as i64),
    ))
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if !msg.chat.is_private() {
        bot.send_message(msg.chat.id, "Incorrect chat type").await?;
        return Ok(());
    }
    let Some(key) = session_key(&msg) else {
        return Ok(());
    };

    let text = msg.text().unwrap_or_default();
    debug!(session = %key, "processing message: {:?}", truncate(text, 30));

    let result = if text.starts_with('/') {
        commands::handle_command(&bot, &msg, &state, &key, text).await
    } else if token::looks_like_token(text) {
        token::handle_token_submission(&bot, &msg, &state, &key, text).await
    } else {
        bot.send_message(msg.chat.id, "Unknown command, use /help")
            .await
            .map(drop)
            .map_err(tg_err)
    };

    catch(&bot, &state, msg.chat.id, None, result).await
}

pub async fn handle_edited_message(
    bot: Bot,
    msg: Message,
    _state: Arc<AppState>,
) -> ResponseResult<()> {
    let reply = if msg.chat.is_private() {
        "Editing messages is not supported"
    } else {
        "Incorrect chat type"
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

/// Central handler-failure catch: apologize in chat, log, and in debug
/// mode re-raise so the failure is loud during development.
pub(crate) async fn catch(
    bot: &Bot,
    state: &AppState,
    chat_id: teloxide::types::ChatId,
    callback_id: Option<&str>,
    result: ttb_core::Result<()>,
) -> ResponseResult<()> {
    let Err(err) = result else {
        return Ok(());
    };

    error!("handler failed: {err}");

    let mut text = String::from("Something went wrong...\nTry again later");
    if let Some(admin) = &state.cfg.admin_username {
        text.push_str(&format!("\nOr let admin know about it: @{admin}"));
    }
    let delivered = match callback_id {
        Some(id) => bot
            .answer_callback_query(id.to_string())
            .text(text)
            .show_alert(true)
            .await
            .map(drop),
        None => bot.send_message(chat_id, text).await.map(drop),
    };
    if let Err(e) = delivered {
        error!("failed to deliver failure notice: {e}");
    }

    if state.cfg.debug {
        panic!("handler error (debug): {err}");
    }
    Ok(())
}
