use std::sync::Arc;

use teloxide::prelude::*;
use tracing::debug;

use ttb_core::{
    domain::{ChatId, SessionKey, UserId},
    format,
    messaging::types::{
        InlineKeyboard, ACTION_CHECK, ACTION_START_CHECKING, ACTION_STOP_CHECKING,
    },
    store::Credential,
    Result,
};

use super::{catch, commands, tg_err};
use crate::router::AppState;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let cb_id = q.id.clone();
    let Some(message) = q.message.as_ref() else {
        // Message too old for Telegram to resend; nothing to act on.
        bot.answer_callback_query(cb_id).await?;
        return Ok(());
    };
    if !message.chat.is_private() {
        bot.answer_callback_query(cb_id)
            .text("Incorrect chat type")
            .await?;
        return Ok(());
    }

    let key = SessionKey::new(ChatId(message.chat.id.0), UserId(q.from.id.0 as i64));
    let action = q.data.clone().unwrap_or_default();
    debug!(session = %key, action = %action, "processing callback");

    let result = dispatch(&bot, &q, message, &state, &key, &action).await;
    catch(&bot, &state, message.chat.id, Some(&cb_id), result).await
}

async fn dispatch(
    bot: &Bot,
    q: &CallbackQuery,
    message: &Message,
    state: &AppState,
    key: &SessionKey,
    action: &str,
) -> Result<()> {
    if !matches!(
        action,
        ACTION_CHECK | ACTION_START_CHECKING | ACTION_STOP_CHECKING
    ) {
        strip_keyboard(bot, message).await?;
        answer_alert(bot, q, "Unknown action").await?;
        return Ok(());
    }

    let Some(credential) = state.store.get(key).await else {
        answer_alert(bot, q, commands::NO_TOKEN_MESSAGE).await?;
        return Ok(());
    };

    match action {
        ACTION_CHECK => action_check(bot, q, message, state, key, credential).await,
        ACTION_START_CHECKING => {
            action_start_checking(bot, q, message, state, key, credential).await
        }
        _ => action_stop_checking(bot, q, message, state, key).await,
    }
}

/// One-off check: acknowledge the tap, retire the button that fired and
/// answer with a fresh status message.
async fn action_check(
    bot: &Bot,
    q: &CallbackQuery,
    message: &Message,
    state: &AppState,
    key: &SessionKey,
    credential: Credential,
) -> Result<()> {
    answer(bot, q, "Checking...").await?;
    strip_keyboard(bot, message).await?;
    commands::check_reply(state, key, credential).await
}

async fn action_start_checking(
    bot: &Bot,
    q: &CallbackQuery,
    message: &Message,
    state: &AppState,
    key: &SessionKey,
    credential: Credential,
) -> Result<()> {
    if credential.polling {
        // A second tap on a stale keyboard; restore it and tell the
        // user checking is already running.
        edit_keyboard(bot, message, InlineKeyboard::stop_checking()).await?;
        answer_alert(
            bot,
            q,
            "Continuous checking is active!\nI will inform when the timer stops",
        )
        .await?;
        return Ok(());
    }

    match state.tracker.fetch_current_timer(&credential.token).await {
        None => {
            edit_text(
                bot,
                message,
                "Timer is already stopped",
                InlineKeyboard::check_again(),
            )
            .await?;
            answer(bot, q, "").await?;
        }
        Some(timer) => {
            state
                .watcher
                .begin_polling(key, &credential.token, timer.elapsed_seconds)
                .await?;
            let updated = Credential {
                polling: true,
                last_duration: timer.elapsed_seconds,
                ..credential
            };
            edit_text(
                bot,
                message,
                &format::timer_message(&updated),
                InlineKeyboard::stop_checking(),
            )
            .await?;
            answer(
                bot,
                q,
                &format!(
                    "I will check every {} and inform when the timer stops",
                    format::human_duration(state.cfg.check_interval.as_secs() as i64)
                ),
            )
            .await?;
        }
    }
    Ok(())
}

async fn action_stop_checking(
    bot: &Bot,
    q: &CallbackQuery,
    message: &Message,
    state: &AppState,
    key: &SessionKey,
) -> Result<()> {
    let text = if state.watcher.stop_polling(key).await? {
        "Continuous checking was stopped"
    } else {
        "Continuous checking is not active!"
    };
    edit_text(bot, message, text, InlineKeyboard::check_again()).await?;
    answer(bot, q, "").await
}

async fn answer(bot: &Bot, q: &CallbackQuery, text: &str) -> Result<()> {
    let mut req = bot.answer_callback_query(q.id.clone());
    if !text.is_empty() {
        req = req.text(text);
    }
    req.await.map(drop).map_err(tg_err)
}

async fn answer_alert(bot: &Bot, q: &CallbackQuery, text: &str) -> Result<()> {
    bot.answer_callback_query(q.id.clone())
        .text(text)
        .show_alert(true)
        .await
        .map(drop)
        .map_err(tg_err)
}

async fn edit_text(
    bot: &Bot,
    message: &Message,
    text: &str,
    keyboard: InlineKeyboard,
) -> Result<()> {
    bot.edit_message_text(message.chat.id, message.id, text)
        .reply_markup(crate::to_markup(keyboard))
        .await
        .map(drop)
        .map_err(tg_err)
}

async fn edit_keyboard(bot: &Bot, message: &Message, keyboard: InlineKeyboard) -> Result<()> {
    bot.edit_message_reply_markup(message.chat.id, message.id)
        .reply_markup(crate::to_markup(keyboard))
        .await
        .map(drop)
        .map_err(tg_err)
}

async fn strip_keyboard(bot: &Bot, message: &Message) -> Result<()> {
    bot.edit_message_reply_markup(message.chat.id, message.id)
        .await
        .map(drop)
        .map_err(tg_err)
}
