use std::sync::OnceLock;

use regex::Regex;
use teloxide::{prelude::*, types::ChatAction};
use tracing::info;

use ttb_core::{
    domain::SessionKey, messaging::types::InlineKeyboard, store::Credential, Result,
};

use super::tg_err;
use crate::router::AppState;

static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

/// Toggl API tokens are 32 lowercase hex characters.
pub(super) fn looks_like_token(text: &str) -> bool {
    TOKEN_RE
        .get_or_init(|| Regex::new(r"^[0-9a-f]{32}$").expect("valid regex"))
        .is_match(text)
}

pub(super) async fn handle_token_submission(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    key: &SessionKey,
    token: &str,
) -> Result<()> {
    if let Some(stored) = state.store.get(key).await {
        if stored.token == token {
            bot.send_message(msg.chat.id, "The same token is already stored")
                .reply_to_message_id(msg.id)
                .await
                .map_err(tg_err)?;
            return Ok(());
        }
    }

    // Validating takes a round trip; show the typing indicator while
    // the user waits. Failure here is inconsequential.
    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

    let Some(profile) = state.tracker.fetch_profile(token).await else {
        bot.send_message(msg.chat.id, "Seems like incorrect token...")
            .reply_to_message_id(msg.id)
            .await
            .map_err(tg_err)?;
        return Ok(());
    };

    let credential = Credential {
        token: token.to_string(),
        display_name: profile.full_name.clone(),
        polling: false,
        last_duration: 0,
    };
    state.watcher.store_credential(key, credential).await?;
    info!(session = %key, "stored token for {:?}", profile.full_name);

    state
        .messenger
        .send_with_keyboard(
            key.chat_id()?,
            &format!("Valid token for \"{}\" is saved", profile.full_name),
            InlineKeyboard::check_now(),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_lowercase_hex_tokens() {
        assert!(looks_like_token("0123456789abcdef0123456789abcdef"));
    }

    #[test]
    fn rejects_near_misses() {
        assert!(!looks_like_token("0123456789ABCDEF0123456789ABCDEF"));
        assert!(!looks_like_token("0123456789abcdef0123456789abcde"));
        assert!(!looks_like_token("0123456789abcdef0123456789abcdef0"));
        assert!(!looks_like_token("not a token"));
    }
}
