use teloxide::{prelude::*, types::BotCommand};
use tracing::info;

use ttb_core::{
    domain::SessionKey, format, messaging::types::InlineKeyboard, store::Credential, Result,
};

use super::tg_err;
use crate::router::AppState;

pub(super) const NO_TOKEN_MESSAGE: &str = "There's no stored token. Send it to the chat first";

/// Registered command set, in the order `/help` lists them.
const COMMANDS: &[(&str, &str)] = &[
    ("start", "Start bot"),
    ("check", "Check timer for the stored token"),
    ("stop", "Stop current check"),
    ("edit", "How to edit a token?"),
    ("delete", "Delete my token from the storage"),
    ("help", "Show available commands"),
];

/// Telegram may send `/cmd@botname arg1 ...`.
fn parse_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub(super) async fn handle_command(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    key: &SessionKey,
    text: &str,
) -> Result<()> {
    let (cmd, _args) = parse_command(text);
    match cmd.as_str() {
        "start" => start(bot, msg, state, key).await,
        "check" => match require_token(bot, msg, state, key).await? {
            Some(credential) => check_reply(state, key, credential).await,
            None => Ok(()),
        },
        "stop" => match require_token(bot, msg, state, key).await? {
            Some(_) => stop(bot, msg, state, key).await,
            None => Ok(()),
        },
        "edit" => {
            reply(
                bot,
                msg,
                "Simply send me a new token, I will replace the old one with it",
            )
            .await
        }
        "delete" => match require_token(bot, msg, state, key).await? {
            Some(_) => delete(bot, msg, state, key).await,
            None => Ok(()),
        },
        "help" => help(bot, msg).await,
        "settings" => settings(bot, msg, state).await,
        _ => reply(bot, msg, "Unknown command, use /help").await,
    }
}

/// Fetch the stored credential, or answer with the fixed "no token"
/// reply.
async fn require_token(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    key: &SessionKey,
) -> Result<Option<Credential>> {
    match state.store.get(key).await {
        Some(credential) => Ok(Some(credential)),
        None => {
            reply(bot, msg, NO_TOKEN_MESSAGE).await?;
            Ok(None)
        }
    }
}

async fn reply(bot: &Bot, msg: &Message, text: impl Into<String>) -> Result<()> {
    bot.send_message(msg.chat.id, text.into())
        .await
        .map_err(tg_err)?;
    Ok(())
}

async fn start(bot: &Bot, msg: &Message, state: &AppState, key: &SessionKey) -> Result<()> {
    match state.store.get(key).await {
        Some(credential) => {
            reply(
                bot,
                msg,
                format!(
                    "I have a token stored for \"{}\".\n\
                     But you can send me another one to replace it.\n\
                     /check — to perform a timer check",
                    credential.display_name
                ),
            )
            .await
        }
        None => {
            reply(
                bot,
                msg,
                "Send me a token.\n\
                 You can find it here: https://track.toggl.com/profile#api-token",
            )
            .await
        }
    }
}

/// Shared `/check` body, also run for the `check` button. Queries the
/// timer once and reports through the messenger port; continuous
/// polling is only affected when the timer turns out to be stopped.
pub(super) async fn check_reply(
    state: &AppState,
    key: &SessionKey,
    credential: Credential,
) -> Result<()> {
    let chat_id = key.chat_id()?;
    match state.tracker.fetch_current_timer(&credential.token).await {
        None => {
            state.watcher.stop_polling(key).await?;
            state
                .messenger
                .send_with_keyboard(chat_id, "Timer is not started", InlineKeyboard::check_again())
                .await?;
        }
        Some(timer) => {
            state
                .store
                .update_polling(
                    key,
                    &credential.token,
                    credential.polling,
                    Some(timer.elapsed_seconds),
                )
                .await?;
            let updated = Credential {
                last_duration: timer.elapsed_seconds,
                ..credential
            };
            let keyboard = if updated.polling {
                InlineKeyboard::stop_checking()
            } else {
                InlineKeyboard::start_checking()
            };
            state
                .messenger
                .send_with_keyboard(chat_id, &format::timer_message(&updated), keyboard)
                .await?;
        }
    }
    Ok(())
}

async fn stop(bot: &Bot, msg: &Message, state: &AppState, key: &SessionKey) -> Result<()> {
    if state.watcher.stop_polling(key).await? {
        reply(bot, msg, "Continuous checking was stopped").await
    } else {
        reply(bot, msg, "Continuous checking is not active!").await
    }
}

async fn delete(bot: &Bot, msg: &Message, state: &AppState, key: &SessionKey) -> Result<()> {
    state.watcher.delete_credential(key).await?;
    reply(bot, msg, "Token was deleted").await
}

async fn help(bot: &Bot, msg: &Message) -> Result<()> {
    let mut text = String::from("Here are commands I understand:\n");
    for (name, description) in COMMANDS {
        text.push_str(&format!("/{name} - {description}\n"));
    }
    reply(bot, msg, text).await
}

/// Admin-only: re-register the command list with Telegram.
async fn settings(bot: &Bot, msg: &Message, state: &AppState) -> Result<()> {
    let username = msg
        .from()
        .and_then(|u| u.username.clone())
        .unwrap_or_default();
    let is_admin = state
        .cfg
        .admin_username
        .as_deref()
        .is_some_and(|admin| admin == username);
    if !is_admin {
        return reply(bot, msg, "You are not admin!").await;
    }

    let commands: Vec<BotCommand> = COMMANDS
        .iter()
        .map(|(name, description)| BotCommand::new(name.to_string(), description.to_string()))
        .collect();
    bot.set_my_commands(commands).await.map_err(tg_err)?;
    info!("command list re-registered by @{username}");
    reply(bot, msg, "Ok").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use ttb_core::config::Config;
    use ttb_core::domain::{ChatId, MessageId, MessageRef, UserId};
    use ttb_core::messaging::port::MessagingPort;
    use ttb_core::store::CredentialStore;
    use ttb_core::tracker::{Profile, RunningTimer, TimeTrackerPort};
    use ttb_core::watcher::TimerWatcher;

    struct FakeTracker {
        timer: Option<RunningTimer>,
    }

    #[async_trait]
    impl TimeTrackerPort for FakeTracker {
        async fn fetch_profile(&self, _token: &str) -> Option<Profile> {
            Some(Profile {
                full_name: "Test User".to_string(),
            })
        }

        async fn fetch_current_timer(&self, _token: &str) -> Option<RunningTimer> {
            self.timer
        }
    }

    #[derive(Default)]
    struct FakeMessenger {
        sends: Mutex<Vec<(ChatId, String, InlineKeyboard)>>,
    }

    impl FakeMessenger {
        fn sends(&self) -> Vec<(ChatId, String, InlineKeyboard)> {
            self.sends.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        async fn send_with_keyboard(
            &self,
            chat_id: ChatId,
            text: &str,
            keyboard: InlineKeyboard,
        ) -> ttb_core::Result<MessageRef> {
            self.sends
                .lock()
                .unwrap()
                .push((chat_id, text.to_string(), keyboard));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }
    }

    struct Fixture {
        state: AppState,
        store: Arc<CredentialStore>,
        messenger: Arc<FakeMessenger>,
    }

    fn fixture(name: &str, timer: Option<RunningTimer>) -> Fixture {
        let cfg = Arc::new(Config {
            bot_token: "x".to_string(),
            check_interval: Duration::from_secs(60),
            admin_username: None,
            debug: false,
            database_path: "/tmp/unused.json".into(),
        });
        let path = std::env::temp_dir().join(format!(
            "ttb-commands-{}-{name}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let store = Arc::new(CredentialStore::open(path).unwrap());
        let tracker: Arc<dyn TimeTrackerPort> = Arc::new(FakeTracker { timer });
        let messenger = Arc::new(FakeMessenger::default());
        let port: Arc<dyn MessagingPort> = messenger.clone();
        let watcher = TimerWatcher::new(cfg.clone(), store.clone(), tracker.clone(), port.clone());
        let state = AppState {
            cfg,
            store: store.clone(),
            tracker,
            watcher,
            messenger: port,
        };
        Fixture {
            state,
            store,
            messenger,
        }
    }

    fn stored(token: &str, polling: bool) -> Credential {
        Credential {
            token: token.to_string(),
            display_name: "Test User".to_string(),
            polling,
            last_duration: 0,
        }
    }

    #[tokio::test]
    async fn check_with_running_timer_offers_start_checking() {
        let f = fixture("running", Some(RunningTimer { elapsed_seconds: 300 }));
        let key = SessionKey::new(ChatId(1), UserId(1));
        f.store.set(&key, stored("a", false)).await.unwrap();

        let credential = f.store.get(&key).await.unwrap();
        check_reply(&f.state, &key, credential).await.unwrap();

        let sends = f.messenger.sends();
        assert_eq!(
            sends,
            vec![(
                ChatId(1),
                "Timer was started 5m ago".to_string(),
                InlineKeyboard::start_checking(),
            )]
        );
        let after = f.store.get(&key).await.unwrap();
        assert_eq!(after.last_duration, 300);
        assert!(!after.polling);
    }

    #[tokio::test]
    async fn check_while_polling_keeps_the_stop_keyboard() {
        let f = fixture("polling", Some(RunningTimer { elapsed_seconds: 60 }));
        let key = SessionKey::new(ChatId(2), UserId(2));
        f.store.set(&key, stored("a", true)).await.unwrap();

        let credential = f.store.get(&key).await.unwrap();
        check_reply(&f.state, &key, credential).await.unwrap();

        let sends = f.messenger.sends();
        assert_eq!(
            sends,
            vec![(
                ChatId(2),
                "Timer was started 1m ago\nContinuous checking is active".to_string(),
                InlineKeyboard::stop_checking(),
            )]
        );
        assert!(f.store.get(&key).await.unwrap().polling);
    }

    #[tokio::test]
    async fn check_with_stopped_timer_clears_polling() {
        let f = fixture("stopped", None);
        let key = SessionKey::new(ChatId(3), UserId(3));
        f.store.set(&key, stored("a", true)).await.unwrap();

        let credential = f.store.get(&key).await.unwrap();
        check_reply(&f.state, &key, credential).await.unwrap();

        let sends = f.messenger.sends();
        assert_eq!(
            sends,
            vec![(
                ChatId(3),
                "Timer is not started".to_string(),
                InlineKeyboard::check_again(),
            )]
        );
        assert!(!f.store.get(&key).await.unwrap().polling);
    }

    #[test]
    fn parse_command_strips_slash_and_bot_mention() {
        assert_eq!(parse_command("/check"), ("check".to_string(), String::new()));
        assert_eq!(
            parse_command("/check@togglwatchbot"),
            ("check".to_string(), String::new())
        );
        assert_eq!(
            parse_command("/Check  now please"),
            ("check".to_string(), "now please".to_string())
        );
    }

    #[test]
    fn help_text_lists_every_registered_command() {
        for (name, _) in COMMANDS {
            assert!(
                !name.starts_with('/'),
                "command names are registered without a slash"
            );
        }
        assert_eq!(COMMANDS.len(), 6);
    }
}
