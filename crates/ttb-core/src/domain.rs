use crate::{errors::Error, Result};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Per-chat session identifier, `<chatId>:<userId>`.
///
/// Only private chats get one, so the chat half is always the user's
/// own chat and can be used to address notifications.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionKey(pub String);

impl SessionKey {
    pub fn new(chat_id: ChatId, user_id: UserId) -> Self {
        Self(format!("{}:{}", chat_id.0, user_id.0))
    }

    /// The chat half of the key.
    pub fn chat_id(&self) -> Result<ChatId> {
        let raw = self.0.split(':').next().unwrap_or_default();
        raw.parse::<i64>()
            .map(ChatId)
            .map_err(|_| Error::External(format!("malformed session key: {}", self.0)))
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
