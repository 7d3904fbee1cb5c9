use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::InlineKeyboard,
    Result,
};

/// The slice of the chat transport the core needs for notifications.
/// Every notification carries an inline keyboard offering the next
/// action.
///
/// Telegram is the only implementation today; keeping it behind a port
/// lets the watcher run against a fake in tests.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_with_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;
}
