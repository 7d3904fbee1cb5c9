/// Callback data for the bot's three inline actions.
pub const ACTION_CHECK: &str = "check";
pub const ACTION_START_CHECKING: &str = "start_checking";
pub const ACTION_STOP_CHECKING: &str = "stop_checking";

/// Inline keyboard, one button per row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    fn single(label: &str, callback_data: &str) -> Self {
        Self {
            buttons: vec![InlineButton {
                label: label.to_string(),
                callback_data: callback_data.to_string(),
            }],
        }
    }

    /// Offered after a stop was detected or reported.
    pub fn check_again() -> Self {
        Self::single("Check again", ACTION_CHECK)
    }

    /// Offered right after a token is saved.
    pub fn check_now() -> Self {
        Self::single("Check timer now", ACTION_CHECK)
    }

    pub fn start_checking() -> Self {
        Self::single("Start checking continuously", ACTION_START_CHECKING)
    }

    pub fn stop_checking() -> Self {
        Self::single("Stop", ACTION_STOP_CHECKING)
    }
}
