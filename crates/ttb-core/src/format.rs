use crate::store::Credential;

/// Render seconds the way the bot talks about durations: `1h 2m 3s`,
/// omitting zero components.
pub fn human_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 {
        parts.push(format!("{secs}s"));
    }
    if parts.is_empty() {
        return "0s".to_string();
    }
    parts.join(" ")
}

/// Message shown for a running timer (`/check` and the `start_checking`
/// button).
pub fn timer_message(credential: &Credential) -> String {
    let mut msg = format!(
        "Timer was started {} ago",
        human_duration(credential.last_duration)
    );
    if credential.polling {
        msg.push_str("\nContinuous checking is active");
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(polling: bool, last_duration: i64) -> Credential {
        Credential {
            token: "a".repeat(32),
            display_name: "Test User".to_string(),
            polling,
            last_duration,
        }
    }

    #[test]
    fn human_duration_composes_components() {
        assert_eq!(human_duration(0), "0s");
        assert_eq!(human_duration(45), "45s");
        assert_eq!(human_duration(300), "5m");
        assert_eq!(human_duration(3600), "1h");
        assert_eq!(human_duration(3661), "1h 1m 1s");
        assert_eq!(human_duration(-5), "0s");
    }

    #[test]
    fn timer_message_for_five_minute_timer() {
        assert_eq!(
            timer_message(&credential(false, 300)),
            "Timer was started 5m ago"
        );
    }

    #[test]
    fn timer_message_mentions_active_checking() {
        assert_eq!(
            timer_message(&credential(true, 60)),
            "Timer was started 1m ago\nContinuous checking is active"
        );
    }
}
