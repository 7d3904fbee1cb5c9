//! Toggl Track API v9 adapter.
//!
//! Implements the core `TimeTrackerPort` over the two read endpoints the
//! bot needs: `me` (token validation) and `me/time_entries/current`.
//! Transport failures, auth failures and "no timer running" all collapse
//! into `None`, the shape the core's port expects.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use ttb_core::tracker::{Profile, RunningTimer, TimeTrackerPort};

const BASE_URL: &str = "https://api.track.toggl.com/api/v9/";

/// Toggl authenticates API tokens as HTTP basic auth with this fixed
/// password.
const TOKEN_PASSWORD: &str = "api_token";

pub struct TogglClient {
    http: reqwest::Client,
    base_url: String,
}

impl TogglClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, token: &str, path: &str) -> Option<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = match self
            .http
            .get(&url)
            .basic_auth(token, Some(TOKEN_PASSWORD))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                debug!("toggl request to {path} failed: {e}");
                return None;
            }
        };

        if !resp.status().is_success() {
            debug!("toggl request to {path} returned {}", resp.status());
            return None;
        }

        match resp.json::<T>().await {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("toggl response from {path} did not parse: {e}");
                None
            }
        }
    }
}

impl Default for TogglClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    fullname: String,
}

#[derive(Debug, Deserialize)]
struct TimeEntry {
    duration: i64,
}

/// A running entry's `duration` is the negative unix start timestamp;
/// completed entries report positive elapsed seconds.
fn elapsed_seconds(duration: i64) -> i64 {
    let elapsed = if duration < 0 {
        Utc::now().timestamp() + duration
    } else {
        duration
    };
    elapsed.max(0)
}

#[async_trait]
impl TimeTrackerPort for TogglClient {
    async fn fetch_profile(&self, token: &str) -> Option<Profile> {
        let me: MeResponse = self.fetch(token, "me").await?;
        Some(Profile {
            full_name: me.fullname,
        })
    }

    async fn fetch_current_timer(&self, token: &str) -> Option<RunningTimer> {
        // The endpoint returns JSON `null` when no timer is running.
        let entry: Option<TimeEntry> = self.fetch(token, "me/time_entries/current").await?;
        let entry = entry?;
        Some(RunningTimer {
            elapsed_seconds: elapsed_seconds(entry.duration),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_duration_is_a_start_timestamp() {
        let started_at = Utc::now().timestamp() - 300;
        let elapsed = elapsed_seconds(-started_at);
        assert!((299..=301).contains(&elapsed), "got {elapsed}");
    }

    #[test]
    fn positive_duration_passes_through() {
        assert_eq!(elapsed_seconds(45), 45);
        assert_eq!(elapsed_seconds(0), 0);
    }
}
