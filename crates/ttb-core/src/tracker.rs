use async_trait::async_trait;

/// Profile of the token's owner, fetched once at validation time.
#[derive(Clone, Debug)]
pub struct Profile {
    pub full_name: String,
}

/// A currently running time entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunningTimer {
    /// Self-reported elapsed seconds at the time of the fetch.
    pub elapsed_seconds: i64,
}

/// External time-tracking service, authenticated per call by an API
/// token.
///
/// Both reads collapse "call failed" and "nothing there" into `None`:
/// a rejected token is not a fatal error, and a failed poll reads the
/// same as a stopped timer.
#[async_trait]
pub trait TimeTrackerPort: Send + Sync {
    async fn fetch_profile(&self, token: &str) -> Option<Profile>;

    async fn fetch_current_timer(&self, token: &str) -> Option<RunningTimer>;
}
