//! Per-credential polling: scheduling, cancellation, restart recovery.
//!
//! One `TimerWatcher` owns every pending delayed check, keyed by
//! `(session, token)`. A pair is either idle (no entry) or pending
//! (exactly one entry); the entry is transient bookkeeping, removed
//! when the check fires and re-created only if the check decides to
//! keep polling.

use std::{collections::HashMap, sync::Arc};

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    config::Config,
    domain::SessionKey,
    messaging::{port::MessagingPort, types::InlineKeyboard},
    store::{Credential, CredentialStore},
    tracker::TimeTrackerPort,
    Result,
};

const TIMER_STOPPED_MESSAGE: &str = "Timer was stopped!";

type PollKey = (SessionKey, String);

struct JobEntry {
    id: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct JobTable {
    next_id: u64,
    entries: HashMap<PollKey, JobEntry>,
}

/// Application service tying the credential store, the time tracker and
/// the chat transport together.
#[derive(Clone)]
pub struct TimerWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    cfg: Arc<Config>,
    store: Arc<CredentialStore>,
    tracker: Arc<dyn TimeTrackerPort>,
    messenger: Arc<dyn MessagingPort>,
    jobs: tokio::sync::Mutex<JobTable>,
}

impl TimerWatcher {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<CredentialStore>,
        tracker: Arc<dyn TimeTrackerPort>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                cfg,
                store,
                tracker,
                messenger,
                jobs: tokio::sync::Mutex::new(JobTable::default()),
            }),
        }
    }

    /// Arm the next delayed check for `(key, token)`.
    ///
    /// Idempotent: a pair that is already pending keeps its existing
    /// entry, so two calls without an intervening fire or cancel never
    /// produce duplicate timers.
    // Boxed rather than `async fn`: `schedule` spawns a task that runs
    // `run_check`, which calls `schedule` again, and that recursion
    // defeats the compiler's `Send` inference for the opaque future.
    pub fn schedule<'a>(
        &'a self,
        key: &'a SessionKey,
        token: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(self.schedule_inner(key, token))
    }

    async fn schedule_inner(&self, key: &SessionKey, token: &str) {
        let mut jobs = self.inner.jobs.lock().await;
        let poll_key = (key.clone(), token.to_string());
        if jobs.entries.contains_key(&poll_key) {
            debug!(session = %key, "check already pending");
            return;
        }

        jobs.next_id += 1;
        let id = jobs.next_id;
        let cancel = CancellationToken::new();

        let watcher = self.clone();
        let task_key = key.clone();
        let task_token = token.to_string();
        let task_cancel = cancel.clone();
        let delay = self.inner.cfg.check_interval;
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => return,
                _ = sleep(delay) => {}
            }
            // The bookkeeping entry goes away before the check runs, so
            // the check can re-arm by calling `schedule` again.
            if !watcher.take_entry(&task_key, &task_token, id).await {
                return;
            }
            if let Err(e) = watcher.run_check(&task_key, &task_token).await {
                error!(session = %task_key, "scheduled check failed: {e}");
            }
        });

        jobs.entries.insert(poll_key, JobEntry { id, cancel, handle });
        debug!(session = %key, delay_secs = delay.as_secs(), "check scheduled");
    }

    /// Drop the pending check for `(key, token)`, if any. A cancelled
    /// task never runs its body. Returns whether an entry existed.
    pub async fn cancel(&self, key: &SessionKey, token: &str) -> bool {
        let mut jobs = self.inner.jobs.lock().await;
        let Some(entry) = jobs.entries.remove(&(key.clone(), token.to_string())) else {
            return false;
        };
        entry.cancel.cancel();
        entry.handle.abort();
        debug!(session = %key, "pending check cancelled");
        true
    }

    /// Cancel every pending check without running its body. The
    /// persisted polling flags stay true on disk so the next startup
    /// resumes them.
    pub async fn shutdown(&self) {
        let mut jobs = self.inner.jobs.lock().await;
        let count = jobs.entries.len();
        for (_, entry) in jobs.entries.drain() {
            entry.cancel.cancel();
            entry.handle.abort();
        }
        if count > 0 {
            info!("cancelled {count} pending checks");
        }
    }

    /// Replay sessions the previous process left mid-poll. Each gets
    /// one immediate check: either the timer still runs and polling
    /// resumes, or the stop is reported right away instead of a full
    /// interval later.
    pub async fn recover(&self) -> Result<usize> {
        let pairs = self.inner.store.polling_credentials().await;
        for (key, token) in &pairs {
            info!(session = %key, "recovering polling session");
            if let Err(e) = self.run_check(key, token).await {
                error!(session = %key, "recovery check failed: {e}");
            }
        }
        Ok(pairs.len())
    }

    /// One invocation of the timer-check procedure for a continuous
    /// poll. "Timer not running" is a normal terminal outcome here,
    /// never an error.
    pub async fn run_check(&self, key: &SessionKey, token: &str) -> Result<()> {
        let Some(credential) = self.inner.store.get(key).await else {
            debug!(session = %key, "stale check: no credential");
            return Ok(());
        };
        if credential.token != token || !credential.polling {
            debug!(session = %key, "stale check: credential changed or polling off");
            return Ok(());
        }

        match self.inner.tracker.fetch_current_timer(token).await {
            Some(timer) => {
                self.inner
                    .store
                    .update_polling(key, token, true, Some(timer.elapsed_seconds))
                    .await?;
                self.schedule(key, token).await;
            }
            None => {
                self.inner.store.update_polling(key, token, false, None).await?;
                let chat_id = key.chat_id()?;
                self.inner
                    .messenger
                    .send_with_keyboard(chat_id, TIMER_STOPPED_MESSAGE, InlineKeyboard::check_again())
                    .await?;
                info!(session = %key, "timer stopped, polling ended");
            }
        }
        Ok(())
    }

    /// Store a freshly validated credential, displacing any previous
    /// one. The old token's pending check is cancelled first so no late
    /// fire can act on it.
    pub async fn store_credential(&self, key: &SessionKey, credential: Credential) -> Result<()> {
        if let Some(previous) = self.inner.store.get(key).await {
            self.cancel(key, &previous.token).await;
        }
        self.inner.store.set(key, credential).await?;
        Ok(())
    }

    /// Remove the session's credential and its pending check.
    pub async fn delete_credential(&self, key: &SessionKey) -> Result<Option<Credential>> {
        if let Some(previous) = self.inner.store.get(key).await {
            self.cancel(key, &previous.token).await;
        }
        self.inner.store.clear(key).await
    }

    /// Turn continuous checking on and arm the first delayed check.
    pub async fn begin_polling(
        &self,
        key: &SessionKey,
        token: &str,
        elapsed_seconds: i64,
    ) -> Result<()> {
        self.inner
            .store
            .update_polling(key, token, true, Some(elapsed_seconds))
            .await?;
        self.schedule(key, token).await;
        Ok(())
    }

    /// Turn continuous checking off. Returns false when it was not
    /// active.
    pub async fn stop_polling(&self, key: &SessionKey) -> Result<bool> {
        let Some(credential) = self.inner.store.get(key).await else {
            return Ok(false);
        };
        if !credential.polling {
            return Ok(false);
        }
        self.cancel(key, &credential.token).await;
        self.inner
            .store
            .update_polling(key, &credential.token, false, None)
            .await?;
        Ok(true)
    }

    /// Remove the pair's entry, but only if it still belongs to job
    /// `id`: a cancel + reschedule between the sleep completing and
    /// this call must not clobber the newer entry.
    async fn take_entry(&self, key: &SessionKey, token: &str, id: u64) -> bool {
        let mut jobs = self.inner.jobs.lock().await;
        let poll_key = (key.clone(), token.to_string());
        match jobs.entries.get(&poll_key) {
            Some(entry) if entry.id == id && !entry.cancel.is_cancelled() => {
                jobs.entries.remove(&poll_key);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    async fn pending_count(&self) -> usize {
        self.inner.jobs.lock().await.entries.len()
    }
}
