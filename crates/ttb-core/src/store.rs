use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{domain::SessionKey, Result};

/// One stored API token plus the metadata derived from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    /// Name returned by the profile lookup at validation time.
    pub display_name: String,
    /// True while continuous checking is active for this token.
    #[serde(default)]
    pub polling: bool,
    /// Elapsed seconds reported by the timer at the last successful
    /// check. Display only.
    #[serde(default)]
    pub last_duration: i64,
}

/// Per-chat persisted state. Holds at most one credential.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Session {
    pub credential: Option<Credential>,
}

/// File-backed credential store, keyed by session (`<chatId>:<userId>`).
///
/// Every mutation is flushed to disk before the call returns, so the
/// polling flags observed at the next restart are accurate as of the
/// last completed check.
pub struct CredentialStore {
    path: PathBuf,
    sessions: Mutex<HashMap<SessionKey, Session>>,
}

impl CredentialStore {
    /// Open a store, loading whatever the previous process left behind.
    /// A missing or empty file loads as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let sessions = load_sessions(&path)?;
        Ok(Self {
            path,
            sessions: Mutex::new(sessions),
        })
    }

    pub async fn get(&self, key: &SessionKey) -> Option<Credential> {
        let sessions = self.sessions.lock().await;
        sessions.get(key).and_then(|s| s.credential.clone())
    }

    /// Replace the session's credential, returning the one it displaced.
    ///
    /// The caller is responsible for cancelling any pending check tied
    /// to the returned credential's token (see
    /// [`TimerWatcher::store_credential`](crate::watcher::TimerWatcher::store_credential)).
    pub async fn set(
        &self,
        key: &SessionKey,
        credential: Credential,
    ) -> Result<Option<Credential>> {
        let mut sessions = self.sessions.lock().await;
        let previous = sessions
            .entry(key.clone())
            .or_default()
            .credential
            .replace(credential);
        self.persist(&sessions)?;
        Ok(previous)
    }

    /// Remove the session's credential, returning it.
    pub async fn clear(&self, key: &SessionKey) -> Result<Option<Credential>> {
        let mut sessions = self.sessions.lock().await;
        let removed = sessions.get_mut(key).and_then(|s| s.credential.take());
        if removed.is_some() {
            self.persist(&sessions)?;
        }
        Ok(removed)
    }

    /// Mutate the polling flag in place, only if the stored token still
    /// matches `token`. Guards against a check firing after the
    /// credential it was scheduled for was replaced. Returns whether
    /// the update applied.
    pub async fn update_polling(
        &self,
        key: &SessionKey,
        token: &str,
        polling: bool,
        last_duration: Option<i64>,
    ) -> Result<bool> {
        let mut sessions = self.sessions.lock().await;
        let Some(credential) = sessions.get_mut(key).and_then(|s| s.credential.as_mut()) else {
            return Ok(false);
        };
        if credential.token != token {
            return Ok(false);
        }
        credential.polling = polling;
        if let Some(duration) = last_duration {
            credential.last_duration = duration;
        }
        self.persist(&sessions)?;
        Ok(true)
    }

    /// Sessions whose credential was left with `polling == true`.
    /// Replayed once at startup recovery.
    pub async fn polling_credentials(&self) -> Vec<(SessionKey, String)> {
        let sessions = self.sessions.lock().await;
        sessions
            .iter()
            .filter_map(|(key, session)| {
                let credential = session.credential.as_ref()?;
                credential
                    .polling
                    .then(|| (key.clone(), credential.token.clone()))
            })
            .collect()
    }

    fn persist(&self, sessions: &HashMap<SessionKey, Session>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let txt = serde_json::to_string_pretty(sessions)?;
        fs::write(&self.path, txt)?;
        Ok(())
    }
}

fn load_sessions(path: &Path) -> Result<HashMap<SessionKey, Session>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let txt = fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(HashMap::new());
    }
    Ok(serde_json::from_str(&txt)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatId, UserId};

    fn temp_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "ttb-store-{}-{name}.json",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        path
    }

    fn key(chat: i64) -> SessionKey {
        SessionKey::new(ChatId(chat), UserId(chat))
    }

    fn credential(token: &str, polling: bool) -> Credential {
        Credential {
            token: token.to_string(),
            display_name: "Test User".to_string(),
            polling,
            last_duration: 0,
        }
    }

    #[tokio::test]
    async fn set_replaces_the_single_slot() {
        let store = CredentialStore::open(temp_path("replace")).unwrap();
        let key = key(1);

        assert!(store.set(&key, credential("a", false)).await.unwrap().is_none());
        let previous = store.set(&key, credential("b", false)).await.unwrap();

        assert_eq!(previous.unwrap().token, "a");
        assert_eq!(store.get(&key).await.unwrap().token, "b");
    }

    #[tokio::test]
    async fn update_polling_is_guarded_by_token() {
        let store = CredentialStore::open(temp_path("guard")).unwrap();
        let key = key(2);
        store.set(&key, credential("a", false)).await.unwrap();

        assert!(!store.update_polling(&key, "b", true, Some(99)).await.unwrap());
        let stored = store.get(&key).await.unwrap();
        assert!(!stored.polling);
        assert_eq!(stored.last_duration, 0);

        assert!(store.update_polling(&key, "a", true, Some(99)).await.unwrap());
        let stored = store.get(&key).await.unwrap();
        assert!(stored.polling);
        assert_eq!(stored.last_duration, 99);
    }

    #[tokio::test]
    async fn polling_state_round_trips_through_the_file() {
        let path = temp_path("roundtrip");
        {
            let store = CredentialStore::open(path.clone()).unwrap();
            let mut cred = credential("a", true);
            cred.last_duration = 120;
            store.set(&key(3), cred).await.unwrap();
        }

        let reopened = CredentialStore::open(path).unwrap();
        let stored = reopened.get(&key(3)).await.unwrap();
        assert!(stored.polling);
        assert_eq!(stored.last_duration, 120);
        assert_eq!(stored.display_name, "Test User");
    }

    #[tokio::test]
    async fn polling_credentials_enumerates_only_active_sessions() {
        let store = CredentialStore::open(temp_path("enumerate")).unwrap();
        store.set(&key(4), credential("active", true)).await.unwrap();
        store.set(&key(5), credential("idle", false)).await.unwrap();

        let pairs = store.polling_credentials().await;
        assert_eq!(pairs, vec![(key(4), "active".to_string())]);
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let store = CredentialStore::open(temp_path("missing")).unwrap();
        assert!(store.get(&key(6)).await.is_none());
        assert!(store.polling_credentials().await.is_empty());
    }

    #[tokio::test]
    async fn clear_removes_the_credential() {
        let store = CredentialStore::open(temp_path("clear")).unwrap();
        let key = key(7);
        store.set(&key, credential("a", true)).await.unwrap();

        let removed = store.clear(&key).await.unwrap();
        assert_eq!(removed.unwrap().token, "a");
        assert!(store.get(&key).await.is_none());
        assert!(store.clear(&key).await.unwrap().is_none());
    }
}
