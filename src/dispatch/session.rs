//! Per-request session handles and the store they are loaded from

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Session key holding the authenticated user identifier
pub const SESSION_USER_KEY: &str = "user";

const SESSION_ID_LEN: usize = 32;

/// Idle time after which the in-memory store forgets a session
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Saves between two sweeps of expired sessions
const SWEEP_INTERVAL: usize = 256;

/// Random alphanumeric token, used for session ids and CSRF tokens
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Key/value session state for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: String,
    values: HashMap<String, String>,
    is_new: bool,
    modified: bool,
}

impl Session {
    /// Fresh session with a random id; persisted only once modified
    pub fn new() -> Self {
        Self {
            id: random_token(SESSION_ID_LEN),
            values: HashMap::new(),
            is_new: true,
            modified: false,
        }
    }

    /// Existing session restored from a store
    pub const fn restore(id: String, values: HashMap<String, String>) -> Self {
        Self {
            id,
            values,
            is_new: false,
            modified: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn is_new(&self) -> bool {
        self.is_new
    }

    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
        self.modified = true;
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.modified = true;
        }
        removed
    }

    /// Drop every value. A cleared session is removed from the store.
    pub fn clear(&mut self) {
        if !self.values.is_empty() {
            self.values.clear();
            self.modified = true;
        }
    }

    pub const fn values(&self) -> &HashMap<String, String> {
        &self.values
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Session persistence supplied by the hosting environment
pub trait SessionStore: Send + Sync {
    fn load(&self, id: &str) -> Option<Session>;
    fn save(&self, session: &Session);
    fn remove(&self, id: &str);
}

#[derive(Debug)]
struct StoredSession {
    values: HashMap<String, String>,
    last_access: Instant,
}

/// In-process session store; sessions idle longer than the timeout expire
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: DashMap<String, StoredSession>,
    idle_timeout: Duration,
    saves: AtomicUsize,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
            saves: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Evict expired sessions, returning how many were dropped
    pub fn sweep(&self) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, stored| stored.last_access.elapsed() < self.idle_timeout);
        before.saturating_sub(self.sessions.len())
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, id: &str) -> Option<Session> {
        let values = {
            let mut stored = self.sessions.get_mut(id)?;
            if stored.last_access.elapsed() >= self.idle_timeout {
                None
            } else {
                stored.last_access = Instant::now();
                Some(stored.values.clone())
            }
        };
        match values {
            Some(values) => Some(Session::restore(id.to_string(), values)),
            None => {
                self.sessions.remove(id);
                None
            }
        }
    }

    fn save(&self, session: &Session) {
        self.sessions.insert(
            session.id().to_string(),
            StoredSession {
                values: session.values().clone(),
                last_access: Instant::now(),
            },
        );
        if self.saves.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.sweep();
        }
    }

    fn remove(&self, id: &str) {
        self.sessions.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_unmodified() {
        let session = Session::new();
        assert!(session.is_new());
        assert!(!session.is_modified());
        assert_eq!(session.id().len(), SESSION_ID_LEN);
        assert_ne!(session.id(), Session::new().id());
    }

    #[test]
    fn test_insert_and_remove_mark_modified() {
        let mut session = Session::restore("abc".into(), HashMap::new());
        assert!(session.remove("missing").is_none());
        assert!(!session.is_modified());

        session.insert(SESSION_USER_KEY, "alice");
        assert!(session.is_modified());
        assert_eq!(session.get(SESSION_USER_KEY), Some("alice"));
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemorySessionStore::new();
        let mut session = Session::new();
        session.insert("k", "v");
        store.save(&session);

        let loaded = store.load(session.id()).unwrap();
        assert!(!loaded.is_new());
        assert_eq!(loaded.get("k"), Some("v"));
        assert!(store.load("unknown").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear_marks_modified() {
        let mut session = Session::restore("abc".into(), HashMap::new());
        session.clear();
        assert!(!session.is_modified());

        session.insert("k", "v");
        let mut session = Session::restore("abc".into(), session.values().clone());
        session.clear();
        assert!(session.is_modified());
        assert!(session.values().is_empty());
    }

    #[test]
    fn test_idle_sessions_expire() {
        let store = MemorySessionStore::with_idle_timeout(Duration::ZERO);
        let mut session = Session::new();
        session.insert("k", "v");
        store.save(&session);
        assert!(store.load(session.id()).is_none());
        assert!(store.is_empty());

        store.save(&session);
        store.save(&Session::restore("other".into(), HashMap::new()));
        assert_eq!(store.sweep(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_active_sessions_survive_sweep() {
        let store = MemorySessionStore::new();
        let mut session = Session::new();
        session.insert("k", "v");
        store.save(&session);
        assert_eq!(store.sweep(), 0);
        assert!(store.load(session.id()).is_some());

        store.remove(session.id());
        assert!(store.load(session.id()).is_none());
        assert!(store.is_empty());
    }
}
