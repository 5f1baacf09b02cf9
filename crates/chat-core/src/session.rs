//! Session Store
//!
//! Per-conversation state cache with time-based expiry. Conversations are
//! keyed by a caller-supplied thread id; an unseen id gets a fresh state
//! seeded with the system prompt, and entries expire once their TTL elapses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Conversation;

/// Default entry lifetime: one hour.
pub const DEFAULT_TTL_SECS: i64 = 3600;

/// Default cap on concurrently cached conversations.
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

/// Caller-supplied conversation identifier, used as the cache key.
///
/// Opaque; no uniqueness is enforced beyond cache semantics.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Cached state of one conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationState {
    /// Ordered message history, system prompt first
    pub conversation: Conversation,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Expiry timestamp, refreshed by the store on every write
    pub expires_at: DateTime<Utc>,
}

impl ConversationState {
    /// Create a fresh state seeded with the fixed system prompt
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            conversation: Conversation::with_system_prompt(system_prompt),
            created_at: now,
            expires_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session store contract.
///
/// `get`/`put` must be safe under concurrent calls for different ids;
/// same-id serialization is the orchestrator's job (see [`TurnLocks`]).
pub trait SessionStore: Send + Sync {
    /// Look up a conversation; expired entries read as absent
    fn get(&self, id: &ThreadId) -> crate::Result<Option<ConversationState>>;

    /// Store a conversation, refreshing its expiry
    fn put(&self, id: &ThreadId, state: ConversationState) -> crate::Result<()>;
}

/// In-memory session store.
///
/// TTL policy: the expiry clock starts at creation and restarts on every
/// `put`, so a conversation stays alive while turns keep completing and
/// lapses `ttl` after the last one. Capacity policy: at `max_entries`, the
/// entry with the oldest expiry (equivalently, the least recently written,
/// and every live conversation is rewritten each turn) is evicted.
pub struct MemorySessionStore {
    entries: RwLock<HashMap<ThreadId, ConversationState>>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECS), DEFAULT_MAX_ENTRIES)
    }
}

impl MemorySessionStore {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// Number of live (possibly expired, not yet collected) entries
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_for_capacity(
        entries: &mut HashMap<ThreadId, ConversationState>,
        now: DateTime<Utc>,
        max_entries: usize,
    ) {
        entries.retain(|_, state| !state.is_expired(now));
        if entries.len() < max_entries {
            return;
        }
        if let Some(oldest) = entries
            .iter()
            .min_by_key(|(_, state)| state.expires_at)
            .map(|(id, _)| id.clone())
        {
            tracing::debug!(thread = %oldest, "evicting conversation at capacity");
            entries.remove(&oldest);
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, id: &ThreadId) -> crate::Result<Option<ConversationState>> {
        let now = Utc::now();
        {
            let entries = self.entries.read().unwrap();
            match entries.get(id) {
                Some(state) if !state.is_expired(now) => return Ok(Some(state.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired: collect it so the id reads as unseen from now on.
        let mut entries = self.entries.write().unwrap();
        if entries.get(id).is_some_and(|state| state.is_expired(now)) {
            entries.remove(id);
        }
        Ok(None)
    }

    fn put(&self, id: &ThreadId, mut state: ConversationState) -> crate::Result<()> {
        let now = Utc::now();
        state.expires_at = now + self.ttl;

        let mut entries = self.entries.write().unwrap();
        if !entries.contains_key(id) && entries.len() >= self.max_entries {
            Self::evict_for_capacity(&mut entries, now, self.max_entries);
        }
        entries.insert(id.clone(), state);
        Ok(())
    }
}

/// Keyed async locks serializing turns on the same thread id.
///
/// Concurrent requests for different ids proceed in parallel; requests for
/// the same id queue on its mutex for the whole get-modify-put cycle,
/// preventing lost updates. Guards are handed out as `Arc`s and the registry
/// holds only `Weak` references, so idle entries vanish on their own.
#[derive(Default)]
pub struct TurnLocks {
    locks: Mutex<HashMap<ThreadId, Weak<tokio::sync::Mutex<()>>>>,
}

impl TurnLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the mutex gating turns for `id`
    pub fn gate(&self, id: &ThreadId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.retain(|_, weak| weak.strong_count() > 0);
        if let Some(gate) = locks.get(id).and_then(Weak::upgrade) {
            return gate;
        }
        let gate = Arc::new(tokio::sync::Mutex::new(()));
        locks.insert(id.clone(), Arc::downgrade(&gate));
        gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn state_with_user(prompt: &str, user: &str) -> ConversationState {
        let mut state = ConversationState::new(prompt);
        state.conversation.push(Message::user(user));
        state
    }

    #[test]
    fn test_unseen_id_is_absent() {
        let store = MemorySessionStore::default();
        assert!(store.get(&ThreadId::from("t1")).unwrap().is_none());
    }

    #[test]
    fn test_round_trip() {
        let store = MemorySessionStore::default();
        let id = ThreadId::from("t1");
        store.put(&id, state_with_user("sys", "hello")).unwrap();

        let loaded = store.get(&id).unwrap().expect("entry should be live");
        assert_eq!(loaded.conversation.len(), 2);
    }

    #[test]
    fn test_get_is_idempotent() {
        let store = MemorySessionStore::default();
        let id = ThreadId::from("t1");
        store.put(&id, state_with_user("sys", "hello")).unwrap();

        let first = store.get(&id).unwrap().unwrap();
        let second = store.get(&id).unwrap().unwrap();
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = MemorySessionStore::new(Duration::milliseconds(20), DEFAULT_MAX_ENTRIES);
        let id = ThreadId::from("t1");
        store.put(&id, state_with_user("sys", "hello")).unwrap();

        assert!(store.get(&id).unwrap().is_some());
        tokio::time::sleep(std::time::Duration::from_millis(40)).await;
        assert!(store.get(&id).unwrap().is_none());
        // The expired entry was collected, not just hidden
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_refreshes_expiry() {
        let store = MemorySessionStore::default();
        let id = ThreadId::from("t1");
        store.put(&id, state_with_user("sys", "hello")).unwrap();
        let first_expiry = store.get(&id).unwrap().unwrap().expires_at;

        let mut state = store.get(&id).unwrap().unwrap();
        state.conversation.push(Message::assistant("hi"));
        store.put(&id, state).unwrap();

        assert!(store.get(&id).unwrap().unwrap().expires_at >= first_expiry);
    }

    #[test]
    fn test_capacity_evicts_least_recently_written() {
        let store = MemorySessionStore::new(Duration::seconds(DEFAULT_TTL_SECS), 2);
        store.put(&ThreadId::from("a"), state_with_user("sys", "1")).unwrap();
        store.put(&ThreadId::from("b"), state_with_user("sys", "2")).unwrap();
        store.put(&ThreadId::from("c"), state_with_user("sys", "3")).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.get(&ThreadId::from("a")).unwrap().is_none());
        assert!(store.get(&ThreadId::from("c")).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_turn_locks_serialize_same_id() {
        let locks = TurnLocks::new();
        let id = ThreadId::from("t1");

        let gate = locks.gate(&id);
        let guard = gate.lock().await;

        // Same id maps to the same mutex, so a second turn would queue
        let second = locks.gate(&id);
        assert!(second.try_lock().is_err());

        drop(guard);
        assert!(second.try_lock().is_ok());

        // Different ids are independent
        let other = locks.gate(&ThreadId::from("t2"));
        assert!(other.try_lock().is_ok());
    }
}
