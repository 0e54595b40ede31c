use super::SessionState;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub type SharedSession = Arc<Mutex<SessionState>>;

/// In-memory sessions keyed by id. Each session has its own lock so one
/// session's render never blocks another's.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, SharedSession>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::from_std(ttl).unwrap_or(Duration::hours(1)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, SharedSession>> {
        // A panic while holding the map lock leaves the map itself intact.
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn create(&self) -> (Uuid, SharedSession) {
        let evicted = self.evict_idle();
        if evicted > 0 {
            log::info!("Evicted {} idle sessions", evicted);
        }

        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(SessionState::new()));
        let active = {
            let mut sessions = self.lock();
            sessions.insert(id, session.clone());
            sessions.len()
        };
        log::info!("Created session {} ({} active)", id, active);
        (id, session)
    }

    pub fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.lock().get(&id).cloned()
    }

    pub fn remove(&self, id: Uuid) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            log::info!("Ended session {}", id);
        }
        removed
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Drops sessions not seen within the TTL. Sessions busy rendering are kept.
    pub fn evict_idle(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, session| match session.try_lock() {
            Ok(state) => state.last_seen() >= cutoff,
            Err(_) => true,
        });
        before - sessions.len()
    }
}
