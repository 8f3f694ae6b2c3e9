//! Process-wide registry of live race sessions.
//!
//! Each session sits in its own slot guarded by a mutex. Writers hold the
//! slot lock for the whole read-modify-write, work on a private copy, and
//! swap the finished value in as a new `Arc`; readers only clone the current
//! `Arc`, so they always see one complete revision. Different sessions never
//! contend with each other.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::{
    error::RaceError,
    race_session::{RaceConfig, RaceSession},
};

#[derive(Debug)]
struct SessionSlot {
    current: Mutex<Arc<RaceSession>>,
}

impl SessionSlot {
    fn lock(&self) -> MutexGuard<'_, Arc<RaceSession>> {
        // writers swap in a complete value as their last step, so a poisoned
        // slot still holds a consistent session
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<Uuid, Arc<SessionSlot>>,
    next_sequence: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        owner_id: &str,
        config: RaceConfig,
        now: DateTime<Utc>,
    ) -> Result<Arc<RaceSession>, RaceError> {
        if config.name.trim().is_empty() {
            return Err(RaceError::InvalidConfig("name is required".to_string()));
        }
        if config.settings.max_participants < 1 {
            return Err(RaceError::InvalidConfig(
                "maxParticipants must be a positive integer".to_string(),
            ));
        }

        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(RaceSession::new(owner_id, config, now, sequence));
        self.sessions.insert(
            session.id,
            Arc::new(SessionSlot {
                current: Mutex::new(session.clone()),
            }),
        );
        Ok(session)
    }

    fn slot(&self, id: Uuid) -> Result<Arc<SessionSlot>, RaceError> {
        self.sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RaceError::NotFound(id.to_string()))
    }

    pub fn get(&self, id: Uuid) -> Result<Arc<RaceSession>, RaceError> {
        let slot = self.slot(id)?;
        let current = slot.lock().clone();
        Ok(current)
    }

    /// Apply `mutate` to a copy of the session under its lock and commit the
    /// copy with a bumped revision. On error, or when the copy comes back
    /// unchanged, nothing is committed and the revision stays put.
    pub fn update<T>(
        &self,
        id: Uuid,
        mutate: impl FnOnce(&mut RaceSession) -> Result<T, RaceError>,
    ) -> Result<(T, Arc<RaceSession>), RaceError> {
        let slot = self.slot(id)?;
        let mut current = slot.lock();

        let mut next = RaceSession::clone(&current);
        let value = mutate(&mut next)?;
        if next == **current {
            return Ok((value, current.clone()));
        }
        next.revision = current.revision + 1;

        let committed = Arc::new(next);
        *current = committed.clone();
        Ok((value, committed))
    }

    /// Every session in insertion order, as of the moment of the call.
    pub fn all(&self) -> Vec<Arc<RaceSession>> {
        let slots: Vec<Arc<SessionSlot>> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let mut sessions: Vec<Arc<RaceSession>> =
            slots.iter().map(|slot| slot.lock().clone()).collect();
        sessions.sort_by_key(|s| s.sequence);
        sessions
    }

    /// `WAITING` and `ACTIVE` sessions in insertion order. The iterator is
    /// lazy over a point-in-time copy, and can be cloned to walk it again.
    pub fn list_active(&self) -> impl Iterator<Item = Arc<RaceSession>> + Clone {
        self.all().into_iter().filter(|s| s.status.is_live())
    }

    /// Remove a session. Returns what was removed; absent ids are a no-op.
    pub fn remove(&self, id: Uuid) -> Option<Arc<RaceSession>> {
        let (_, slot) = self.sessions.remove(&id)?;
        let last = slot.lock().clone();
        Some(last)
    }

    /// Drop terminal sessions that ended more than `retention` before `now`.
    /// A window reaching past the earliest representable time expires nothing.
    pub fn remove_expired(&self, retention: Duration, now: DateTime<Utc>) -> Vec<Arc<RaceSession>> {
        let Some(cutoff) = now.checked_sub_signed(retention) else {
            return Vec::new();
        };
        let expired: Vec<Uuid> = self
            .all()
            .into_iter()
            .filter(|s| s.ended_at().is_some_and(|ended| ended <= cutoff))
            .map(|s| s.id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::race_session::{Actor, RaceSettings, RaceStatus};
    use crate::realtime::lifecycle::LifecyclePolicy;
    use pretty_assertions::assert_eq;

    fn config(name: &str, max: u32) -> RaceConfig {
        RaceConfig {
            name: name.to_string(),
            settings: RaceSettings {
                max_participants: max,
                public_race: true,
                vehicle_restrictions: vec![],
            },
        }
    }

    #[test]
    fn create_and_get() {
        let store = SessionStore::new();
        let created = store.create("owner", config("Canal loop", 4), Utc::now()).unwrap();

        let fetched = store.get(created.id).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.status, RaceStatus::Waiting);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn create_rejects_zero_capacity() {
        let store = SessionStore::new();
        let err = store.create("owner", config("Canal loop", 0), Utc::now()).unwrap_err();
        assert!(matches!(err, RaceError::InvalidConfig(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = SessionStore::new();
        assert!(matches!(store.get(Uuid::new_v4()), Err(RaceError::NotFound(_))));
        assert!(matches!(
            store.update(Uuid::new_v4(), |_| Ok(())),
            Err(RaceError::NotFound(_))
        ));
    }

    #[test]
    fn update_bumps_revision_and_keeps_old_reads_intact() {
        let store = SessionStore::new();
        let created = store.create("owner", config("Canal loop", 4), Utc::now()).unwrap();

        let (_, after_join) = store
            .update(created.id, |s| s.join("a", Utc::now()))
            .unwrap();
        let (_, after_start) = store
            .update(created.id, |s| {
                s.start(&Actor::user("owner"), &LifecyclePolicy::default(), Utc::now())
            })
            .unwrap();

        assert_eq!(created.revision(), 1);
        assert_eq!(after_join.revision(), 2);
        assert_eq!(after_start.revision(), 3);
        // earlier reads are untouched
        assert_eq!(created.participants().len(), 1);
        assert_eq!(after_join.status, RaceStatus::Waiting);
        assert_eq!(store.get(created.id).unwrap().status, RaceStatus::Active);
    }

    #[test]
    fn unchanged_update_keeps_revision() {
        let store = SessionStore::new();
        let created = store.create("owner", config("Canal loop", 3), Utc::now()).unwrap();
        store.update(created.id, |s| s.join("a", Utc::now())).unwrap();
        store.update(created.id, |s| s.mark_ready("a")).unwrap();

        let (changed, session) = store.update(created.id, |s| s.mark_ready("a")).unwrap();
        assert!(!changed);
        assert_eq!(session.revision(), 3);
    }

    #[test]
    fn failed_update_commits_nothing() {
        let store = SessionStore::new();
        let created = store.create("owner", config("Canal loop", 1), Utc::now()).unwrap();

        let err = store
            .update(created.id, |s| s.join("a", Utc::now()))
            .unwrap_err();
        assert_eq!(err, RaceError::SessionFull);
        assert_eq!(store.get(created.id).unwrap(), created);
    }

    #[test]
    fn list_active_is_ordered_and_restartable() {
        let store = SessionStore::new();
        let first = store.create("o1", config("first", 2), Utc::now()).unwrap();
        let second = store.create("o2", config("second", 2), Utc::now()).unwrap();
        let third = store.create("o3", config("third", 2), Utc::now()).unwrap();
        store
            .update(second.id, |s| s.cancel(&Actor::user("o2"), Utc::now()))
            .unwrap();

        let active = store.list_active();
        let ids: Vec<Uuid> = active.clone().map(|s| s.id).collect();
        assert_eq!(ids, vec![first.id, third.id]);
        assert_eq!(active.count(), 2);
    }

    #[test]
    fn remove_is_idempotent() {
        let store = SessionStore::new();
        let created = store.create("owner", config("Canal loop", 2), Utc::now()).unwrap();

        assert!(store.remove(created.id).is_some());
        assert!(store.remove(created.id).is_none());
        assert!(store.get(created.id).is_err());
    }

    #[test]
    fn remove_expired_only_takes_old_terminal_sessions() {
        let store = SessionStore::new();
        let now = Utc::now();
        let old = store.create("o1", config("old", 2), now).unwrap();
        let fresh = store.create("o2", config("fresh", 2), now).unwrap();
        let live = store.create("o3", config("live", 2), now).unwrap();

        store
            .update(old.id, |s| s.cancel(&Actor::user("o1"), now - Duration::minutes(10)))
            .unwrap();
        store
            .update(fresh.id, |s| s.cancel(&Actor::user("o2"), now))
            .unwrap();

        let removed = store.remove_expired(Duration::minutes(5), now);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, old.id);
        assert!(store.get(fresh.id).is_ok());
        assert!(store.get(live.id).is_ok());
    }

    #[test]
    fn huge_retention_window_expires_nothing() {
        let store = SessionStore::new();
        let now = Utc::now();
        let race = store.create("o1", config("ancient", 2), now).unwrap();
        store
            .update(race.id, |s| s.cancel(&Actor::user("o1"), now))
            .unwrap();

        let removed = store.remove_expired(Duration::days(365 * 1_000_000), now);
        assert!(removed.is_empty());
        assert!(store.get(race.id).is_ok());
    }

    #[test]
    fn concurrent_joins_never_exceed_capacity() {
        let store = Arc::new(SessionStore::new());
        let capacity = 8u32;
        let created = store
            .create("owner", config("Stampede", capacity), Utc::now())
            .unwrap();
        let id = created.id;
        // the owner already holds one slot
        let callers = capacity as usize - 1 + 5;

        let results: Vec<Result<(), RaceError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..callers)
                .map(|i| {
                    let store = store.clone();
                    scope.spawn(move || {
                        store
                            .update(id, |s| s.join(&format!("user-{i}"), Utc::now()))
                            .map(|_| ())
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect()
        });

        let joined = results.iter().filter(|r| r.is_ok()).count();
        let full = results
            .iter()
            .filter(|r| matches!(r, Err(RaceError::SessionFull)))
            .count();
        assert_eq!(joined, capacity as usize - 1);
        assert_eq!(full, 5);

        let session = store.get(id).unwrap();
        assert_eq!(session.participants().len(), capacity as usize);
        let mut ids: Vec<&str> = session
            .participants()
            .iter()
            .map(|p| p.user_id.as_str())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), capacity as usize);
    }
}
