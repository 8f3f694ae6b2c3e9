//! Entry point the HTTP layer talks to.
//!
//! Every operation commits to the session store first, with the per-session
//! lock held only for the in-memory change. Events are then published and
//! the new revision is written to the archive outside the lock, time bounded.
//! A failed or slow archive write never undoes a committed change; it shows
//! up as `persisted: false` on the outcome and in the degraded write count.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::{task::JoinHandle, task::JoinSet, time::MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    models::{
        error::RaceError,
        event::{RaceEvent, RaceEventKind},
        race_session::{
            Actor, Participant, ParticipantStatus, RaceConfig, RaceSession, RaceStatus,
        },
        snapshot::{ParticipantTotals, RaceStats, SessionSnapshot, StatusCounts},
    },
    realtime::{
        archive::{ArchiveError, ArchiveRecord, RaceArchive},
        lifecycle::LifecyclePolicy,
        notifier::RaceNotifier,
        snapshot::{project, project_all, Audience},
        store::SessionStore,
    },
    utils::rate_limiter::RateLimiter,
};

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub policy: LifecyclePolicy,
    /// How long finished or cancelled sessions stay in the live registry.
    pub retention: chrono::Duration,
    pub collaborator_timeout: Duration,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            policy: LifecyclePolicy::default(),
            retention: chrono::Duration::minutes(5),
            collaborator_timeout: Duration::from_secs(2),
        }
    }
}

/// Result of a committed operation.
#[derive(Debug, Clone)]
pub struct Outcome<T = ()> {
    pub value: T,
    pub session: Arc<RaceSession>,
    /// False when the archive write failed or timed out.
    pub persisted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub sessions: usize,
    pub flushed: usize,
    pub failed: usize,
}

impl ShutdownReport {
    pub fn unfinished(&self) -> usize {
        self.sessions - self.flushed - self.failed
    }
}

pub struct RaceManager {
    store: SessionStore,
    notifier: RaceNotifier,
    archive: Arc<dyn RaceArchive>,
    limiter: RateLimiter,
    settings: ManagerSettings,
    degraded_writes: AtomicU64,
}

impl RaceManager {
    pub fn new(archive: Arc<dyn RaceArchive>, limiter: RateLimiter, settings: ManagerSettings) -> Self {
        Self {
            store: SessionStore::new(),
            notifier: RaceNotifier::default(),
            archive,
            limiter,
            settings,
            degraded_writes: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn notifier(&self) -> &RaceNotifier {
        &self.notifier
    }

    pub fn degraded_writes(&self) -> u64 {
        self.degraded_writes.load(Ordering::Relaxed)
    }

    pub async fn create(&self, actor: &Actor, config: RaceConfig) -> Result<Outcome, RaceError> {
        let now = Utc::now();
        let session = self.store.create(&actor.user_id, config, now)?;
        info!(
            race_id = %session.id,
            user_id = %actor.user_id,
            max_participants = session.settings.max_participants,
            "race session created"
        );

        let persisted = self
            .after_commit(
                &session,
                vec![RaceEventKind::SessionCreated {
                    created_by: actor.user_id.clone(),
                }],
                now,
            )
            .await;
        Ok(Outcome {
            value: (),
            session,
            persisted,
        })
    }

    pub fn get(&self, id: Uuid) -> Result<Arc<RaceSession>, RaceError> {
        self.store.get(id)
    }

    /// Private races the actor is not involved in read as not found.
    pub fn snapshot(&self, id: Uuid, actor: Option<&Actor>) -> Result<SessionSnapshot, RaceError> {
        let session = self.store.get(id)?;
        let audience = Audience::resolve(&session, actor);
        if !audience.can_view(&session) {
            return Err(RaceError::NotFound(id.to_string()));
        }
        Ok(project(&session, audience))
    }

    /// Live public races for anonymous listings.
    pub fn list_public(&self) -> Vec<SessionSnapshot> {
        project_all(self.store.list_active(), None)
    }

    pub async fn join(&self, id: Uuid, actor: &Actor) -> Result<Outcome<Participant>, RaceError> {
        let now = Utc::now();
        let (participant, session) = self
            .store
            .update(id, |s| s.join(&actor.user_id, now))
            .inspect_err(|e| {
                debug!(race_id = %id, user_id = %actor.user_id, error = %e, "join rejected");
            })?;
        debug!(race_id = %id, user_id = %actor.user_id, "participant joined");

        let persisted = self
            .after_commit(
                &session,
                vec![RaceEventKind::ParticipantJoined {
                    user_id: actor.user_id.clone(),
                }],
                now,
            )
            .await;
        Ok(Outcome {
            value: participant,
            session,
            persisted,
        })
    }

    pub async fn leave(&self, id: Uuid, actor: &Actor) -> Result<Outcome, RaceError> {
        let now = Utc::now();
        let ((), session) = self.store.update(id, |s| s.leave(&actor.user_id))?;
        debug!(race_id = %id, user_id = %actor.user_id, "participant left");

        let persisted = self
            .after_commit(
                &session,
                vec![RaceEventKind::ParticipantLeft {
                    user_id: actor.user_id.clone(),
                }],
                now,
            )
            .await;
        Ok(Outcome {
            value: (),
            session,
            persisted,
        })
    }

    /// A repeated ready call succeeds without a new revision or event.
    pub async fn ready(&self, id: Uuid, actor: &Actor) -> Result<Outcome, RaceError> {
        let now = Utc::now();
        let (changed, session) = self.store.update(id, |s| s.mark_ready(&actor.user_id))?;
        if !changed {
            return Ok(Outcome {
                value: (),
                session,
                persisted: true,
            });
        }

        let persisted = self
            .after_commit(
                &session,
                vec![RaceEventKind::ParticipantReady {
                    user_id: actor.user_id.clone(),
                }],
                now,
            )
            .await;
        Ok(Outcome {
            value: (),
            session,
            persisted,
        })
    }

    pub async fn start(&self, id: Uuid, actor: &Actor) -> Result<Outcome, RaceError> {
        let now = Utc::now();
        let policy = self.settings.policy;
        let ((), session) = self.store.update(id, |s| s.start(actor, &policy, now))?;
        self.transitioned(session, RaceStatus::Waiting, actor, now).await
    }

    pub async fn finish(&self, id: Uuid, actor: &Actor) -> Result<Outcome, RaceError> {
        let now = Utc::now();
        let ((), session) = self.store.update(id, |s| s.finish(actor, now))?;
        self.transitioned(session, RaceStatus::Active, actor, now).await
    }

    pub async fn cancel(&self, id: Uuid, actor: &Actor) -> Result<Outcome, RaceError> {
        let now = Utc::now();
        let (from, session) = self.store.update(id, |s| {
            let from = s.status;
            s.cancel(actor, now)?;
            Ok(from)
        })?;
        self.transitioned(session, from, actor, now).await
    }

    async fn transitioned(
        &self,
        session: Arc<RaceSession>,
        from: RaceStatus,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Outcome, RaceError> {
        info!(
            race_id = %session.id,
            user_id = %actor.user_id,
            from = %from,
            to = %session.status,
            "race status changed"
        );
        let persisted = self
            .after_commit(
                &session,
                vec![RaceEventKind::StatusChanged {
                    from,
                    to: session.status,
                }],
                now,
            )
            .await;
        Ok(Outcome {
            value: (),
            session,
            persisted,
        })
    }

    async fn after_commit(
        &self,
        session: &RaceSession,
        events: Vec<RaceEventKind>,
        now: DateTime<Utc>,
    ) -> bool {
        for kind in events {
            self.notifier.publish(RaceEvent::new(session, kind, now));
        }
        self.persist(session).await
    }

    async fn persist(&self, session: &RaceSession) -> bool {
        let record = ArchiveRecord::from(session);
        let write = async {
            let _permit = self
                .limiter
                .acquire()
                .await
                .map_err(|_| ArchiveError::Unavailable("archive writer is closed".to_string()))?;
            self.archive.save(&record).await
        };

        let result = tokio::time::timeout(self.settings.collaborator_timeout, write)
            .await
            .unwrap_or(Err(ArchiveError::Timeout));

        match result {
            Ok(()) => true,
            Err(error) => {
                let total = self.degraded_writes.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    race_id = %record.id,
                    revision = record.revision,
                    error = %error,
                    degraded_writes = total,
                    "archive write failed, in-memory state kept"
                );
                false
            }
        }
    }

    pub fn stats(&self) -> RaceStats {
        let mut by_status = StatusCounts::default();
        let mut participants = ParticipantTotals::default();
        let sessions = self.store.all();

        for session in &sessions {
            by_status.record(session.status);
            participants.total += session.present_count();
            participants.racing += session.count_with_status(ParticipantStatus::Racing);
        }

        RaceStats {
            total: sessions.len(),
            by_status,
            participants,
            degraded_writes: self.degraded_writes(),
        }
    }

    /// Archive and drop terminal sessions past the retention window.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let removed = self.store.remove_expired(self.settings.retention, now);
        for session in &removed {
            self.persist(session).await;
            debug!(
                race_id = %session.id,
                status = %session.status,
                subscribers = self.notifier.subscriber_count(session.id),
                "race session retired"
            );
            self.notifier.close(session.id);
        }
        removed.len()
    }

    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = manager.sweep_expired(Utc::now()).await;
                if removed > 0 {
                    info!(removed, remaining = manager.store.len(), "retired expired race sessions");
                }
            }
        })
    }

    /// Flush a final record for every session, bounded by `grace`. Writes
    /// still running at the deadline are abandoned.
    pub async fn shutdown(self: &Arc<Self>, grace: Duration) -> ShutdownReport {
        if self.store.is_empty() {
            debug!("no race sessions to flush");
        }
        let sessions = self.store.all();
        let mut report = ShutdownReport {
            sessions: sessions.len(),
            ..ShutdownReport::default()
        };

        let mut writes = JoinSet::new();
        for session in sessions {
            let manager = Arc::clone(self);
            writes.spawn(async move { manager.persist(&session).await });
        }

        let drained = tokio::time::timeout(grace, async {
            while let Some(result) = writes.join_next().await {
                match result {
                    Ok(true) => report.flushed += 1,
                    _ => report.failed += 1,
                }
            }
        })
        .await;

        if drained.is_err() {
            writes.abort_all();
            warn!(
                unfinished = report.unfinished(),
                "shutdown deadline hit before every session was flushed"
            );
        }
        self.limiter.close();
        info!(
            sessions = report.sessions,
            flushed = report.flushed,
            failed = report.failed,
            "race sessions flushed"
        );
        report
    }
}
