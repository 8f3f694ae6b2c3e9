//! Race status state machine.
//!
//! ```text
//! WAITING ──start──▶ ACTIVE ──finish──▶ FINISHED
//!    │                  │
//!    └──cancel──┐  ┌─cancel┘
//!               ▼  ▼
//!            CANCELLED
//! ```

use chrono::{DateTime, Utc};

use crate::models::{
    error::RaceError,
    race_session::{Actor, ParticipantStatus, RaceSession, RaceStatus},
};

/// Tunable rules that are policy rather than invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Present participants needed before the creator may start.
    pub min_participants_to_start: usize,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            min_participants_to_start: 1,
        }
    }
}

pub fn can_transition(from: RaceStatus, to: RaceStatus) -> bool {
    matches!(
        (from, to),
        (RaceStatus::Waiting, RaceStatus::Active)
            | (RaceStatus::Active, RaceStatus::Finished)
            | (RaceStatus::Waiting, RaceStatus::Cancelled)
            | (RaceStatus::Active, RaceStatus::Cancelled)
    )
}

fn check_transition(from: RaceStatus, to: RaceStatus) -> Result<(), RaceError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(RaceError::InvalidTransition { from, to })
    }
}

impl RaceSession {
    fn require_creator_or_admin(&self, actor: &Actor, action: &str) -> Result<(), RaceError> {
        if actor.is_admin || self.is_creator(&actor.user_id) {
            Ok(())
        } else {
            Err(RaceError::Forbidden(format!(
                "only the creator or an admin can {action} this race"
            )))
        }
    }

    /// Only the creator may start, admins included.
    pub fn start(
        &mut self,
        actor: &Actor,
        policy: &LifecyclePolicy,
        now: DateTime<Utc>,
    ) -> Result<(), RaceError> {
        check_transition(self.status, RaceStatus::Active)?;
        if !self.is_creator(&actor.user_id) {
            return Err(RaceError::Forbidden(
                "only the creator can start this race".to_string(),
            ));
        }
        let present = self.present_count();
        if present < policy.min_participants_to_start {
            return Err(RaceError::Forbidden(format!(
                "at least {} participants are needed to start, {} present",
                policy.min_participants_to_start, present
            )));
        }

        self.status = RaceStatus::Active;
        self.start_time = Some(now);
        for participant in &mut self.participants {
            if matches!(
                participant.status,
                ParticipantStatus::Joined | ParticipantStatus::Ready
            ) {
                participant.status = ParticipantStatus::Racing;
            }
        }
        Ok(())
    }

    pub fn finish(&mut self, actor: &Actor, now: DateTime<Utc>) -> Result<(), RaceError> {
        check_transition(self.status, RaceStatus::Finished)?;
        self.require_creator_or_admin(actor, "finish")?;

        self.status = RaceStatus::Finished;
        self.end_time = Some(now);
        for participant in &mut self.participants {
            if participant.status == ParticipantStatus::Racing {
                participant.status = ParticipantStatus::Finished;
            }
        }
        Ok(())
    }

    pub fn cancel(&mut self, actor: &Actor, now: DateTime<Utc>) -> Result<(), RaceError> {
        check_transition(self.status, RaceStatus::Cancelled)?;
        self.require_creator_or_admin(actor, "cancel")?;

        self.status = RaceStatus::Cancelled;
        self.cancelled_at = Some(now);
        Ok(())
    }
}
