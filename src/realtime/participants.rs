//! Membership bookkeeping for a single race session.
//!
//! Leave policy: while the race is `WAITING` a leaving user is removed outright
//! so the slot frees up; once it is `ACTIVE` the record stays and is marked
//! `LEFT`. The creator cannot leave at all and has to cancel instead.

use chrono::{DateTime, Utc};

use crate::models::{
    error::RaceError,
    race_session::{Participant, ParticipantStatus, RaceSession, RaceStatus},
};

impl RaceSession {
    pub fn join(&mut self, user_id: &str, now: DateTime<Utc>) -> Result<Participant, RaceError> {
        if self.status != RaceStatus::Waiting {
            return Err(RaceError::SessionClosed);
        }
        if self.participants.iter().any(|p| p.user_id == user_id) {
            return Err(RaceError::AlreadyJoined);
        }
        if self.participants.len() >= self.settings.max_participants as usize {
            return Err(RaceError::SessionFull);
        }

        let participant = Participant::new(user_id, now);
        self.participants.push(participant.clone());
        Ok(participant)
    }

    pub fn leave(&mut self, user_id: &str) -> Result<(), RaceError> {
        if self.status.is_terminal() {
            return Err(RaceError::SessionClosed);
        }
        let index = self
            .participants
            .iter()
            .position(|p| p.user_id == user_id && p.is_present())
            .ok_or(RaceError::NotAParticipant)?;
        if self.is_creator(user_id) {
            return Err(RaceError::Forbidden(
                "the creator cannot leave, cancel the race instead".to_string(),
            ));
        }

        if self.status == RaceStatus::Waiting {
            self.participants.remove(index);
        } else {
            self.participants[index].status = ParticipantStatus::Left;
        }
        Ok(())
    }

    /// Mark a waiting participant ready. Repeating it is a no-op; returns
    /// whether anything changed.
    pub fn mark_ready(&mut self, user_id: &str) -> Result<bool, RaceError> {
        if self.status != RaceStatus::Waiting {
            return Err(RaceError::SessionClosed);
        }
        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or(RaceError::NotAParticipant)?;

        match participant.status {
            ParticipantStatus::Ready => Ok(false),
            ParticipantStatus::Joined => {
                participant.status = ParticipantStatus::Ready;
                Ok(true)
            }
            _ => Err(RaceError::NotAParticipant),
        }
    }
}
