use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::race_session::{Participant, ParticipantStatus, RaceStatus};

/// Read-only view of a session handed to HTTP and stream consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub name: String,
    pub status: RaceStatus,
    pub participant_count: usize,
    pub max_participants: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub vehicle_restrictions: Vec<String>,
    pub public_race: bool,
    /// Only filled in for the creator or an admin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<ParticipantView>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    pub status: ParticipantStatus,
}

impl From<&Participant> for ParticipantView {
    fn from(participant: &Participant) -> Self {
        Self {
            user_id: participant.user_id.clone(),
            joined_at: participant.joined_at,
            status: participant.status,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub waiting: usize,
    pub active: usize,
    pub finished: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: RaceStatus) {
        match status {
            RaceStatus::Waiting => self.waiting += 1,
            RaceStatus::Active => self.active += 1,
            RaceStatus::Finished => self.finished += 1,
            RaceStatus::Cancelled => self.cancelled += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParticipantTotals {
    pub total: usize,
    pub racing: usize,
}

/// Aggregate numbers for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceStats {
    pub total: usize,
    pub by_status: StatusCounts,
    pub participants: ParticipantTotals,
    pub degraded_writes: u64,
}
