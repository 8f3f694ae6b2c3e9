use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::race_session::{RaceSession, RaceStatus};

/// What happened to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RaceEventKind {
    #[serde(rename_all = "camelCase")]
    SessionCreated { created_by: String },
    #[serde(rename_all = "camelCase")]
    ParticipantJoined { user_id: String },
    #[serde(rename_all = "camelCase")]
    ParticipantLeft { user_id: String },
    #[serde(rename_all = "camelCase")]
    ParticipantReady { user_id: String },
    StatusChanged { from: RaceStatus, to: RaceStatus },
}

/// A committed change to a session, stamped with the revision it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceEvent {
    pub race_id: Uuid,
    pub revision: u64,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: RaceEventKind,
}

impl RaceEvent {
    pub fn new(session: &RaceSession, kind: RaceEventKind, occurred_at: DateTime<Utc>) -> Self {
        Self {
            race_id: session.id,
            revision: session.revision(),
            occurred_at,
            kind,
        }
    }

    /// Transport channel the event belongs to.
    pub fn channel(&self) -> String {
        format!("race:{}", self.race_id)
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            RaceEventKind::SessionCreated { .. } => "session_created",
            RaceEventKind::ParticipantJoined { .. } => "participant_joined",
            RaceEventKind::ParticipantLeft { .. } => "participant_left",
            RaceEventKind::ParticipantReady { .. } => "participant_ready",
            RaceEventKind::StatusChanged { .. } => "status_changed",
        }
    }
}
