use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a race session.
///
/// `Waiting -> Active -> Finished`, with `Cancelled` reachable from
/// `Waiting` or `Active`. `Finished` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaceStatus {
    Waiting,
    Active,
    Finished,
    Cancelled,
}

impl RaceStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }

    /// Live sessions show up in public listings.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Waiting | Self::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Active => "ACTIVE",
            Self::Finished => "FINISHED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant's state within one race session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantStatus {
    Joined,
    Ready,
    Racing,
    Finished,
    Left,
}

/// Creation-time settings; never change after the session exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceSettings {
    pub max_participants: u32,
    pub public_race: bool,
    pub vehicle_restrictions: Vec<String>,
}

/// Validated input for creating a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceConfig {
    pub name: String,
    pub settings: RaceSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    pub status: ParticipantStatus,
}

impl Participant {
    pub fn new(user_id: impl Into<String>, joined_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            joined_at,
            status: ParticipantStatus::Joined,
        }
    }

    /// Whether this record still counts as a member of the race.
    pub fn is_present(&self) -> bool {
        self.status != ParticipantStatus::Left
    }
}

/// Authoritative state of one race.
///
/// Instances are only ever handed out behind an `Arc`; every mutation goes
/// through the session store, which swaps in a whole new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceSession {
    pub id: Uuid,
    pub name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub status: RaceStatus,
    pub settings: RaceSettings,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Set when the session reaches `Cancelled`.
    pub cancelled_at: Option<DateTime<Utc>>,
    pub(crate) participants: Vec<Participant>,
    pub(crate) revision: u64,
    pub(crate) sequence: u64,
}

impl RaceSession {
    /// A fresh `Waiting` session with the owner enrolled as the first participant.
    pub fn new(owner_id: &str, config: RaceConfig, now: DateTime<Utc>, sequence: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: config.name,
            created_by: owner_id.to_string(),
            created_at: now,
            status: RaceStatus::Waiting,
            settings: config.settings,
            start_time: None,
            end_time: None,
            cancelled_at: None,
            participants: vec![Participant::new(owner_id, now)],
            revision: 1,
            sequence,
        }
    }

    /// Every participant record in join order, including `Left` ones.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    /// Members that have not left.
    pub fn present_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_present()).count()
    }

    pub fn count_with_status(&self, status: ParticipantStatus) -> usize {
        self.participants
            .iter()
            .filter(|p| p.status == status)
            .count()
    }

    pub fn is_creator(&self, user_id: &str) -> bool {
        self.created_by == user_id
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// When the session reached a terminal state, if it has.
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            RaceStatus::Finished => self.end_time,
            RaceStatus::Cancelled => self.cancelled_at,
            _ => None,
        }
    }
}

/// The authenticated caller of a lifecycle operation.
///
/// The core trusts the role flag; deciding who is an admin happens upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: false,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: true,
        }
    }
}
