//! Durable copy of race sessions, owned by an external store.
//!
//! The live registry stays authoritative; the archive only receives whole
//! documents stamped with a revision, and ignores anything older than what it
//! already has.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{types::Json, PgPool};
use thiserror::Error;
use uuid::Uuid;

use crate::models::race_session::{Participant, RaceSession, RaceSettings, RaceStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveError {
    #[error("archive unavailable: {0}")]
    Unavailable(String),
    #[error("archive write timed out")]
    Timeout,
}

impl From<sqlx::Error> for ArchiveError {
    fn from(error: sqlx::Error) -> Self {
        Self::Unavailable(error.to_string())
    }
}

/// Everything about a session worth keeping, participant identities included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRecord {
    pub id: Uuid,
    pub revision: u64,
    pub name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub status: RaceStatus,
    pub settings: RaceSettings,
    pub participants: Vec<Participant>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<&RaceSession> for ArchiveRecord {
    fn from(session: &RaceSession) -> Self {
        Self {
            id: session.id,
            revision: session.revision(),
            name: session.name.clone(),
            created_by: session.created_by.clone(),
            created_at: session.created_at,
            status: session.status,
            settings: session.settings.clone(),
            participants: session.participants().to_vec(),
            start_time: session.start_time,
            end_time: session.end_time,
            cancelled_at: session.cancelled_at,
        }
    }
}

#[async_trait]
pub trait RaceArchive: Send + Sync {
    async fn save(&self, record: &ArchiveRecord) -> Result<(), ArchiveError>;
}

/// Used when no database is configured.
#[derive(Debug, Default)]
pub struct NoopArchive;

#[async_trait]
impl RaceArchive for NoopArchive {
    async fn save(&self, _record: &ArchiveRecord) -> Result<(), ArchiveError> {
        Ok(())
    }
}

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS race_sessions (
    id UUID PRIMARY KEY,
    status TEXT NOT NULL,
    revision BIGINT NOT NULL,
    document JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
)"#;

const UPSERT: &str = r#"
INSERT INTO race_sessions (id, status, revision, document, updated_at)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (id) DO UPDATE SET
    status = EXCLUDED.status,
    revision = EXCLUDED.revision,
    document = EXCLUDED.document,
    updated_at = EXCLUDED.updated_at
WHERE race_sessions.revision < EXCLUDED.revision"#;

#[derive(Debug, Clone)]
pub struct PgRaceArchive {
    pool: PgPool,
}

impl PgRaceArchive {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), ArchiveError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl RaceArchive for PgRaceArchive {
    async fn save(&self, record: &ArchiveRecord) -> Result<(), ArchiveError> {
        let revision = i64::try_from(record.revision)
            .map_err(|_| ArchiveError::Unavailable("revision out of range".to_string()))?;
        sqlx::query(UPSERT)
            .bind(record.id)
            .bind(record.status.as_str())
            .bind(revision)
            .bind(Json(record))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    //! Archive doubles for exercising the degraded paths.

    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    #[derive(Debug, Default)]
    pub struct RecordingArchive {
        pub saved: Mutex<Vec<ArchiveRecord>>,
    }

    impl RecordingArchive {
        pub fn saved(&self) -> Vec<ArchiveRecord> {
            self.saved.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RaceArchive for RecordingArchive {
        async fn save(&self, record: &ArchiveRecord) -> Result<(), ArchiveError> {
            self.saved.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    pub struct FailingArchive;

    #[async_trait]
    impl RaceArchive for FailingArchive {
        async fn save(&self, _record: &ArchiveRecord) -> Result<(), ArchiveError> {
            Err(ArchiveError::Unavailable("connection refused".to_string()))
        }
    }

    /// Never answers within any sane timeout.
    #[derive(Debug, Default)]
    pub struct StalledArchive;

    #[async_trait]
    impl RaceArchive for StalledArchive {
        async fn save(&self, _record: &ArchiveRecord) -> Result<(), ArchiveError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::race_session::RaceConfig;
    use serde_json::json;

    #[test]
    fn record_keeps_identities_and_revision() {
        let config = RaceConfig {
            name: "Tunnel run".to_string(),
            settings: RaceSettings {
                max_participants: 3,
                public_race: true,
                vehicle_restrictions: vec![],
            },
        };
        let mut session = RaceSession::new("owner", config, Utc::now(), 0);
        session.join("a", Utc::now()).unwrap();

        let record = ArchiveRecord::from(&session);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["revision"], json!(1));
        assert_eq!(value["status"], json!("WAITING"));
        assert_eq!(value["participants"][1]["userId"], json!("a"));
        assert_eq!(value["settings"]["maxParticipants"], json!(3));
    }
}
