use std::{error::Error, str::FromStr, sync::Arc, time::Duration};

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    realtime::{
        archive::{NoopArchive, PgRaceArchive, RaceArchive},
        lifecycle::LifecyclePolicy,
        manager::{ManagerSettings, RaceManager},
    },
    utils::{config::Config, jwt_decode::TokenVerifier, rate_limiter::RateLimiter},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub races: Arc<RaceManager>,
    pub tokens: TokenVerifier,
}

impl AppState {
    pub async fn init(config: Config) -> Result<Self, Box<dyn Error>> {
        let archive: Arc<dyn RaceArchive> = match &config.database_url {
            Some(url) => {
                let connect_options = PgConnectOptions::from_str(url)?.statement_cache_capacity(0);
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .min_connections(0)
                    .acquire_timeout(Duration::from_secs(10))
                    .idle_timeout(Some(Duration::from_secs(60)))
                    .connect_lazy_with(connect_options);
                let archive = PgRaceArchive::new(db_pool);

                let timeout = Duration::from_millis(config.collaborator_timeout_ms);
                match tokio::time::timeout(timeout, archive.ensure_schema()).await {
                    Ok(Ok(())) => info!("Race archive ready"),
                    Ok(Err(err)) => warn!("Race archive schema check failed: {}", err),
                    Err(_) => warn!("Race archive schema check timed out"),
                }
                Arc::new(archive)
            }
            None => {
                warn!("DATABASE_URL not set, race sessions will not be archived");
                Arc::new(NoopArchive)
            }
        };

        Ok(Self::with_archive(config, archive)?)
    }

    pub fn with_archive(
        config: Config,
        archive: Arc<dyn RaceArchive>,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        let tokens = TokenVerifier::from_config(&config)?;
        let settings = ManagerSettings {
            policy: LifecyclePolicy {
                min_participants_to_start: config.min_participants_to_start,
            },
            retention: chrono::Duration::seconds(i64::from(config.retention_secs)),
            collaborator_timeout: Duration::from_millis(config.collaborator_timeout_ms),
        };
        let limiter = RateLimiter::new(config.archive_max_concurrent, config.archive_min_delay_ms);

        Ok(AppState {
            races: Arc::new(RaceManager::new(archive, limiter, settings)),
            config,
            tokens,
        })
    }

    /// Where clients connect to follow a race live.
    pub fn websocket_url(&self, race_id: Uuid) -> String {
        format!("{}/races/{}", self.config.realtime_url, race_id)
    }
}
