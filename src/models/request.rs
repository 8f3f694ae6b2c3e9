use serde::Deserialize;

use crate::models::{
    error::RaceError,
    race_session::{RaceConfig, RaceSettings},
};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_CAPACITY: i64 = 100;
pub const MAX_VEHICLE_RESTRICTIONS: usize = 32;

fn default_public() -> bool {
    true
}

/// Body of `POST /races/create-realtime`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateRaceRequest {
    pub name: String,
    pub max_participants: i64,
    #[serde(default = "default_public")]
    pub public_race: bool,
    #[serde(default)]
    pub vehicle_restrictions: Vec<String>,
}

impl TryFrom<CreateRaceRequest> for RaceConfig {
    type Error = RaceError;

    fn try_from(req: CreateRaceRequest) -> Result<Self, Self::Error> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(RaceError::InvalidConfig("name is required".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(RaceError::InvalidConfig(format!(
                "name must be at most {MAX_NAME_LEN} characters"
            )));
        }
        if req.max_participants < 1 {
            return Err(RaceError::InvalidConfig(
                "maxParticipants must be a positive integer".to_string(),
            ));
        }
        if req.max_participants > MAX_CAPACITY {
            return Err(RaceError::InvalidConfig(format!(
                "maxParticipants must not exceed {MAX_CAPACITY}"
            )));
        }
        if req.vehicle_restrictions.len() > MAX_VEHICLE_RESTRICTIONS {
            return Err(RaceError::InvalidConfig(format!(
                "at most {MAX_VEHICLE_RESTRICTIONS} vehicle restrictions are allowed"
            )));
        }

        let mut vehicle_restrictions = Vec::with_capacity(req.vehicle_restrictions.len());
        for tag in req.vehicle_restrictions {
            let tag = tag.trim();
            if tag.is_empty() {
                return Err(RaceError::InvalidConfig(
                    "vehicle restrictions must not be blank".to_string(),
                ));
            }
            if !vehicle_restrictions.iter().any(|t: &String| t == tag) {
                vehicle_restrictions.push(tag.to_string());
            }
        }

        Ok(RaceConfig {
            name: name.to_string(),
            settings: RaceSettings {
                max_participants: req.max_participants as u32,
                public_race: req.public_race,
                vehicle_restrictions,
            },
        })
    }
}
