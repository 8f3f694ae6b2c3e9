use serde::{Deserialize, Serialize};

use crate::models::race_session::Actor;

pub const ADMIN_ROLE: &str = "admin";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub aud: String,
    pub exp: usize,
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_metadata: Option<AppMetadata>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
            || self
                .app_metadata
                .as_ref()
                .and_then(|m| m.role.as_deref())
                == Some(ADMIN_ROLE)
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.sub.clone(),
            is_admin: self.is_admin(),
        }
    }
}
