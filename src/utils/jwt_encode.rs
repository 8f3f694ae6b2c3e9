use jsonwebtoken::{EncodingKey, Header};

use crate::models::jwt::Claims;

/// Mint an HS256 access token, valid for 15 minutes.
pub fn jwt_encode(
    user_id: &str,
    role: Option<&str>,
    audience: &str,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        aud: audience.to_string(),
        iat: now,
        exp: now + 15 * 60,
        email: None,
        role: role.map(str::to_string),
        app_metadata: None,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}
