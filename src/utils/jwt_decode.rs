use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::{
    models::jwt::Claims,
    utils::config::{Config, JwtKey},
};

/// Decoding key and validation rules, built once at startup.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn from_config(config: &Config) -> Result<Self, jsonwebtoken::errors::Error> {
        let (key, algorithm) = match &config.jwt_key {
            JwtKey::Secret(secret) => (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256),
            JwtKey::EcComponents { x, y } => (DecodingKey::from_ec_components(x, y)?, Algorithm::ES256),
        };

        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[config.jwt_audience.as_str()]);

        Ok(Self { key, validation })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.key, &self.validation).map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::jwt_encode::jwt_encode;

    fn config(secret: &str) -> Config {
        Config::from_lookup(|name| (name == "JWT_SECRET").then(|| secret.to_string())).unwrap()
    }

    #[test]
    fn accepts_tokens_signed_with_the_secret() {
        let verifier = TokenVerifier::from_config(&config("track-secret")).unwrap();
        let token = jwt_encode("driver-7", Some("admin"), "authenticated", "track-secret").unwrap();

        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.sub, "driver-7");
        assert!(claims.is_admin());
    }

    #[test]
    fn rejects_wrong_secret_and_wrong_audience() {
        let verifier = TokenVerifier::from_config(&config("track-secret")).unwrap();

        let forged = jwt_encode("driver-7", None, "authenticated", "other").unwrap();
        assert!(verifier.verify(&forged).is_err());

        let elsewhere = jwt_encode("driver-7", None, "service", "track-secret").unwrap();
        assert!(verifier.verify(&elsewhere).is_err());
    }
}
