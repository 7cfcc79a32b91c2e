use filepipe_core::AppError;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};

use super::models::JwtClaims;

/// Verifies HS256 bearer tokens against the shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, AppError> {
        let token_data =
            decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => {
                        AppError::Unauthorized("Token has expired".to_string())
                    }
                    ErrorKind::ImmatureSignature => {
                        AppError::Unauthorized("Token is not yet valid (nbf)".to_string())
                    }
                    _ => AppError::Unauthorized("Invalid or expired token".to_string()),
                }
            })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    const SECRET: &str = "test-secret-that-is-at-least-32-characters";

    fn token(secret: &str, sub: Uuid, exp_offset: Duration) -> String {
        let now = Utc::now();
        let claims = JwtClaims {
            sub,
            exp: (now + exp_offset).timestamp(),
            iat: now.timestamp(),
            nbf: None,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_yields_owner() {
        let owner = Uuid::new_v4();
        let claims = JwtVerifier::new(SECRET)
            .verify(&token(SECRET, owner, Duration::hours(1)))
            .unwrap();
        assert_eq!(claims.sub, owner);
    }

    #[test]
    fn test_expired_token_rejected() {
        let err = JwtVerifier::new(SECRET)
            .verify(&token(SECRET, Uuid::new_v4(), Duration::hours(-1)))
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg.contains("expired")));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let other = "another-secret-that-is-at-least-32-chars!";
        let err = JwtVerifier::new(SECRET)
            .verify(&token(other, Uuid::new_v4(), Duration::hours(1)))
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
