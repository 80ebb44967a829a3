use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use thiserror::Error;

use guardian_db::Database;
use guardian_types::models::Principal;

use crate::ingest::IngestWorkflow;

pub type AppState = Arc<AppStateInner>;

/// Process-wide state, built once in `main` and shared by every handler.
pub struct AppStateInner {
    pub db: Arc<Database>,
    pub workflow: IngestWorkflow,
    pub verifier: Arc<dyn TokenVerifier>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    Missing,

    #[error("Invalid or expired token: {0}")]
    Invalid(String),
}

/// Turns a bearer credential into a stable subject identifier.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// HS256 JWT verifier. `exp` is always required; issuer and audience are
/// checked only when configured.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // A configured claim must be present, not merely correct when present.
        let mut required = vec!["exp", "sub"];
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
            required.push("iss");
        }
        match audience {
            Some(audience) => {
                validation.set_audience(&[audience]);
                required.push("aud");
            }
            None => validation.validate_aud = false,
        }
        validation.set_required_spec_claims(&required);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::Invalid(e.to_string()))?;

        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::Invalid("token has no subject".into()));
        }

        Ok(Principal::authenticated(data.claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &str = "unit-test-secret";

    fn token(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_one_hour() -> i64 {
        (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp()
    }

    #[tokio::test]
    async fn valid_token_yields_subject() {
        let verifier = JwtVerifier::new(SECRET, None, None);
        let principal = verifier
            .verify(&token(json!({"sub": "uid-123", "exp": in_one_hour()}), SECRET))
            .await
            .unwrap();

        assert_eq!(principal.subject_id, "uid-123");
        assert!(principal.is_authenticated);
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let verifier = JwtVerifier::new(SECRET, None, None);
        let result = verifier
            .verify(&token(json!({"sub": "uid-123", "exp": in_one_hour()}), "other"))
            .await;
        assert!(matches!(result, Err(AuthError::Invalid(_))));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let verifier = JwtVerifier::new(SECRET, None, None);
        let expired = (chrono::Utc::now() - chrono::Duration::hours(2)).timestamp();
        let result = verifier
            .verify(&token(json!({"sub": "uid-123", "exp": expired}), SECRET))
            .await;
        assert!(matches!(result, Err(AuthError::Invalid(_))));
    }

    #[tokio::test]
    async fn empty_subject_is_rejected() {
        let verifier = JwtVerifier::new(SECRET, None, None);
        let result = verifier
            .verify(&token(json!({"sub": " ", "exp": in_one_hour()}), SECRET))
            .await;
        assert!(matches!(result, Err(AuthError::Invalid(_))));
    }

    #[tokio::test]
    async fn issuer_and_audience_are_enforced_when_configured() {
        let verifier = JwtVerifier::new(SECRET, Some("guardian-idp"), Some("guardian"));

        let good = json!({"sub": "u", "exp": in_one_hour(), "iss": "guardian-idp", "aud": "guardian"});
        assert!(verifier.verify(&token(good, SECRET)).await.is_ok());

        let wrong_iss = json!({"sub": "u", "exp": in_one_hour(), "iss": "elsewhere", "aud": "guardian"});
        assert!(verifier.verify(&token(wrong_iss, SECRET)).await.is_err());

        let wrong_aud = json!({"sub": "u", "exp": in_one_hour(), "iss": "guardian-idp", "aud": "other"});
        assert!(verifier.verify(&token(wrong_aud, SECRET)).await.is_err());

        let bare = json!({"sub": "u", "exp": in_one_hour()});
        assert!(matches!(
            verifier.verify(&token(bare, SECRET)).await,
            Err(AuthError::Invalid(_))
        ));

        let missing_aud = json!({"sub": "u", "exp": in_one_hour(), "iss": "guardian-idp"});
        assert!(verifier.verify(&token(missing_aud, SECRET)).await.is_err());

        let missing_iss = json!({"sub": "u", "exp": in_one_hour(), "aud": "guardian"});
        assert!(verifier.verify(&token(missing_iss, SECRET)).await.is_err());
    }

    #[tokio::test]
    async fn token_without_subject_is_rejected() {
        let verifier = JwtVerifier::new(SECRET, None, None);
        let result = verifier
            .verify(&token(json!({"exp": in_one_hour()}), SECRET))
            .await;
        assert!(matches!(result, Err(AuthError::Invalid(_))));
    }

    #[tokio::test]
    async fn audience_is_ignored_when_not_configured() {
        let verifier = JwtVerifier::new(SECRET, None, None);
        let claims = json!({"sub": "u", "exp": in_one_hour(), "aud": "anything"});
        assert!(verifier.verify(&token(claims, SECRET)).await.is_ok());
    }
}
