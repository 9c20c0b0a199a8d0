use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::routes::ApiError;

/// Claims carried by tokens issued by the external identity provider. The
/// service only checks signature and expiry; issuance lives elsewhere.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Verifies bearer tokens against key material injected at process start.
pub struct AuthVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map(|data| data.claims)
    }
}

/// Middleware requiring a valid bearer credential on the request.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    state.auth.verify(token).map_err(|_| ApiError::Unauthorized)?;

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_with_exp(secret: &str, exp: i64) -> String {
        let claims = Claims {
            sub: "test-user".to_string(),
            exp: exp as usize,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_token_signed_with_the_configured_key() {
        let verifier = AuthVerifier::new("topsecret");
        let token = token_with_exp("topsecret", chrono::Utc::now().timestamp() + 3600);

        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.sub, "test-user");
    }

    #[test]
    fn rejects_token_signed_with_a_different_key() {
        let verifier = AuthVerifier::new("topsecret");
        let token = token_with_exp("someotherkey", chrono::Utc::now().timestamp() + 3600);

        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let verifier = AuthVerifier::new("topsecret");
        let token = token_with_exp("topsecret", chrono::Utc::now().timestamp() - 3600);

        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn rejects_garbage() {
        let verifier = AuthVerifier::new("topsecret");
        assert!(verifier.verify("not-a-jwt").is_err());
    }
}
