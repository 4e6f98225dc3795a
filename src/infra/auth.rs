use crate::token::TokenPayload;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use thiserror::Error;
use tracing::debug;

pub const TOKEN_HEADER: &str = "token";
pub const STAFF_ROLE: &str = "admin";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("missing token header")]
    Missing,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("unsupported token algorithm")]
    UnsupportedAlgorithm,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token verification is not configured")]
    NotConfigured,
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => AuthError::BadSignature,
            ErrorKind::InvalidAlgorithm => AuthError::UnsupportedAlgorithm,
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Malformed(err.to_string()),
        }
    }
}

/// Checks HS256 signatures with the shared secret. Tokens are issued elsewhere.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is honoured when present but not required.
        validation.required_spec_claims.clear();
        validation.leeway = 0;
        TokenVerifier {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<TokenPayload, AuthError> {
        Ok(decode::<TokenPayload>(token, &self.key, &self.validation)?.claims)
    }
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, claims: serde_json::Value) -> String {
    sign_with(jsonwebtoken::Header::default(), secret, claims)
}

#[cfg(test)]
pub(crate) fn sign_with(
    header: jsonwebtoken::Header,
    secret: &str,
    claims: serde_json::Value,
) -> String {
    use jsonwebtoken::{encode, EncodingKey};
    encode(&header, &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

/// A caller whose token signature has been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: String,
    pub name: Option<String>,
    pub role: Option<String>,
}

impl AuthUser {
    pub fn is_staff(&self) -> bool {
        self.role.as_deref() == Some(STAFF_ROLE)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(verifier) = request.rocket().state::<TokenVerifier>() else {
            return Outcome::Error((Status::InternalServerError, AuthError::NotConfigured));
        };
        let Some(token) = request.headers().get_one(TOKEN_HEADER) else {
            return Outcome::Error((Status::Unauthorized, AuthError::Missing));
        };
        match verifier.verify(token) {
            Ok(payload) => Outcome::Success(AuthUser {
                id: payload.id,
                name: payload.name,
                role: payload.role,
            }),
            Err(e) => {
                debug!(error = %e, "rejected token");
                Outcome::Error((Status::Unauthorized, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{get_current_timestamp, Header};
    use serde_json::json;

    #[test]
    fn test_verify_accepts_own_signature() {
        let verifier = TokenVerifier::new("s3cret");
        let token = sign("s3cret", json!({"id": "U1", "name": "Ana"}));
        let payload = verifier.verify(&token).unwrap();
        assert_eq!(payload.id, "U1");
        assert_eq!(payload.name.as_deref(), Some("Ana"));
        assert_eq!(payload.role, None);
    }

    #[test]
    fn test_verify_rejects_foreign_signature() {
        let token = sign("other", json!({"id": "U1"}));
        assert_eq!(
            TokenVerifier::new("s3cret").verify(&token),
            Err(AuthError::BadSignature)
        );
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let verifier = TokenVerifier::new("s3cret");
        let token = sign("s3cret", json!({"id": "U1"}));
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            crate::token::encode_segment(br#"{"id":"U2"}"#),
            parts[2]
        );
        assert_eq!(verifier.verify(&forged), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_verify_rejects_expired() {
        let verifier = TokenVerifier::new("s3cret");
        let now = get_current_timestamp();
        let live = sign("s3cret", json!({"id": "U1", "exp": now + 3600}));
        assert_eq!(verifier.verify(&live).unwrap().id, "U1");
        let stale = sign("s3cret", json!({"id": "U1", "exp": now - 3600}));
        assert_eq!(verifier.verify(&stale), Err(AuthError::Expired));
    }

    #[test]
    fn test_verify_rejects_other_algorithms() {
        let verifier = TokenVerifier::new("s3cret");
        let token = sign_with(Header::new(Algorithm::HS512), "s3cret", json!({"id": "U1"}));
        assert_eq!(verifier.verify(&token), Err(AuthError::UnsupportedAlgorithm));

        let unsigned = format!(
            "{}.{}.",
            crate::token::encode_segment(br#"{"alg":"none"}"#),
            crate::token::encode_segment(br#"{"id":"U1"}"#)
        );
        assert!(matches!(
            verifier.verify(&unsigned),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn test_staff_role() {
        let staff = AuthUser {
            id: "S1".to_string(),
            name: None,
            role: Some(STAFF_ROLE.to_string()),
        };
        assert!(staff.is_staff());
    }
}
