//! HS256 join tokens.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token secret is not configured")]
    MissingSecret,

    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub role: String,
    pub room_id: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(
        user_id: impl Into<String>,
        role: impl Into<String>,
        room_id: impl Into<String>,
        issued_at: i64,
        ttl_secs: u64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
            room_id: room_id.into(),
            iat: issued_at,
            exp: issued_at.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX)),
        }
    }
}

fn require_secret(secret: &str) -> Result<&[u8], TokenError> {
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }
    Ok(secret.as_bytes())
}

pub fn sign(claims: &Claims, secret: &str) -> Result<String, TokenError> {
    let key = EncodingKey::from_secret(require_secret(secret)?);
    Ok(jsonwebtoken::encode(&Header::default(), claims, &key)?)
}

/// Check the algorithm, signature and expiry of `token`.
pub fn verify(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let key = DecodingKey::from_secret(require_secret(secret)?);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    jsonwebtoken::decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Jwt(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        Claims::new("u1", "host", "room-1", chrono::Utc::now().timestamp(), 3600)
    }

    #[test]
    fn exp_is_iat_plus_ttl() {
        let c = claims();
        assert_eq!(c.exp - c.iat, 3600);
    }

    #[test]
    fn signed_token_verifies() {
        let c = claims();
        let token = sign(&c, "s3cret").unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert!(!token.contains('='));
        assert_eq!(verify(&token, "s3cret").unwrap(), c);
    }

    #[test]
    fn header_is_hs256() {
        let token = sign(&claims(), "s3cret").unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn claims_are_camel_case() {
        let json = serde_json::to_value(claims()).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["roomId"], "room-1");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign(&claims(), "s3cret").unwrap();
        match verify(&token, "other") {
            Err(TokenError::Jwt(e)) => assert_eq!(e.kind(), &ErrorKind::InvalidSignature),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn other_algorithms_are_rejected() {
        let key = EncodingKey::from_secret(b"s3cret");
        let token =
            jsonwebtoken::encode(&Header::new(Algorithm::HS384), &claims(), &key).unwrap();
        match verify(&token, "s3cret") {
            Err(TokenError::Jwt(e)) => assert_eq!(e.kind(), &ErrorKind::InvalidAlgorithm),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn expired_token_is_rejected() {
        let issued = chrono::Utc::now().timestamp() - 7200;
        let token = sign(&Claims::new("u1", "host", "room-1", issued, 3600), "s3cret").unwrap();
        assert!(matches!(verify(&token, "s3cret"), Err(TokenError::Expired)));
    }

    #[test]
    fn empty_secret_cannot_sign() {
        assert!(matches!(sign(&claims(), ""), Err(TokenError::MissingSecret)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            verify("not-a-token", "s3cret"),
            Err(TokenError::Jwt(_))
        ));
    }
}
