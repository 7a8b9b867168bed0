//! Application access tokens.
//!
//! After a successful provider handshake the service hands the browser a
//! signed JWT; subsequent API requests authenticate with it as a Bearer
//! token. HS256 with a shared secret.

use crate::entity::user;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Claims carried by an issued access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id.
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub iss: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    lifetime_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, issuer: String, lifetime_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            lifetime_secs,
        }
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }

    /// Issue an access token for a user.
    pub fn issue(&self, user: &user::Model) -> Result<String, jsonwebtoken::errors::Error> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = AccessClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            iss: self.issuer.clone(),
            iat: now as usize,
            exp: (now + self.lifetime_secs) as usize,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);
        decode::<AccessClaims>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> user::Model {
        user::Model {
            id: "user-1".into(),
            email: Some("jo@example.com".into()),
            email_verified: true,
            name: Some("Jo".into()),
            avatar_url: None,
            created_at: OffsetDateTime::now_utc(),
            last_login_at: None,
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            "0123456789abcdef0123456789abcdef",
            "https://login.example.com".into(),
            3600,
        )
    }

    #[test]
    fn issued_token_verifies() {
        let issuer = issuer();
        let token = issuer.issue(&test_user()).unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("jo@example.com"));
        assert_eq!(claims.iss, "https://login.example.com");
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = issuer().issue(&test_user()).unwrap();
        let other = TokenIssuer::new(
            "ffffffffffffffffffffffffffffffff",
            "https://login.example.com".into(),
            3600,
        );
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn wrong_issuer_rejected() {
        let token = issuer().issue(&test_user()).unwrap();
        let other = TokenIssuer::new(
            "0123456789abcdef0123456789abcdef",
            "https://evil.example.com".into(),
            3600,
        );
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let issuer = TokenIssuer::new(
            "0123456789abcdef0123456789abcdef",
            "https://login.example.com".into(),
            -120,
        );
        let token = issuer.issue(&test_user()).unwrap();
        assert!(issuer.verify(&token).is_err());
    }
}
