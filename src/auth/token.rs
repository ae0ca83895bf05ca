//! Signed session tokens: short-lived access, long-lived refresh.
//!
//! Tokens are HS256 JWTs (three base64url segments). Access and refresh
//! tokens are signed with distinct secrets; the refresh secret is derived
//! from the access secret with a domain-separation suffix, so one configured
//! secret drives both keys.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by every session token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
    #[error("unexpected token type")]
    WrongType,
}

/// Signing/verification material for both token types.
pub struct TokenKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl TokenKeys {
    #[must_use]
    pub fn new(access_secret: &SecretString) -> Self {
        let access = access_secret.expose_secret().as_bytes();
        let refresh = derive_refresh_secret(access);
        Self {
            access_encoding: EncodingKey::from_secret(access),
            access_decoding: DecodingKey::from_secret(access),
            refresh_encoding: EncodingKey::from_secret(&refresh),
            refresh_decoding: DecodingKey::from_secret(&refresh),
        }
    }

    /// Issue a token for `account_id`, stamping issued-at and expiry.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue(
        &self,
        token_type: TokenType,
        account_id: i64,
        email: &str,
        role: &str,
        ttl_seconds: i64,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            token_type,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_seconds)).timestamp(),
        };
        self.sign(&claims)
    }

    /// Sign pre-built claims. Key selection follows the `token_type` claim.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn sign(&self, claims: &Claims) -> Result<String> {
        let key = match claims.token_type {
            TokenType::Access => &self.access_encoding,
            TokenType::Refresh => &self.refresh_encoding,
        };
        encode(&Header::default(), claims, key).context("failed to sign session token")
    }

    /// Verify segment count, signature, expiry and the type claim.
    ///
    /// # Errors
    /// `Expired` when past expiry, `WrongType` on a type-claim mismatch,
    /// `Invalid` for everything else.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        if token.split('.').count() != 3 {
            return Err(TokenError::Invalid);
        }

        let key = match expected {
            TokenType::Access => &self.access_decoding,
            TokenType::Refresh => &self.refresh_decoding,
        };

        let mut validation = Validation::default();
        validation.leeway = 0;

        match decode::<Claims>(token, key, &validation) {
            Ok(data) => {
                if data.claims.token_type == expected {
                    Ok(data.claims)
                } else {
                    Err(TokenError::WrongType)
                }
            }
            Err(err) => match err.kind() {
                ErrorKind::ExpiredSignature => Err(TokenError::Expired),
                _ => Err(TokenError::Invalid),
            },
        }
    }
}

/// The refresh key is bound to the access secret, not independently random.
fn derive_refresh_secret(access: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(access);
    hasher.update(b"refresh");
    hasher.finalize().to_vec()
}

/// Hash a token for storage; the store never sees raw token material.
#[must_use]
pub fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> TokenKeys {
        TokenKeys::new(&SecretString::from("unit-test-secret".to_string()))
    }

    #[test]
    fn round_trip_recovers_claims() {
        let keys = keys();
        let token = keys
            .issue(TokenType::Access, 42, "jane@x.com", "admin", 60)
            .expect("issue failed");
        let claims = keys.verify(&token, TokenType::Access).expect("verify failed");
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "jane@x.com");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.token_type, TokenType::Access);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn rejects_wrong_segment_count() {
        let keys = keys();
        assert_eq!(
            keys.verify("only.two", TokenType::Access),
            Err(TokenError::Invalid)
        );
        assert_eq!(
            keys.verify("a.b.c.d", TokenType::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn rejects_tampered_signature() {
        let keys = keys();
        let token = keys
            .issue(TokenType::Access, 1, "a@b.c", "user", 60)
            .expect("issue failed");
        let mut parts = token.rsplitn(2, '.');
        let signature = parts.next().expect("signature segment");
        let head = parts.next().expect("header.payload");
        let tampered = format!("{head}.{}", signature.chars().rev().collect::<String>());
        assert_eq!(
            keys.verify(&tampered, TokenType::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn rejects_expired_token() {
        let keys = keys();
        let now = Utc::now();
        let claims = Claims {
            sub: "1".to_string(),
            email: "a@b.c".to_string(),
            role: "user".to_string(),
            token_type: TokenType::Access,
            iat: (now - Duration::seconds(120)).timestamp(),
            exp: (now - Duration::seconds(1)).timestamp(),
        };
        let token = keys.sign(&claims).expect("sign failed");
        assert_eq!(
            keys.verify(&token, TokenType::Access),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn access_and_refresh_keys_differ() {
        let keys = keys();
        let access = keys
            .issue(TokenType::Access, 1, "a@b.c", "user", 60)
            .expect("issue failed");
        // Signature check runs before the type claim is looked at, so a
        // cross-key verification fails as Invalid, not WrongType.
        assert_eq!(
            keys.verify(&access, TokenType::Refresh),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn wrong_type_claim_rejected_under_same_key() {
        let keys = keys();
        let now = Utc::now();
        // A refresh-type claim signed with the access key: signature passes,
        // the type claim does not.
        let claims = Claims {
            sub: "1".to_string(),
            email: "a@b.c".to_string(),
            role: "user".to_string(),
            token_type: TokenType::Refresh,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(60)).timestamp(),
        };
        let key = TokenKeys::new(&SecretString::from("unit-test-secret".to_string()));
        let forged = encode(&Header::default(), &claims, &key.access_encoding)
            .expect("encode failed");
        assert_eq!(
            keys.verify(&forged, TokenType::Access),
            Err(TokenError::WrongType)
        );
    }

    #[test]
    fn refresh_round_trip() {
        let keys = keys();
        let token = keys
            .issue(TokenType::Refresh, 7, "x@y.z", "manager", 3600)
            .expect("issue failed");
        let claims = keys
            .verify(&token, TokenType::Refresh)
            .expect("verify failed");
        assert_eq!(claims.token_type, TokenType::Refresh);
    }

    #[test]
    fn hash_token_is_stable_and_discriminating() {
        let first = hash_token("token");
        let second = hash_token("token");
        let different = hash_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
        assert_eq!(first.len(), 32);
    }
}
