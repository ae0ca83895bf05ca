//! Password verification across current and historical hash formats.
//!
//! Accounts created by earlier generations of the site carry plaintext, MD5,
//! SHA-1 or SHA-256 password values. Verification tries the strong scheme
//! first when the stored value looks like one, then walks the legacy formats
//! in a fixed order. A legacy match triggers a best-effort in-request
//! migration to Argon2 so the weak value disappears without a mass-rehash
//! maintenance window.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use subtle::ConstantTimeEq;
use tracing::{Instrument, info, info_span, warn};

use super::schema::USERS_TABLE;

const STRONG_HASH_PREFIX: &str = "$argon2";

/// Which stored format matched the presented password.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchedScheme {
    Argon2,
    Plaintext,
    Md5,
    Sha1,
    Sha256,
}

impl MatchedScheme {
    #[must_use]
    pub const fn is_legacy(self) -> bool {
        !matches!(self, Self::Argon2)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Argon2 => "argon2",
            Self::Plaintext => "plaintext",
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

#[must_use]
pub fn is_strong_hash(stored: &str) -> bool {
    stored.starts_with(STRONG_HASH_PREFIX)
}

/// Check `plain` against `stored`, returning the scheme that matched.
///
/// Legacy digests are compared as lowercase hex in constant time; the
/// plaintext fallback compares raw bytes in constant time as well.
#[must_use]
pub fn verify(plain: &str, stored: &str) -> Option<MatchedScheme> {
    if is_strong_hash(stored) {
        let parsed = PasswordHash::new(stored).ok()?;
        return Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .ok()
            .map(|()| MatchedScheme::Argon2);
    }

    if constant_time_eq(plain.as_bytes(), stored.as_bytes()) {
        return Some(MatchedScheme::Plaintext);
    }

    let stored_hex = stored.trim().to_ascii_lowercase();
    let candidates = [
        (
            MatchedScheme::Md5,
            hex::encode(Md5::digest(plain.as_bytes())),
        ),
        (
            MatchedScheme::Sha1,
            hex::encode(Sha1::digest(plain.as_bytes())),
        ),
        (
            MatchedScheme::Sha256,
            hex::encode(Sha256::digest(plain.as_bytes())),
        ),
    ];

    for (scheme, digest) in candidates {
        if constant_time_eq(digest.as_bytes(), stored_hex.as_bytes()) {
            return Some(scheme);
        }
    }

    None
}

/// Hash a password with the current strong scheme.
///
/// # Errors
/// Returns an error if the hasher rejects the input.
pub fn hash(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hashed| hashed.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

/// Replace a legacy hash with a strong one, best effort.
///
/// Called inline from the login path after a legacy match; failure is logged
/// and never fails the login. `password_column` comes from the schema
/// capability snapshot, never from user input.
pub async fn migrate_to_strong(
    pool: &PgPool,
    password_column: &str,
    account_id: i64,
    plain: &str,
) {
    let strong = match hash(plain) {
        Ok(strong) => strong,
        Err(err) => {
            warn!("Password migration skipped for account {account_id}: {err}");
            return;
        }
    };

    let query = format!("UPDATE {USERS_TABLE} SET {password_column} = $1 WHERE id = $2");
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = %query
    );
    match sqlx::query(&query)
        .bind(&strong)
        .bind(account_id)
        .execute(pool)
        .instrument(span)
        .await
    {
        Ok(_) => info!("Migrated legacy password hash for account {account_id}"),
        Err(err) => warn!("Password migration failed for account {account_id}: {err}"),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    // Length is not secret here; ct_eq needs equal-length slices.
    a.len() == b.len() && a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSWORD: &str = "demo123";

    #[test]
    fn verifies_argon2_hash() {
        let stored = hash(PASSWORD).expect("hashing failed");
        assert!(is_strong_hash(&stored));
        assert_eq!(verify(PASSWORD, &stored), Some(MatchedScheme::Argon2));
        assert_eq!(verify("wrong", &stored), None);
    }

    #[test]
    fn verifies_legacy_plaintext() {
        assert_eq!(verify(PASSWORD, PASSWORD), Some(MatchedScheme::Plaintext));
    }

    #[test]
    fn verifies_legacy_md5() {
        let stored = hex::encode(Md5::digest(PASSWORD.as_bytes()));
        assert_eq!(verify(PASSWORD, &stored), Some(MatchedScheme::Md5));
    }

    #[test]
    fn verifies_legacy_sha1() {
        let stored = hex::encode(Sha1::digest(PASSWORD.as_bytes()));
        assert_eq!(verify(PASSWORD, &stored), Some(MatchedScheme::Sha1));
    }

    #[test]
    fn verifies_legacy_sha256() {
        let stored = hex::encode(Sha256::digest(PASSWORD.as_bytes()));
        assert_eq!(verify(PASSWORD, &stored), Some(MatchedScheme::Sha256));
    }

    #[test]
    fn legacy_digests_match_uppercase_hex() {
        let stored = hex::encode(Sha256::digest(PASSWORD.as_bytes())).to_uppercase();
        assert_eq!(verify(PASSWORD, &stored), Some(MatchedScheme::Sha256));
    }

    #[test]
    fn rejects_wrong_password_on_every_scheme() {
        let schemes = [
            PASSWORD.to_string(),
            hex::encode(Md5::digest(PASSWORD.as_bytes())),
            hex::encode(Sha1::digest(PASSWORD.as_bytes())),
            hex::encode(Sha256::digest(PASSWORD.as_bytes())),
        ];
        for stored in schemes {
            assert_eq!(verify("not-the-password", &stored), None);
        }
    }

    #[test]
    fn migrated_hash_no_longer_matches_legacy_path() {
        // Once the stored value is strong, the legacy chain is skipped:
        // an attacker presenting the old MD5 digest as the password fails.
        let md5_digest = hex::encode(Md5::digest(PASSWORD.as_bytes()));
        let migrated = hash(PASSWORD).expect("hashing failed");
        assert_eq!(verify(&md5_digest, &migrated), None);
        assert_eq!(verify(PASSWORD, &migrated), Some(MatchedScheme::Argon2));
    }

    #[test]
    fn scheme_flags_legacy_formats() {
        assert!(!MatchedScheme::Argon2.is_legacy());
        assert!(MatchedScheme::Plaintext.is_legacy());
        assert!(MatchedScheme::Md5.is_legacy());
        assert!(MatchedScheme::Sha1.is_legacy());
        assert!(MatchedScheme::Sha256.is_legacy());
    }
}
