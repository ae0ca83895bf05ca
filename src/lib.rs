//! # Tavola (Restaurant Content & Administration Backend)
//!
//! `tavola` is the administration backend for a single restaurant site. Content
//! management (menus, newsletters, media) lives behind thin repository wrappers;
//! the heart of the service is the adaptive authentication and session
//! subsystem:
//!
//! - **Schema-tolerant credential resolution.** The `users` table differs
//!   between deployments: some carry `email` and `username`, older ones only a
//!   legacy `login`/`identifiant` alias, loyalty-card installs a `card_number`.
//!   The resolver discovers the available identity columns at runtime and
//!   builds its lookup accordingly.
//! - **Progressive password strengthening.** Stored hashes range from Argon2
//!   down to historical plaintext/MD5/SHA-1/SHA-256 values. Legacy matches are
//!   re-hashed with Argon2 in-request, best effort.
//! - **Failed-login lockout.** Per-account counter with a fixed window; the
//!   lockout machinery never blocks an otherwise-successful authentication due
//!   to its own failure.
//! - **Stateless session tokens.** Short-lived access and long-lived refresh
//!   JWTs, signed with distinct secrets; refresh tokens are optionally recorded
//!   for revocation when the deployment has a `refresh_tokens` table.

pub mod api;
pub mod auth;
pub mod cli;
pub mod notify;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
