//! Shared authentication state injected into the handler chain.

use secrecy::SecretString;
use sqlx::PgPool;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::RwLock;

use super::debug_gate::Environment;
use super::lockout::{DEFAULT_LOCKOUT_SECONDS, DEFAULT_MAX_FAILED_ATTEMPTS, LockoutPolicy};
use super::schema::{SchemaCache, SchemaCapabilities};
use super::token::TokenKeys;
use crate::notify::NotificationSender;

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone, Copy, Debug)]
pub struct AuthConfig {
    environment: Environment,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    max_failed_attempts: i32,
    lockout_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub const fn new(environment: Environment) -> Self {
        Self {
            environment,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout_seconds: DEFAULT_LOCKOUT_SECONDS,
        }
    }

    #[must_use]
    pub const fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_max_failed_attempts(mut self, attempts: i32) -> Self {
        self.max_failed_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn with_lockout_seconds(mut self, seconds: i64) -> Self {
        self.lockout_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub const fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub const fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub const fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy::new(self.max_failed_attempts, self.lockout_seconds)
    }
}

/// Process-wide authentication state: config, signing keys, schema cache and
/// the notification collaborator.
pub struct AuthState {
    config: AuthConfig,
    keys: TokenKeys,
    schema: SchemaCache,
    capabilities: RwLock<Option<Arc<SchemaCapabilities>>>,
    generation: AtomicU64,
    notifier: Arc<dyn NotificationSender>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        token_secret: &SecretString,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            config,
            keys: TokenKeys::new(token_secret),
            schema: SchemaCache::new(),
            capabilities: RwLock::new(None),
            generation: AtomicU64::new(0),
            notifier,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub const fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    #[must_use]
    pub const fn schema(&self) -> &SchemaCache {
        &self.schema
    }

    #[must_use]
    pub fn notifier(&self) -> Arc<dyn NotificationSender> {
        self.notifier.clone()
    }

    /// The capability snapshot for this pool, detecting it on first use.
    ///
    /// An unusable snapshot (no identity or password column, which is also
    /// what a store outage during detection produces) is returned but not
    /// cached, so the next request re-detects instead of pinning login to a
    /// configuration error.
    pub async fn capabilities(&self, pool: &PgPool) -> Arc<SchemaCapabilities> {
        let cached = self.capabilities.read().await.clone();
        if let Some(caps) = cached {
            return caps;
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let caps = Arc::new(SchemaCapabilities::detect(pool, &self.schema, generation).await);
        if caps.usable() {
            *self.capabilities.write().await = Some(caps.clone());
        }
        caps
    }

    /// Drop the cached snapshot, forcing re-detection on the next request.
    pub async fn invalidate_capabilities(&self) {
        *self.capabilities.write().await = None;
        self.schema.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = AuthConfig::new(Environment::Production);
        assert_eq!(config.access_ttl_seconds(), 900);
        assert_eq!(config.refresh_ttl_seconds(), 604_800);
        let policy = config.lockout_policy();
        assert_eq!(policy.max_attempts, DEFAULT_MAX_FAILED_ATTEMPTS);
        assert_eq!(policy.lockout_seconds, DEFAULT_LOCKOUT_SECONDS);
    }

    #[test]
    fn config_builders() {
        let config = AuthConfig::new(Environment::Development)
            .with_access_ttl_seconds(60)
            .with_refresh_ttl_seconds(120)
            .with_max_failed_attempts(3)
            .with_lockout_seconds(30);
        assert_eq!(config.access_ttl_seconds(), 60);
        assert_eq!(config.refresh_ttl_seconds(), 120);
        assert_eq!(config.lockout_policy().max_attempts, 3);
        assert_eq!(config.lockout_policy().lockout_seconds, 30);
        assert!(!config.environment().is_production());
    }
}
