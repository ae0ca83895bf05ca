use secrecy::SecretString;

use crate::auth::debug_gate::Environment;

/// Process-wide settings resolved once at startup.
#[derive(Clone)]
pub struct GlobalArgs {
    pub environment: Environment,
    pub token_secret: SecretString,
    pub notify_webhook: Option<String>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            token_secret: SecretString::default(),
            notify_webhook: None,
        }
    }

    pub fn set_token_secret(&mut self, secret: SecretString) {
        self.token_secret = secret;
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("environment", &self.environment)
            .field("token_secret", &"***")
            .field("notify_webhook", &self.notify_webhook)
            .finish()
    }
}
