use crate::api;
use crate::auth::AuthConfig;
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;

/// Handle the server action
///
/// # Errors
///
/// Returns an error when the server fails to start.
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            access_ttl_seconds,
            refresh_ttl_seconds,
            max_failed_attempts,
            lockout_seconds,
        } => {
            let auth_config = AuthConfig::new(globals.environment)
                .with_access_ttl_seconds(access_ttl_seconds)
                .with_refresh_ttl_seconds(refresh_ttl_seconds)
                .with_max_failed_attempts(max_failed_attempts)
                .with_lockout_seconds(lockout_seconds);

            api::new(port, dsn, globals, auth_config).await?;
        }
    }

    Ok(())
}
