use std::str::FromStr;

use anyhow::{Context, Result};
use secrecy::SecretString;

use crate::auth::debug_gate::Environment;
use crate::cli::{actions::Action, globals::GlobalArgs};

/// Turn parsed arguments into the action to execute.
///
/// # Errors
///
/// Returns an error when a required argument is missing or malformed.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one("dsn")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --dsn"))?,
        access_ttl_seconds: matches.get_one::<i64>("access-ttl").copied().unwrap_or(900),
        refresh_ttl_seconds: matches
            .get_one::<i64>("refresh-ttl")
            .copied()
            .unwrap_or(604_800),
        max_failed_attempts: matches
            .get_one::<i32>("max-failed-attempts")
            .copied()
            .unwrap_or(5),
        lockout_seconds: matches
            .get_one::<i64>("lockout-seconds")
            .copied()
            .unwrap_or(900),
    })
}

/// Build the global settings shared by every action.
///
/// # Errors
///
/// Returns an error when the environment or token secret is unusable.
pub fn globals(matches: &clap::ArgMatches) -> Result<GlobalArgs> {
    let environment = matches
        .get_one::<String>("environment")
        .map(|value| Environment::from_str(value))
        .transpose()
        .map_err(|err| anyhow::anyhow!(err))
        .context("invalid --environment")?
        .unwrap_or_default();

    let token_secret = matches
        .get_one::<String>("token-secret")
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("missing required argument: --token-secret"))?;

    let mut globals = GlobalArgs::new(environment);
    globals.set_token_secret(SecretString::from(token_secret));
    globals.notify_webhook = matches
        .get_one::<String>("notify-webhook")
        .map(String::to_string);

    Ok(globals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    fn matches_for(args: &[&str]) -> clap::ArgMatches {
        commands::new().get_matches_from(args)
    }

    #[test]
    fn builds_server_action() {
        let matches = matches_for(&[
            "tavola",
            "--dsn",
            "postgres://localhost/tavola",
            "--token-secret",
            "secret",
            "--max-failed-attempts",
            "3",
        ]);
        let action = handler(&matches).expect("handler failed");
        match action {
            Action::Server {
                port,
                dsn,
                max_failed_attempts,
                ..
            } => {
                assert_eq!(port, 8080);
                assert_eq!(dsn, "postgres://localhost/tavola");
                assert_eq!(max_failed_attempts, 3);
            }
        }
    }

    #[test]
    fn builds_globals_with_secret() {
        let matches = matches_for(&[
            "tavola",
            "--dsn",
            "postgres://localhost/tavola",
            "--token-secret",
            "super-secret",
            "--environment",
            "development",
        ]);
        let globals = globals(&matches).expect("globals failed");
        assert!(!globals.environment.is_production());
        assert_eq!(globals.token_secret.expose_secret(), "super-secret");
    }

    #[test]
    fn rejects_unknown_environment() {
        let matches = matches_for(&[
            "tavola",
            "--dsn",
            "postgres://localhost/tavola",
            "--token-secret",
            "secret",
            "--environment",
            "weird",
        ]);
        assert!(globals(&matches).is_err());
    }
}
