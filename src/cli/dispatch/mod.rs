use crate::cli::{
    actions::{login::Args, Action},
    commands::{
        ARG_CAPTCHA_THRESHOLD, ARG_ENDPOINT, ARG_LOCKOUT_SECONDS, ARG_LOCKOUT_THRESHOLD,
        ARG_LOGIN_PATH, ARG_NEXT, ARG_OAUTH_TOKEN, ARG_REDIRECT_DELAY, ARG_TIMEOUT,
        ARG_TWO_FACTOR_PATH, ARG_USERNAME,
    },
};
use crate::flow::config::{
    FlowConfig, LedgerConfig, VerifierConfig, DEFAULT_CAPTCHA_THRESHOLD, DEFAULT_LOCKOUT_THRESHOLD,
    DEFAULT_LOGIN_PATH, DEFAULT_TWO_FACTOR_PATH,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;

/// # Errors
/// Returns an error if required arguments are missing or the resulting
/// configuration is invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let endpoint = matches
        .get_one::<String>(ARG_ENDPOINT)
        .context("missing required argument: --endpoint")?;

    let verifier = VerifierConfig::new(endpoint)
        .context("invalid LOGINFLOW_ENDPOINT")?
        .with_login_path(
            matches
                .get_one::<String>(ARG_LOGIN_PATH)
                .map_or(DEFAULT_LOGIN_PATH, String::as_str),
        )
        .with_two_factor_path(
            matches
                .get_one::<String>(ARG_TWO_FACTOR_PATH)
                .map_or(DEFAULT_TWO_FACTOR_PATH, String::as_str),
        )
        .with_timeout(Duration::from_secs(
            matches.get_one::<u64>(ARG_TIMEOUT).copied().unwrap_or(10),
        ));

    let ledger = LedgerConfig::new()
        .with_captcha_threshold(
            matches
                .get_one::<u32>(ARG_CAPTCHA_THRESHOLD)
                .copied()
                .unwrap_or(DEFAULT_CAPTCHA_THRESHOLD),
        )
        .with_lockout_threshold(
            matches
                .get_one::<u32>(ARG_LOCKOUT_THRESHOLD)
                .copied()
                .unwrap_or(DEFAULT_LOCKOUT_THRESHOLD),
        )
        .with_lockout_duration(Duration::from_secs(
            matches.get_one::<u64>(ARG_LOCKOUT_SECONDS).copied().unwrap_or(300),
        ));

    let flow = FlowConfig::new()
        .with_ledger(ledger)
        .with_redirect_delay(Duration::from_millis(
            matches.get_one::<u64>(ARG_REDIRECT_DELAY).copied().unwrap_or(1000),
        ));
    flow.validate().context("invalid attempt thresholds")?;

    let oauth_token = matches
        .get_one::<String>(ARG_OAUTH_TOKEN)
        .filter(|token| !token.trim().is_empty())
        .map(|token| SecretString::from(token.clone()));

    Ok(Action::Login(Args {
        verifier,
        flow,
        username: matches.get_one::<String>(ARG_USERNAME).cloned(),
        oauth_token,
        next: matches.get_one::<String>(ARG_NEXT).cloned(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    const CLEAN_ENV: [(&str, Option<&str>); 6] = [
        ("LOGINFLOW_ENDPOINT", None),
        ("LOGINFLOW_USERNAME", None),
        ("LOGINFLOW_OAUTH_TOKEN", None),
        ("LOGINFLOW_NEXT", None),
        ("LOGINFLOW_CAPTCHA_THRESHOLD", None),
        ("LOGINFLOW_LOCKOUT_THRESHOLD", None),
    ];

    fn login_args(args: &[&str]) -> Result<Args> {
        let matches = commands::new().try_get_matches_from(args)?;
        match handler(&matches)? {
            Action::Login(args) => Ok(args),
        }
    }

    #[test]
    fn test_handler_defaults() -> Result<()> {
        temp_env::with_vars(CLEAN_ENV, || -> Result<()> {
            let args = login_args(&["loginflow", "--endpoint", "https://auth.tld"])?;

            assert_eq!(
                args.verifier.login_url()?.as_str(),
                "https://auth.tld/api/login"
            );
            assert_eq!(
                args.verifier.two_factor_url()?.as_str(),
                "https://auth.tld/api/login/security"
            );
            assert_eq!(args.verifier.timeout(), Duration::from_secs(10));
            assert_eq!(args.flow.ledger().captcha_threshold(), 3);
            assert_eq!(args.flow.ledger().lockout_threshold(), 5);
            assert_eq!(args.flow.ledger().lockout_duration(), Duration::from_secs(300));
            assert_eq!(args.flow.redirect_delay(), Duration::from_secs(1));
            assert!(args.username.is_none());
            assert!(args.oauth_token.is_none());
            assert!(args.next.is_none());
            Ok(())
        })
    }

    #[test]
    fn test_handler_overrides() -> Result<()> {
        temp_env::with_vars(CLEAN_ENV, || -> Result<()> {
            let args = login_args(&[
                "loginflow",
                "--endpoint",
                "http://127.0.0.1:9000",
                "--username",
                "alice",
                "--oauth-token",
                "tok-1",
                "--next",
                "/settings",
                "--lockout-threshold",
                "7",
                "--redirect-delay-ms",
                "250",
            ])?;

            assert_eq!(args.username.as_deref(), Some("alice"));
            assert_eq!(
                args.oauth_token.as_ref().map(ExposeSecret::expose_secret),
                Some("tok-1")
            );
            assert_eq!(args.next.as_deref(), Some("/settings"));
            assert_eq!(args.flow.ledger().lockout_threshold(), 7);
            assert_eq!(args.flow.redirect_delay(), Duration::from_millis(250));
            Ok(())
        })
    }

    #[test]
    fn test_handler_blank_oauth_token_is_ignored() -> Result<()> {
        temp_env::with_vars(CLEAN_ENV, || -> Result<()> {
            let args = login_args(&[
                "loginflow",
                "--endpoint",
                "https://auth.tld",
                "--oauth-token",
                "  ",
            ])?;
            assert!(args.oauth_token.is_none());
            Ok(())
        })
    }

    #[test]
    fn test_handler_rejects_bad_endpoint() {
        temp_env::with_vars(CLEAN_ENV, || {
            let result = login_args(&["loginflow", "--endpoint", "ftp://auth.tld"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_handler_rejects_zero_lockout_threshold() {
        temp_env::with_vars(CLEAN_ENV, || {
            let result = login_args(&[
                "loginflow",
                "--endpoint",
                "https://auth.tld",
                "--lockout-threshold",
                "0",
            ]);
            assert!(result.is_err());
        });
    }
}
