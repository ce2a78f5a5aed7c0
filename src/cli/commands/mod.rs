pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_ENDPOINT: &str = "endpoint";
pub const ARG_USERNAME: &str = "username";
pub const ARG_OAUTH_TOKEN: &str = "oauth-token";
pub const ARG_NEXT: &str = "next";
pub const ARG_LOGIN_PATH: &str = "login-path";
pub const ARG_TWO_FACTOR_PATH: &str = "two-factor-path";
pub const ARG_TIMEOUT: &str = "timeout";
pub const ARG_CAPTCHA_THRESHOLD: &str = "captcha-threshold";
pub const ARG_LOCKOUT_THRESHOLD: &str = "lockout-threshold";
pub const ARG_LOCKOUT_SECONDS: &str = "lockout-seconds";
pub const ARG_REDIRECT_DELAY: &str = "redirect-delay-ms";

const MAX_LOCKOUT_SECONDS: u64 = crate::flow::config::MAX_LOCKOUT_DURATION.as_secs();

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let command = Command::new("loginflow")
        .about("Credential and two-factor login")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_ENDPOINT)
                .short('e')
                .long("endpoint")
                .help("Verification service base URL, example: https://auth.tld")
                .env("LOGINFLOW_ENDPOINT")
                .required(true),
        )
        .arg(
            Arg::new(ARG_USERNAME)
                .short('u')
                .long("username")
                .help("Username to prefill on the credential form")
                .env("LOGINFLOW_USERNAME"),
        )
        .arg(
            Arg::new(ARG_OAUTH_TOKEN)
                .long("oauth-token")
                .help("OAuth token; skips the credential form and goes straight to the code")
                .env("LOGINFLOW_OAUTH_TOKEN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_NEXT)
                .long("next")
                .help("Destination after login, overrides the one returned by the service")
                .env("LOGINFLOW_NEXT"),
        )
        .arg(
            Arg::new(ARG_LOGIN_PATH)
                .long("login-path")
                .help("Path of the credential endpoint")
                .default_value(crate::flow::config::DEFAULT_LOGIN_PATH)
                .env("LOGINFLOW_LOGIN_PATH"),
        )
        .arg(
            Arg::new(ARG_TWO_FACTOR_PATH)
                .long("two-factor-path")
                .help("Path of the one-time code endpoint")
                .default_value(crate::flow::config::DEFAULT_TWO_FACTOR_PATH)
                .env("LOGINFLOW_TWO_FACTOR_PATH"),
        )
        .arg(
            Arg::new(ARG_TIMEOUT)
                .long("timeout")
                .help("Request timeout in seconds")
                .default_value("10")
                .env("LOGINFLOW_TIMEOUT")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_CAPTCHA_THRESHOLD)
                .long("captcha-threshold")
                .help("Failed credential attempts before a captcha token is required")
                .default_value("3")
                .env("LOGINFLOW_CAPTCHA_THRESHOLD")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_THRESHOLD)
                .long("lockout-threshold")
                .help("Failed attempts on either form before a temporary lockout")
                .default_value("5")
                .env("LOGINFLOW_LOCKOUT_THRESHOLD")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_SECONDS)
                .long("lockout-seconds")
                .help("Lockout duration in seconds, at most one day")
                .default_value("300")
                .env("LOGINFLOW_LOCKOUT_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_LOCKOUT_SECONDS)),
        )
        .arg(
            Arg::new(ARG_REDIRECT_DELAY)
                .long("redirect-delay-ms")
                .help("How long the success message is shown before completing")
                .default_value("1000")
                .env("LOGINFLOW_REDIRECT_DELAY_MS")
                .value_parser(clap::value_parser!(u64)),
        );

    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "loginflow");
        assert_eq!(
            command.get_about().unwrap().to_string(),
            "Credential and two-factor login"
        );
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(
            [
                ("LOGINFLOW_ENDPOINT", None::<&str>),
                ("LOGINFLOW_CAPTCHA_THRESHOLD", None),
                ("LOGINFLOW_LOCKOUT_THRESHOLD", None),
                ("LOGINFLOW_LOCKOUT_SECONDS", None),
                ("LOGINFLOW_REDIRECT_DELAY_MS", None),
            ],
            || {
                let matches = new().get_matches_from(vec![
                    "loginflow",
                    "--endpoint",
                    "https://auth.tld",
                ]);

                assert_eq!(
                    matches.get_one::<String>(ARG_ENDPOINT).map(String::as_str),
                    Some("https://auth.tld")
                );
                assert_eq!(matches.get_one::<u32>(ARG_CAPTCHA_THRESHOLD).copied(), Some(3));
                assert_eq!(matches.get_one::<u32>(ARG_LOCKOUT_THRESHOLD).copied(), Some(5));
                assert_eq!(matches.get_one::<u64>(ARG_LOCKOUT_SECONDS).copied(), Some(300));
                assert_eq!(matches.get_one::<u64>(ARG_REDIRECT_DELAY).copied(), Some(1000));
                assert_eq!(matches.get_one::<String>(ARG_OAUTH_TOKEN), None);
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("LOGINFLOW_ENDPOINT", Some("https://auth.tld")),
                ("LOGINFLOW_USERNAME", Some("alice")),
                ("LOGINFLOW_LOCKOUT_THRESHOLD", Some("8")),
                ("LOGINFLOW_NEXT", Some("/settings")),
                ("LOGINFLOW_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["loginflow"]);
                assert_eq!(
                    matches.get_one::<String>(ARG_USERNAME).map(String::as_str),
                    Some("alice")
                );
                assert_eq!(matches.get_one::<u32>(ARG_LOCKOUT_THRESHOLD).copied(), Some(8));
                assert_eq!(
                    matches.get_one::<String>(ARG_NEXT).map(String::as_str),
                    Some("/settings")
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = vec!["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("LOGINFLOW_LOG_LEVEL", Some(level)),
                    ("LOGINFLOW_ENDPOINT", Some("https://auth.tld")),
                ],
                || {
                    let matches = new().get_matches_from(vec!["loginflow"]);
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        Some(index as u8)
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5_usize {
            temp_env::with_vars([("LOGINFLOW_LOG_LEVEL", None::<String>)], || {
                let mut args = vec![
                    "loginflow".to_string(),
                    "--endpoint".to_string(),
                    "https://auth.tld".to_string(),
                ];

                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(index as u8)
                );
            });
        }
    }

    #[test]
    fn test_rejects_unbounded_lockout_seconds() {
        temp_env::with_vars([("LOGINFLOW_LOCKOUT_SECONDS", None::<&str>)], || {
            for seconds in ["0", "86401", "18446744073709551615"] {
                let result = new().try_get_matches_from(vec![
                    "loginflow",
                    "--endpoint",
                    "https://auth.tld",
                    "--lockout-seconds",
                    seconds,
                ]);
                assert!(result.is_err(), "{seconds} should be rejected");
            }

            let matches = new().get_matches_from(vec![
                "loginflow",
                "--endpoint",
                "https://auth.tld",
                "--lockout-seconds",
                "86400",
            ]);
            assert_eq!(matches.get_one::<u64>(ARG_LOCKOUT_SECONDS).copied(), Some(86_400));
        });
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let result = new().try_get_matches_from(vec![
            "loginflow",
            "--endpoint",
            "https://auth.tld",
            "--timeout",
            "0",
        ]);
        assert!(result.is_err());
    }
}
