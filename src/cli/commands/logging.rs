//! `-v` / `LOGINFLOW_LOG_LEVEL` handling.

use clap::{builder::ValueParser, Arg, ArgMatches, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

const LEVELS: [(&str, Level); 5] = [
    ("error", Level::ERROR),
    ("warn", Level::WARN),
    ("info", Level::INFO),
    ("debug", Level::DEBUG),
    ("trace", Level::TRACE),
];

/// Accepts a level name or its position in `LEVELS`; anything past `trace` is
/// clamped to it.
#[must_use]
pub fn level_parser() -> ValueParser {
    ValueParser::from(|raw: &str| -> Result<u8, String> {
        if let Ok(count) = raw.parse::<u8>() {
            return Ok(count.min(4));
        }
        LEVELS
            .iter()
            .position(|(name, _)| name.eq_ignore_ascii_case(raw))
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| format!("invalid log level: {raw}"))
    })
}

/// Level selected by the counted `-v` flags or the env override. Defaults to
/// `ERROR`.
#[must_use]
pub fn verbosity_level(matches: &ArgMatches) -> Level {
    let count = matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0);
    LEVELS
        .get(usize::from(count))
        .map_or(Level::TRACE, |(_, level)| *level)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("LOGINFLOW_LOG_LEVEL")
            .global(true)
            .action(clap::ArgAction::Count)
            .value_parser(level_parser()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(args: &[&str]) -> ArgMatches {
        with_args(Command::new("loginflow")).get_matches_from(args)
    }

    #[test]
    fn test_verbosity_level_from_flags() {
        let expected = [
            Level::ERROR,
            Level::WARN,
            Level::INFO,
            Level::DEBUG,
            Level::TRACE,
            Level::TRACE,
        ];
        for (count, level) in expected.iter().enumerate() {
            temp_env::with_vars([("LOGINFLOW_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["loginflow".to_string()];
                if count > 0 {
                    args.push(format!("-{}", "v".repeat(count)));
                }
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                assert_eq!(verbosity_level(&matches(&args)), *level);
            });
        }
    }

    #[test]
    fn test_verbosity_level_from_env() {
        for (name, level) in LEVELS {
            temp_env::with_vars([("LOGINFLOW_LOG_LEVEL", Some(name.to_uppercase()))], || {
                assert_eq!(verbosity_level(&matches(&["loginflow"])), level);
            });
        }
    }

    #[test]
    fn test_level_parser_rejects_unknown_names() {
        temp_env::with_vars([("LOGINFLOW_LOG_LEVEL", Some("loud"))], || {
            let result =
                with_args(Command::new("loginflow")).try_get_matches_from(["loginflow"]);
            assert!(result.is_err());
        });
    }
}
