//! # loginflow (Credential + Two-Factor Login Attempt Controller)
//!
//! `loginflow` drives an interactive login session against a credential
//! verification service. It composes the failed-attempt ledger, the local lockout
//! window, captcha escalation and the six-digit one-time-code challenge into a
//! single state machine.
//!
//! ## Stages
//!
//! A session is always in exactly one of `CredentialEntry`, `TwoFactorChallenge`,
//! `Locked` or `Completed`. A lockout remembers the stage it interrupted and the
//! flow resumes there once the window has passed; the window is checked lazily on
//! the next action, there is no background timer.
//!
//! ## Enumeration resistance
//!
//! Rejections and transport failures share one generic message per stage, so the
//! user never learns whether the username or the password was wrong. Every
//! failure still counts toward lockout.
//!
//! ## OAuth bypass
//!
//! A session opened with an OAuth token starts at the code challenge and submits
//! `{oauth_token, code}`; the request type makes it impossible to attach a password
//! or captcha token to that variant.

pub mod cli;
pub mod flow;

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
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with("loginflow/"));
        assert!(APP_USER_AGENT.ends_with(env!("CARGO_PKG_VERSION")));
    }
}
