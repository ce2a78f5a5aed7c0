use std::fmt;
use thiserror::Error;

pub const MSG_INVALID_CREDENTIALS: &str = "Invalid username or password.";
pub const MSG_INVALID_CODE: &str = "Invalid verification code.";
pub const MSG_LOCKOUT: &str = "Too many failed attempts. Please try again later.";
pub const MSG_MISSING_CREDENTIALS: &str = "Enter your username and password.";
pub const MSG_CAPTCHA_REQUIRED: &str = "Complete the bot check before signing in.";
pub const MSG_CODE_SHAPE: &str = "Enter the 6-digit verification code.";
pub const MSG_SUCCESS: &str = "Verification complete. Redirecting...";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local input was empty or malformed; nothing was sent.
    Validation,
    /// Refused locally while a lockout is active; nothing was sent.
    Lockout,
    InvalidCredentials,
    InvalidCode,
    /// The operation does not apply to the current stage.
    InvalidStage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Lockout => "lockout",
            ErrorKind::InvalidCredentials => "invalid_credentials",
            ErrorKind::InvalidCode => "invalid_code",
            ErrorKind::InvalidStage => "invalid_stage",
        };
        formatter.write_str(name)
    }
}

/// User-facing failure of a controller operation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct FlowError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FlowError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn lockout() -> Self {
        Self::new(ErrorKind::Lockout, MSG_LOCKOUT)
    }
}

/// Failure to get an answer out of the verification service.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response status: {0}")]
    Status(u16),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_error_displays_message_only() {
        let err = FlowError::new(ErrorKind::InvalidCredentials, MSG_INVALID_CREDENTIALS);
        assert_eq!(err.to_string(), "Invalid username or password.");
        assert_eq!(FlowError::lockout().kind, ErrorKind::Lockout);
    }

    #[test]
    fn lockout_message_does_not_leak_unlock_time() {
        assert!(!MSG_LOCKOUT.chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn generic_messages_do_not_name_a_field() {
        // One message for both fields, so neither "username" nor "password" is
        // singled out as wrong.
        assert!(MSG_INVALID_CREDENTIALS.contains("username or password"));
    }

    #[test]
    fn kind_display_is_snake_case() {
        assert_eq!(ErrorKind::InvalidStage.to_string(), "invalid_stage");
        assert_eq!(VerifyError::Status(502).to_string(), "unexpected response status: 502");
    }
}
