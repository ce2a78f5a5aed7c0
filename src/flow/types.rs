//! Request and response types for the verification service. Request bodies carry
//! passwords and one-time codes, so they are built only at send time and never
//! logged.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Primary credential submission.
#[derive(Debug)]
pub struct PrimaryRequest {
    pub username: String,
    pub password: SecretString,
    pub captcha_token: Option<String>,
}

/// Two-factor submission. The OAuth variant has no room for a password or a
/// captcha token.
#[derive(Debug)]
pub enum TwoFactorRequest {
    Password {
        username: String,
        password: SecretString,
        code: String,
        captcha_token: Option<String>,
    },
    OAuth {
        oauth_token: SecretString,
        code: String,
    },
}

/// Everything the verification service accepts.
#[derive(Debug)]
pub enum VerifyRequest {
    Primary(PrimaryRequest),
    TwoFactor(TwoFactorRequest),
}

impl VerifyRequest {
    /// Whether this request was sent with a bot-check token attached.
    #[must_use]
    pub fn carries_captcha(&self) -> bool {
        match self {
            Self::Primary(request) => request.captcha_token.is_some(),
            Self::TwoFactor(TwoFactorRequest::Password { captcha_token, .. }) => {
                captcha_token.is_some()
            }
            Self::TwoFactor(TwoFactorRequest::OAuth { .. }) => false,
        }
    }

    /// Borrowed JSON body for this request.
    #[must_use]
    pub fn body(&self) -> RequestBody<'_> {
        match self {
            Self::Primary(request) => RequestBody::Primary {
                username: &request.username,
                password: request.password.expose_secret(),
                captcha_token: request.captcha_token.as_deref(),
            },
            Self::TwoFactor(TwoFactorRequest::Password {
                username,
                password,
                code,
                captcha_token,
            }) => RequestBody::PasswordTwoFactor {
                username,
                password: password.expose_secret(),
                code,
                captcha_token: captcha_token.as_deref(),
            },
            Self::TwoFactor(TwoFactorRequest::OAuth { oauth_token, code }) => {
                RequestBody::OAuthTwoFactor {
                    oauth_token: oauth_token.expose_secret(),
                    code,
                }
            }
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum RequestBody<'a> {
    Primary {
        username: &'a str,
        password: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        captcha_token: Option<&'a str>,
    },
    PasswordTwoFactor {
        username: &'a str,
        password: &'a str,
        code: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        captcha_token: Option<&'a str>,
    },
    OAuthTwoFactor {
        oauth_token: &'a str,
        code: &'a str,
    },
}

/// Success payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginBody {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<bool>,
}

impl LoginBody {
    #[must_use]
    pub fn requires_two_factor(&self) -> bool {
        self.security.unwrap_or(false)
    }
}

/// Response envelope returned for every request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ApiResponse {
    #[serde(rename = "DONE")]
    Done { body: LoginBody },
    #[serde(rename = "ERROR", rename_all = "camelCase")]
    Error {
        #[serde(default)]
        error_code: serde_json::Value,
        #[serde(default)]
        error_message: String,
    },
}

/// Application-level result of a verification call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Accepted(LoginBody),
    Rejected,
}

impl From<ApiResponse> for VerifyOutcome {
    fn from(response: ApiResponse) -> Self {
        match response {
            ApiResponse::Done { body } => Self::Accepted(body),
            ApiResponse::Error { .. } => Self::Rejected,
        }
    }
}
