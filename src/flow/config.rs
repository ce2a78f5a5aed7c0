//! Thresholds, timings and endpoints for a login session.
//!
//! Every value has a documented default so the CLI and tests only override what
//! they care about. `validate` rejects combinations that would make captcha
//! escalation unreachable.

use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_CAPTCHA_THRESHOLD: u32 = 3;
pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 5;
pub const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);
pub const MAX_LOCKOUT_DURATION: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_REDIRECT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_LOGIN_PATH: &str = "/api/login";
pub const DEFAULT_TWO_FACTOR_PATH: &str = "/api/login/security";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("captcha threshold must be at least 1")]
    ZeroCaptchaThreshold,
    #[error("captcha threshold ({captcha}) must be lower than lockout threshold ({lockout})")]
    CaptchaNotBelowLockout { captcha: u32, lockout: u32 },
    #[error("lockout duration must not be zero")]
    ZeroLockoutDuration,
    #[error("lockout duration ({0:?}) must not exceed one day")]
    LockoutTooLong(Duration),
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

/// Escalation thresholds for the attempt ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerConfig {
    captcha_threshold: u32,
    lockout_threshold: u32,
    lockout_duration: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            captcha_threshold: DEFAULT_CAPTCHA_THRESHOLD,
            lockout_threshold: DEFAULT_LOCKOUT_THRESHOLD,
            lockout_duration: DEFAULT_LOCKOUT_DURATION,
        }
    }

    #[must_use]
    pub fn with_captcha_threshold(mut self, threshold: u32) -> Self {
        self.captcha_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_lockout_threshold(mut self, threshold: u32) -> Self {
        self.lockout_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_lockout_duration(mut self, duration: Duration) -> Self {
        self.lockout_duration = duration;
        self
    }

    #[must_use]
    pub fn captcha_threshold(&self) -> u32 {
        self.captcha_threshold
    }

    #[must_use]
    pub fn lockout_threshold(&self) -> u32 {
        self.lockout_threshold
    }

    #[must_use]
    pub fn lockout_duration(&self) -> Duration {
        self.lockout_duration
    }

    /// # Errors
    /// Returns a `ConfigError` when the captcha step could never trigger before a
    /// lockout, or when the lockout window is empty or longer than a day.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.captcha_threshold == 0 {
            return Err(ConfigError::ZeroCaptchaThreshold);
        }
        if self.captcha_threshold >= self.lockout_threshold {
            return Err(ConfigError::CaptchaNotBelowLockout {
                captcha: self.captcha_threshold,
                lockout: self.lockout_threshold,
            });
        }
        if self.lockout_duration.is_zero() {
            return Err(ConfigError::ZeroLockoutDuration);
        }
        if self.lockout_duration > MAX_LOCKOUT_DURATION {
            return Err(ConfigError::LockoutTooLong(self.lockout_duration));
        }
        Ok(())
    }
}

/// Controller settings.
#[derive(Clone, Copy, Debug)]
pub struct FlowConfig {
    ledger: LedgerConfig,
    redirect_delay: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ledger: LedgerConfig::new(),
            redirect_delay: DEFAULT_REDIRECT_DELAY,
        }
    }

    #[must_use]
    pub fn with_ledger(mut self, ledger: LedgerConfig) -> Self {
        self.ledger = ledger;
        self
    }

    /// How long the success message stays visible before navigation is signalled.
    #[must_use]
    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    #[must_use]
    pub fn ledger(&self) -> LedgerConfig {
        self.ledger
    }

    #[must_use]
    pub fn redirect_delay(&self) -> Duration {
        self.redirect_delay
    }

    /// # Errors
    /// See [`LedgerConfig::validate`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ledger.validate()
    }
}

/// Where the verification service lives.
#[derive(Clone, Debug)]
pub struct VerifierConfig {
    base_url: Url,
    login_path: String,
    two_factor_path: String,
    timeout: Duration,
}

impl VerifierConfig {
    /// # Errors
    /// Returns `ConfigError::Endpoint` if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let base_url =
            Url::parse(base_url.trim()).map_err(|err| ConfigError::Endpoint(err.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::Endpoint(format!(
                "unsupported scheme: {}",
                base_url.scheme()
            )));
        }

        Ok(Self {
            base_url,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            two_factor_path: DEFAULT_TWO_FACTOR_PATH.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_login_path(mut self, path: &str) -> Self {
        self.login_path = path.to_string();
        self
    }

    #[must_use]
    pub fn with_two_factor_path(mut self, path: &str) -> Self {
        self.two_factor_path = path.to_string();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// # Errors
    /// Returns a `url::ParseError` if the login path cannot be joined.
    pub fn login_url(&self) -> Result<Url, url::ParseError> {
        self.base_url.join(&self.login_path)
    }

    /// # Errors
    /// Returns a `url::ParseError` if the two-factor path cannot be joined.
    pub fn two_factor_url(&self) -> Result<Url, url::ParseError> {
        self.base_url.join(&self.two_factor_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = FlowConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.ledger().captcha_threshold(), 3);
        assert_eq!(config.ledger().lockout_threshold(), 5);
        assert_eq!(config.redirect_delay(), Duration::from_secs(1));
    }

    #[test]
    fn captcha_must_trigger_before_lockout() {
        let config = LedgerConfig::new()
            .with_captcha_threshold(5)
            .with_lockout_threshold(5);
        assert_eq!(
            config.validate(),
            Err(ConfigError::CaptchaNotBelowLockout {
                captcha: 5,
                lockout: 5
            })
        );
        assert_eq!(
            LedgerConfig::new().with_captcha_threshold(0).validate(),
            Err(ConfigError::ZeroCaptchaThreshold)
        );
        assert_eq!(
            LedgerConfig::new()
                .with_lockout_duration(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroLockoutDuration)
        );
    }

    #[test]
    fn lockout_longer_than_a_day_is_rejected() {
        assert_eq!(
            LedgerConfig::new()
                .with_lockout_duration(Duration::MAX)
                .validate(),
            Err(ConfigError::LockoutTooLong(Duration::MAX))
        );
        assert_eq!(
            LedgerConfig::new()
                .with_lockout_duration(MAX_LOCKOUT_DURATION)
                .validate(),
            Ok(())
        );
    }

    #[test]
    fn verifier_urls_join_paths() -> anyhow::Result<()> {
        let config = VerifierConfig::new(" https://auth.example.com ")?
            .with_two_factor_path("/v2/login/otp");
        assert_eq!(
            config.login_url()?.as_str(),
            "https://auth.example.com/api/login"
        );
        assert_eq!(
            config.two_factor_url()?.as_str(),
            "https://auth.example.com/v2/login/otp"
        );
        Ok(())
    }

    #[test]
    fn verifier_rejects_non_http_endpoints() {
        assert!(matches!(
            VerifierConfig::new("ftp://auth.example.com"),
            Err(ConfigError::Endpoint(_))
        ));
        assert!(matches!(
            VerifierConfig::new("not a url"),
            Err(ConfigError::Endpoint(_))
        ));
    }
}
