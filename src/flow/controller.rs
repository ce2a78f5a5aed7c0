//! Login flow controller.
//!
//! Flow Overview:
//! 1) `submit_primary` validates the form locally, then asks the verifier.
//! 2) A success either completes the flow or opens the two-factor challenge.
//! 3) `submit_two_factor` checks the code shape, then asks the verifier with the
//!    password or OAuth variant of the request.
//! 4) Failures go to the attempt ledger, which may require a captcha or lock the
//!    flow. A lockout parks the flow in `Locked` and the next action after expiry
//!    resumes the stage that was interrupted.
//!
//! The state sits behind a mutex that is never held across the network call, so a
//! go-back can run while a request is in flight. Each request remembers the epoch
//! it was issued under; a result that comes back after the epoch moved is dropped.

use secrecy::{ExposeSecret, SecretString};
use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{
    sync::watch,
    time::{sleep, Instant},
};
use tracing::{debug, info, instrument, warn};
use ulid::Ulid;

use super::{
    code::{self, CodeDigits, CODE_LENGTH, EMPTY_CODE},
    config::FlowConfig,
    error::{
        ErrorKind, FlowError, VerifyError, MSG_CAPTCHA_REQUIRED, MSG_CODE_SHAPE,
        MSG_INVALID_CODE, MSG_INVALID_CREDENTIALS, MSG_LOCKOUT, MSG_MISSING_CREDENTIALS,
        MSG_SUCCESS,
    },
    ledger::{AttemptLedger, AttemptStage},
    types::{PrimaryRequest, TwoFactorRequest, VerifyOutcome, VerifyRequest},
    verifier::Verifier,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    CredentialEntry,
    TwoFactorChallenge,
    /// Refusing submissions; `resume` is where the flow continues after expiry.
    Locked { resume: AttemptStage },
    Completed,
}

impl From<AttemptStage> for Stage {
    fn from(stage: AttemptStage) -> Self {
        match stage {
            AttemptStage::Primary => Self::CredentialEntry,
            AttemptStage::TwoFactor => Self::TwoFactorChallenge,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Error,
    Success,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowMessage {
    pub kind: MessageKind,
    pub text: String,
}

impl FlowMessage {
    fn error(text: &str) -> Self {
        Self {
            kind: MessageKind::Error,
            text: text.to_string(),
        }
    }

    fn success(text: &str) -> Self {
        Self {
            kind: MessageKind::Success,
            text: text.to_string(),
        }
    }
}

/// Caller-supplied context for one login session.
#[derive(Debug, Default)]
pub struct FlowContext {
    redirect_target: Option<String>,
    oauth_token: Option<SecretString>,
}

impl FlowContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the destination returned by the service on completion.
    #[must_use]
    pub fn with_redirect_target(mut self, target: impl Into<String>) -> Self {
        self.redirect_target = Some(target.into());
        self
    }

    /// Opens the session directly at the code challenge, identified by `token`.
    #[must_use]
    pub fn with_oauth_token(mut self, token: SecretString) -> Self {
        self.oauth_token = Some(token);
        self
    }
}

/// Primary form contents.
#[derive(Debug)]
pub struct PrimaryInput {
    pub username: String,
    pub password: SecretString,
    pub captcha_token: Option<String>,
}

impl PrimaryInput {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            captcha_token: None,
        }
    }

    #[must_use]
    pub fn with_captcha_token(mut self, token: impl Into<String>) -> Self {
        self.captcha_token = Some(token.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Credentials accepted; the code challenge is now showing.
    ChallengeRequired,
    /// The flow is finished; navigate to `destination`.
    Completed { destination: String },
    /// Another request is in flight; nothing was done.
    Busy,
    /// The stage changed while the request was in flight; its result was dropped.
    Superseded,
}

/// Read-only view of the flow published to subscribers. Secrets are not part of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowSnapshot {
    pub stage: Stage,
    pub username: Option<String>,
    pub code_digits: CodeDigits,
    pub is_submitting: bool,
    pub message: Option<FlowMessage>,
    pub captcha_required: bool,
    pub captcha_token_ready: bool,
    pub oauth: bool,
    pub primary_failures: u32,
    pub two_factor_failures: u32,
    pub locked_until: Option<Instant>,
}

struct Credentials {
    username: String,
    password: SecretString,
}

struct FlowState {
    stage: Stage,
    credentials: Option<Credentials>,
    oauth_token: Option<SecretString>,
    code_digits: CodeDigits,
    captcha_token: Option<String>,
    is_submitting: bool,
    message: Option<FlowMessage>,
    ledger: AttemptLedger,
    epoch: u64,
}

enum Begin {
    Busy,
    Send { epoch: u64, request: VerifyRequest },
}

enum Finish {
    Superseded,
    ChallengeRequired,
    Completed(String),
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

impl FlowState {
    fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            stage: self.stage,
            username: self
                .credentials
                .as_ref()
                .map(|credentials| credentials.username.clone()),
            code_digits: self.code_digits,
            is_submitting: self.is_submitting,
            message: self.message.clone(),
            captcha_required: self.ledger.captcha_required(),
            captcha_token_ready: self.captcha_token.is_some(),
            oauth: self.oauth_token.is_some(),
            primary_failures: self.ledger.primary_failures(),
            two_factor_failures: self.ledger.two_factor_failures(),
            locked_until: self.ledger.locked_until(),
        }
    }

    fn transition(&mut self, stage: Stage) {
        debug!(from = ?self.stage, to = ?stage, "stage transition");
        self.stage = stage;
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Lazy lockout check. Resumes the interrupted stage once the window passed.
    fn refresh_lock(&mut self, now: Instant) -> bool {
        if self.ledger.check_locked(now) {
            return true;
        }
        if let Stage::Locked { resume } = self.stage {
            info!(?resume, "lockout expired, resuming");
            self.transition(resume.into());
            self.message = None;
        }
        false
    }

    fn reject(&mut self, kind: ErrorKind, text: &str) -> FlowError {
        self.message = Some(FlowMessage::error(text));
        FlowError::new(kind, text)
    }

    fn locked_out(&mut self) -> FlowError {
        self.message = Some(FlowMessage::error(MSG_LOCKOUT));
        FlowError::lockout()
    }

    fn ensure_stage(&self, expected: Stage) -> Result<(), FlowError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(FlowError::new(
                ErrorKind::InvalidStage,
                format!("not available while {:?}", self.stage),
            ))
        }
    }

    fn begin_primary(&mut self, input: PrimaryInput, now: Instant) -> Result<Begin, FlowError> {
        if self.is_submitting {
            return Ok(Begin::Busy);
        }
        if self.refresh_lock(now) {
            return Err(self.locked_out());
        }
        self.ensure_stage(Stage::CredentialEntry)?;

        let username = input.username.trim().to_string();
        if username.is_empty() || input.password.expose_secret().is_empty() {
            return Err(self.reject(ErrorKind::Validation, MSG_MISSING_CREDENTIALS));
        }

        if self.ledger.captcha_required()
            && input.captcha_token.is_none()
            && self.captcha_token.is_none()
        {
            return Err(self.reject(ErrorKind::Validation, MSG_CAPTCHA_REQUIRED));
        }
        // Bot-check tokens are single use: whatever is sent is gone.
        let captcha_token = input.captcha_token.or_else(|| self.captcha_token.take());

        let request = VerifyRequest::Primary(PrimaryRequest {
            username: username.clone(),
            password: copy_secret(&input.password),
            captcha_token,
        });
        self.credentials = Some(Credentials {
            username,
            password: input.password,
        });
        self.is_submitting = true;
        self.message = None;

        Ok(Begin::Send {
            epoch: self.epoch,
            request,
        })
    }

    fn finish_primary(
        &mut self,
        epoch: u64,
        result: Result<VerifyOutcome, VerifyError>,
        now: Instant,
        redirect_target: Option<&String>,
    ) -> Result<Finish, FlowError> {
        if epoch != self.epoch {
            debug!("discarding primary result from an earlier stage");
            return Ok(Finish::Superseded);
        }
        self.is_submitting = false;

        let body = match result {
            Ok(VerifyOutcome::Accepted(body)) => body,
            Ok(VerifyOutcome::Rejected) => return Err(self.fail_primary(now)),
            Err(err) => {
                warn!("primary verification failed: {err}");
                return Err(self.fail_primary(now));
            }
        };

        self.ledger.record_success(AttemptStage::Primary);
        self.message = None;

        if body.requires_two_factor() {
            info!("credentials accepted, two-factor challenge required");
            self.code_digits = EMPTY_CODE;
            self.transition(Stage::TwoFactorChallenge);
            Ok(Finish::ChallengeRequired)
        } else {
            info!("credentials accepted, login completed");
            self.credentials = None;
            self.transition(Stage::Completed);
            Ok(Finish::Completed(redirect_target.cloned().unwrap_or(body.url)))
        }
    }

    fn fail_primary(&mut self, now: Instant) -> FlowError {
        self.credentials = None;
        let decision = self.ledger.record_failure(AttemptStage::Primary, now);
        if decision.locked {
            self.transition(Stage::Locked {
                resume: AttemptStage::Primary,
            });
            return self.locked_out();
        }
        self.reject(ErrorKind::InvalidCredentials, MSG_INVALID_CREDENTIALS)
    }

    fn begin_two_factor(&mut self, code: &str, now: Instant) -> Result<Begin, FlowError> {
        if self.is_submitting {
            return Ok(Begin::Busy);
        }
        if self.refresh_lock(now) {
            return Err(self.locked_out());
        }
        self.ensure_stage(Stage::TwoFactorChallenge)?;

        if !code::is_complete_code(code) {
            return Err(self.reject(ErrorKind::Validation, MSG_CODE_SHAPE));
        }

        let request = if let Some(oauth_token) = &self.oauth_token {
            TwoFactorRequest::OAuth {
                oauth_token: copy_secret(oauth_token),
                code: code.to_string(),
            }
        } else if let Some(credentials) = &self.credentials {
            TwoFactorRequest::Password {
                username: credentials.username.clone(),
                password: copy_secret(&credentials.password),
                code: code.to_string(),
                captcha_token: self.captcha_token.take(),
            }
        } else {
            return Err(FlowError::new(
                ErrorKind::InvalidStage,
                "no credentials to confirm",
            ));
        };

        self.is_submitting = true;
        self.message = None;

        Ok(Begin::Send {
            epoch: self.epoch,
            request: VerifyRequest::TwoFactor(request),
        })
    }

    fn finish_two_factor(
        &mut self,
        epoch: u64,
        result: Result<VerifyOutcome, VerifyError>,
        now: Instant,
        redirect_target: Option<&String>,
    ) -> Result<Finish, FlowError> {
        if epoch != self.epoch {
            debug!("discarding two-factor result from an earlier stage");
            return Ok(Finish::Superseded);
        }
        self.is_submitting = false;

        let body = match result {
            Ok(VerifyOutcome::Accepted(body)) => body,
            Ok(VerifyOutcome::Rejected) => return Err(self.fail_two_factor(now)),
            Err(err) => {
                warn!("two-factor verification failed: {err}");
                return Err(self.fail_two_factor(now));
            }
        };

        info!("code accepted, login completed");
        self.ledger.record_success(AttemptStage::TwoFactor);
        self.credentials = None;
        self.oauth_token = None;
        self.captcha_token = None;
        self.code_digits = EMPTY_CODE;
        self.message = Some(FlowMessage::success(MSG_SUCCESS));
        self.transition(Stage::Completed);

        Ok(Finish::Completed(redirect_target.cloned().unwrap_or(body.url)))
    }

    fn fail_two_factor(&mut self, now: Instant) -> FlowError {
        // Never keep a partially correct code around.
        self.code_digits = EMPTY_CODE;
        let decision = self.ledger.record_failure(AttemptStage::TwoFactor, now);
        if decision.locked {
            self.transition(Stage::Locked {
                resume: AttemptStage::TwoFactor,
            });
            return self.locked_out();
        }
        self.reject(ErrorKind::InvalidCode, MSG_INVALID_CODE)
    }
}

/// Drives one login session against a [`Verifier`].
pub struct AuthFlowController<V> {
    verifier: V,
    config: FlowConfig,
    redirect_target: Option<String>,
    session_id: Ulid,
    state: Mutex<FlowState>,
    published: watch::Sender<FlowSnapshot>,
}

impl<V: Verifier> AuthFlowController<V> {
    #[must_use]
    pub fn new(verifier: V, config: FlowConfig, context: FlowContext) -> Self {
        let stage = if context.oauth_token.is_some() {
            Stage::TwoFactorChallenge
        } else {
            Stage::CredentialEntry
        };

        let state = FlowState {
            stage,
            credentials: None,
            oauth_token: context.oauth_token,
            code_digits: EMPTY_CODE,
            captcha_token: None,
            is_submitting: false,
            message: None,
            ledger: AttemptLedger::new(config.ledger()),
            epoch: 0,
        };
        let (published, _) = watch::channel(state.snapshot());

        Self {
            verifier,
            config,
            redirect_target: context.redirect_target,
            session_id: Ulid::new(),
            state: Mutex::new(state),
            published,
        }
    }

    #[must_use]
    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    #[must_use]
    pub fn session_id(&self) -> Ulid {
        self.session_id
    }

    #[must_use]
    pub fn snapshot(&self) -> FlowSnapshot {
        self.lock().snapshot()
    }

    /// Receives a fresh snapshot after every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FlowSnapshot> {
        self.published.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<T>(&self, apply: impl FnOnce(&mut FlowState) -> T) -> T {
        let mut state = self.lock();
        let output = apply(&mut state);
        let snapshot = state.snapshot();
        drop(state);
        self.published.send_replace(snapshot);
        output
    }

    /// Submits the primary form.
    ///
    /// # Errors
    /// Returns a `FlowError` when the form is refused locally (lockout, empty
    /// fields, missing captcha, wrong stage) or rejected by the service.
    #[instrument(skip_all, fields(session = %self.session_id))]
    pub async fn submit_primary(&self, input: PrimaryInput) -> Result<FlowOutcome, FlowError> {
        let begin = self.update(|state| state.begin_primary(input, Instant::now()))?;
        let (epoch, request) = match begin {
            Begin::Busy => {
                debug!("submission already in flight");
                return Ok(FlowOutcome::Busy);
            }
            Begin::Send { epoch, request } => (epoch, request),
        };

        let result = self.verifier.verify(&request).await;
        drop(request);

        let finish = self.update(|state| {
            state.finish_primary(
                epoch,
                result,
                Instant::now(),
                self.redirect_target.as_ref(),
            )
        })?;

        Ok(match finish {
            Finish::Superseded => FlowOutcome::Superseded,
            Finish::ChallengeRequired => FlowOutcome::ChallengeRequired,
            Finish::Completed(destination) => FlowOutcome::Completed { destination },
        })
    }

    /// Submits a one-time code. On success the success message stays published
    /// for the configured redirect delay before `Completed` is returned.
    ///
    /// # Errors
    /// Returns a `FlowError` when the code is refused locally (lockout, shape,
    /// wrong stage) or rejected by the service.
    #[instrument(skip_all, fields(session = %self.session_id))]
    pub async fn submit_two_factor(&self, code: &str) -> Result<FlowOutcome, FlowError> {
        let begin = self.update(|state| state.begin_two_factor(code, Instant::now()))?;
        let (epoch, request) = match begin {
            Begin::Busy => {
                debug!("submission already in flight");
                return Ok(FlowOutcome::Busy);
            }
            Begin::Send { epoch, request } => (epoch, request),
        };

        let result = self.verifier.verify(&request).await;
        drop(request);

        let finish = self.update(|state| {
            state.finish_two_factor(
                epoch,
                result,
                Instant::now(),
                self.redirect_target.as_ref(),
            )
        })?;

        match finish {
            Finish::Superseded => Ok(FlowOutcome::Superseded),
            Finish::ChallengeRequired => Ok(FlowOutcome::ChallengeRequired),
            Finish::Completed(destination) => {
                sleep(self.config.redirect_delay()).await;
                Ok(FlowOutcome::Completed { destination })
            }
        }
    }

    /// Submits the code currently held in the six boxes.
    ///
    /// # Errors
    /// See [`Self::submit_two_factor`].
    pub async fn submit_code(&self) -> Result<FlowOutcome, FlowError> {
        let code = code::assemble(&self.lock().code_digits);
        self.submit_two_factor(&code).await
    }

    /// Leaves the code challenge for the credential form. Failure history stays.
    ///
    /// # Errors
    /// Returns `ErrorKind::InvalidStage` outside the password-based code challenge.
    pub fn go_back_to_primary(&self) -> Result<(), FlowError> {
        self.update(|state| {
            state.ensure_stage(Stage::TwoFactorChallenge)?;
            if state.oauth_token.is_some() {
                return Err(FlowError::new(
                    ErrorKind::InvalidStage,
                    "no credential form on the OAuth path",
                ));
            }
            state.code_digits = EMPTY_CODE;
            state.message = None;
            // Whatever is still in flight belongs to the stage being left.
            state.is_submitting = false;
            state.transition(Stage::CredentialEntry);
            Ok(())
        })
    }

    /// Stores a bot-check token for the next request.
    pub fn set_captcha_token(&self, token: impl Into<String>) {
        let token = token.into();
        self.update(|state| {
            state.captcha_token = (!token.trim().is_empty()).then_some(token);
        });
    }

    /// Lazy lockout check without submitting anything. Returns the current stage.
    pub fn refresh(&self) -> Stage {
        self.update(|state| {
            state.refresh_lock(Instant::now());
            state.stage
        })
    }

    /// Time left before a lockout lifts, `None` when the flow is not locked.
    #[must_use]
    pub fn lockout_remaining(&self) -> Option<Duration> {
        self.lock().ledger.remaining(Instant::now())
    }

    /// Types into box `index`; returns the box to focus.
    pub fn enter_digit(&self, index: usize, raw: &str) -> usize {
        self.update(|state| {
            if state.stage != Stage::TwoFactorChallenge {
                return index;
            }
            let entry = code::on_digit_entered(state.code_digits, index, raw);
            state.code_digits = entry.digits;
            entry.focus
        })
    }

    /// Backspace in box `index`: clears a filled box, or steps back from an empty one.
    pub fn backspace(&self, index: usize) -> usize {
        let index = index.min(CODE_LENGTH - 1);
        self.update(|state| {
            if state.stage != Stage::TwoFactorChallenge {
                return index;
            }
            let focus = code::on_backspace_navigate(&state.code_digits, index);
            if focus == index {
                state.code_digits = code::on_digit_entered(state.code_digits, index, "").digits;
            }
            focus
        })
    }

    /// Pastes clipboard text into the boxes. `None` means the paste was ignored.
    pub fn paste_code(&self, pasted: &str) -> Option<usize> {
        self.update(|state| {
            if state.stage != Stage::TwoFactorChallenge {
                return None;
            }
            let entry = code::distribute_paste(pasted)?;
            state.code_digits = entry.digits;
            Some(entry.focus)
        })
    }
}
