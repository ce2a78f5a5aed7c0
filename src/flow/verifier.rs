//! Verification service client.
//!
//! `Verifier` is the seam the controller talks to; `HttpVerifier` posts JSON to the
//! service with a fixed timeout. A response whose body is a valid envelope is
//! trusted whatever its HTTP status, since services commonly answer rejections
//! with 4xx plus `{"status": "ERROR"}`.

use reqwest::Client;
use std::future::Future;
use tracing::{debug, instrument};
use url::Url;

use super::{
    config::VerifierConfig,
    error::VerifyError,
    types::{ApiResponse, VerifyOutcome, VerifyRequest},
};
use crate::APP_USER_AGENT;

pub trait Verifier: Send + Sync {
    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyOutcome, VerifyError>> + Send;
}

#[derive(Clone, Debug)]
pub struct HttpVerifier {
    client: Client,
    login_url: Url,
    two_factor_url: Url,
}

impl HttpVerifier {
    /// # Errors
    /// Returns an error if the endpoint URLs cannot be built or the HTTP client
    /// fails to initialize.
    pub fn new(config: &VerifierConfig) -> Result<Self, VerifyError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            login_url: config.login_url()?,
            two_factor_url: config.two_factor_url()?,
        })
    }

    fn url_for(&self, request: &VerifyRequest) -> &Url {
        match request {
            VerifyRequest::Primary(_) => &self.login_url,
            VerifyRequest::TwoFactor(_) => &self.two_factor_url,
        }
    }
}

impl Verifier for HttpVerifier {
    #[instrument(skip_all, fields(url = tracing::field::Empty))]
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyOutcome, VerifyError> {
        let url = self.url_for(request);
        tracing::Span::current().record("url", url.as_str());
        debug!(captcha = request.carries_captcha(), "sending verification request");

        let response = self
            .client
            .post(url.clone())
            .json(&request.body())
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(status = status.as_u16(), "verification response");

        match serde_json::from_slice::<ApiResponse>(&bytes) {
            Ok(envelope) => Ok(envelope.into()),
            Err(_) if !status.is_success() => Err(VerifyError::Status(status.as_u16())),
            Err(err) => Err(VerifyError::Decode(err)),
        }
    }
}
