use crate::flow::{
    error::{MSG_CODE_SHAPE, MSG_LOCKOUT},
    AuthFlowController, FlowConfig, FlowContext, FlowError, FlowOutcome, HttpVerifier,
    PrimaryInput, Stage, Verifier, VerifierConfig,
};
use anyhow::{anyhow, Result};
use secrecy::SecretString;
use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines},
    time::sleep,
};
use tracing::{debug, info};

const BACK_COMMAND: &str = "back";

#[derive(Debug)]
pub struct Args {
    pub verifier: VerifierConfig,
    pub flow: FlowConfig,
    pub username: Option<String>,
    pub oauth_token: Option<SecretString>,
    pub next: Option<String>,
}

/// Execute the login action against stdin/stdout.
/// # Errors
/// Returns an error if the HTTP client cannot be built or the terminal closes
/// before the flow completes.
pub async fn execute(args: Args) -> Result<()> {
    let verifier = HttpVerifier::new(&args.verifier)?;

    let mut context = FlowContext::new();
    if let Some(next) = args.next {
        context = context.with_redirect_target(next);
    }
    if let Some(token) = args.oauth_token {
        context = context.with_oauth_token(token);
    }

    let controller = AuthFlowController::new(verifier, args.flow, context);
    info!(session = %controller.session_id(), "login session started");

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();
    let destination = drive(&controller, &mut lines, &mut stdout, args.username).await?;

    info!(session = %controller.session_id(), %destination, "login completed");

    Ok(())
}

/// Runs the flow to completion, reading answers from `lines` and writing prompts
/// to `out`. Returns the destination.
pub async fn drive<V, R, W>(
    controller: &AuthFlowController<V>,
    lines: &mut Lines<R>,
    out: &mut W,
    mut username: Option<String>,
) -> Result<String>
where
    V: Verifier,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let outcome = match controller.refresh() {
            Stage::Completed => return Err(anyhow!("login session already completed")),
            Stage::Locked { .. } => {
                wait_for_unlock(controller, out).await?;
                continue;
            }
            Stage::CredentialEntry => {
                let name = match username.take() {
                    Some(name) => name,
                    None => prompt(lines, out, "Username: ").await?,
                };
                let password = prompt(lines, out, "Password: ").await?;
                if controller.snapshot().captcha_required {
                    let token = prompt(lines, out, "Captcha token: ").await?;
                    controller.set_captcha_token(token);
                }
                controller
                    .submit_primary(PrimaryInput::new(name, password))
                    .await
            }
            Stage::TwoFactorChallenge => {
                let answer = prompt(lines, out, "Verification code ('back' to return): ").await?;
                if answer == BACK_COMMAND {
                    if let Err(err) = controller.go_back_to_primary() {
                        say(out, &err.message).await?;
                    }
                    continue;
                }
                if controller.paste_code(&answer).is_none() {
                    say(out, MSG_CODE_SHAPE).await?;
                    continue;
                }
                controller.submit_code().await
            }
        };

        if let Some(destination) = report(controller, out, outcome).await? {
            return Ok(destination);
        }
    }
}

async fn report<V, W>(
    controller: &AuthFlowController<V>,
    out: &mut W,
    outcome: Result<FlowOutcome, FlowError>,
) -> Result<Option<String>>
where
    V: Verifier,
    W: AsyncWrite + Unpin,
{
    match outcome {
        Ok(FlowOutcome::Completed { destination }) => {
            if let Some(message) = controller.snapshot().message {
                say(out, &message.text).await?;
            }
            say(out, &format!("Continue at {destination}")).await?;
            Ok(Some(destination))
        }
        Ok(FlowOutcome::ChallengeRequired) => {
            say(out, "Enter the 6-digit code from your authenticator.").await?;
            Ok(None)
        }
        Ok(outcome @ (FlowOutcome::Busy | FlowOutcome::Superseded)) => {
            debug!(?outcome, "submission produced no transition");
            Ok(None)
        }
        Err(err) => {
            say(out, &err.message).await?;
            Ok(None)
        }
    }
}

async fn wait_for_unlock<V, W>(controller: &AuthFlowController<V>, out: &mut W) -> Result<()>
where
    V: Verifier,
    W: AsyncWrite + Unpin,
{
    let Some(remaining) = controller.lockout_remaining() else {
        return Ok(());
    };
    // The unlock time stays private; only the generic message is shown.
    say(out, MSG_LOCKOUT).await?;
    debug!(?remaining, "waiting out lockout");
    sleep(remaining).await;
    Ok(())
}

async fn prompt<R, W>(lines: &mut Lines<R>, out: &mut W, label: &str) -> Result<String>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    out.write_all(label.as_bytes()).await?;
    out.flush().await?;
    let line = lines
        .next_line()
        .await?
        .ok_or_else(|| anyhow!("input closed before login completed"))?;
    Ok(line.trim().to_string())
}

async fn say<W>(out: &mut W, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(text.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}
