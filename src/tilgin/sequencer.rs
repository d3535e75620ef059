//! Login → restart → wait-for-reboot sequence against one router
//!
//! Steps run strictly in order and the first failure ends the run. The
//! login step needs the `HmacSecret` produced by `fetch_secret`, and the
//! restart step needs the `Authenticated` value only a successful login
//! produces, so the order cannot be broken by a caller either.

use std::time::Duration;

use url::Url;

use super::client::{HttpProbe, ReachabilityProbe, RouterTransport, SessionClient};
use super::extract::{extract_form_token, extract_hmac_secret, FormToken, HmacSecret};
use super::liveness::{await_liveness, LivenessPolicy};
use super::protocol::{credential_hash, Protocol};
use crate::config::SessionConfig;
use crate::error::{AppError, SequenceError, Step};

/// Where a run currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    SecretFetched,
    Authenticated,
    RestartSubmitted,
    Verified,
    TimedOut,
    Failed(Step),
}

/// Proof of a successful login, carrying the token for the next form
#[derive(Debug)]
pub struct Authenticated {
    form_token: FormToken,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartReport {
    /// Time between the first failed probe and the router answering again
    pub downtime: Duration,
}

pub struct Sequencer<T, P> {
    session: SessionConfig,
    protocol: Protocol,
    policy: LivenessPolicy,
    transport: T,
    probe: P,
    state: SessionState,
}

impl Sequencer<SessionClient, HttpProbe> {
    /// Build the cookie-bearing session and the liveness probe for a router
    pub fn initialize_session(
        session: SessionConfig,
        protocol: Protocol,
        policy: LivenessPolicy,
    ) -> Result<Self, SequenceError> {
        let transport = SessionClient::new(&session.router_host)
            .map_err(|e| SequenceError::new(Step::InitSession, e))?;
        let probe = HttpProbe::new(&session.router_host, policy.probe_timeout)
            .map_err(|e| SequenceError::new(Step::InitSession, e))?;

        Ok(Self::with_transport(session, protocol, policy, transport, probe))
    }
}

impl<T, P> Sequencer<T, P>
where
    T: RouterTransport,
    P: ReachabilityProbe,
{
    pub fn with_transport(
        session: SessionConfig,
        protocol: Protocol,
        policy: LivenessPolicy,
        transport: T,
        probe: P,
    ) -> Self {
        Self {
            session,
            protocol,
            policy,
            transport,
            probe,
            state: SessionState::Init,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run every step in order
    pub async fn run(&mut self) -> Result<RestartReport, SequenceError> {
        tracing::info!(host = %self.session.router_host, "[Tilgin] Starting restart, fetching secrets");

        let result = self.fetch_secret().await;
        let secret = result.map_err(|e| self.fail(Step::FetchSecret, e))?;

        let result = self.authenticate(&secret).await;
        let authenticated = result.map_err(|e| self.fail(Step::Authenticate, e))?;

        let result = self.submit_restart(&authenticated).await;
        result.map_err(|e| self.fail(Step::SubmitRestart, e))?;

        let result = self.await_liveness().await;
        let downtime = result.map_err(|e| self.fail(Step::AwaitLiveness, e))?;

        Ok(RestartReport { downtime })
    }

    /// GET the index page and pull the login secret out of it
    pub async fn fetch_secret(&mut self) -> Result<HmacSecret, AppError> {
        tracing::info!("[Tilgin] Fetching HMAC secret");

        let url = self.endpoint("");
        let reply = self.transport.get(&url).await.map_err(AppError::FetchError)?;
        let secret = extract_hmac_secret(&reply.body)?;

        tracing::debug!(secret_len = secret.as_bytes().len(), "[Tilgin] HMAC secret extracted");
        self.state = SessionState::SecretFetched;
        Ok(secret)
    }

    /// POST the login form with the keyed credential hash
    pub async fn authenticate(&mut self, secret: &HmacSecret) -> Result<Authenticated, AppError> {
        tracing::info!(user = %self.session.username, "[Tilgin] Authenticating");

        let hash = credential_hash(secret, &self.session.username, self.session.password.expose());
        let form = self.protocol.login_form(&self.session.username, hash);

        let url = self.endpoint("");
        let reply = self
            .transport
            .post_form(&url, &form)
            .await
            .map_err(|detail| AppError::AuthError { status: None, detail })?;

        if !reply.is_success() {
            tracing::error!(status = reply.status, body = %reply.body, "[Tilgin] Auth failed");
            return Err(AppError::AuthError {
                status: Some(reply.status),
                detail: reply.body,
            });
        }

        let form_token = if self.protocol.requires_form_token {
            let token = extract_form_token(&reply.body)?;
            tracing::debug!(form_token = token.as_str(), "[Tilgin] CSRF form token extracted");
            token
        } else {
            FormToken::empty()
        };

        self.state = SessionState::Authenticated;
        Ok(Authenticated { form_token })
    }

    /// POST the restart form
    pub async fn submit_restart(&mut self, authenticated: &Authenticated) -> Result<(), AppError> {
        tracing::info!("[Tilgin] Restarting");

        let form = self.protocol.restart_form(&authenticated.form_token);
        let url = self.endpoint(self.protocol.restart_path);
        let reply = self
            .transport
            .post_form(&url, &form)
            .await
            .map_err(|detail| AppError::RestartError { status: None, detail })?;

        if !reply.is_success() {
            tracing::error!(status = reply.status, body = %reply.body, "[Tilgin] Restart failed");
            return Err(AppError::RestartError {
                status: Some(reply.status),
                detail: reply.body,
            });
        }

        self.state = SessionState::RestartSubmitted;
        Ok(())
    }

    /// Wait until the router has gone down and answers again
    pub async fn await_liveness(&mut self) -> Result<Duration, AppError> {
        tracing::info!(
            deadline = ?self.policy.deadline,
            "[Tilgin] Waiting for router to go down and come back up"
        );

        let downtime = await_liveness(&self.probe, &self.policy).await?;
        self.state = SessionState::Verified;
        Ok(downtime)
    }

    fn fail(&mut self, step: Step, err: AppError) -> SequenceError {
        tracing::error!(error = %err, "[Tilgin] Failed to {}", step);
        self.state = match err {
            AppError::LivenessTimeoutError(_) => SessionState::TimedOut,
            _ => SessionState::Failed(step),
        };
        SequenceError::new(step, err)
    }

    fn endpoint(&self, path: &str) -> String {
        endpoint(&self.session.router_host, path)
    }
}

/// `path` appended to the router base address; the base itself when empty
fn endpoint(router_host: &Url, path: &str) -> String {
    if path.is_empty() {
        router_host.to_string()
    } else {
        format!("{}{}", router_host.as_str().trim_end_matches('/'), path)
    }
}
