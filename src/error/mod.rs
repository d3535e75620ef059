//! Error handling module

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// What the extractor was looking for when the page did not contain it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionErrorKind {
    SecretNotFound,
    TokenNotFound,
}

impl fmt::Display for ExtractionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionErrorKind::SecretNotFound => f.write_str("hmac secret not found in page"),
            ExtractionErrorKind::TokenNotFound => f.write_str("form token not found in page"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Extraction error: {kind}")]
pub struct ExtractionError {
    pub kind: ExtractionErrorKind,
}

impl ExtractionError {
    pub fn secret_not_found() -> Self {
        Self {
            kind: ExtractionErrorKind::SecretNotFound,
        }
    }

    pub fn token_not_found() -> Self {
        Self {
            kind: ExtractionErrorKind::TokenNotFound,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Session init error: {0}")]
    SessionInitError(String),

    #[error("Fetch error: {0}")]
    FetchError(String),

    #[error(transparent)]
    ExtractionError(#[from] ExtractionError),

    /// `status` is `None` when the login request never got an answer
    #[error("Auth error: {}", http_failure(.status, .detail))]
    AuthError { status: Option<u16>, detail: String },

    #[error("Restart error: {}", http_failure(.status, .detail))]
    RestartError { status: Option<u16>, detail: String },

    #[error("Liveness timeout: router not seen down and back up within {0:?}")]
    LivenessTimeoutError(Duration),
}

fn http_failure(status: &Option<u16>, detail: &str) -> String {
    match status {
        Some(status) => format!("router answered {}", status),
        None => detail.to_string(),
    }
}

/// Steps of a restart run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    InitSession,
    FetchSecret,
    Authenticate,
    SubmitRestart,
    AwaitLiveness,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::InitSession => "initialise session",
            Step::FetchSecret => "fetch hmac secret",
            Step::Authenticate => "login",
            Step::SubmitRestart => "restart",
            Step::AwaitLiveness => "check if router came back up",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A step failure, carrying the step that produced it
#[derive(Error, Debug)]
#[error("failed to {step}")]
pub struct SequenceError {
    pub step: Step,
    #[source]
    pub source: AppError,
}

impl SequenceError {
    pub fn new(step: Step, source: AppError) -> Self {
        Self { step, source }
    }
}
