//! Configuration module
//!
//! Layers, lowest first: built-in defaults, `config/default.*`, `ROUTER_*`
//! environment variables, command-line flags. The password is only ever
//! read from `ROUTER_PASSWORD`; a `password` key in the file is ignored.

use std::fmt;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use url::Url;

use crate::error::AppError;
use crate::tilgin::liveness::LivenessPolicy;
use crate::tilgin::protocol::ProtocolVariant;

/// Restart a Tilgin router through its web interface
#[derive(Debug, Default, Parser)]
#[command(name = "tilgin-restart", version, about)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Username to login as
    #[arg(long)]
    pub username: Option<String>,

    /// Router host
    #[arg(long)]
    pub host: Option<String>,

    /// Router web UI generation
    #[arg(long, value_enum)]
    pub variant: Option<ProtocolVariant>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub username: String,
    #[serde(skip)]
    pub password: Secret,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_variant")]
    pub variant: ProtocolVariant,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub liveness: LivenessConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LivenessConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

/// String that never shows up in `Debug` output
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"***\"")
    }
}

/// Validated inputs of one restart run
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub username: String,
    pub password: Secret,
    pub router_host: Url,
}

fn default_host() -> String {
    "http://192.168.1.1".to_string()
}

fn default_variant() -> ProtocolVariant {
    ProtocolVariant::FormToken
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_deadline_secs() -> u64 {
    300
}

impl Config {
    pub fn load(cli: &Cli) -> Result<Self, AppError> {
        Self::from_sources(
            cli,
            config::File::with_name("config/default").required(false),
            environment(),
        )
    }

    fn from_sources<F>(cli: &Cli, file: F, env: config::Environment) -> Result<Self, AppError>
    where
        F: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(env.clone())
            .set_override_option("username", cli.username.clone())
            .and_then(|b| b.set_override_option("host", cli.host.clone()))
            .and_then(|b| b.set_override_option("variant", cli.variant.map(|v| v.as_str())))
            .and_then(|b| b.set_override_option("debug", cli.debug.then_some(true)))
            .and_then(|b| b.build())
            .map_err(|e| AppError::ConfigError(e.to_string()))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| AppError::ConfigError(e.to_string()))?;
        config.password = password_from(env)?;

        Ok(config)
    }

    /// Check required inputs before anything touches the network
    pub fn session(&self) -> Result<SessionConfig, AppError> {
        if self.username.is_empty() {
            return Err(AppError::ConfigError("Username is not set".to_string()));
        }
        if self.host.is_empty() {
            return Err(AppError::ConfigError("Router host is not set".to_string()));
        }
        if self.password.expose().is_empty() {
            return Err(AppError::ConfigError("Password is not set".to_string()));
        }

        let router_host = Url::parse(&self.host)
            .map_err(|e| AppError::ConfigError(format!("Invalid router host {}: {}", self.host, e)))?;
        if !matches!(router_host.scheme(), "http" | "https") || !router_host.has_host() {
            return Err(AppError::ConfigError(format!(
                "Router host must be an http(s) URL: {}",
                self.host
            )));
        }

        Ok(SessionConfig {
            username: self.username.clone(),
            password: self.password.clone(),
            router_host,
        })
    }

    pub fn liveness_policy(&self) -> Result<LivenessPolicy, AppError> {
        let cfg = &self.liveness;
        if cfg.poll_interval_secs == 0 || cfg.probe_timeout_secs == 0 || cfg.deadline_secs == 0 {
            return Err(AppError::ConfigError(
                "Liveness timings must be greater than zero".to_string(),
            ));
        }

        Ok(LivenessPolicy {
            poll_interval: Duration::from_secs(cfg.poll_interval_secs),
            probe_timeout: Duration::from_secs(cfg.probe_timeout_secs),
            deadline: Duration::from_secs(cfg.deadline_secs),
        })
    }
}

fn password_from(env: config::Environment) -> Result<Secret, AppError> {
    let secrets = config::Config::builder()
        .add_source(env)
        .build()
        .map_err(|e| AppError::ConfigError(e.to_string()))?;

    match secrets.get_string("password") {
        Ok(password) => Ok(Secret::from(password)),
        Err(config::ConfigError::NotFound(_)) => Ok(Secret::default()),
        Err(e) => Err(AppError::ConfigError(e.to_string())),
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("ROUTER")
        .prefix_separator("_")
        .separator("__")
}
