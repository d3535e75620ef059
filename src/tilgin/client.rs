//! HTTP plumbing for talking to the router
//!
//! - `RouterTransport`: the cookie-bearing session used for login and restart
//! - `ReachabilityProbe`: cheap, independent requests used while the router reboots

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use cookie_store::RawCookie;
use reqwest::header::HeaderValue;
use reqwest::Client;
use url::Url;

use crate::error::AppError;

/// Mozilla public suffix list, ICANN and private sections
static PUBLIC_SUFFIX_LIST: &str = include_str!("../../data/public_suffix_list.dat");

/// Status and body of a router response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Session transport trait
#[async_trait]
pub trait RouterTransport: Send + Sync {
    /// GET a page and read its full body
    async fn get(&self, url: &str) -> Result<HttpReply, String>;

    /// POST an `application/x-www-form-urlencoded` body and read the response
    async fn post_form(&self, url: &str, form: &[(&'static str, String)]) -> Result<HttpReply, String>;
}

/// Liveness probe trait
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// `Ok` when the router answered at all, whatever the status code
    async fn probe(&self) -> Result<(), String>;
}

/// Cookie jar that rejects cookies whose `Domain` is a public suffix,
/// so a router on `router.co.uk` cannot scope its session to all of `co.uk`.
pub struct RouterCookieJar(RwLock<cookie_store::CookieStore>);

impl RouterCookieJar {
    pub fn new() -> Result<Self, AppError> {
        let list: publicsuffix::List = PUBLIC_SUFFIX_LIST
            .parse()
            .map_err(|e| AppError::SessionInitError(format!("Failed to load public suffix list: {}", e)))?;

        Ok(Self(RwLock::new(cookie_store::CookieStore::new(Some(list)))))
    }
}

impl reqwest::cookie::CookieStore for RouterCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let cookies = cookie_headers
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| RawCookie::parse(value.to_string()).ok());

        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .store_response_cookies(cookies, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get_request_values(url)
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}

/// Cookie-bearing reqwest session for the router
pub struct SessionClient {
    http_client: Client,
}

impl SessionClient {
    pub fn new(router_host: &Url) -> Result<Self, AppError> {
        let jar = RouterCookieJar::new()?;
        let http_client = Client::builder()
            .cookie_provider(std::sync::Arc::new(jar))
            .build()
            .map_err(|e| AppError::SessionInitError(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!(host = %router_host, "[Tilgin] Session cookie jar ready");
        Ok(Self { http_client })
    }
}

#[async_trait]
impl RouterTransport for SessionClient {
    async fn get(&self, url: &str) -> Result<HttpReply, String> {
        let resp = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request to {} failed: {}", url, e))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| format!("Failed to read body: {}", e))?;

        Ok(HttpReply { status, body })
    }

    async fn post_form(&self, url: &str, form: &[(&'static str, String)]) -> Result<HttpReply, String> {
        let resp = self
            .http_client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| format!("Request to {} failed: {}", url, e))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| format!("Failed to read body: {}", e))?;

        Ok(HttpReply { status, body })
    }
}

/// Probes the router index with a fresh client and a short timeout
pub struct HttpProbe {
    client: Client,
    url: String,
}

impl HttpProbe {
    pub fn new(router_host: &Url, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::SessionInitError(format!("Failed to create probe client: {}", e)))?;

        Ok(Self {
            client,
            url: router_host.to_string(),
        })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn probe(&self) -> Result<(), String> {
        self.client
            .get(&self.url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| {
                if e.is_timeout() {
                    "timeout".to_string()
                } else if e.is_connect() {
                    "connection_failed".to_string()
                } else {
                    e.to_string()
                }
            })
    }
}
