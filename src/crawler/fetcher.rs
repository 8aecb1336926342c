//! Page fetching with retries and a browser fallback
//!
//! This module decides how a listing page is obtained:
//! - Lightweight HTTP requests with rotated identities and exponential backoff
//! - Escalation to a headless browser once lightweight attempts are exhausted
//! - Classification of every failure into a `FailureKind`
//!
//! The retry/fallback policy itself lives in `state::FetchState`; this module
//! drives it against real (or fake) transports.

use crate::config::{FetchConfig, ProxyConfig};
use crate::crawler::disguise::{DisguisePolicy, Identity};
use crate::crawler::events::{ScrapeEvent, ScrapeObserver};
use crate::crawler::pacing::Pacer;
use crate::state::{FetchPlan, FetchState, StepOutcome};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a fetch step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// HTTP 404: the page does not exist
    NotFound,
    /// HTTP 403, 429 or 503: the site is pushing back
    Blocked(u16),
    /// Any other non-success status
    Status(u16),
    Timeout,
    /// Connection, TLS or protocol failure
    Network,
    /// A success status with nothing in the body
    EmptyBody,
    /// The headless browser could not produce the page
    Browser,
}

impl FailureKind {
    /// Classifies an HTTP status; None for success statuses
    pub fn from_status(status: StatusCode) -> Option<Self> {
        if status.is_success() {
            return None;
        }

        Some(match status.as_u16() {
            404 => Self::NotFound,
            code @ (403 | 429 | 503) => Self::Blocked(code),
            code => Self::Status(code),
        })
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Blocked(code) => write!(f, "blocked_{}", code),
            Self::Status(code) => write!(f, "status_{}", code),
            Self::Timeout => write!(f, "timeout"),
            Self::Network => write!(f, "network"),
            Self::EmptyBody => write!(f, "empty_body"),
            Self::Browser => write!(f, "browser"),
        }
    }
}

/// Failure of a single attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Final failure of a page after every strategy ran
#[derive(Debug, Clone, Error)]
#[error("Failed to fetch page {page} ({url}): {message}")]
pub struct FetchError {
    pub page: u32,
    pub url: Url,
    pub kind: FailureKind,
    pub message: String,
    pub lightweight_attempts: u32,
    pub browser_attempted: bool,
    /// Every lightweight attempt was answered with 404
    pub not_found: bool,
}

/// How a page's markup was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPath {
    Lightweight { attempt: u32 },
    Browser,
}

impl fmt::Display for FetchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lightweight { attempt } => write!(f, "http_attempt_{}", attempt),
            Self::Browser => write!(f, "browser"),
        }
    }
}

/// Markup of one page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub markup: String,
    pub via: FetchPath,
    /// The lightweight attempts were all answered with 404 before the browser got the page
    pub not_found: bool,
}

/// Issues a single lightweight request
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url, identity: &Identity) -> Result<String, FetchFailure>;
}

/// Renders a page in a real browser engine
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Loads `url`, waits `settle` after navigation, returns the final markup
    async fn render(
        &self,
        url: &Url,
        identity: &Identity,
        settle: Duration,
    ) -> Result<String, FetchFailure>;
}

/// `reqwest`-backed transport
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds the HTTP client
    ///
    /// # Arguments
    ///
    /// * `fetch` - Timeout settings
    /// * `proxy` - Optional upstream proxy every request goes through
    ///
    /// # Returns
    ///
    /// * `Ok(ReqwestTransport)` - Ready to use
    /// * `Err(reqwest::Error)` - The proxy URL or TLS backend was rejected
    pub fn new(fetch: &FetchConfig, proxy: &ProxyConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(fetch.timeout_secs);

        let mut builder = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .gzip(true)
            .brotli(true);

        if let Some(proxy_url) = proxy.url() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url, identity: &Identity) -> Result<String, FetchFailure> {
        let response = self
            .client
            .get(url.clone())
            .headers(header_map(identity))
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if let Some(kind) = FailureKind::from_status(status) {
            return Err(FetchFailure::new(kind, format!("HTTP {}", status)));
        }

        let body = response.text().await.map_err(classify_reqwest_error)?;
        if body.trim().is_empty() {
            return Err(FetchFailure::new(
                FailureKind::EmptyBody,
                "Response body was empty",
            ));
        }

        Ok(body)
    }
}

fn header_map(identity: &Identity) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in identity.headers() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }
    headers
}

fn classify_reqwest_error(error: reqwest::Error) -> FetchFailure {
    if error.is_timeout() {
        FetchFailure::new(FailureKind::Timeout, "Request timed out")
    } else if error.is_connect() {
        FetchFailure::new(FailureKind::Network, format!("Connection failed: {}", error))
    } else {
        FetchFailure::new(FailureKind::Network, error.to_string())
    }
}

/// Obtains the markup of one page, retrying and escalating as needed
pub struct FetchStrategy {
    transport: Arc<dyn Transport>,
    renderer: Option<Arc<dyn Renderer>>,
    policy: Arc<DisguisePolicy>,
    pacer: Arc<dyn Pacer>,
    observer: Arc<dyn ScrapeObserver>,
    plan: FetchPlan,
}

impl FetchStrategy {
    /// Creates a strategy; the browser fallback is available iff `renderer` is set
    pub fn new(
        transport: Arc<dyn Transport>,
        renderer: Option<Arc<dyn Renderer>>,
        policy: Arc<DisguisePolicy>,
        pacer: Arc<dyn Pacer>,
        observer: Arc<dyn ScrapeObserver>,
        config: &FetchConfig,
    ) -> Self {
        let plan = FetchPlan {
            max_lightweight_attempts: config.max_lightweight_attempts,
            browser_available: renderer.is_some(),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        };

        Self {
            transport,
            renderer,
            policy,
            pacer,
            observer,
            plan,
        }
    }

    pub fn plan(&self) -> &FetchPlan {
        &self.plan
    }

    /// Fetches page `page` at `url`
    ///
    /// The first attempt presents `identity`; every later attempt (and the
    /// browser) presents a freshly rotated one.
    ///
    /// # Returns
    ///
    /// * `Ok(FetchedPage)` - Markup and the path that produced it
    /// * `Err(FetchError)` - Every strategy failed
    pub async fn fetch_page(
        &self,
        url: &Url,
        page: u32,
        identity: Identity,
    ) -> Result<FetchedPage, FetchError> {
        let mut state = FetchState::initial();
        let mut identity = identity;
        let mut last_failure = None;
        let mut lightweight_attempts = 0;
        let mut browser_attempted = false;
        let mut not_found = true;

        while !state.is_terminal() {
            match state {
                FetchState::Attempt(attempt) => {
                    lightweight_attempts = attempt;
                    if attempt > 1 {
                        identity = self.policy.identity();
                    }

                    match self.transport.get(url, &identity).await {
                        Ok(markup) => {
                            return Ok(self.fetched(
                                page,
                                markup,
                                FetchPath::Lightweight { attempt },
                                false,
                            ));
                        }
                        Err(failure) => {
                            not_found &= failure.kind == FailureKind::NotFound;
                            let next = state.next(StepOutcome::Retryable, &self.plan);
                            let backoff = next
                                .is_lightweight()
                                .then(|| self.plan.backoff_after(attempt));

                            self.observer.on_event(&ScrapeEvent::AttemptFailed {
                                page,
                                attempt,
                                kind: failure.kind,
                                error: failure.message.clone(),
                                backoff,
                            });

                            if let Some(delay) = backoff {
                                self.pacer.pause(delay).await;
                            }

                            last_failure = Some(failure);
                            state = next;
                        }
                    }
                }
                FetchState::BrowserFallback => {
                    browser_attempted = true;
                    let Some(renderer) = &self.renderer else {
                        state = FetchState::Failed;
                        continue;
                    };

                    self.observer.on_event(&ScrapeEvent::BrowserFallbackStarted {
                        page,
                        url: url.clone(),
                    });

                    let identity = self.policy.identity();
                    let settle = self.policy.settle_delay();
                    match renderer.render(url, &identity, settle).await {
                        Ok(markup) => {
                            return Ok(self.fetched(page, markup, FetchPath::Browser, not_found));
                        }
                        Err(failure) => {
                            last_failure = Some(failure);
                            state = state.next(StepOutcome::Retryable, &self.plan);
                        }
                    }
                }
                FetchState::Done | FetchState::Failed => break,
            }
        }

        let failure = last_failure.unwrap_or_else(|| {
            FetchFailure::new(FailureKind::Network, "No fetch strategy was attempted")
        });

        Err(FetchError {
            page,
            url: url.clone(),
            kind: failure.kind,
            message: failure.message,
            lightweight_attempts,
            browser_attempted,
            not_found: not_found && lightweight_attempts > 0,
        })
    }

    fn fetched(&self, page: u32, markup: String, via: FetchPath, not_found: bool) -> FetchedPage {
        self.observer.on_event(&ScrapeEvent::PageFetched {
            page,
            via,
            bytes: markup.len(),
        });
        FetchedPage {
            markup,
            via,
            not_found,
        }
    }
}
