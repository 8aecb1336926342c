//! Request disguise policy
//!
//! Produces the identity each request presents (User-Agent, language,
//! client hints, referer) and the randomized pauses between requests, so
//! that consecutive requests do not look machine-generated.
//!
//! The random source is owned by the policy and can be seeded, which makes
//! every choice reproducible in tests.

use crate::config::{DelayRange, PacingConfig};
use crate::crawler::RunMode;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A realistic browser fingerprint
#[derive(Debug, PartialEq, Eq)]
pub struct BrowserSignature {
    pub user_agent: &'static str,
    pub accept_language: &'static str,
    /// Value of the `sec-ch-ua-platform` client hint
    pub platform: &'static str,
    pub mobile: bool,
}

/// Pool of signatures rotated between requests
pub static SIGNATURES: &[BrowserSignature] = &[
    BrowserSignature {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        accept_language: "en-US,en;q=0.9",
        platform: "\"Windows\"",
        mobile: false,
    },
    BrowserSignature {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        accept_language: "en-GB,en;q=0.9",
        platform: "\"macOS\"",
        mobile: false,
    },
    BrowserSignature {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        accept_language: "en-US,en;q=0.8,ar;q=0.6",
        platform: "\"Linux\"",
        mobile: false,
    },
    BrowserSignature {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
        accept_language: "en-US,en;q=0.5",
        platform: "\"Windows\"",
        mobile: false,
    },
    BrowserSignature {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
        accept_language: "en-US,en;q=0.9,fr;q=0.7",
        platform: "\"Windows\"",
        mobile: false,
    },
    BrowserSignature {
        user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
        accept_language: "en-US,en;q=0.9",
        platform: "\"iOS\"",
        mobile: true,
    },
];

/// Plausible origins a visitor could arrive from
pub static REFERERS: &[&str] = &[
    "https://www.google.com/",
    "https://www.bing.com/",
    "https://duckduckgo.com/",
    "https://search.yahoo.com/",
];

/// The identity one request presents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub signature: &'static BrowserSignature,
    pub referer: &'static str,
}

impl Identity {
    pub fn user_agent(&self) -> &'static str {
        self.signature.user_agent
    }

    /// Full header set in the order a browser sends them
    pub fn headers(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            ("user-agent", self.signature.user_agent),
            (
                "accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
            ("accept-language", self.signature.accept_language),
            ("referer", self.referer),
            ("upgrade-insecure-requests", "1"),
            ("sec-fetch-dest", "document"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-site", "cross-site"),
            ("sec-fetch-user", "?1"),
            ("sec-ch-ua-mobile", if self.signature.mobile { "?1" } else { "?0" }),
            ("sec-ch-ua-platform", self.signature.platform),
            ("cache-control", "max-age=0"),
        ]
    }
}

/// Which pause precedes a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// First page of a run; no pause
    First,
    /// The previous page succeeded
    AfterSuccess,
    /// The previous page failed; back off longer
    AfterFailure,
}

/// Everything needed to issue the next page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestProfile {
    pub identity: Identity,
    pub delay_before: Duration,
}

struct PolicyState {
    rng: StdRng,
    last_signature: Option<usize>,
}

/// Randomized request disguise
///
/// Pure computation: nothing here sleeps or blocks.
pub struct DisguisePolicy {
    state: Mutex<PolicyState>,
    pacing: PacingConfig,
}

impl DisguisePolicy {
    /// Creates a policy seeded from `pacing.seed`, or from entropy when unset
    pub fn new(pacing: PacingConfig) -> Self {
        let rng = match pacing.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(pacing, rng)
    }

    /// Creates a policy with a fixed seed
    pub fn seeded(pacing: PacingConfig, seed: u64) -> Self {
        Self::with_rng(pacing, StdRng::seed_from_u64(seed))
    }

    fn with_rng(pacing: PacingConfig, rng: StdRng) -> Self {
        Self {
            state: Mutex::new(PolicyState {
                rng,
                last_signature: None,
            }),
            pacing,
        }
    }

    /// Returns the profile for the next page request
    pub fn next_request_profile(&self, mode: RunMode, pace: Pace) -> RequestProfile {
        let delay_before = match pace {
            Pace::First => Duration::ZERO,
            Pace::AfterSuccess => self.success_delay(mode),
            Pace::AfterFailure => self.failure_delay(),
        };

        RequestProfile {
            identity: self.identity(),
            delay_before,
        }
    }

    /// Picks a new identity, never reusing the previous signature
    pub fn identity(&self) -> Identity {
        let mut state = self.lock();

        let mut index = state.rng.gen_range(0..SIGNATURES.len());
        if Some(index) == state.last_signature {
            index = (index + 1 + state.rng.gen_range(0..SIGNATURES.len() - 1)) % SIGNATURES.len();
        }
        state.last_signature = Some(index);

        let referer = REFERERS[state.rng.gen_range(0..REFERERS.len())];

        Identity {
            signature: &SIGNATURES[index],
            referer,
        }
    }

    /// Pause after a page that succeeded
    pub fn success_delay(&self, mode: RunMode) -> Duration {
        let range = match mode {
            RunMode::Standard => self.pacing.standard_delay_ms,
            RunMode::Category => self.pacing.category_delay_ms,
        };
        self.sample(range)
    }

    /// Pause after a page that failed
    pub fn failure_delay(&self) -> Duration {
        self.sample(self.pacing.failure_delay_ms)
    }

    /// Dwell time on a rendered page before capturing it
    pub fn settle_delay(&self) -> Duration {
        self.sample(self.pacing.settle_delay_ms)
    }

    /// Bounds are ordered first so an unvalidated range cannot panic
    fn sample(&self, range: DelayRange) -> Duration {
        let (low, high) = if range.min_ms <= range.max_ms {
            (range.min_ms, range.max_ms)
        } else {
            (range.max_ms, range.min_ms)
        };
        let ms = self.lock().rng.gen_range(low..=high);
        Duration::from_millis(ms)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PolicyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
