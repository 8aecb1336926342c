/// Per-page fetch state machine
///
/// A page starts at `Attempt(1)`, retries lightweight requests with
/// exponential backoff, escalates to a rendered browser session once the
/// lightweight attempts are exhausted, and ends in `Done` or `Failed`.
use std::fmt;
use std::time::Duration;

/// Represents where a page is in its fetch lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchState {
    // ===== Active States =====
    /// Lightweight HTTP attempt number `n` (1-based)
    Attempt(u32),

    /// Rendering the page in a headless browser
    BrowserFallback,

    // ===== Terminal States =====
    /// Markup was obtained
    Done,

    /// Every strategy was exhausted
    Failed,
}

/// What happened in the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Markup was obtained
    Succeeded,

    /// The step failed; the next attempt or the browser may still help
    Retryable,
}

/// Limits that drive the transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    /// Lightweight attempts before escalating
    pub max_lightweight_attempts: u32,

    /// Whether a browser fallback can be used
    pub browser_available: bool,

    /// First backoff delay
    pub backoff_base: Duration,

    /// Cap for any single backoff delay
    pub backoff_max: Duration,
}

impl FetchPlan {
    /// Backoff to wait after lightweight attempt `attempt` failed
    ///
    /// `base * 2^(attempt - 1)`, capped at `backoff_max`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.backoff_base
            .checked_mul(1u32 << exponent)
            .map_or(self.backoff_max, |d| d.min(self.backoff_max))
    }
}

impl FetchState {
    /// The state every page fetch starts in
    pub fn initial() -> Self {
        Self::Attempt(1)
    }

    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true for lightweight HTTP attempts
    pub fn is_lightweight(&self) -> bool {
        matches!(self, Self::Attempt(_))
    }

    /// Computes the next state from the outcome of the current one
    ///
    /// Terminal states never move.
    pub fn next(self, outcome: StepOutcome, plan: &FetchPlan) -> Self {
        match (self, outcome) {
            (Self::Done, _) | (Self::Failed, _) => self,

            (Self::Attempt(_), StepOutcome::Succeeded) => Self::Done,
            (Self::Attempt(n), StepOutcome::Retryable) => {
                if n < plan.max_lightweight_attempts {
                    Self::Attempt(n + 1)
                } else if plan.browser_available {
                    Self::BrowserFallback
                } else {
                    Self::Failed
                }
            }

            (Self::BrowserFallback, StepOutcome::Succeeded) => Self::Done,
            (Self::BrowserFallback, _) => Self::Failed,
        }
    }

    /// Short label used in logs and events
    pub fn label(&self) -> String {
        match self {
            Self::Attempt(n) => format!("attempt_{}", n),
            Self::BrowserFallback => "browser_fallback".to_string(),
            Self::Done => "done".to_string(),
            Self::Failed => "failed".to_string(),
        }
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
