use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Biz-Harvest
///
/// Every section is optional; a missing section takes its defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// An inclusive range of milliseconds, written in TOML as `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "[u64; 2]")]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// A range that always yields zero; handy in tests
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Returns true if `delay` lies within the range
    pub fn contains(&self, delay: Duration) -> bool {
        delay >= self.min() && delay <= self.max()
    }
}

impl From<[u64; 2]> for DelayRange {
    fn from([min_ms, max_ms]: [u64; 2]) -> Self {
        Self::new(min_ms, max_ms)
    }
}

/// Lightweight HTTP fetch behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Lightweight attempts before escalating to the browser
    #[serde(
        rename = "max-lightweight-attempts",
        default = "default_max_lightweight_attempts"
    )]
    pub max_lightweight_attempts: u32,

    /// First backoff delay (milliseconds), doubled after each failed attempt
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff delay (milliseconds)
    #[serde(rename = "backoff-max-ms", default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_lightweight_attempts: default_max_lightweight_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

/// Delays between pages and inside the browser fallback
#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    /// Delay after a successful page in a standard scrape
    #[serde(rename = "standard-delay-ms", default = "default_standard_delay")]
    pub standard_delay_ms: DelayRange,

    /// Delay after a successful page in a category scrape
    #[serde(rename = "category-delay-ms", default = "default_category_delay")]
    pub category_delay_ms: DelayRange,

    /// Delay after a page that failed
    #[serde(rename = "failure-delay-ms", default = "default_failure_delay")]
    pub failure_delay_ms: DelayRange,

    /// Dwell time on a rendered page before capturing it
    #[serde(rename = "settle-delay-ms", default = "default_settle_delay")]
    pub settle_delay_ms: DelayRange,

    /// Consecutive "not found" pages that end a run early (0 disables)
    #[serde(rename = "early-stop-window", default = "default_early_stop_window")]
    pub early_stop_window: u32,

    /// Fixed seed for the jitter source; random when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            standard_delay_ms: default_standard_delay(),
            category_delay_ms: default_category_delay(),
            failure_delay_ms: default_failure_delay(),
            settle_delay_ms: default_settle_delay(),
            early_stop_window: default_early_stop_window(),
            seed: None,
        }
    }
}

/// Headless browser fallback
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Chrome/Chromium binary; auto-detected when absent
    #[serde(rename = "executable-path", default)]
    pub executable_path: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            executable_path: None,
        }
    }
}

/// Optional upstream HTTP proxy
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl ProxyConfig {
    /// Returns `host:port` when both parts are configured
    pub fn server(&self) -> Option<String> {
        match (&self.host, self.port) {
            (Some(host), Some(port)) => Some(format!("{}:{}", host, port)),
            _ => None,
        }
    }

    /// Returns the proxy as an `http://` URL when configured
    pub fn url(&self) -> Option<String> {
        self.server().map(|server| format!("http://{}", server))
    }
}

/// CSS selectors describing the directory's listing markup
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// One node per directory listing
    #[serde(default = "default_listing_selector")]
    pub listing: String,

    /// Listing nodes matching this are advertisements and skipped
    #[serde(default = "default_advertisement_selector")]
    pub advertisement: String,

    #[serde(default = "default_name_selector")]
    pub name: String,

    #[serde(default = "default_address_selector")]
    pub address: String,

    /// Icon whose parent element holds the phone number
    #[serde(rename = "phone-icon", default = "default_phone_icon_selector")]
    pub phone_icon: String,

    /// Image element carrying the logo in `src`/`data-src`
    #[serde(default = "default_image_selector")]
    pub image: String,

    /// Elements that carry the logo as a CSS `background-image`
    #[serde(
        rename = "background-image",
        default = "default_background_image_selector"
    )]
    pub background_image: String,

    /// Marker present only on verified listings
    #[serde(default = "default_verified_selector")]
    pub verified: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            listing: default_listing_selector(),
            advertisement: default_advertisement_selector(),
            name: default_name_selector(),
            address: default_address_selector(),
            phone_icon: default_phone_icon_selector(),
            image: default_image_selector(),
            background_image: default_background_image_selector(),
            verified: default_verified_selector(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory holding one CSV file per dataset
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    /// Dataset name used by standard (non-category) scrapes
    #[serde(rename = "default-dataset", default = "default_dataset")]
    pub default_dataset: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            default_dataset: default_dataset(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_lightweight_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_standard_delay() -> DelayRange {
    DelayRange::new(2_000, 5_000)
}

fn default_category_delay() -> DelayRange {
    DelayRange::new(3_000, 10_000)
}

fn default_failure_delay() -> DelayRange {
    DelayRange::new(10_000, 15_000)
}

fn default_settle_delay() -> DelayRange {
    DelayRange::new(2_000, 5_000)
}

fn default_early_stop_window() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_listing_selector() -> String {
    "div.listing".to_string()
}

fn default_advertisement_selector() -> String {
    ".ad, .sponsored, [data-ad]".to_string()
}

fn default_name_selector() -> String {
    ".listing-name a, .listing-name".to_string()
}

fn default_address_selector() -> String {
    ".listing-address".to_string()
}

fn default_phone_icon_selector() -> String {
    "i.fa-phone, .icon-phone".to_string()
}

fn default_image_selector() -> String {
    "img.listing-logo, .listing-logo img".to_string()
}

fn default_background_image_selector() -> String {
    "[style*='background-image']".to_string()
}

fn default_verified_selector() -> String {
    ".verified-badge, .badge-verified".to_string()
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("./output")
}

fn default_dataset() -> String {
    "businesses".to_string()
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}
