//! Headless Chrome fallback renderer
//!
//! Used when lightweight requests keep failing, typically because the site
//! serves its listings through a script or a bot challenge. The
//! `headless_chrome` driver is blocking, so each render runs on tokio's
//! blocking pool.

use crate::config::{BrowserConfig, ProxyConfig};
use crate::crawler::disguise::Identity;
use crate::crawler::fetcher::{FailureKind, FetchFailure, Renderer};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Renders pages in a fresh headless Chrome process per call
#[derive(Debug, Clone)]
pub struct HeadlessChromeRenderer {
    executable: PathBuf,
    proxy_server: Option<String>,
    navigation_timeout: Duration,
}

impl HeadlessChromeRenderer {
    /// Builds the renderer if the fallback is enabled and a browser exists
    ///
    /// # Returns
    ///
    /// * `Some(renderer)` - A Chrome/Chromium binary was found
    /// * `None` - The fallback is disabled or no binary is installed
    pub fn from_config(
        browser: &BrowserConfig,
        proxy: &ProxyConfig,
        navigation_timeout: Duration,
    ) -> Option<Self> {
        if !browser.enabled {
            tracing::info!("Browser fallback disabled by configuration");
            return None;
        }

        let executable = match &browser.executable_path {
            Some(path) if path.exists() => path.clone(),
            Some(path) => {
                tracing::warn!(path = %path.display(), "Configured browser executable not found");
                return None;
            }
            None => match headless_chrome::browser::default_executable() {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("No Chrome/Chromium found, browser fallback unavailable: {}", e);
                    return None;
                }
            },
        };

        tracing::debug!(path = %executable.display(), "Browser fallback available");

        Some(Self {
            executable,
            proxy_server: proxy.server(),
            navigation_timeout,
        })
    }

    fn render_blocking(
        &self,
        url: &Url,
        identity: &Identity,
        settle: Duration,
    ) -> Result<String, FetchFailure> {
        let session = RenderSession::launch(self, identity)?;
        let tab = &session.tab;

        tab.set_default_timeout(self.navigation_timeout);
        tab.enable_stealth_mode()
            .map_err(|e| browser_failure("enable stealth mode", e))?;
        tab.set_user_agent(
            identity.user_agent(),
            Some(identity.signature.accept_language),
            Some(identity.signature.platform.trim_matches('"')),
        )
        .map_err(|e| browser_failure("set user agent", e))?;

        tab.navigate_to(url.as_str())
            .map_err(|e| browser_failure("navigate", e))?;
        tab.wait_until_navigated()
            .map_err(|e| browser_failure("wait for navigation", e))?;

        std::thread::sleep(settle);

        let content = tab
            .get_content()
            .map_err(|e| browser_failure("capture content", e))?;

        if content.trim().is_empty() {
            return Err(FetchFailure::new(
                FailureKind::Browser,
                "Rendered page was empty",
            ));
        }

        Ok(content)
    }
}

#[async_trait]
impl Renderer for HeadlessChromeRenderer {
    async fn render(
        &self,
        url: &Url,
        identity: &Identity,
        settle: Duration,
    ) -> Result<String, FetchFailure> {
        let renderer = self.clone();
        let url = url.clone();
        let identity = *identity;

        tokio::task::spawn_blocking(move || renderer.render_blocking(&url, &identity, settle))
            .await
            .map_err(|e| browser_failure("join render task", e))?
    }
}

/// A running browser with one open tab
///
/// Dropping the session closes the tab and then the browser process, on
/// every exit path.
struct RenderSession {
    tab: Arc<Tab>,
    _browser: Browser,
}

impl RenderSession {
    fn launch(
        renderer: &HeadlessChromeRenderer,
        identity: &Identity,
    ) -> Result<Self, FetchFailure> {
        let user_agent_arg = format!("--user-agent={}", identity.user_agent());
        let lang_arg = format!(
            "--lang={}",
            identity
                .signature
                .accept_language
                .split(',')
                .next()
                .unwrap_or("en-US")
        );
        let args = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--no-first-run"),
            OsStr::new(&user_agent_arg),
            OsStr::new(&lang_arg),
        ];

        let browser = Browser::new(LaunchOptions {
            headless: true,
            sandbox: false,
            window_size: Some((1366, 768)),
            path: Some(renderer.executable.clone()),
            proxy_server: renderer.proxy_server.as_deref(),
            idle_browser_timeout: renderer.navigation_timeout * 2,
            args,
            ..Default::default()
        })
        .map_err(|e| browser_failure("launch browser", e))?;

        let tab = browser
            .new_tab()
            .map_err(|e| browser_failure("open tab", e))?;

        Ok(Self {
            tab,
            _browser: browser,
        })
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            tracing::debug!("Failed to close browser tab: {}", e);
        }
    }
}

fn browser_failure(step: &str, error: impl std::fmt::Display) -> FetchFailure {
    FetchFailure::new(
        FailureKind::Browser,
        format!("Browser failed to {}: {}", step, error),
    )
}
