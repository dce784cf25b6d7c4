//! A narrow capability wrapper over a headless Chrome process. Mirrors the
//! reference workspace's `registration::browser::HeadlessBrowser`, trimmed to
//! the operations the crawl pipeline actually needs: launch, open a tab,
//! navigate, wait for network idle, read the final URL/HTML, close. Form
//! filling, CAPTCHA handling, and human-behavior simulation stay behind in
//! the registration flow this was lifted from — the crawl pipeline never
//! interacts with a page, only reads it.

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use headless_chrome::{Browser as ChromeBrowser, Tab as ChromeTab};
use tracing::{debug, warn};

pub const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// One headless browser process, scoped to a single caller (typically one
/// URL-resolve call or one batch of Google News tabs). Never pooled across
/// jobs: the caller launches it, uses it, and lets it drop.
pub struct HeadlessBrowser {
    inner: ChromeBrowser,
}

impl HeadlessBrowser {
    /// Launch with the same container-safe flags as the reference workspace's
    /// `HeadlessBrowser::new`: `--no-sandbox --disable-dev-shm-usage --disable-gpu`.
    pub fn launch() -> Result<Self> {
        let extra_args: Vec<OsString> = vec![
            OsString::from("--no-sandbox"),
            OsString::from("--disable-dev-shm-usage"),
            OsString::from("--disable-gpu"),
        ];

        let mut builder = headless_chrome::LaunchOptionsBuilder::default();
        builder
            .headless(true)
            .window_size(Some((1920, 1080)))
            .args(extra_args.iter().map(|a| a.as_ref()).collect());

        if let Ok(chrome_path) = std::env::var("CHROME_PATH") {
            builder.path(Some(std::path::PathBuf::from(chrome_path)));
        }

        let launch_options = builder
            .build()
            .map_err(|e| anyhow!("failed to build browser launch options: {e}"))?;
        let inner = ChromeBrowser::new(launch_options)?;
        Ok(Self { inner })
    }

    pub fn new_tab(&self) -> Result<BrowserTab> {
        let tab = self.inner.new_tab()?;
        Ok(BrowserTab { inner: tab })
    }
}

/// One tab within a `HeadlessBrowser`. Dropped (and its underlying CDP
/// session torn down) when the caller is done with it.
pub struct BrowserTab {
    inner: Arc<ChromeTab>,
}

/// Resource extensions blocked on Google-News-batch tabs — the page is only
/// read for its final URL/HTML, so images/fonts/styles are pure waste.
pub const BLOCKED_RESOURCE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "css", "woff", "woff2", "ttf", "eot", "ico",
];

impl BrowserTab {
    pub fn set_user_agent(&self, ua: &str) -> Result<()> {
        self.inner.set_user_agent(ua, None, None)?;
        Ok(())
    }

    /// Blocks the given URL-matching patterns at the network layer via CDP
    /// `Network.setBlockedURLs`, the same `call_method` idiom the reference
    /// workspace uses for `Page.captureScreenshot`.
    pub fn block_resource_extensions(&self, extensions: &[&str]) -> Result<()> {
        let urls: Vec<String> = extensions.iter().map(|ext| format!("*.{ext}")).collect();
        self.inner
            .call_method(headless_chrome::protocol::cdp::Network::SetBlockedURLs { urls })?;
        Ok(())
    }

    /// Navigate and wait for `domcontentloaded`, bounded by `timeout`.
    pub fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        self.inner.set_default_timeout(timeout);
        self.inner.navigate_to(url)?;
        self.inner.wait_until_navigated()?;
        Ok(())
    }

    /// Best-effort wait for network-idle; unlike `goto` this never fails the
    /// caller — a rendered SPA may never go fully idle.
    pub fn wait_network_idle(&self, timeout: Duration) -> Result<()> {
        self.inner.set_default_timeout(timeout);
        if let Err(e) = self.inner.wait_until_navigated() {
            debug!(error = %e, "network-idle wait did not settle cleanly");
        }
        Ok(())
    }

    pub fn final_url(&self) -> String {
        self.inner.get_url()
    }

    pub fn content(&self) -> Result<String> {
        Ok(self.inner.get_content()?)
    }
}

/// Uniform random sleep in `[min, max]` seconds, used for the anti-detection
/// pacing between tabs and between batches in the Google News batch path.
pub async fn jittered_sleep(min_secs: f64, max_secs: f64) {
    let secs = if max_secs > min_secs {
        min_secs + rand::random::<f64>() * (max_secs - min_secs)
    } else {
        min_secs
    };
    if secs < 0.0 {
        warn!("computed negative jitter sleep, clamped to zero");
    }
    tokio::time::sleep(Duration::from_secs_f64(secs.max(0.0))).await;
}
