use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Renders pages in headless Chrome so script-driven pagination runs
pub struct BrowserRenderer {
    browser: Browser,
    settle: Duration,
}

impl BrowserRenderer {
    /// Launch headless Chrome
    pub fn new(settle: Duration) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self { browser, settle })
    }

    /// Navigate, let scripts settle, dismiss the cookie banner and return the DOM.
    /// Blocking; call from `spawn_blocking`.
    pub fn render(&self, url: &str) -> Result<String> {
        let tab = self.browser.new_tab().context("Failed to open tab")?;

        tab.navigate_to(url)
            .with_context(|| format!("Failed to navigate to {}", url))?;
        tab.wait_until_navigated()?;

        debug!("Waiting {:?} for {} to settle", self.settle, url);
        thread::sleep(self.settle);

        // Accept cookies if present
        let _ = tab.evaluate(
            r#"
            const button = document.querySelector('button[id*="accept"], button[id*="kabul"]');
            if (button) button.click();
            "#,
            false,
        );

        let html_result = tab.evaluate("document.documentElement.outerHTML", false)?;
        let html = html_result
            .value
            .as_ref()
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string();

        if let Err(e) = tab.close(true) {
            warn!("Failed to close tab for {}: {}", url, e);
        }

        debug!("Rendered {} bytes from {}", html.len(), url);
        Ok(html)
    }
}
