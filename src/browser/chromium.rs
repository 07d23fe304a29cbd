//! chromiumoxide-backed [`PageRenderer`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::{Browser, BrowserConfig as LaunchConfig, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{PageRenderer, RenderRequest};
use crate::config::BrowserConfig;
use crate::error::FetchError;

/// JavaScript to wait for page ready state.
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// Headless Chrome renderer. The browser is launched lazily on first use
/// and shared by every render afterwards.
pub struct ChromiumRenderer {
    config: BrowserConfig,
    browser: Mutex<Option<Browser>>,
}

impl ChromiumRenderer {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            browser: Mutex::new(None),
        }
    }

    fn find_chrome(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config.chrome_path {
            return path.exists().then(|| path.clone());
        }
        Self::CHROME_PATHS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(Path::to_path_buf)
    }

    /// Open a blank page, launching or connecting to the browser if needed.
    async fn new_page(&self, request: &RenderRequest) -> Result<Page, FetchError> {
        let mut slot = self.browser.lock().await;
        open_from_slot(&mut *slot, self.start(request)).await
    }

    async fn start(&self, request: &RenderRequest) -> Result<Browser, FetchError> {
        match self.config.remote_url.clone() {
            Some(url) => self.connect_remote(&url).await,
            None => self.launch(request).await,
        }
    }

    async fn launch(&self, request: &RenderRequest) -> Result<Browser, FetchError> {
        let chrome = self.find_chrome().ok_or_else(|| {
            warn!("Chrome/Chromium not found; set browser.chrome_path or browser.remote_url");
            FetchError::RendererUnavailable(request.channel)
        })?;
        info!(
            "Launching browser at {} (headless={})",
            chrome.display(),
            self.config.headless
        );

        let mut builder = LaunchConfig::builder().chrome_executable(chrome);
        if !self.config.headless {
            builder = builder.with_head();
        }
        let launch_config = builder
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .build()
            .map_err(|e| FetchError::Render(format!("failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(launch_config)
            .await
            .map_err(|e| FetchError::Render(format!("failed to launch browser: {}", e)))?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    async fn connect_remote(&self, url: &str) -> Result<Browser, FetchError> {
        info!("Connecting to remote browser at {}", url);

        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await?
            .json()
            .await?;
        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FetchError::Render("no webSocketDebuggerUrl in response".to_string()))?;

        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| FetchError::Render(format!("failed to connect to browser: {}", e)))?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    async fn render_inner(
        &self,
        page: &Page,
        request: &RenderRequest,
    ) -> Result<Vec<String>, FetchError> {
        page.execute(SetUserAgentOverrideParams::new(request.user_agent.clone()))
            .await
            .map_err(|e| FetchError::Render(format!("failed to set user agent: {}", e)))?;

        page.goto(request.url.as_str())
            .await
            .map_err(|e| FetchError::Render(format!("navigation failed: {}", e)))?;

        let wait = Duration::from_secs(self.config.render_wait_secs).min(request.timeout);
        wait_for_page_ready(page, wait).await;
        if let Some(selector) = &request.wait_for {
            wait_for_selector(page, selector, wait).await;
        }

        let script = region_text_script(&request.regions)?;
        let texts: Vec<String> = page
            .evaluate(script)
            .await
            .map_err(|e| FetchError::Render(format!("failed to read page text: {}", e)))?
            .into_value()
            .map_err(|e| FetchError::Render(format!("unexpected region text: {}", e)))?;

        debug!("Captured {} text region(s) from {}", texts.len(), request.url);
        Ok(texts)
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<Vec<String>, FetchError> {
        let page = OpenPage::new(self.new_page(request).await?);
        let result = within(request.timeout, self.render_inner(&page.page, request)).await;
        page.close().await;
        result
    }
}

/// Anything that hands out pages. An error means the browser is gone.
#[async_trait]
trait PageSource: Send + Sync {
    type Page: Send;

    async fn open_page(&self) -> Result<Self::Page, String>;
}

#[async_trait]
impl PageSource for Browser {
    type Page = Page;

    async fn open_page(&self) -> Result<Page, String> {
        self.new_page("about:blank").await.map_err(|e| e.to_string())
    }
}

/// Open a page on the browser in `slot`, replacing it with one from `start`
/// when the slot is empty or its browser has died.
async fn open_from_slot<S, F>(slot: &mut Option<S>, start: F) -> Result<S::Page, FetchError>
where
    S: PageSource,
    F: Future<Output = Result<S, FetchError>>,
{
    if let Some(browser) = slot.as_ref() {
        let opened = browser.open_page().await;
        match opened {
            Ok(page) => return Ok(page),
            Err(e) => {
                warn!("Browser stopped responding ({}); restarting", e);
                *slot = None;
            }
        }
    }

    let browser = start.await?;
    let page = browser
        .open_page()
        .await
        .map_err(|e| FetchError::Render(format!("failed to open page: {}", e)))?;
    *slot = Some(browser);
    Ok(page)
}

/// A page that is closed on drop, so cancelled renders do not leak tabs.
struct OpenPage {
    page: Page,
    closed: bool,
}

impl OpenPage {
    fn new(page: Page) -> Self {
        Self {
            page,
            closed: false,
        }
    }

    async fn close(mut self) {
        self.closed = true;
        if let Err(e) = self.page.clone().close().await {
            debug!("Failed to close page: {}", e);
        }
    }
}

impl Drop for OpenPage {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let page = self.page.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = page.close().await;
            });
        }
    }
}

/// Bound a render by the request timeout.
async fn within<T>(
    timeout: Duration,
    render: impl Future<Output = Result<T, FetchError>>,
) -> Result<T, FetchError> {
    tokio::time::timeout(timeout, render)
        .await
        .map_err(|_| FetchError::Timeout(timeout))?
}

/// Wait for the page to reach a ready state.
async fn wait_for_page_ready(page: &Page, timeout: Duration) {
    match tokio::time::timeout(timeout, page.evaluate(WAIT_FOR_READY_SCRIPT.to_string())).await {
        Ok(Ok(result)) => {
            let state: String = result
                .into_value()
                .unwrap_or_else(|_| "unknown".to_string());
            debug!("Page ready state: {}", state);
        }
        Ok(Err(e)) => debug!("Could not check ready state: {}", e),
        Err(_) => warn!("Timeout waiting for page ready state"),
    }
}

/// Wait for the price selector; a miss is logged, not fatal.
async fn wait_for_selector(page: &Page, selector: &str, timeout: Duration) {
    debug!("Waiting for selector: {}", selector);
    match tokio::time::timeout(timeout, page.find_element(selector)).await {
        Ok(Ok(_)) => debug!("Selector found"),
        Ok(Err(e)) => debug!("Selector not found: {}", e),
        Err(_) => warn!("Timeout waiting for selector {}", selector),
    }
}

/// Script returning the innerText of every region match, or the body text.
fn region_text_script(regions: &[String]) -> Result<String, FetchError> {
    let selectors = serde_json::to_string(regions)
        .map_err(|e| FetchError::Render(format!("invalid region selectors: {}", e)))?;
    Ok(format!(
        r#"(() => {{
            const out = [];
            for (const sel of {selectors}) {{
                try {{
                    document.querySelectorAll(sel).forEach((el) => {{
                        const text = (el.innerText || '').trim();
                        if (text) out.push(text);
                    }});
                }} catch (e) {{}}
            }}
            if (out.length === 0 && document.body) out.push(document.body.innerText || '');
            return out;
        }})()"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_script_embeds_selectors() {
        let script = region_text_script(&["[data-stid=\"price-summary\"]".to_string()]).unwrap();
        assert!(script.contains(r#"[data-stid=\"price-summary\"]"#));
        assert!(script.contains("document.body.innerText"));
    }

    struct FakeBrowser {
        id: u32,
        alive: bool,
    }

    #[async_trait]
    impl PageSource for FakeBrowser {
        type Page = u32;

        async fn open_page(&self) -> Result<u32, String> {
            if self.alive {
                Ok(self.id)
            } else {
                Err("connection closed".to_string())
            }
        }
    }

    fn fake(id: u32, alive: bool) -> FakeBrowser {
        FakeBrowser { id, alive }
    }

    #[tokio::test]
    async fn live_browser_is_reused() {
        let mut slot = Some(fake(1, true));
        let page = open_from_slot(&mut slot, async {
            Err::<FakeBrowser, _>(FetchError::Render("started".to_string()))
        })
        .await
        .unwrap();
        assert_eq!(page, 1);
    }

    #[tokio::test]
    async fn dead_browser_is_replaced() {
        let mut slot = Some(fake(1, false));
        let page = open_from_slot(&mut slot, async { Ok(fake(2, true)) })
            .await
            .unwrap();
        assert_eq!(page, 2);
        assert_eq!(slot.as_ref().map(|b| b.id), Some(2));
    }

    #[tokio::test]
    async fn failed_restart_leaves_slot_empty() {
        let mut slot = Some(fake(1, false));
        let err = open_from_slot(&mut slot, async {
            Err::<FakeBrowser, _>(FetchError::Render("launch failed".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, FetchError::Render(_)));
        assert!(slot.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn render_is_bounded_by_request_timeout() {
        let timeout = Duration::from_secs(5);
        let err = within(timeout, std::future::pending::<Result<Vec<String>, FetchError>>())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(t) if t == timeout));
    }

    #[tokio::test]
    async fn missing_chrome_is_unavailable() {
        let renderer = ChromiumRenderer::new(BrowserConfig {
            chrome_path: Some(PathBuf::from("/nonexistent/chrome")),
            ..BrowserConfig::default()
        });
        let request = RenderRequest {
            channel: crate::models::Channel::Vrbo,
            url: "https://www.vrbo.com/123".to_string(),
            wait_for: None,
            regions: vec![],
            user_agent: "test".to_string(),
            timeout: Duration::from_secs(1),
        };
        let err = renderer.render(&request).await.unwrap_err();
        assert!(matches!(err, FetchError::RendererUnavailable(_)));
        assert!(!err.is_retryable());
    }
}
