//! Scripted browser sessions over the WebDriver protocol.
//!
//! Capabilities that need rendered or interactive pages drive a
//! `BrowserSession`. The session only depends on the `BrowserEngine`
//! seam (navigate, script eval, quit); engine internals stay out of
//! scope. The production engine speaks WebDriver's REST surface against
//! a configured endpoint with headless, sandbox-less, ephemeral-profile
//! options.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{ExtractError, ExtractResult};
use crate::types::config::BrowserConfig;

/// Scripted interaction contract with a browser.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Load a page.
    async fn navigate(&mut self, url: &str) -> ExtractResult<()>;

    /// Evaluate a script in the page and return its value.
    async fn execute_script(&mut self, script: &str) -> ExtractResult<Value>;

    /// Terminate the browser.
    async fn quit(&mut self) -> ExtractResult<()>;
}

/// Acquires engines for capabilities; the seam keeps them testable
/// without a live WebDriver endpoint.
#[async_trait]
pub trait EngineProvider: Send + Sync {
    async fn acquire(&self, config: &BrowserConfig) -> ExtractResult<Box<dyn BrowserEngine>>;
}

/// Provider backed by a real WebDriver endpoint.
#[derive(Debug, Default)]
pub struct WebDriverProvider;

#[async_trait]
impl EngineProvider for WebDriverProvider {
    async fn acquire(&self, config: &BrowserConfig) -> ExtractResult<Box<dyn BrowserEngine>> {
        Ok(Box::new(WebDriverEngine::launch(config).await?))
    }
}

#[derive(Debug, Deserialize)]
struct WebDriverValue<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct NewSessionValue {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusValue {
    ready: bool,
    #[serde(default)]
    message: String,
}

fn browser_err(error: reqwest::Error) -> ExtractError {
    ExtractError::Browser(Box::new(error))
}

/// Probe the WebDriver endpoint once during service startup.
///
/// Idempotent; replaces any import-time driver installation side effect.
pub async fn provision(webdriver_url: &str) -> ExtractResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(browser_err)?;

    let response = client
        .get(format!("{}/status", webdriver_url))
        .send()
        .await
        .map_err(browser_err)?;

    if !response.status().is_success() {
        return Err(ExtractError::Browser(
            format!("webdriver status check failed: HTTP {}", response.status()).into(),
        ));
    }

    let status: WebDriverValue<StatusValue> = response.json().await.map_err(browser_err)?;
    if !status.value.ready {
        return Err(ExtractError::Browser(
            format!("webdriver not ready: {}", status.value.message).into(),
        ));
    }

    debug!(url = %webdriver_url, "webdriver endpoint ready");
    Ok(())
}

/// A WebDriver session: one browser process, one ephemeral profile.
pub struct WebDriverEngine {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
    // Removed with the engine; keeps the profile isolated per session.
    _profile_dir: TempDir,
}

impl WebDriverEngine {
    /// Start a browser session against the configured endpoint.
    pub async fn launch(config: &BrowserConfig) -> ExtractResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.script_timeout)
            .build()
            .map_err(browser_err)?;

        let profile_dir = tempfile::tempdir()?;
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-notifications".to_string(),
            "--disable-popup-blocking".to_string(),
            "--disable-extensions".to_string(),
            format!("--user-data-dir={}", profile_dir.path().display()),
        ];
        if config.headless {
            args.push("--headless=new".to_string());
        }

        let body = json!({
            "capabilities": {
                "alwaysMatch": {
                    "goog:chromeOptions": { "args": args }
                }
            }
        });

        let response = client
            .post(format!("{}/session", config.webdriver_url))
            .json(&body)
            .send()
            .await
            .map_err(browser_err)?;

        if !response.status().is_success() {
            return Err(ExtractError::Browser(
                format!("webdriver session create failed: HTTP {}", response.status()).into(),
            ));
        }

        let session: WebDriverValue<NewSessionValue> =
            response.json().await.map_err(browser_err)?;

        debug!(session = %session.value.session_id, "browser session started");
        Ok(Self {
            client,
            base_url: config.webdriver_url.clone(),
            session_id: session.value.session_id,
            _profile_dir: profile_dir,
        })
    }

    fn session_url(&self, path: &str) -> String {
        format!("{}/session/{}{}", self.base_url, self.session_id, path)
    }
}

#[async_trait]
impl BrowserEngine for WebDriverEngine {
    async fn navigate(&mut self, url: &str) -> ExtractResult<()> {
        let response = self
            .client
            .post(self.session_url("/url"))
            .json(&json!({ "url": url }))
            .send()
            .await
            .map_err(browser_err)?;

        if !response.status().is_success() {
            return Err(ExtractError::Browser(
                format!("navigate to {} failed: HTTP {}", url, response.status()).into(),
            ));
        }
        Ok(())
    }

    async fn execute_script(&mut self, script: &str) -> ExtractResult<Value> {
        let response = self
            .client
            .post(self.session_url("/execute/sync"))
            .json(&json!({ "script": script, "args": [] }))
            .send()
            .await
            .map_err(browser_err)?;

        if !response.status().is_success() {
            return Err(ExtractError::Browser(
                format!("script evaluation failed: HTTP {}", response.status()).into(),
            ));
        }

        let result: WebDriverValue<Value> = response.json().await.map_err(browser_err)?;
        Ok(result.value)
    }

    async fn quit(&mut self) -> ExtractResult<()> {
        let response = self
            .client
            .delete(self.session_url(""))
            .send()
            .await
            .map_err(browser_err)?;

        if !response.status().is_success() {
            return Err(ExtractError::Browser(
                format!("session delete failed: HTTP {}", response.status()).into(),
            ));
        }
        Ok(())
    }
}

/// A scoped, stateful automation handle.
///
/// Acquire, drive, then call [`release`](Self::release) — the owning
/// capability does this on every exit path. Dropping an unreleased
/// session triggers a best-effort background termination so an abnormal
/// exit never leaks a browser process.
pub struct BrowserSession {
    engine: Option<Box<dyn BrowserEngine>>,
    config: BrowserConfig,
}

impl BrowserSession {
    pub fn new(engine: Box<dyn BrowserEngine>, config: BrowserConfig) -> Self {
        Self {
            engine: Some(engine),
            config,
        }
    }

    fn engine_mut(&mut self) -> ExtractResult<&mut Box<dyn BrowserEngine>> {
        self.engine
            .as_mut()
            .ok_or_else(|| ExtractError::Browser("session already released".into()))
    }

    /// Run the configured login script, if any. No-op by default;
    /// sources that need authentication supply the script through
    /// [`BrowserConfig::with_login_script`].
    pub async fn login(&mut self) -> ExtractResult<()> {
        if let Some(script) = self.config.login_script.clone() {
            self.execute_script(&script).await?;
        }
        Ok(())
    }

    pub async fn navigate(&mut self, url: &str) -> ExtractResult<()> {
        self.engine_mut()?.navigate(url).await
    }

    pub async fn execute_script(&mut self, script: &str) -> ExtractResult<Value> {
        self.engine_mut()?.execute_script(script).await
    }

    async fn page_height(&mut self) -> ExtractResult<i64> {
        let value = self
            .execute_script("return document.body.scrollHeight;")
            .await?;
        value
            .as_i64()
            .ok_or_else(|| ExtractError::Browser("scrollHeight was not a number".into()))
    }

    /// Scroll to the bottom until the page height stops changing or
    /// `max_scrolls` is reached, whichever comes first. Returns the
    /// number of scrolls performed.
    pub async fn scroll_to_stable(&mut self, max_scrolls: usize) -> ExtractResult<usize> {
        let mut last_height = self.page_height().await?;
        let mut scrolls = 0;

        while scrolls < max_scrolls {
            self.execute_script("window.scrollTo(0, document.body.scrollHeight);")
                .await?;
            tokio::time::sleep(self.config.settle).await;

            let height = self.page_height().await?;
            scrolls += 1;
            if height == last_height {
                break;
            }
            last_height = height;
        }

        Ok(scrolls)
    }

    /// Terminate the browser. Failures are logged and swallowed so
    /// release never masks the primary result of the job.
    pub async fn release(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            if let Err(error) = engine.quit().await {
                warn!(error = %error, "browser release failed");
            }
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            warn!("browser session dropped without release, terminating in background");
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = engine.quit().await;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineCall, MockBrowserEngine};

    fn quick_config() -> BrowserConfig {
        BrowserConfig::default().with_settle(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_scroll_stops_when_height_is_stable() {
        let mock = MockBrowserEngine::new().with_heights([1000, 2000, 2000]);
        let mut session = BrowserSession::new(Box::new(mock.clone()), quick_config());

        // Heights: initial 1000, then 2000 (changed), then 2000 (stable).
        let scrolls = session.scroll_to_stable(10).await.unwrap();
        assert_eq!(scrolls, 2);
        session.release().await;
    }

    #[tokio::test]
    async fn test_scroll_stops_at_limit() {
        // Height grows forever; the limit has to stop the loop.
        let mock = MockBrowserEngine::new().with_heights([1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let mut session = BrowserSession::new(Box::new(mock.clone()), quick_config());

        let scrolls = session.scroll_to_stable(3).await.unwrap();
        assert_eq!(scrolls, 3);
        session.release().await;
    }

    #[tokio::test]
    async fn test_login_is_noop_without_script() {
        let mock = MockBrowserEngine::new();
        let mut session = BrowserSession::new(Box::new(mock.clone()), quick_config());

        session.login().await.unwrap();
        assert!(mock.calls().is_empty());
        session.release().await;
    }

    #[tokio::test]
    async fn test_login_runs_configured_script() {
        let mock = MockBrowserEngine::new();
        let config = quick_config().with_login_script("doLogin();");
        let mut session = BrowserSession::new(Box::new(mock.clone()), config);

        session.login().await.unwrap();
        assert_eq!(
            mock.calls(),
            vec![EngineCall::Script("doLogin();".to_string())]
        );
        session.release().await;
    }

    #[tokio::test]
    async fn test_release_terminates_engine_and_is_idempotent() {
        let mock = MockBrowserEngine::new();
        let mut session = BrowserSession::new(Box::new(mock.clone()), quick_config());

        session.release().await;
        session.release().await;
        assert!(mock.quit_called());

        // Operations after release fail with a typed error.
        assert!(session.navigate("https://example.com").await.is_err());
    }
}
