//! Browser sessions over the W3C WebDriver protocol.
//!
//! The browser engine is an external process (chromedriver or an equivalent
//! remote end); everything here is plain HTTP+JSON against it. Sessions are
//! request-scoped and carry a drop guard so a cancelled scrape cannot leak a
//! browser process.

use crate::domain::model::{PageLink, StoredCookie};
use crate::domain::ports::{BrowserDriver, BrowserSession};
use crate::utils::error::{Result, ScrapeError};
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Base URL of the WebDriver remote end.
    pub webdriver_url: String,
    pub window_width: u32,
    pub window_height: u32,
    pub locale: String,
    pub user_agent: String,
    /// Fixed settle delay after navigation, in lieu of network-idle tracking.
    pub page_settle: Duration,
    /// JSON file of cookies to preload into each session.
    pub cookies_file: Option<PathBuf>,
    pub headless: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            window_width: 1920,
            window_height: 5000,
            locale: "zh-TW".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/85.0.4183.102 Safari/537.36"
                .to_string(),
            page_settle: Duration::from_secs(3),
            cookies_file: Some(PathBuf::from("./cookies.json")),
            headless: true,
        }
    }
}

/// Session factory against one WebDriver remote end.
pub struct WebDriverBrowser {
    client: Client,
    settings: BrowserSettings,
}

impl WebDriverBrowser {
    pub fn new(client: Client, settings: BrowserSettings) -> Self {
        Self { client, settings }
    }

    fn capabilities(&self) -> serde_json::Value {
        let mut args = vec![
            format!(
                "--window-size={},{}",
                self.settings.window_width, self.settings.window_height
            ),
            format!("--lang={}", self.settings.locale),
            format!("--user-agent={}", self.settings.user_agent),
            "--disable-web-security".to_string(),
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
        ];
        if self.settings.headless {
            args.insert(0, "--headless=new".to_string());
        }

        serde_json::json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }

    fn load_cookies(&self) -> Vec<StoredCookie> {
        let Some(path) = &self.settings.cookies_file else {
            return Vec::new();
        };
        if !path.exists() {
            debug!("cookies file {} not found, starting without cookies", path.display());
            return Vec::new();
        }
        match std::fs::read_to_string(path)
            .map_err(ScrapeError::Io)
            .and_then(|raw| Ok(serde_json::from_str::<Vec<StoredCookie>>(&raw)?))
        {
            Ok(cookies) => {
                debug!("loaded {} cookies from {}", cookies.len(), path.display());
                cookies
            }
            Err(e) => {
                warn!("ignoring unreadable cookies file {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl BrowserDriver for WebDriverBrowser {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>> {
        let base_url = self.settings.webdriver_url.trim_end_matches('/').to_string();
        let response = self
            .client
            .post(format!("{}/session", base_url))
            .json(&self.capabilities())
            .send()
            .await?;
        let value = webdriver_value(response).await?;

        let session_id = value
            .get("sessionId")
            .and_then(|id| id.as_str())
            .ok_or_else(|| ScrapeError::Browser {
                message: "session response carried no sessionId".to_string(),
            })?
            .to_string();

        debug!("opened WebDriver session {}", session_id);
        Ok(Box::new(WebDriverSession {
            client: self.client.clone(),
            base_url,
            session_id,
            page_settle: self.settings.page_settle,
            pending_cookies: self.load_cookies(),
            closed: false,
        }))
    }
}

pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: String,
    page_settle: Duration,
    /// Cookies waiting for the first navigation to a matching domain.
    pending_cookies: Vec<StoredCookie>,
    closed: bool,
}

impl WebDriverSession {
    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/session/{}{}", self.base_url, self.session_id, suffix)
    }

    async fn execute(&self, script: &str, args: serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(self.endpoint("/execute/sync"))
            .json(&serde_json::json!({ "script": script, "args": args }))
            .send()
            .await?;
        webdriver_value(response).await
    }

    /// Install pending cookies whose domain matches the page just loaded.
    /// Cookies without a domain bind to the first page navigated to.
    async fn install_matching_cookies(&mut self, target: &str) -> Result<()> {
        if self.pending_cookies.is_empty() {
            return Ok(());
        }
        let Some(host) = Url::parse(target).ok().and_then(|u| u.host_str().map(str::to_string))
        else {
            return Ok(());
        };

        let mut remaining = Vec::new();
        let pending: Vec<_> = self.pending_cookies.drain(..).collect();
        for cookie in pending {
            let matches = match cookie.domain.as_deref() {
                None => true,
                Some(domain) => {
                    let domain = domain.trim_start_matches('.');
                    host == domain || host.ends_with(&format!(".{}", domain))
                }
            };
            if matches {
                debug!("installing cookie '{}' for {}", cookie.name, host);
                self.push_cookie(&cookie).await?;
            } else {
                remaining.push(cookie);
            }
        }
        self.pending_cookies = remaining;
        Ok(())
    }

    async fn push_cookie(&self, cookie: &StoredCookie) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint("/cookie"))
            .json(&serde_json::json!({ "cookie": cookie }))
            .send()
            .await?;
        webdriver_value(response).await?;
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint("/url"))
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await?;
        webdriver_value(response).await?;

        // 固定等待時間取代 network-idle 偵測
        if !self.page_settle.is_zero() {
            tokio::time::sleep(self.page_settle).await;
        }

        self.install_matching_cookies(url).await
    }

    async fn current_url(&self) -> Result<String> {
        let response = self.client.get(self.endpoint("/url")).send().await?;
        let value = webdriver_value(response).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ScrapeError::Browser {
                message: "current URL response was not a string".to_string(),
            })
    }

    async fn title(&self) -> Result<String> {
        let response = self.client.get(self.endpoint("/title")).send().await?;
        let value = webdriver_value(response).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn page_text(&self) -> Result<String> {
        let value = self
            .execute(
                "return document.body ? document.body.innerText : '';",
                serde_json::json!([]),
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn collect_links(&self, limit: usize) -> Result<Vec<PageLink>> {
        let value = self
            .execute(
                "const limit = arguments[0]; \
                 return Array.from(document.querySelectorAll('a[href]')) \
                   .slice(0, limit) \
                   .map(a => ({href: a.getAttribute('href'), text: a.innerText}));",
                serde_json::json!([limit]),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let response = self
            .client
            .delete(format!("{}/session/{}", self.base_url, self.session_id))
            .send()
            .await?;
        webdriver_value(response).await?;
        self.closed = true;
        debug!("closed WebDriver session {}", self.session_id);
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // 取消（client 斷線）時 handler future 會被丟棄，這裡補做清理
        let client = self.client.clone();
        let url = format!("{}/session/{}", self.base_url, self.session_id);
        let session_id = self.session_id.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = client.delete(&url).send().await {
                    debug!("best-effort cleanup of session {} failed: {}", session_id, e);
                }
            });
        }
    }
}

/// Unwrap the `{"value": ...}` envelope every WebDriver response uses,
/// mapping the protocol's error shape onto `ScrapeError::Browser`.
async fn webdriver_value(response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    let value = body.get("value").cloned().unwrap_or(serde_json::Value::Null);

    if !status.is_success() {
        let message = value
            .get("message")
            .and_then(|m| m.as_str())
            .filter(|m| !m.is_empty())
            .unwrap_or("unknown WebDriver error")
            .to_string();
        return Err(ScrapeError::Browser { message });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn settings(server: &MockServer) -> BrowserSettings {
        BrowserSettings {
            webdriver_url: server.base_url(),
            page_settle: Duration::ZERO,
            cookies_file: None,
            ..BrowserSettings::default()
        }
    }

    fn mock_new_session(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(POST).path("/session");
            then.status(200)
                .json_body(serde_json::json!({"value": {"sessionId": "sess-1"}}));
        })
    }

    #[tokio::test]
    async fn test_open_session_extracts_session_id_and_navigates() {
        let server = MockServer::start();
        let session_mock = mock_new_session(&server);
        let goto_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/session/sess-1/url")
                .json_body(serde_json::json!({"url": "https://site.test/list"}));
            then.status(200).json_body(serde_json::json!({"value": null}));
        });

        let driver = WebDriverBrowser::new(Client::new(), settings(&server));
        let mut session = driver.open_session().await.unwrap();
        session.goto("https://site.test/list").await.unwrap();

        session_mock.assert();
        goto_mock.assert();

        // Drop 前先關閉，避免測試結束後 guard 打到已停止的 mock server
        let close_mock = server.mock(|when, then| {
            when.method(DELETE).path("/session/sess-1");
            then.status(200).json_body(serde_json::json!({"value": null}));
        });
        session.close().await.unwrap();
        close_mock.assert();
    }

    #[tokio::test]
    async fn test_page_text_and_links_via_execute() {
        let server = MockServer::start();
        mock_new_session(&server);
        let execute_mock = server.mock(|when, then| {
            when.method(POST).path("/session/sess-1/execute/sync");
            then.status(200).json_body(serde_json::json!({
                "value": [
                    {"href": "/a/1", "text": "First"},
                    {"href": "https://site.test/a/2", "text": "Second"}
                ]
            }));
        });

        let driver = WebDriverBrowser::new(Client::new(), settings(&server));
        let mut session = driver.open_session().await.unwrap();
        let links = session.collect_links(10).await.unwrap();

        execute_mock.assert();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].href, "/a/1");
        assert_eq!(links[1].text, "Second");

        server.mock(|when, then| {
            when.method(DELETE).path("/session/sess-1");
            then.status(200).json_body(serde_json::json!({"value": null}));
        });
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_webdriver_error_envelope_maps_to_browser_error() {
        let server = MockServer::start();
        mock_new_session(&server);
        server.mock(|when, then| {
            when.method(GET).path("/session/sess-1/url");
            then.status(404).json_body(serde_json::json!({
                "value": {"error": "no such window", "message": "window was closed"}
            }));
        });

        let driver = WebDriverBrowser::new(Client::new(), settings(&server));
        let mut session = driver.open_session().await.unwrap();
        let err = session.current_url().await.unwrap_err();

        match err {
            ScrapeError::Browser { message } => assert_eq!(message, "window was closed"),
            other => panic!("unexpected error: {:?}", other),
        }

        server.mock(|when, then| {
            when.method(DELETE).path("/session/sess-1");
            then.status(200).json_body(serde_json::json!({"value": null}));
        });
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let server = MockServer::start();
        mock_new_session(&server);
        let delete_mock = server.mock(|when, then| {
            when.method(DELETE).path("/session/sess-1");
            then.status(200).json_body(serde_json::json!({"value": null}));
        });

        let driver = WebDriverBrowser::new(Client::new(), settings(&server));
        let mut session = driver.open_session().await.unwrap();
        session.close().await.unwrap();
        session.close().await.unwrap();

        delete_mock.assert_hits(1);
    }

    #[tokio::test]
    async fn test_cookies_install_after_matching_navigation() {
        let server = MockServer::start();
        let cookies_file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            cookies_file.path(),
            serde_json::to_string(&serde_json::json!([
                {"name": "auth", "value": "abc", "domain": ".site.test"},
                {"name": "other", "value": "xyz", "domain": "elsewhere.test"}
            ]))
            .unwrap(),
        )
        .unwrap();

        mock_new_session(&server);
        server.mock(|when, then| {
            when.method(POST).path("/session/sess-1/url");
            then.status(200).json_body(serde_json::json!({"value": null}));
        });
        let cookie_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/session/sess-1/cookie")
                .json_body(serde_json::json!({
                    "cookie": {"name": "auth", "value": "abc", "domain": ".site.test", "path": null}
                }));
            then.status(200).json_body(serde_json::json!({"value": null}));
        });

        let driver = WebDriverBrowser::new(
            Client::new(),
            BrowserSettings {
                webdriver_url: server.base_url(),
                page_settle: Duration::ZERO,
                cookies_file: Some(cookies_file.path().to_path_buf()),
                ..BrowserSettings::default()
            },
        );
        let mut session = driver.open_session().await.unwrap();
        session.goto("https://www.site.test/list").await.unwrap();

        // 只有 domain 相符的 cookie 會被安裝
        cookie_mock.assert_hits(1);

        server.mock(|when, then| {
            when.method(DELETE).path("/session/sess-1");
            then.status(200).json_body(serde_json::json!({"value": null}));
        });
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_without_close_fires_best_effort_delete() {
        let server = MockServer::start();
        mock_new_session(&server);
        let delete_mock = server.mock(|when, then| {
            when.method(DELETE).path("/session/sess-1");
            then.status(200).json_body(serde_json::json!({"value": null}));
        });

        let driver = WebDriverBrowser::new(Client::new(), settings(&server));
        let session = driver.open_session().await.unwrap();
        drop(session);

        // drop guard 是背景任務，給它一點時間
        tokio::time::sleep(Duration::from_millis(200)).await;
        delete_mock.assert_hits(1);
    }
}
