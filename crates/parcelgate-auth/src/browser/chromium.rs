//! Headless Chromium driven over the DevTools protocol.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventRequestWillBeSent, EventResponseReceived,
};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::port::{BrowserLauncher, BrowserPage, PageObservations};
use crate::credential::SessionCookie;
use crate::error::{AuthError, Result};

const READ_LOCAL_STORAGE: &str = "JSON.stringify(Object.entries(window.localStorage || {}))";

fn browser_err(e: impl std::fmt::Display) -> AuthError {
    AuthError::Browser(e.to_string())
}

/// Launches a fresh headless Chromium per login.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    /// Browser binary; `None` lets chromiumoxide search the usual locations.
    pub executable: Option<PathBuf>,
    /// Run with a visible window (debugging only).
    pub headful: bool,
}

impl ChromiumLauncher {
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self {
            executable,
            headful: false,
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserPage>> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        if self.headful {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(browser_err)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(browser_err)?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let mut session = ChromiumPage {
            browser,
            page: None,
            tasks: vec![handler_task],
            request_urls: Arc::new(Mutex::new(Vec::new())),
            authorization_headers: Arc::new(Mutex::new(Vec::new())),
        };

        if let Err(e) = session.open_page().await {
            let _ = session.close().await;
            return Err(e);
        }
        tracing::debug!("Chromium launched");
        Ok(Box::new(session))
    }
}

/// A Chromium process with a single sniffed page.
pub struct ChromiumPage {
    browser: Browser,
    page: Option<Page>,
    tasks: Vec<JoinHandle<()>>,
    request_urls: Arc<Mutex<Vec<String>>>,
    authorization_headers: Arc<Mutex<Vec<String>>>,
}

impl ChromiumPage {
    async fn open_page(&mut self) -> Result<()> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(browser_err)?;

        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(browser_err)?;
        let urls = Arc::clone(&self.request_urls);
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                urls.lock().push(event.request.url.clone());
            }
        }));

        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(browser_err)?;
        let headers = Arc::clone(&self.authorization_headers);
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if let Some(map) = event.response.headers.inner().as_object() {
                    for (name, value) in map {
                        if name.eq_ignore_ascii_case("authorization")
                            && let Some(value) = value.as_str()
                        {
                            headers.lock().push(value.to_string());
                        }
                    }
                }
            }
        }));

        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| AuthError::Browser("page is closed".to_string()))
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page()?.goto(url).await.map_err(browser_err)?;
        Ok(())
    }

    async fn exists(&mut self, selector: &str) -> Result<bool> {
        Ok(self.page()?.find_element(selector).await.is_ok())
    }

    async fn fill_field(&mut self, selector: &str, value: &str) -> Result<()> {
        self.page()?
            .find_element(selector)
            .await
            .map_err(browser_err)?
            .click()
            .await
            .map_err(browser_err)?
            .type_str(value)
            .await
            .map_err(browser_err)?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        self.page()?
            .find_element(selector)
            .await
            .map_err(browser_err)?
            .click()
            .await
            .map_err(browser_err)?;
        Ok(())
    }

    async fn click_button_with_text(&mut self, texts: &[String]) -> Result<bool> {
        let needles = serde_json::to_string(
            &texts.iter().map(|t| t.to_lowercase()).collect::<Vec<_>>(),
        )
        .map_err(browser_err)?;
        let script = format!(
            "(() => {{ const needles = {needles}; \
             const button = Array.from(document.querySelectorAll('button')) \
               .find(b => needles.some(n => (b.innerText || '').toLowerCase().includes(n))); \
             if (!button) return false; button.click(); return true; }})()"
        );
        self.page()?
            .evaluate(script)
            .await
            .map_err(browser_err)?
            .into_value::<bool>()
            .map_err(browser_err)
    }

    async fn press_enter(&mut self, selector: &str) -> Result<()> {
        self.page()?
            .find_element(selector)
            .await
            .map_err(browser_err)?
            .press_key("Enter")
            .await
            .map_err(browser_err)?;
        Ok(())
    }

    async fn wait_for_navigation(&mut self, timeout: Duration) -> Result<()> {
        let page = self.page()?;
        match tokio::time::timeout(timeout, page.wait_for_navigation()).await {
            Ok(result) => result.map(|_| ()).map_err(browser_err),
            Err(_) => Err(AuthError::Timeout(timeout)),
        }
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self
            .page()?
            .url()
            .await
            .map_err(browser_err)?
            .unwrap_or_default())
    }

    async fn text_of(&mut self, selector: &str) -> Result<Option<String>> {
        let Ok(element) = self.page()?.find_element(selector).await else {
            return Ok(None);
        };
        let text = element.inner_text().await.map_err(browser_err)?;
        Ok(text.map(|t| t.trim().to_string()))
    }

    async fn observations(&mut self) -> Result<PageObservations> {
        let page = self.page()?;

        let storage_json: String = page
            .evaluate(READ_LOCAL_STORAGE)
            .await
            .map_err(browser_err)?
            .into_value()
            .map_err(browser_err)?;
        let local_storage: Vec<(String, String)> =
            serde_json::from_str(&storage_json).unwrap_or_default();

        let cookies = page
            .get_cookies()
            .await
            .map_err(browser_err)?
            .into_iter()
            .map(|c| SessionCookie {
                name: c.name,
                value: c.value,
            })
            .collect();

        Ok(PageObservations {
            request_urls: self.request_urls.lock().clone(),
            authorization_headers: self.authorization_headers.lock().clone(),
            local_storage,
            cookies,
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.page = None;
        let closed = self.browser.close().await.map(|_| ());
        let _ = self.browser.wait().await;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        closed.map_err(browser_err)
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
