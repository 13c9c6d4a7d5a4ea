//! Scriptable in-memory browser for exercising the login drive.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::port::{BrowserLauncher, BrowserPage, PageObservations};
use crate::credential::SessionCookie;
use crate::error::{AuthError, Result};

/// What the fake page contains and where submitting leads.
#[derive(Debug, Clone, Default)]
pub struct FakePageScript {
    elements: HashSet<String>,
    buttons: Vec<String>,
    texts: HashMap<String, String>,
    after_submit_url: String,
    navigation_delay: Duration,
    observations: PageObservations,
}

impl FakePageScript {
    /// A page that lands on `after_submit_url` once the form is submitted.
    pub fn new(after_submit_url: impl Into<String>) -> Self {
        Self {
            after_submit_url: after_submit_url.into(),
            ..Default::default()
        }
    }

    pub fn with_elements<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.elements.extend(selectors.into_iter().map(Into::into));
        self
    }

    pub fn with_button(mut self, caption: impl Into<String>) -> Self {
        self.buttons.push(caption.into());
        self
    }

    pub fn with_text(mut self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        self.texts.insert(selector.into(), text.into());
        self
    }

    /// Delay every `navigate` call, to simulate a hung page.
    pub fn with_navigation_delay(mut self, delay: Duration) -> Self {
        self.navigation_delay = delay;
        self
    }

    pub fn with_request_url(mut self, url: impl Into<String>) -> Self {
        self.observations.request_urls.push(url.into());
        self
    }

    pub fn with_authorization_header(mut self, value: impl Into<String>) -> Self {
        self.observations.authorization_headers.push(value.into());
        self
    }

    pub fn with_local_storage(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.observations
            .local_storage
            .push((key.into(), value.into()));
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.observations.cookies.push(SessionCookie {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

#[derive(Debug, Default)]
struct FakeLog {
    actions: Vec<String>,
    launches: u32,
    closes: u32,
}

/// Launcher handing out [`FakePage`]s that share one action log.
#[derive(Debug, Clone)]
pub struct FakeBrowser {
    script: FakePageScript,
    launch_error: Option<String>,
    log: Arc<Mutex<FakeLog>>,
}

impl FakeBrowser {
    pub fn new(script: FakePageScript) -> Self {
        Self {
            script,
            launch_error: None,
            log: Arc::new(Mutex::new(FakeLog::default())),
        }
    }

    pub fn failing_launch(message: impl Into<String>) -> Self {
        Self {
            launch_error: Some(message.into()),
            ..Self::new(FakePageScript::default())
        }
    }

    /// Actions performed so far. Filled values are never recorded.
    pub fn actions(&self) -> Vec<String> {
        self.log.lock().actions.clone()
    }

    pub fn launch_count(&self) -> u32 {
        self.log.lock().launches
    }

    pub fn close_count(&self) -> u32 {
        self.log.lock().closes
    }
}

#[async_trait]
impl BrowserLauncher for FakeBrowser {
    async fn launch(&self) -> Result<Box<dyn BrowserPage>> {
        if let Some(message) = &self.launch_error {
            return Err(AuthError::Browser(message.clone()));
        }
        self.log.lock().launches += 1;
        Ok(Box::new(FakePage {
            script: self.script.clone(),
            log: Arc::clone(&self.log),
            url: "about:blank".to_string(),
            submitted: false,
        }))
    }
}

/// One page of a [`FakeBrowser`].
#[derive(Debug)]
pub struct FakePage {
    script: FakePageScript,
    log: Arc<Mutex<FakeLog>>,
    url: String,
    submitted: bool,
}

impl FakePage {
    fn record(&self, action: String) {
        self.log.lock().actions.push(action);
    }

    fn submit(&mut self) {
        self.submitted = true;
        self.url = self.script.after_submit_url.clone();
    }

    fn require(&self, selector: &str) -> Result<()> {
        if self.script.elements.contains(selector) {
            Ok(())
        } else {
            Err(AuthError::Browser(format!("no element matches {}", selector)))
        }
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        if !self.script.navigation_delay.is_zero() {
            tokio::time::sleep(self.script.navigation_delay).await;
        }
        self.record(format!("navigate {}", url));
        self.url = url.to_string();
        Ok(())
    }

    async fn exists(&mut self, selector: &str) -> Result<bool> {
        Ok(self.script.elements.contains(selector))
    }

    async fn fill_field(&mut self, selector: &str, _value: &str) -> Result<()> {
        self.require(selector)?;
        self.record(format!("fill {}", selector));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        self.require(selector)?;
        self.record(format!("click {}", selector));
        self.submit();
        Ok(())
    }

    async fn click_button_with_text(&mut self, texts: &[String]) -> Result<bool> {
        let found = self.script.buttons.iter().find(|caption| {
            let caption = caption.to_lowercase();
            texts.iter().any(|t| caption.contains(&t.to_lowercase()))
        });
        match found {
            Some(caption) => {
                let caption = caption.trim().to_string();
                self.record(format!("click-text {}", caption));
                self.submit();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn press_enter(&mut self, selector: &str) -> Result<()> {
        self.require(selector)?;
        self.record(format!("enter {}", selector));
        self.submit();
        Ok(())
    }

    async fn wait_for_navigation(&mut self, timeout: Duration) -> Result<()> {
        if self.submitted {
            Ok(())
        } else {
            Err(AuthError::Timeout(timeout))
        }
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn text_of(&mut self, selector: &str) -> Result<Option<String>> {
        Ok(self.script.texts.get(selector).map(|t| t.trim().to_string()))
    }

    async fn observations(&mut self) -> Result<PageObservations> {
        Ok(self.script.observations.clone())
    }

    async fn close(&mut self) -> Result<()> {
        self.log.lock().closes += 1;
        Ok(())
    }
}
