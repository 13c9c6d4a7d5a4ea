//! The narrow interface the browser login drives.

use std::time::Duration;

use async_trait::async_trait;

use crate::credential::SessionCookie;
use crate::error::Result;

/// Everything the page exposed that might carry a token.
#[derive(Debug, Clone, Default)]
pub struct PageObservations {
    /// URLs of outgoing requests, in the order they were sent.
    pub request_urls: Vec<String>,
    /// `Authorization` header values seen on responses.
    pub authorization_headers: Vec<String>,
    /// Local-storage `(key, value)` pairs of the current origin.
    pub local_storage: Vec<(String, String)>,
    pub cookies: Vec<SessionCookie>,
}

/// Starts a fresh, isolated browser page.
#[async_trait]
pub trait BrowserLauncher: Send + Sync + std::fmt::Debug {
    async fn launch(&self) -> Result<Box<dyn BrowserPage>>;
}

/// A single page of a running headless browser.
///
/// The owner must call [`BrowserPage::close`] once it is done, whatever the
/// outcome of the drive.
#[async_trait]
pub trait BrowserPage: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Whether an element matches `selector` right now.
    async fn exists(&mut self, selector: &str) -> Result<bool>;

    async fn fill_field(&mut self, selector: &str, value: &str) -> Result<()>;

    async fn click(&mut self, selector: &str) -> Result<()>;

    /// Click the first `<button>` whose text contains one of `texts`
    /// (case-insensitive). Returns whether one was clicked.
    async fn click_button_with_text(&mut self, texts: &[String]) -> Result<bool>;

    async fn press_enter(&mut self, selector: &str) -> Result<()>;

    /// Errors with [`crate::AuthError::Timeout`] if nothing navigated in time.
    async fn wait_for_navigation(&mut self, timeout: Duration) -> Result<()>;

    async fn current_url(&mut self) -> Result<String>;

    /// Trimmed inner text of the first element matching `selector`.
    async fn text_of(&mut self, selector: &str) -> Result<Option<String>>;

    async fn observations(&mut self) -> Result<PageObservations>;

    /// Tear down the page and its browser process.
    async fn close(&mut self) -> Result<()>;
}
