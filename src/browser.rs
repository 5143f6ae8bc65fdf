//! Browser session capability
//!
//! The crawler only needs a handful of operations from a live browser: load a
//! page, read its current markup, scroll a container, click an element and
//! shut down. Anything else (driver setup, headless mode) belongs to the
//! implementation.

use crate::error::BrowserError;

/// A single, serialized browser session
#[async_trait::async_trait]
pub trait Browser: Send {
    /// Navigate to `url` and return the rendered markup
    async fn open(&mut self, url: &str) -> Result<String, BrowserError>;

    /// Markup of the current page as rendered right now
    async fn content(&mut self) -> Result<String, BrowserError>;

    /// Scroll the element matching `selector` to its end
    async fn scroll(&mut self, selector: &str) -> Result<(), BrowserError>;

    /// Click the first element matching `selector`
    async fn click(&mut self, selector: &str) -> Result<(), BrowserError>;

    /// Close the session
    async fn stop(&mut self) -> Result<(), BrowserError>;
}

#[cfg(feature = "webdriver")]
pub use self::webdriver::WebDriverBrowser;

#[cfg(feature = "webdriver")]
mod webdriver {
    use thirtyfour::prelude::*;
    use tracing::{debug, warn};

    use super::Browser;
    use crate::error::BrowserError;

    const SCROLL_SCRIPT: &str = r#"
        const element = document.querySelector(arguments[0]);
        if (element) { element.scrollTop = element.scrollHeight; return true; }
        window.scrollTo(0, document.body.scrollHeight);
        return false;
    "#;

    /// [`Browser`] backed by a WebDriver server such as chromedriver
    pub struct WebDriverBrowser {
        driver: Option<WebDriver>,
    }

    impl WebDriverBrowser {
        /// Start a Chrome session on the WebDriver server at `server_url`
        pub async fn connect(server_url: &str, headless: bool) -> Result<Self, BrowserError> {
            let unavailable = |e: WebDriverError| BrowserError::SessionUnavailable(e.to_string());

            let mut caps = DesiredCapabilities::chrome();
            if headless {
                caps.set_headless().map_err(unavailable)?;
            }
            caps.add_arg("--disable-gpu").map_err(unavailable)?;
            caps.add_arg("--no-sandbox").map_err(unavailable)?;
            caps.add_arg("--disable-dev-shm-usage").map_err(unavailable)?;
            caps.add_arg("--window-size=1920,1080").map_err(unavailable)?;

            let driver = WebDriver::new(server_url, caps).await.map_err(unavailable)?;
            debug!(server = server_url, headless, "WebDriver session started");
            Ok(Self {
                driver: Some(driver),
            })
        }

        fn driver(&self) -> Result<&WebDriver, BrowserError> {
            self.driver
                .as_ref()
                .ok_or_else(|| BrowserError::SessionUnavailable("session already stopped".into()))
        }
    }

    #[async_trait::async_trait]
    impl Browser for WebDriverBrowser {
        async fn open(&mut self, url: &str) -> Result<String, BrowserError> {
            let driver = self.driver()?;
            driver
                .goto(url)
                .await
                .map_err(|e| BrowserError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            driver.source().await.map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })
        }

        async fn content(&mut self) -> Result<String, BrowserError> {
            self.driver()?
                .source()
                .await
                .map_err(|e| BrowserError::Action {
                    action: "content".into(),
                    message: e.to_string(),
                })
        }

        async fn scroll(&mut self, selector: &str) -> Result<(), BrowserError> {
            self.driver()?
                .execute(SCROLL_SCRIPT, vec![serde_json::Value::from(selector)])
                .await
                .map(|_| ())
                .map_err(|e| BrowserError::Action {
                    action: format!("scroll {selector}"),
                    message: e.to_string(),
                })
        }

        async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
            let action_error = |e: WebDriverError| BrowserError::Action {
                action: format!("click {selector}"),
                message: e.to_string(),
            };
            let element = self
                .driver()?
                .find(By::Css(selector))
                .await
                .map_err(action_error)?;
            element.click().await.map_err(action_error)
        }

        async fn stop(&mut self) -> Result<(), BrowserError> {
            if let Some(driver) = self.driver.take()
                && let Err(e) = driver.quit().await
            {
                warn!(error = %e, "Failed to quit WebDriver session");
                return Err(BrowserError::SessionUnavailable(e.to_string()));
            }
            Ok(())
        }
    }
}
