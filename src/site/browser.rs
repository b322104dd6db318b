//! Headless Chromium navigator for pages that need JavaScript.

use crate::config::Config;
use crate::error::NavigatorError;
use crate::site::navigator::PageNavigator;
use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Navigator backed by a real Chromium session.
pub struct BrowserNavigator {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    search_field: String,
}

impl BrowserNavigator {
    /// Launches Chromium and opens a blank page.
    pub async fn launch(config: &Config) -> Result<Self, NavigatorError> {
        info!("Launching browser (headless={})", config.headless);

        let mut builder = BrowserConfig::builder();

        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(proxy) = &config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        let browser_config = builder
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--window-size=1920,1080")
            .arg("--start-maximized")
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(NavigatorError::Browser)?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(browser_err)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!("Browser handler error: {:?}", event);
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(browser_err)?;

        Ok(Self { browser, page, handler, search_field: config.locators.search_field.clone() })
    }

    async fn find(&self, locator: &str) -> Result<Element, NavigatorError> {
        self.page
            .find_element(locator)
            .await
            .map_err(|_| NavigatorError::ElementNotFound(locator.to_string()))
    }
}

#[async_trait]
impl PageNavigator for BrowserNavigator {
    async fn goto(&mut self, url: &str) -> Result<(), NavigatorError> {
        debug!("Navigating to {}", url);
        self.page.goto(url).await.map_err(browser_err)?;
        Ok(())
    }

    async fn submit_search(&mut self, term: &str) -> Result<(), NavigatorError> {
        info!("Searching: {}", term);
        let field = self.find(&self.search_field).await?;
        field.click().await.map_err(browser_err)?;
        field.type_str(term).await.map_err(browser_err)?;
        field.press_key("Enter").await.map_err(browser_err)?;
        self.page.wait_for_navigation().await.map_err(browser_err)?;
        Ok(())
    }

    async fn click(&mut self, locator: &str) -> Result<(), NavigatorError> {
        let element = self.find(locator).await?;
        element.click().await.map_err(browser_err)?;
        Ok(())
    }

    async fn scroll_to(&mut self, y: u32) -> Result<(), NavigatorError> {
        self.page.evaluate(format!("window.scrollTo(0, {})", y)).await.map_err(browser_err)?;
        Ok(())
    }

    async fn wait_for(&self, locator: &str, timeout: Duration) -> Result<(), NavigatorError> {
        let start = Instant::now();
        let mut delay = Duration::from_millis(50);

        while start.elapsed() < timeout {
            if self.page.find_element(locator).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(Duration::from_millis(500));
        }

        Err(NavigatorError::Timeout {
            locator: locator.to_string(),
            waited_ms: timeout.as_millis() as u64,
        })
    }

    async fn current_url(&self) -> Result<String, NavigatorError> {
        self.page.url().await.map_err(browser_err)?.ok_or(NavigatorError::NoPage)
    }

    async fn text(&self, locator: &str) -> Result<String, NavigatorError> {
        let element = self.find(locator).await?;
        let text = element.inner_text().await.map_err(browser_err)?.unwrap_or_default();
        Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    async fn attribute(&self, locator: &str, name: &str) -> Result<String, NavigatorError> {
        let element = self.find(locator).await?;
        element
            .attribute(name)
            .await
            .map_err(browser_err)?
            .ok_or_else(|| NavigatorError::ElementNotFound(format!("{}[{}]", locator, name)))
    }

    async fn attributes(&self, locator: &str, name: &str) -> Result<Vec<String>, NavigatorError> {
        let elements = match self.page.find_elements(locator).await {
            Ok(elements) => elements,
            Err(_) => return Ok(Vec::new()),
        };

        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            if let Some(value) = element.attribute(name).await.map_err(browser_err)? {
                if !value.trim().is_empty() {
                    values.push(value.trim().to_string());
                }
            }
        }
        Ok(values)
    }

    async fn close(&mut self) -> Result<(), NavigatorError> {
        self.browser.close().await.map_err(browser_err)?;
        self.handler.abort();
        Ok(())
    }
}

fn browser_err(e: chromiumoxide::error::CdpError) -> NavigatorError {
    NavigatorError::Browser(e.to_string())
}
