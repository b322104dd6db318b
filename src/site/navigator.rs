//! Page navigation capability and its static-HTML implementation.

use crate::config::Config;
use crate::error::NavigatorError;
use crate::site::markets::Market;
use crate::site::selectors::Locators;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use url::Url;
use wreq::Client;
use wreq_util::Emulation;

/// Everything the pipeline needs from a loaded page - enables mocking for tests.
///
/// Locators are CSS selectors. Single-element lookups fail with
/// [`NavigatorError::ElementNotFound`]; `attributes` returns an empty list instead.
#[async_trait]
pub trait PageNavigator: Send + Sync {
    /// Loads a URL, replacing the current page.
    async fn goto(&mut self, url: &str) -> Result<(), NavigatorError>;

    /// Submits a term to the site's search control.
    async fn submit_search(&mut self, term: &str) -> Result<(), NavigatorError>;

    /// Clicks the first element matching the locator.
    async fn click(&mut self, locator: &str) -> Result<(), NavigatorError>;

    /// Scrolls the window to a vertical offset.
    async fn scroll_to(&mut self, y: u32) -> Result<(), NavigatorError>;

    /// Waits until an element matching the locator is present, up to `timeout`.
    async fn wait_for(&self, locator: &str, timeout: Duration) -> Result<(), NavigatorError>;

    /// Returns the URL of the loaded page.
    async fn current_url(&self) -> Result<String, NavigatorError>;

    /// Returns the text of the first matching element.
    async fn text(&self, locator: &str) -> Result<String, NavigatorError>;

    /// Returns an attribute of the first matching element.
    async fn attribute(&self, locator: &str, name: &str) -> Result<String, NavigatorError>;

    /// Returns the attribute from every matching element that has it.
    async fn attributes(&self, locator: &str, name: &str) -> Result<Vec<String>, NavigatorError>;

    /// Ends the session.
    async fn close(&mut self) -> Result<(), NavigatorError>;
}

/// The currently loaded page of an [`HttpNavigator`].
#[derive(Debug, Clone)]
struct LoadedPage {
    url: Url,
    html: String,
}

/// Navigator over plain HTTP fetches with browser TLS impersonation.
///
/// Pages are parsed with `scraper`. Clicking follows the element's `href`;
/// clicking an element without one does nothing, since no scripts run.
pub struct HttpNavigator {
    client: Client,
    market: Market,
    base_url: Url,
    locators: Locators,
    page: Option<LoadedPage>,
}

impl HttpNavigator {
    /// Creates a navigator for the configured market.
    pub fn new(config: &Config) -> Result<Self, NavigatorError> {
        Self::with_base_url(config, None)
    }

    /// Creates a navigator with an optional custom base URL (for testing).
    pub fn with_base_url(config: &Config, base_url: Option<String>) -> Result<Self, NavigatorError> {
        let base = base_url.unwrap_or_else(|| config.base_url());
        let base_url = parse_base_url(&base)?;

        let mut builder = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &config.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url)
                .map_err(|e| NavigatorError::Request(format!("invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| NavigatorError::Request(e.to_string()))?;

        Ok(Self {
            client,
            market: config.market,
            base_url,
            locators: config.locators.clone(),
            page: None,
        })
    }

    /// Returns the storefront base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves a possibly relative link against the loaded page (or the base URL).
    fn resolve(&self, href: &str) -> Result<Url, NavigatorError> {
        let base = self.page.as_ref().map(|p| &p.url).unwrap_or(&self.base_url);
        base.join(href)
            .map_err(|e| NavigatorError::InvalidUrl { url: href.to_string(), reason: e.to_string() })
    }

    /// Performs a GET request and returns the final URL and body.
    async fn fetch(&self, url: Url) -> Result<LoadedPage, NavigatorError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.as_str())
            .emulation(Emulation::Chrome131)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8")
            .header("Accept-Language", self.market.accept_language())
            .header("Cache-Control", "no-cache")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .map_err(|e| NavigatorError::Request(e.to_string()))?;

        let status = response.status();
        debug!("Response status: {}", status);

        if status == 503 || status == 429 {
            warn!("Rate limited ({}). Consider using a proxy or increasing delay.", status);
            return Err(NavigatorError::RateLimited(url.to_string()));
        }

        if !status.is_success() {
            return Err(NavigatorError::Status { url: url.to_string(), status: status.as_u16() });
        }

        let final_url = Url::parse(&response.uri().to_string()).unwrap_or(url);
        let html = response.text().await.map_err(|e| NavigatorError::Request(e.to_string()))?;

        Ok(LoadedPage { url: final_url, html })
    }

    fn loaded(&self) -> Result<&LoadedPage, NavigatorError> {
        self.page.as_ref().ok_or(NavigatorError::NoPage)
    }

    fn first_text(&self, locator: &str) -> Result<String, NavigatorError> {
        let selector = parse_selector(locator)?;
        let document = Html::parse_document(&self.loaded()?.html);
        let element = document
            .select(&selector)
            .next()
            .ok_or_else(|| NavigatorError::ElementNotFound(locator.to_string()))?;

        Ok(element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "))
    }

    fn first_attribute(&self, locator: &str, name: &str) -> Result<Option<String>, NavigatorError> {
        let selector = parse_selector(locator)?;
        let document = Html::parse_document(&self.loaded()?.html);
        let element = document
            .select(&selector)
            .next()
            .ok_or_else(|| NavigatorError::ElementNotFound(locator.to_string()))?;

        Ok(element.value().attr(name).map(|v| v.trim().to_string()))
    }

    fn all_attributes(&self, locator: &str, name: &str) -> Result<Vec<String>, NavigatorError> {
        let selector = parse_selector(locator)?;
        let document = Html::parse_document(&self.loaded()?.html);

        Ok(document
            .select(&selector)
            .filter_map(|e| e.value().attr(name))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect())
    }
}

#[async_trait]
impl PageNavigator for HttpNavigator {
    async fn goto(&mut self, url: &str) -> Result<(), NavigatorError> {
        let target = self.resolve(url)?;
        let page = self.fetch(target).await?;
        self.page = Some(page);
        Ok(())
    }

    async fn submit_search(&mut self, term: &str) -> Result<(), NavigatorError> {
        let path = self.locators.search_path_for(term);
        let url = self.base_url.join(&path).map_err(|e| NavigatorError::InvalidUrl {
            url: path.clone(),
            reason: e.to_string(),
        })?;

        info!("Searching: {}", term);
        let page = self.fetch(url).await?;
        self.page = Some(page);
        Ok(())
    }

    async fn click(&mut self, locator: &str) -> Result<(), NavigatorError> {
        match self.first_attribute(locator, "href")? {
            Some(href) if !href.is_empty() && !href.starts_with('#') => {
                debug!("Following {} -> {}", locator, href);
                self.goto(&href).await
            }
            _ => {
                debug!("Clicked {} (no link to follow)", locator);
                Ok(())
            }
        }
    }

    async fn scroll_to(&mut self, y: u32) -> Result<(), NavigatorError> {
        trace!("Scroll to {} ignored on static page", y);
        Ok(())
    }

    async fn wait_for(&self, locator: &str, timeout: Duration) -> Result<(), NavigatorError> {
        // A static page never changes, so one presence check decides it.
        match self.first_attribute(locator, "id") {
            Ok(_) => Ok(()),
            Err(NavigatorError::ElementNotFound(_)) => Err(NavigatorError::Timeout {
                locator: locator.to_string(),
                waited_ms: timeout.as_millis() as u64,
            }),
            Err(e) => Err(e),
        }
    }

    async fn current_url(&self) -> Result<String, NavigatorError> {
        Ok(self.loaded()?.url.to_string())
    }

    async fn text(&self, locator: &str) -> Result<String, NavigatorError> {
        self.first_text(locator)
    }

    async fn attribute(&self, locator: &str, name: &str) -> Result<String, NavigatorError> {
        self.first_attribute(locator, name)?
            .ok_or_else(|| NavigatorError::ElementNotFound(format!("{}[{}]", locator, name)))
    }

    async fn attributes(&self, locator: &str, name: &str) -> Result<Vec<String>, NavigatorError> {
        self.all_attributes(locator, name)
    }

    async fn close(&mut self) -> Result<(), NavigatorError> {
        self.page = None;
        Ok(())
    }
}

fn parse_selector(locator: &str) -> Result<Selector, NavigatorError> {
    Selector::parse(locator).map_err(|_| NavigatorError::InvalidLocator(locator.to_string()))
}

/// Parses a base URL, making sure it ends with a slash so joins keep its path.
pub(crate) fn parse_base_url(base: &str) -> Result<Url, NavigatorError> {
    let normalized = if base.ends_with('/') { base.to_string() } else { format!("{}/", base) };
    Url::parse(&normalized)
        .map_err(|e| NavigatorError::InvalidUrl { url: base.to_string(), reason: e.to_string() })
}

/// Resolves `href` against `base`, returning None for unusable links.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href.starts_with('#') {
        return None;
    }

    match Url::parse(base) {
        Ok(base) => base.join(href).ok().map(|u| u.to_string()),
        Err(_) => Url::parse(href).ok().map(|u| u.to_string()),
    }
}
