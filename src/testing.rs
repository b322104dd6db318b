//! In-memory stand-ins for the navigator and image fetcher used by unit tests.

use crate::error::{NavigatorError, StoreError};
use crate::site::PageNavigator;
use crate::store::ImageFetcher;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
struct MockElement {
    text: String,
    attrs: HashMap<String, String>,
}

/// One scripted page: elements keyed by locator, plus where clicks lead.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockPage {
    elements: HashMap<String, Vec<MockElement>>,
    clicks: HashMap<String, String>,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element matching `locator`.
    pub fn element(mut self, locator: &str, text: &str, attrs: &[(&str, &str)]) -> Self {
        let element = MockElement {
            text: text.to_string(),
            attrs: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        };
        self.elements.entry(locator.to_string()).or_default().push(element);
        self
    }

    /// Adds a clickable element that navigates to `url`.
    pub fn link(mut self, locator: &str, url: &str) -> Self {
        self.elements.entry(locator.to_string()).or_default().push(MockElement::default());
        self.clicks.insert(locator.to_string(), url.to_string());
        self
    }

    fn first(&self, locator: &str) -> Result<&MockElement, NavigatorError> {
        self.elements
            .get(locator)
            .and_then(|e| e.first())
            .ok_or_else(|| NavigatorError::ElementNotFound(locator.to_string()))
    }
}

/// Navigator over a fixed set of scripted pages.
#[derive(Debug, Default)]
pub(crate) struct MockNavigator {
    pages: HashMap<String, MockPage>,
    search_results: HashMap<String, String>,
    current: Option<String>,
    pub visited: Vec<String>,
    pub searches: Vec<String>,
    pub scrolls: Vec<u32>,
    pub closed: bool,
}

impl MockNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: MockPage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    /// Makes a search for `term` land on `url`.
    pub fn search(mut self, term: &str, url: &str) -> Self {
        self.search_results.insert(term.to_string(), url.to_string());
        self
    }

    fn loaded(&self) -> Result<&MockPage, NavigatorError> {
        let url = self.current.as_ref().ok_or(NavigatorError::NoPage)?;
        self.pages.get(url).ok_or(NavigatorError::NoPage)
    }

    fn load(&mut self, url: &str) -> Result<(), NavigatorError> {
        if !self.pages.contains_key(url) {
            return Err(NavigatorError::Status { url: url.to_string(), status: 404 });
        }
        self.current = Some(url.to_string());
        Ok(())
    }
}

#[async_trait]
impl PageNavigator for MockNavigator {
    async fn goto(&mut self, url: &str) -> Result<(), NavigatorError> {
        self.visited.push(url.to_string());
        self.load(url)
    }

    async fn submit_search(&mut self, term: &str) -> Result<(), NavigatorError> {
        self.searches.push(term.to_string());
        let url = self
            .search_results
            .get(term)
            .cloned()
            .ok_or_else(|| NavigatorError::ElementNotFound("search".to_string()))?;
        self.load(&url)
    }

    async fn click(&mut self, locator: &str) -> Result<(), NavigatorError> {
        let page = self.loaded()?;
        page.first(locator)?;
        match page.clicks.get(locator).cloned() {
            Some(url) => self.load(&url),
            None => Ok(()),
        }
    }

    async fn scroll_to(&mut self, y: u32) -> Result<(), NavigatorError> {
        self.scrolls.push(y);
        Ok(())
    }

    async fn wait_for(&self, locator: &str, timeout: Duration) -> Result<(), NavigatorError> {
        match self.loaded()?.first(locator) {
            Ok(_) => Ok(()),
            Err(_) => Err(NavigatorError::Timeout {
                locator: locator.to_string(),
                waited_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn current_url(&self) -> Result<String, NavigatorError> {
        self.current.clone().ok_or(NavigatorError::NoPage)
    }

    async fn text(&self, locator: &str) -> Result<String, NavigatorError> {
        Ok(self.loaded()?.first(locator)?.text.clone())
    }

    async fn attribute(&self, locator: &str, name: &str) -> Result<String, NavigatorError> {
        self.loaded()?
            .first(locator)?
            .attrs
            .get(name)
            .cloned()
            .ok_or_else(|| NavigatorError::ElementNotFound(format!("{}[{}]", locator, name)))
    }

    async fn attributes(&self, locator: &str, name: &str) -> Result<Vec<String>, NavigatorError> {
        Ok(self
            .loaded()?
            .elements
            .get(locator)
            .map(|els| els.iter().filter_map(|e| e.attrs.get(name).cloned()).collect())
            .unwrap_or_default())
    }

    async fn close(&mut self) -> Result<(), NavigatorError> {
        self.closed = true;
        self.current = None;
        Ok(())
    }
}

/// Image fetcher returning fixed bytes, failing for selected URLs.
#[derive(Debug, Default)]
pub(crate) struct MockFetcher {
    failing: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ImageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StoreError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        if self.failing.contains(url) {
            return Err(StoreError::Download { url: url.to_string(), reason: "status 404".to_string() });
        }
        Ok(format!("bytes of {}", url).into_bytes())
    }
}
