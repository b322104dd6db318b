//! Product link collection across search result pages.

use crate::error::NavigatorError;
use crate::models::LinkSet;
use crate::site::{resolve_url, Locators, PageNavigator, Pacer};
use tracing::{debug, info, warn};

/// Searches for a term and gathers product links from the result pages.
#[derive(Debug, Clone)]
pub struct LinkCollector {
    locators: Locators,
    pacer: Pacer,
}

impl LinkCollector {
    pub fn new(locators: Locators, pacer: Pacer) -> Self {
        Self { locators, pacer }
    }

    /// Submits the search term.
    pub async fn search<N>(&self, nav: &mut N, term: &str) -> Result<(), NavigatorError>
    where
        N: PageNavigator + ?Sized,
    {
        info!("Searching for: {}", term);
        nav.submit_search(term).await
    }

    /// Scrolls down in `steps` increments of `speed` pixels.
    ///
    /// Scrolling only helps lazy-loaded results, so failures are logged and ignored.
    pub async fn scroll<N>(&self, nav: &mut N, steps: u32, speed: u32)
    where
        N: PageNavigator + ?Sized,
    {
        for step in 1..=steps {
            let y = speed.saturating_mul(step);
            if let Err(e) = nav.scroll_to(y).await {
                debug!("Scroll to {} failed: {}", y, e);
                return;
            }
            self.pacer.pause().await;
        }
    }

    /// Reads product links from up to `max_pages` result pages.
    ///
    /// Each iteration harvests the current page and then tries the load-more
    /// control. A missing control does not end the loop early; every
    /// iteration still harvests whatever the page shows.
    pub async fn gather<N>(&self, nav: &mut N, max_pages: u32) -> LinkSet
    where
        N: PageNavigator + ?Sized,
    {
        let mut links = LinkSet::new();

        for page in 1..=max_pages {
            self.pacer.pause().await;

            let added = self.harvest(nav, &mut links).await;
            debug!("Page {}: {} new links, {} total", page, added, links.len());

            if let Err(e) = nav.click(&self.locators.load_more).await {
                debug!("Load more unavailable on page {}: {}", page, e);
            }
        }

        info!("Collected {} product links", links.len());
        links
    }

    /// Searches then gathers, the whole collection step.
    pub async fn collect<N>(
        &self,
        nav: &mut N,
        term: &str,
        max_pages: u32,
    ) -> Result<LinkSet, NavigatorError>
    where
        N: PageNavigator + ?Sized,
    {
        self.search(nav, term).await?;
        Ok(self.gather(nav, max_pages).await)
    }

    async fn harvest<N>(&self, nav: &mut N, links: &mut LinkSet) -> usize
    where
        N: PageNavigator + ?Sized,
    {
        let hrefs = match nav.attributes(&self.locators.product_link, "href").await {
            Ok(hrefs) => hrefs,
            Err(e) => {
                warn!("Could not read product links: {}", e);
                return 0;
            }
        };

        let base = nav.current_url().await.unwrap_or_default();
        hrefs
            .iter()
            .filter_map(|href| resolve_url(&base, href))
            .filter(|link| links.insert(link.clone()))
            .count()
    }
}
