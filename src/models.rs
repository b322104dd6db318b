//! Data models for scraped products and collected links.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// One scraped product.
///
/// Field names serialize to the same column names used by the table sink,
/// so `data.json` and the SQL row read the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Site-assigned identifier, the only deduplication key across sinks
    #[serde(rename = "Product_id")]
    pub product_id: String,
    /// Fresh UUID per extraction, kept for auditing only
    #[serde(rename = "UUID_number")]
    pub unique_run_id: String,
    /// Currency symbol followed by the numeric text, verbatim
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Image_link")]
    pub primary_image_url: String,
    #[serde(rename = "Image_all_links")]
    pub gallery_image_urls: Vec<String>,
}

impl ProductRecord {
    /// Builds a record with a freshly generated run id.
    pub fn new(
        product_id: impl Into<String>,
        price: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        primary_image_url: impl Into<String>,
        gallery_image_urls: Vec<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            unique_run_id: Uuid::new_v4().to_string(),
            price: price.into(),
            name: name.into(),
            description: description.into(),
            primary_image_url: primary_image_url.into(),
            gallery_image_urls,
        }
    }

    /// Joins a currency symbol and the numeric price text without parsing either.
    pub fn format_price(currency: &str, amount: &str) -> String {
        format!("{}{}", currency.trim(), amount.trim())
    }

    /// File-name friendly form of the product name, used for image files.
    pub fn image_stem(&self) -> String {
        let stem: String = self
            .name
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if matches!(c, '/' | '\\' | ':' | '.') { '-' } else { c })
            .collect();

        if stem.is_empty() {
            "product".to_string()
        } else {
            stem
        }
    }

    /// Number of image URLs the record points at.
    pub fn image_count(&self) -> usize {
        1 + self.gallery_image_urls.len()
    }
}

/// Deduplicated product page URLs gathered across result pages.
///
/// First-seen order is kept so that truncating the set is deterministic.
#[derive(Debug, Clone, Default)]
pub struct LinkSet {
    links: Vec<String>,
    seen: HashSet<String>,
}

impl LinkSet {
    /// Creates an empty link set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a link, returning false if it was already present.
    pub fn insert(&mut self, link: impl Into<String>) -> bool {
        let link = link.into();
        if self.seen.contains(&link) {
            return false;
        }
        self.seen.insert(link.clone());
        self.links.push(link);
        true
    }

    /// Returns true if the link has been collected.
    pub fn contains(&self, link: &str) -> bool {
        self.seen.contains(link)
    }

    /// Returns the number of unique links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns true if no links were collected.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Iterates over the links in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.links.iter().map(String::as_str)
    }

    /// Consumes the set, returning the links in first-seen order.
    pub fn into_vec(self) -> Vec<String> {
        self.links
    }
}

impl Extend<String> for LinkSet {
    fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
        for link in iter {
            self.insert(link);
        }
    }
}

impl FromIterator<String> for LinkSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl IntoIterator for LinkSet {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.links.into_iter()
    }
}
