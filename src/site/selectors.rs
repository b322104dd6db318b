//! CSS locators for the storefront's search and product pages.
//!
//! The storefront changes its markup often. Every locator can be overridden
//! from the `[locators]` table of the config file without a rebuild.
//!
//! **Update process**: when extraction fails, capture an HTML sample,
//! update the default here, and add a test fixture.

use serde::{Deserialize, Serialize};

/// Locators used by the collector, extractor and consent step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Locators {
    /// Search text box (typed into by the browser navigator).
    pub search_field: String,
    /// Path appended to the base URL for a static search, `{term}` is replaced.
    pub search_path: String,
    /// Product card links on a results page.
    pub product_link: String,
    /// "Show more" / next page control.
    pub load_more: String,
    /// Cookie-consent accept button.
    pub consent_accept: String,
    /// Element carrying the product id attribute.
    pub product_id: String,
    /// Attribute holding the product id.
    pub product_id_attr: String,
    /// Integer part of the price.
    pub price_integer: String,
    /// Leading currency symbol.
    pub currency_symbol: String,
    /// Product name.
    pub name: String,
    /// Short product description.
    pub description: String,
    /// Main product image.
    pub primary_image: String,
    /// Every image in the product media grid.
    pub gallery_images: String,
}

impl Default for Locators {
    fn default() -> Self {
        Self {
            search_field: "div.search-field input".to_string(),
            search_path: "search/?q={term}".to_string(),
            product_link: "section.results div.serp-grid__item.product-fragment > a".to_string(),
            load_more: "a.show-more__button".to_string(),
            consent_accept: "#onetrust-accept-btn-handler".to_string(),
            product_id: "div.pip-product__subgrid.product-pip".to_string(),
            product_id_attr: "data-product-id".to_string(),
            price_integer: "span.pip-price__integer".to_string(),
            currency_symbol: "span.pip-price__currency-symbol".to_string(),
            name: "span.pip-header-section__title--big".to_string(),
            description: "span.pip-header-section__description-text".to_string(),
            primary_image: "div.pip-product__left-top img.pip-aspect-ratio-image__image"
                .to_string(),
            gallery_images: "div.pip-media-grid__grid img".to_string(),
        }
    }
}

impl Locators {
    /// Returns the search path with the term URL-encoded into it.
    pub fn search_path_for(&self, term: &str) -> String {
        self.search_path.replace("{term}", &urlencoding::encode(term))
    }

    /// Returns every CSS locator, paired with its field name.
    pub fn css(&self) -> [(&'static str, &str); 11] {
        [
            ("search_field", self.search_field.as_str()),
            ("product_link", self.product_link.as_str()),
            ("load_more", self.load_more.as_str()),
            ("consent_accept", self.consent_accept.as_str()),
            ("product_id", self.product_id.as_str()),
            ("price_integer", self.price_integer.as_str()),
            ("currency_symbol", self.currency_symbol.as_str()),
            ("name", self.name.as_str()),
            ("description", self.description.as_str()),
            ("primary_image", self.primary_image.as_str()),
            ("gallery_images", self.gallery_images.as_str()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn test_default_locators_parse() {
        let locators = Locators::default();
        for (field, css) in locators.css() {
            assert!(Selector::parse(css).is_ok(), "locator {} does not parse: {}", field, css);
        }
    }

    #[test]
    fn test_search_path_encodes_term() {
        let locators = Locators::default();
        assert_eq!(locators.search_path_for("desk"), "search/?q=desk");
        assert_eq!(locators.search_path_for("office chair"), "search/?q=office%20chair");
    }

    #[test]
    fn test_product_locators_match_markup() {
        let html = Html::parse_document(
            r#"<div class="pip-product__subgrid product-pip js-product-pip" data-product-id="20351742">
                <span class="pip-price__currency-symbol pip-price__currency-symbol--leading">£</span>
                <span class="pip-price__integer">129</span>
            </div>"#,
        );
        let locators = Locators::default();

        let id = Selector::parse(&locators.product_id).unwrap();
        let element = html.select(&id).next().unwrap();
        assert_eq!(element.value().attr(&locators.product_id_attr), Some("20351742"));

        let price = Selector::parse(&locators.price_integer).unwrap();
        assert_eq!(html.select(&price).next().unwrap().text().collect::<String>(), "129");
    }

    #[test]
    fn test_partial_override_from_toml() {
        let locators: Locators = toml::from_str(r#"load_more = "button.next""#).unwrap();
        assert_eq!(locators.load_more, "button.next");
        assert_eq!(locators.name, Locators::default().name);
    }
}
