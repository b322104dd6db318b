//! Product page extraction.

use crate::error::{ExtractError, NavigatorError};
use crate::models::ProductRecord;
use crate::site::{resolve_url, Locators, PageNavigator};
use tracing::debug;

/// Reads a [`ProductRecord`] off the loaded product page.
#[derive(Debug, Clone, Default)]
pub struct ProductExtractor {
    locators: Locators,
}

impl ProductExtractor {
    pub fn new(locators: Locators) -> Self {
        Self { locators }
    }

    /// Extracts every field of the product on the current page.
    ///
    /// A missing id, price, name, description or primary image aborts the
    /// extraction. Text fields are kept as found, even when blank; only a
    /// blank product id is rejected. An empty gallery is fine.
    pub async fn extract<N>(&self, nav: &N) -> Result<ProductRecord, ExtractError>
    where
        N: PageNavigator + ?Sized,
    {
        let l = &self.locators;

        // The id names the product directory and object prefix
        let product_id =
            non_blank("product_id", nav.attribute(&l.product_id, &l.product_id_attr).await)?;
        let currency = found("currency", nav.text(&l.currency_symbol).await)?;
        let amount = found("price", nav.text(&l.price_integer).await)?;
        let name = found("name", nav.text(&l.name).await)?;
        let description = found("description", nav.text(&l.description).await)?;

        let primary_image_url = self.extract_primary_image(nav).await?;
        let gallery = self.extract_gallery_images(nav).await?;

        let record = ProductRecord::new(
            product_id,
            ProductRecord::format_price(&currency, &amount),
            name,
            description,
            primary_image_url,
            gallery,
        );
        debug!(
            "Extracted {} ({}, {} gallery images)",
            record.product_id,
            record.price,
            record.gallery_image_urls.len()
        );
        Ok(record)
    }

    /// Returns the absolute URL of the main product image.
    pub async fn extract_primary_image<N>(&self, nav: &N) -> Result<String, ExtractError>
    where
        N: PageNavigator + ?Sized,
    {
        let src = non_blank("primary_image", nav.attribute(&self.locators.primary_image, "src").await)?;
        let base = page_url(nav).await;
        resolve_url(&base, &src).ok_or(ExtractError::EmptyField("primary_image"))
    }

    /// Returns the absolute URLs of the gallery images, possibly none.
    pub async fn extract_gallery_images<N>(&self, nav: &N) -> Result<Vec<String>, ExtractError>
    where
        N: PageNavigator + ?Sized,
    {
        let sources = nav
            .attributes(&self.locators.gallery_images, "src")
            .await
            .map_err(|source| ExtractError::MissingField { field: "gallery_images", source })?;

        let base = page_url(nav).await;
        Ok(sources.iter().filter_map(|src| resolve_url(&base, src)).collect())
    }
}

/// Maps a lookup failure to `MissingField` and trims the value.
fn found(
    field: &'static str,
    value: Result<String, NavigatorError>,
) -> Result<String, ExtractError> {
    let value = value.map_err(|source| ExtractError::MissingField { field, source })?;
    Ok(value.trim().to_string())
}

/// Like [`found`], but a blank value is an `EmptyField` error.
fn non_blank(
    field: &'static str,
    value: Result<String, NavigatorError>,
) -> Result<String, ExtractError> {
    let value = found(field, value)?;
    if value.is_empty() {
        return Err(ExtractError::EmptyField(field));
    }
    Ok(value)
}

async fn page_url<N>(nav: &N) -> String
where
    N: PageNavigator + ?Sized,
{
    nav.current_url().await.unwrap_or_default()
}
