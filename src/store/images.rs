//! Image download capability.

use crate::error::StoreError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use wreq::Client;
use wreq_util::Emulation;

/// Downloads image bytes - enables mocking for tests.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StoreError>;
}

/// Fetches images over HTTP with the same browser impersonation as page loads.
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    /// Creates a fetcher, optionally routed through a proxy.
    pub fn new(proxy: Option<&str>) -> Result<Self, StoreError> {
        let mut builder = Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = proxy {
            let proxy = wreq::Proxy::all(proxy_url).map_err(|e| StoreError::Download {
                url: proxy_url.to_string(),
                reason: format!("invalid proxy: {}", e),
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| StoreError::Download {
            url: String::new(),
            reason: e.to_string(),
        })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StoreError> {
        let download_err =
            |reason: String| StoreError::Download { url: url.to_string(), reason };

        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("Accept", "image/avif,image/webp,image/apng,image/*,*/*;q=0.8")
            .header("Sec-Fetch-Dest", "image")
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_err(format!("status {}", status.as_u16())));
        }

        let bytes = response.bytes().await.map_err(|e| download_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
