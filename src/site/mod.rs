//! Storefront access: navigation, locators, markets and pacing.

pub mod markets;
pub mod navigator;
pub mod pacing;
pub mod selectors;

#[cfg(feature = "browser")]
pub mod browser;

#[cfg(feature = "browser")]
pub use browser::BrowserNavigator;
pub use markets::Market;
pub use navigator::{resolve_url, HttpNavigator, PageNavigator};
pub use pacing::Pacer;
pub use selectors::Locators;
