//! Storefront markets: country/language paths, currencies and languages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported storefront markets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    #[default]
    Gb,
    Ie,
    Us,
    Ca,
    Au,
    De,
    Fr,
    Se,
}

impl Market {
    /// Returns the `{country}/{language}` path segment for this market.
    pub fn path(&self) -> &'static str {
        match self {
            Market::Gb => "gb/en",
            Market::Ie => "ie/en",
            Market::Us => "us/en",
            Market::Ca => "ca/en",
            Market::Au => "au/en",
            Market::De => "de/de",
            Market::Fr => "fr/fr",
            Market::Se => "se/sv",
        }
    }

    /// Returns the storefront home URL, always ending in a slash.
    pub fn base_url(&self) -> String {
        format!("https://www.ikea.com/{}/", self.path())
    }

    /// Returns the Accept-Language header value for this market.
    pub fn accept_language(&self) -> &'static str {
        match self {
            Market::Gb | Market::Ie => "en-GB,en;q=0.9",
            Market::Us | Market::Ca | Market::Au => "en-US,en;q=0.9",
            Market::De => "de-DE,de;q=0.9,en;q=0.8",
            Market::Fr => "fr-FR,fr;q=0.9,en;q=0.8",
            Market::Se => "sv-SE,sv;q=0.9,en;q=0.8",
        }
    }

    /// Returns all supported markets.
    pub fn all() -> &'static [Market] {
        &[
            Market::Gb,
            Market::Ie,
            Market::Us,
            Market::Ca,
            Market::Au,
            Market::De,
            Market::Fr,
            Market::Se,
        ]
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Market::Gb => "gb",
            Market::Ie => "ie",
            Market::Us => "us",
            Market::Ca => "ca",
            Market::Au => "au",
            Market::De => "de",
            Market::Fr => "fr",
            Market::Se => "se",
        };
        write!(f, "{}", code)
    }
}

impl FromStr for Market {
    type Err = MarketParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gb" | "uk" | "united kingdom" => Ok(Market::Gb),
            "ie" | "ireland" => Ok(Market::Ie),
            "us" | "usa" | "united states" => Ok(Market::Us),
            "ca" | "canada" => Ok(Market::Ca),
            "au" | "australia" => Ok(Market::Au),
            "de" | "germany" => Ok(Market::De),
            "fr" | "france" => Ok(Market::Fr),
            "se" | "sweden" => Ok(Market::Se),
            _ => Err(MarketParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketParseError(String);

impl fmt::Display for MarketParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown market '{}'. Valid markets: gb, ie, us, ca, au, de, fr, se", self.0)
    }
}

impl std::error::Error for MarketParseError {}
