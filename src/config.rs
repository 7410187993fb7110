// Engine configuration, read from environment variables

use crate::credential_cache::CredentialCacheConfig;
use crate::generative::GenerationConfig;
use crate::inventory::FetchConfig;
use crate::rate_cache::RateCacheConfig;
use anyhow::{Context, Result};
use std::time::Duration;

const DEFAULT_AMADEUS_BASE_URL: &str = "https://test.api.amadeus.com";
const DEFAULT_RATES_BASE_URL: &str =
    "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest/v1";
const DEFAULT_PLACES_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone)]
pub struct AmadeusConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct PlacesConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub amadeus: AmadeusConfig,
    pub places: PlacesConfig,
    pub gemini: GeminiConfig,
    pub rates_base_url: String,
    pub http_timeout: Duration,
    pub credential_cache: CredentialCacheConfig,
    pub rate_cache: RateCacheConfig,
    pub fetch: FetchConfig,
    pub generation: GenerationConfig,
}

impl EngineConfig {
    // Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // Build from any key lookup; credentials are required, everything else has a default
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("missing required setting {}", key))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let search_radius_km = match lookup("SEARCH_RADIUS_KM") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("SEARCH_RADIUS_KM is not a number: {}", raw))?,
            None => FetchConfig::default().search_radius_km,
        };
        let http_timeout_ms: u64 = match lookup("HTTP_TIMEOUT_MS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("HTTP_TIMEOUT_MS is not a number: {}", raw))?,
            None => 10_000,
        };

        Ok(EngineConfig {
            amadeus: AmadeusConfig {
                base_url: trim_slash(or_default("AMADEUS_BASE_URL", DEFAULT_AMADEUS_BASE_URL)),
                client_id: required("AMADEUS_CLIENT_ID")?,
                client_secret: required("AMADEUS_CLIENT_SECRET")?,
            },
            places: PlacesConfig {
                base_url: trim_slash(or_default("GOOGLE_PLACES_BASE_URL", DEFAULT_PLACES_BASE_URL)),
                api_key: required("GOOGLE_PLACES_API_KEY")?,
            },
            gemini: GeminiConfig {
                base_url: trim_slash(or_default("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL)),
                api_key: required("GEMINI_API_KEY")?,
                model: or_default("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            },
            rates_base_url: trim_slash(or_default("RATES_BASE_URL", DEFAULT_RATES_BASE_URL)),
            http_timeout: Duration::from_millis(http_timeout_ms),
            credential_cache: CredentialCacheConfig::default(),
            rate_cache: RateCacheConfig::default(),
            fetch: FetchConfig {
                search_radius_km,
                offer_currency: or_default("OFFER_CURRENCY", "USD"),
                ..FetchConfig::default()
            },
            generation: GenerationConfig::default(),
        })
    }
}

fn trim_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
