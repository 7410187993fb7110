// Top-level hotel search: paged inventory with USD prices, photos and carbon estimates

use crate::clients::{AmadeusClient, CurrencyApiClient, GeminiClient, PlacesClient};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::credential_cache::CredentialCache;
use crate::currency::CurrencyNormalizer;
use crate::emissions::{BatchEmissionsEstimator, EmissionsEstimate, HotelDescriptor};
use crate::generative::GenerativeSchemaClient;
use crate::inventory::{
    InventoryError, ListedOffer, PaginatedInventoryFetcher, PaginationState, SearchParams,
};
use crate::rate_cache::RateCache;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedOffer {
    #[serde(flatten)]
    pub listed: ListedOffer,
    pub carbon_emissions: EmissionsEstimate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedPage {
    pub data: Vec<EnrichedOffer>,
    pub pagination: PaginationState,
}

pub struct EnrichmentPipeline {
    fetcher: PaginatedInventoryFetcher,
    estimator: BatchEmissionsEstimator,
}

impl EnrichmentPipeline {
    pub fn new(fetcher: PaginatedInventoryFetcher, estimator: BatchEmissionsEstimator) -> Self {
        Self { fetcher, estimator }
    }

    // Wire the reqwest clients and process-wide caches from configuration
    pub fn from_config(config: &EngineConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let amadeus = Arc::new(AmadeusClient::new(http.clone(), config.amadeus.clone()));
        let credentials = Arc::new(CredentialCache::new(
            amadeus.clone(),
            clock.clone(),
            config.credential_cache.clone(),
        ));
        let rates = Arc::new(RateCache::new(
            Arc::new(CurrencyApiClient::new(http.clone(), &config.rates_base_url)),
            clock,
            config.rate_cache.clone(),
        ));
        let fetcher = PaginatedInventoryFetcher::new(
            credentials,
            amadeus,
            Arc::new(PlacesClient::new(http.clone(), config.places.clone())),
            Arc::new(CurrencyNormalizer::new(rates)),
            config.fetch.clone(),
        );

        let generative = GenerativeSchemaClient::new(
            Arc::new(GeminiClient::new(http, config.gemini.clone())),
            config.generation.clone(),
        );
        let estimator = BatchEmissionsEstimator::new(Arc::new(generative));

        Ok(Self::new(fetcher, estimator))
    }

    pub async fn get_enriched_hotel_offers(
        &self,
        params: &SearchParams,
    ) -> Result<EnrichedPage, PipelineError> {
        let page = self.fetcher.fetch_page(params).await?;

        let nights = stay_nights(&params.check_in_date, &params.check_out_date);
        let guests = (params.adults + params.children).max(1);
        let descriptors: Vec<HotelDescriptor> = page
            .items
            .iter()
            .map(|item| describe(item, &params.city_code))
            .collect();

        let mut estimates = self.estimator.estimate(&descriptors, nights, guests).await;

        let data: Vec<EnrichedOffer> = page
            .items
            .into_iter()
            .map(|listed| {
                let carbon_emissions = estimates
                    .remove(&listed.offer.hotel.hotel_id)
                    .unwrap_or_else(|| EmissionsEstimate::fallback(nights));
                EnrichedOffer {
                    listed,
                    carbon_emissions,
                }
            })
            .collect();

        info!(
            city_code = %params.city_code,
            page = page.pagination.page,
            offers = data.len(),
            "Enriched hotel offers"
        );
        Ok(EnrichedPage {
            data,
            pagination: page.pagination,
        })
    }
}

// Nights between the two dates; unparseable or inverted dates count as one night
pub fn stay_nights(check_in: &str, check_out: &str) -> u32 {
    let parse = |d: &str| NaiveDate::parse_from_str(d, "%Y-%m-%d");
    match (parse(check_in), parse(check_out)) {
        (Ok(start), Ok(end)) if end > start => (end - start).num_days() as u32,
        _ => {
            debug!(check_in, check_out, "Could not derive stay length, assuming one night");
            1
        }
    }
}

fn describe(item: &ListedOffer, city_code: &str) -> HotelDescriptor {
    let hotel = &item.offer.hotel;
    let room_type = item
        .offer
        .offers
        .iter()
        .filter_map(|o| o.room.as_ref())
        .find_map(|room| {
            room.description
                .as_ref()
                .map(|d| d.text.clone())
                .filter(|t| !t.is_empty())
                .or_else(|| room.room_type.clone())
        });
    let city = hotel.city_code.as_deref().unwrap_or(city_code);
    let location = match (hotel.latitude, hotel.longitude) {
        (Some(lat), Some(lon)) => format!("{} ({:.4}, {:.4})", city, lat, lon),
        _ => city.to_string(),
    };

    HotelDescriptor {
        id: hotel.hotel_id.clone(),
        name: hotel.name.clone(),
        hotel_type: "hotel".to_string(),
        room_type,
        location: Some(location),
    }
}
