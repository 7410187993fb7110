// Paginated hotel inventory
// The provider returns every hotel near a city in one response, so paging happens here:
// slice the window, look up photos for that window only, then fetch offers for exactly
// those hotel IDs.

use crate::credential_cache::{AuthError, CredentialCache};
use crate::currency::CurrencyNormalizer;
use crate::provider::{
    GeoPoint, HotelOffer, InventoryItem, InventoryProvider, OfferQuery, PlaceCandidate,
    PlaceLookup, TransportError,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

// A place result farther than this from the hotel's coordinates is a different place
pub const PHOTO_MATCH_RADIUS_M: f64 = 300.0;
const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InventoryError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Inventory listing failed for {city_code}: {source}")]
    Provider {
        city_code: String,
        source: TransportError,
    },

    #[error("Offer fetch failed for {hotel_count} hotels: {source}")]
    OfferFetch {
        hotel_count: usize,
        source: TransportError,
    },
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub search_radius_km: u32,
    pub offer_currency: String,
    pub photo_max_width: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            search_radius_km: 5,
            offer_currency: "USD".to_string(),
            photo_max_width: 800,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    pub page: u32,
    pub limit: u32,
    pub total_count: usize,
    pub total_pages: usize,
    pub has_more: bool,
}

impl PaginationState {
    // page and limit are clamped to at least 1
    pub fn new(page: u32, limit: u32, total_count: usize) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        let total_pages = total_count.div_ceil(limit as usize);
        Self {
            page,
            limit,
            total_count,
            total_pages,
            has_more: (page as usize) < total_pages,
        }
    }

    // Zero-indexed [start, end) window into the full result set
    pub fn window(&self) -> std::ops::Range<usize> {
        let start = (self.page as usize - 1).saturating_mul(self.limit as usize);
        let end = start.saturating_add(self.limit as usize);
        start.min(self.total_count)..end.min(self.total_count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub city_code: String,
    pub check_in_date: String,
    pub check_out_date: String,
    pub adults: u32,
    pub children: u32,
    pub page: u32,
    pub limit: u32,
}

impl SearchParams {
    pub fn new(city_code: &str, check_in_date: &str, check_out_date: &str, adults: u32) -> Self {
        Self {
            city_code: city_code.to_string(),
            check_in_date: check_in_date.to_string(),
            check_out_date: check_out_date.to_string(),
            adults,
            children: 0,
            page: 1,
            limit: 10,
        }
    }
}

// An offer with its prices in USD and the photo resolved for its hotel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedOffer {
    #[serde(flatten)]
    pub offer: HotelOffer,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryPage {
    pub items: Vec<ListedOffer>,
    // Hotels in the page window, in window order
    pub hotels: Vec<InventoryItem>,
    pub pagination: PaginationState,
}

pub struct PaginatedInventoryFetcher {
    credentials: Arc<CredentialCache>,
    inventory: Arc<dyn InventoryProvider>,
    places: Arc<dyn PlaceLookup>,
    normalizer: Arc<CurrencyNormalizer>,
    config: FetchConfig,
}

impl PaginatedInventoryFetcher {
    pub fn new(
        credentials: Arc<CredentialCache>,
        inventory: Arc<dyn InventoryProvider>,
        places: Arc<dyn PlaceLookup>,
        normalizer: Arc<CurrencyNormalizer>,
        config: FetchConfig,
    ) -> Self {
        Self {
            credentials,
            inventory,
            places,
            normalizer,
            config,
        }
    }

    pub async fn fetch_page(&self, params: &SearchParams) -> Result<InventoryPage, InventoryError> {
        let token = self.credentials.get_token().await?;

        let all_hotels = self
            .inventory
            .hotels_by_city(&token, &params.city_code, self.config.search_radius_km)
            .await
            .map_err(|source| InventoryError::Provider {
                city_code: params.city_code.clone(),
                source,
            })?;

        let pagination = PaginationState::new(params.page, params.limit, all_hotels.len());
        let page_hotels = all_hotels[pagination.window()].to_vec();
        info!(
            city_code = %params.city_code,
            total_count = pagination.total_count,
            page = pagination.page,
            page_size = page_hotels.len(),
            "Listed hotels"
        );

        if page_hotels.is_empty() {
            return Ok(InventoryPage {
                items: Vec::new(),
                hotels: page_hotels,
                pagination,
            });
        }

        // Photos and offers are independent of each other
        let (photos, offers) = tokio::join!(
            self.resolve_photos(&page_hotels),
            self.fetch_offers(&token, params, &page_hotels)
        );

        let offers = match offers {
            Ok(offers) => offers,
            Err(e) => {
                warn!(error = %e, city_code = %params.city_code, page = pagination.page, "Returning page without offers");
                return Ok(InventoryPage {
                    items: Vec::new(),
                    hotels: page_hotels,
                    pagination,
                });
            }
        };

        let items = join_all(offers.into_iter().map(|offer| {
            let photo_url = photos.get(&offer.hotel.hotel_id).cloned().flatten();
            self.normalize_offer(offer, photo_url)
        }))
        .await;

        Ok(InventoryPage {
            items,
            hotels: page_hotels,
            pagination,
        })
    }

    async fn fetch_offers(
        &self,
        token: &str,
        params: &SearchParams,
        hotels: &[InventoryItem],
    ) -> Result<Vec<HotelOffer>, InventoryError> {
        let query = OfferQuery {
            hotel_ids: hotels.iter().map(|h| h.id.clone()).collect(),
            check_in_date: params.check_in_date.clone(),
            check_out_date: params.check_out_date.clone(),
            adults: params.adults,
            currency: self.config.offer_currency.clone(),
        };
        self.inventory
            .hotel_offers(token, &query)
            .await
            .map_err(|source| InventoryError::OfferFetch {
                hotel_count: hotels.len(),
                source,
            })
    }

    // hotel id -> photo URL; lookup failures map to None
    async fn resolve_photos(&self, hotels: &[InventoryItem]) -> HashMap<String, Option<String>> {
        let lookups = hotels.iter().map(|hotel| async move {
            let photo = self.lookup_photo(hotel).await;
            (hotel.id.clone(), photo)
        });
        join_all(lookups).await.into_iter().collect()
    }

    async fn lookup_photo(&self, hotel: &InventoryItem) -> Option<String> {
        if let Some(existing) = hotel.photos.as_ref().and_then(|p| p.first()) {
            return Some(existing.clone());
        }

        let candidates = match self.places.search_text(&hotel.display_name, hotel.geo).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, hotel_id = %hotel.id, "Photo lookup failed");
                return None;
            }
        };

        let reference = match candidates
            .into_iter()
            .filter(|c| is_same_place(c, hotel))
            .find_map(|c| c.photo_reference)
        {
            Some(reference) => reference,
            None => {
                debug!(hotel_id = %hotel.id, "No place result matched hotel name and location");
                return None;
            }
        };

        match self
            .places
            .photo_url(&reference, self.config.photo_max_width)
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, hotel_id = %hotel.id, "Photo URL resolution failed");
                None
            }
        }
    }

    async fn normalize_offer(&self, mut offer: HotelOffer, photo_url: Option<String>) -> ListedOffer {
        let prices = join_all(
            offer
                .offers
                .iter()
                .map(|o| self.normalizer.convert_price(&o.price)),
        )
        .await;
        for (o, price) in offer.offers.iter_mut().zip(prices) {
            o.price = price;
        }
        debug!(hotel_id = %offer.hotel.hotel_id, has_photo = photo_url.is_some(), "Assembled offer");
        ListedOffer { offer, photo_url }
    }
}

fn is_same_place(candidate: &PlaceCandidate, hotel: &InventoryItem) -> bool {
    let same_name =
        candidate.name.trim().to_lowercase() == hotel.display_name.trim().to_lowercase();
    same_name
        && candidate
            .location
            .map_or(false, |at| distance_m(at, hotel.geo) <= PHOTO_MATCH_RADIUS_M)
}

// Haversine great-circle distance
fn distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat_a, lat_b) = (a.latitude.to_radians(), b.latitude.to_radians());
    let d_lat = lat_b - lat_a;
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::credential_cache::CredentialCacheConfig;
    use crate::provider::mock::{
        candidate, hotel, hotels, MockAuth, MockInventory, MockPlaces, MockRates,
    };
    use crate::rate_cache::{RateCache, RateCacheConfig};
    use std::sync::atomic::Ordering;
    use test_case::test_case;

    struct Fixture {
        auth: Arc<MockAuth>,
        inventory: Arc<MockInventory>,
        places: Arc<MockPlaces>,
        fetcher: PaginatedInventoryFetcher,
    }

    fn fixture(hotel_count: usize, currency: &str, places: MockPlaces) -> Fixture {
        let clock = Arc::new(ManualClock::new(0));
        let auth = Arc::new(MockAuth::new(3600));
        let inventory = Arc::new(MockInventory::new(hotels(hotel_count), currency));
        let places = Arc::new(places);
        let rates = Arc::new(RateCache::new(
            Arc::new(MockRates::new(&[("eur", 0.8)])),
            clock.clone(),
            RateCacheConfig::default(),
        ));
        let credentials = Arc::new(CredentialCache::new(
            auth.clone(),
            clock,
            CredentialCacheConfig::default(),
        ));
        let fetcher = PaginatedInventoryFetcher::new(
            credentials,
            inventory.clone(),
            places.clone(),
            Arc::new(CurrencyNormalizer::new(rates)),
            FetchConfig::default(),
        );
        Fixture {
            auth,
            inventory,
            places,
            fetcher,
        }
    }

    fn params(page: u32, limit: u32) -> SearchParams {
        SearchParams {
            page,
            limit,
            ..SearchParams::new("NYC", "2024-06-01", "2024-06-05", 2)
        }
    }

    #[test_case(25, 10, 1, 3, 0..10, true ; "first page")]
    #[test_case(25, 10, 3, 3, 20..25, false ; "partial last page")]
    #[test_case(25, 10, 4, 3, 25..25, false ; "beyond last page")]
    #[test_case(0, 10, 1, 0, 0..0, false ; "empty result")]
    #[test_case(20, 10, 2, 2, 10..20, false ; "exact multiple")]
    #[test_case(5, 0, 0, 5, 0..1, true ; "zero page and limit clamp to one")]
    fn test_pagination_arithmetic(
        total: usize,
        limit: u32,
        page: u32,
        expected_pages: usize,
        expected_window: std::ops::Range<usize>,
        expected_has_more: bool,
    ) {
        let state = PaginationState::new(page, limit, total);
        assert_eq!(state.total_pages, expected_pages);
        assert_eq!(state.window(), expected_window);
        assert_eq!(state.has_more, expected_has_more);
        assert_eq!(state.has_more, (state.page as usize) < state.total_pages);
    }

    #[test]
    fn test_pagination_serializes_camel_case() {
        let value = serde_json::to_value(PaginationState::new(1, 10, 3)).unwrap();
        assert_eq!(value["totalCount"], 3);
        assert_eq!(value["totalPages"], 1);
        assert_eq!(value["hasMore"], false);
    }

    #[tokio::test]
    async fn test_three_hotels_single_page() {
        let f = fixture(3, "USD", MockPlaces::default());
        let page = f.fetcher.fetch_page(&params(1, 10)).await.unwrap();

        assert_eq!(page.items.len(), 3);
        assert_eq!(page.pagination.total_count, 3);
        assert_eq!(page.pagination.total_pages, 1);
        assert!(!page.pagination.has_more);
        assert!(page.items.iter().all(|i| i.photo_url.is_some()));
    }

    #[tokio::test]
    async fn test_offers_requested_only_for_page_window() {
        let f = fixture(25, "USD", MockPlaces::default());

        let page = f.fetcher.fetch_page(&params(3, 10)).await.unwrap();
        assert_eq!(page.items.len(), 5);
        assert!(!page.pagination.has_more);

        let query = f.inventory.last_query.lock().clone().unwrap();
        assert_eq!(query.hotel_ids, vec!["HT020", "HT021", "HT022", "HT023", "HT024"]);
        assert_eq!(query.adults, 2);
        assert_eq!(f.places.calls.load(Ordering::SeqCst), 5);

        let page = f.fetcher.fetch_page(&params(1, 10)).await.unwrap();
        assert_eq!(page.items.len(), 10);
        assert!(page.pagination.has_more);
        assert_eq!(f.auth.calls(), 1, "Token should be reused across pages");

        let tokens = f.inventory.seen_tokens.lock().clone();
        assert_eq!(tokens.len(), 4, "Listing and offers on both pages");
        assert!(tokens.iter().all(|t| t == "token-1"));
    }

    #[tokio::test]
    async fn test_page_beyond_end_skips_offer_call() {
        let f = fixture(25, "USD", MockPlaces::default());
        let page = f.fetcher.fetch_page(&params(9, 10)).await.unwrap();

        assert!(page.items.is_empty());
        assert!(!page.pagination.has_more);
        assert_eq!(page.pagination.total_pages, 3);
        assert_eq!(f.inventory.offer_calls(), 0);
        assert_eq!(f.places.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_offer_failure_keeps_pagination() {
        let f = fixture(12, "USD", MockPlaces::default());
        f.inventory.fail_offers.store(true, Ordering::SeqCst);

        let page = f.fetcher.fetch_page(&params(1, 10)).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.pagination.total_count, 12);
        assert_eq!(page.pagination.total_pages, 2);
        assert!(page.pagination.has_more);
        assert_eq!(page.hotels.len(), 10);
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let f = fixture(3, "USD", MockPlaces::default());
        f.inventory.fail_listing.store(true, Ordering::SeqCst);

        let err = f.fetcher.fetch_page(&params(1, 10)).await.unwrap_err();
        assert!(matches!(err, InventoryError::Provider { ref city_code, .. } if city_code == "NYC"));
    }

    #[tokio::test]
    async fn test_auth_failure_is_fatal() {
        let f = fixture(3, "USD", MockPlaces::default());
        f.auth.fail.store(true, Ordering::SeqCst);

        let err = f.fetcher.fetch_page(&params(1, 10)).await.unwrap_err();
        assert!(matches!(err, InventoryError::Auth(_)));
        assert_eq!(f.inventory.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_photo_failure_yields_none() {
        let f = fixture(3, "USD", MockPlaces::failing_for(&["Hotel 1"]));
        let page = f.fetcher.fetch_page(&params(1, 10)).await.unwrap();

        let by_id: HashMap<_, _> = page
            .items
            .iter()
            .map(|i| (i.offer.hotel.hotel_id.as_str(), i.photo_url.clone()))
            .collect();
        assert_eq!(by_id["HT001"], None);
        assert_eq!(
            by_id["HT000"].as_deref(),
            Some("https://photos.test/ref-Hotel_0?maxwidth=800")
        );
    }

    #[tokio::test]
    async fn test_photo_taken_from_matching_place_only() {
        let places = MockPlaces::default()
            .with_candidates(
                "Hotel 0",
                vec![
                    candidate("Joe's Diner", 40.7, -74.0, "diner"),
                    candidate("hotel 0 ", 40.7005, -74.0, "lobby"),
                ],
            )
            .with_candidates("Hotel 1", vec![candidate("Hotel 1", 40.72, -74.0, "elsewhere")]);
        let f = fixture(2, "USD", places);
        let page = f.fetcher.fetch_page(&params(1, 10)).await.unwrap();

        let by_id: HashMap<_, _> = page
            .items
            .iter()
            .map(|i| (i.offer.hotel.hotel_id.as_str(), i.photo_url.clone()))
            .collect();
        assert_eq!(
            by_id["HT000"].as_deref(),
            Some("https://photos.test/lobby?maxwidth=800")
        );
        assert_eq!(by_id["HT001"], None, "Same name 2km away is another place");
    }

    #[test_case("Hotel 0", 40.7, -74.0, true ; "exact")]
    #[test_case("HOTEL 0", 40.701, -74.001, true ; "case and small offset")]
    #[test_case("Hotel 0 Annex", 40.7, -74.0, false ; "different name")]
    #[test_case("Hotel 0", 40.71, -74.0, false ; "over a kilometre away")]
    fn test_is_same_place(name: &str, latitude: f64, longitude: f64, expected: bool) {
        let place = candidate(name, latitude, longitude, "ref");
        assert_eq!(is_same_place(&place, &hotel("HT000", "Hotel 0")), expected);
    }

    #[test]
    fn test_place_without_location_never_matches() {
        let place = PlaceCandidate {
            location: None,
            ..candidate("Hotel 0", 40.7, -74.0, "ref")
        };
        assert!(!is_same_place(&place, &hotel("HT000", "Hotel 0")));
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        let d = distance_m(
            GeoPoint { latitude: 0.0, longitude: 0.0 },
            GeoPoint { latitude: 1.0, longitude: 0.0 },
        );
        assert!((d - 111_195.0).abs() < 10.0);
    }

    #[tokio::test]
    async fn test_prices_normalized_to_usd() {
        let f = fixture(2, "EUR", MockPlaces::default());
        let page = f.fetcher.fetch_page(&params(1, 10)).await.unwrap();

        for item in &page.items {
            let price = &item.offer.offers[0].price;
            assert_eq!(price.currency, "USD");
            assert_eq!(price.total, "250.00");
            assert_eq!(price.base.as_deref(), Some("230.00"));
        }
    }

    #[tokio::test]
    async fn test_listed_offer_serializes_flat() {
        let f = fixture(1, "USD", MockPlaces::default());
        let page = f.fetcher.fetch_page(&params(1, 10)).await.unwrap();

        let value = serde_json::to_value(&page.items[0]).unwrap();
        assert_eq!(value["hotel"]["hotelId"], "HT000");
        assert!(value["photoUrl"].is_string());
        assert_eq!(value["offers"][0]["price"]["currency"], "USD");
    }
}
