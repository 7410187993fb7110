// Upstream collaborators: auth, currency rates, hotel inventory, place photos and the
// generative model. Each one is "give it typed parameters, get typed JSON back or a
// transport error"; the reqwest-backed versions live in `clients`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

// Auth provider response for the client-credentials grant
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

// A hotel as listed by the inventory provider's by-city lookup
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InventoryItem {
    #[serde(rename = "hotelId")]
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "geoCode", default)]
    pub geo: GeoPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelOffer {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub hotel: OfferHotel,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub offers: Vec<Offer>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferHotel {
    pub hotel_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: String,
    pub check_in_date: String,
    pub check_out_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests: Option<OfferGuests>,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct RoomInfo {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<RoomDescription>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct RoomDescription {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct OfferGuests {
    #[serde(default)]
    pub adults: u32,
}

// Monetary amounts stay decimal strings end to end
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Price {
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    pub total: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variations: Option<PriceVariations>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct PriceVariations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<PriceAverage>,
    #[serde(default)]
    pub changes: Vec<PriceChange>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct PriceAverage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceChange {
    pub start_date: String,
    pub end_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfferQuery {
    pub hotel_ids: Vec<String>,
    pub check_in_date: String,
    pub check_out_date: String,
    pub adults: u32,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceCandidate {
    pub name: String,
    pub location: Option<GeoPoint>,
    pub photo_reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub response_format: ResponseFormat,
}

#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    // POST /token with grant_type=client_credentials
    async fn exchange_client_credentials(&self) -> Result<TokenResponse, TransportError>;
}

#[async_trait]
pub trait RateProvider: Send + Sync + 'static {
    // Currency code -> units of that currency per one USD
    async fn fetch_usd_rates(&self) -> Result<HashMap<String, f64>, TransportError>;
}

#[async_trait]
pub trait InventoryProvider: Send + Sync + 'static {
    // Full, unpaginated list of hotels around a city
    async fn hotels_by_city(
        &self,
        token: &str,
        city_code: &str,
        radius_km: u32,
    ) -> Result<Vec<InventoryItem>, TransportError>;

    async fn hotel_offers(
        &self,
        token: &str,
        query: &OfferQuery,
    ) -> Result<Vec<HotelOffer>, TransportError>;
}

#[async_trait]
pub trait PlaceLookup: Send + Sync + 'static {
    async fn search_text(
        &self,
        query: &str,
        near: GeoPoint,
    ) -> Result<Vec<PlaceCandidate>, TransportError>;

    async fn photo_url(&self, photo_reference: &str, max_width: u32)
        -> Result<String, TransportError>;
}

#[async_trait]
pub trait GenerativeBackend: Send + Sync + 'static {
    // Free-form text that is expected (not guaranteed) to be JSON
    async fn generate(&self, request: GenerationRequest) -> Result<String, TransportError>;
}
