// reqwest implementations of the upstream collaborators

use crate::config::{AmadeusConfig, GeminiConfig, PlacesConfig};
use crate::provider::{
    AuthProvider, GenerationRequest, GenerativeBackend, GeoPoint, HotelOffer, InventoryItem,
    InventoryProvider, OfferQuery, PlaceCandidate, PlaceLookup, RateProvider, ResponseFormat,
    TokenResponse, TransportError,
};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;

// Radius for biasing place search around the hotel's coordinates
const PLACE_SEARCH_RADIUS_M: u32 = 500;

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(TransportError::Status {
            status: status.as_u16(),
            message,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| TransportError::Decode(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

// Amadeus self-service API: OAuth token, hotel list and hotel offers
pub struct AmadeusClient {
    http: Client,
    config: AmadeusConfig,
}

impl AmadeusClient {
    pub fn new(http: Client, config: AmadeusConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl AuthProvider for AmadeusClient {
    async fn exchange_client_credentials(&self) -> Result<TokenResponse, TransportError> {
        let url = format!("{}/v1/security/oauth2/token", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;
        decode(response).await
    }
}

#[async_trait]
impl InventoryProvider for AmadeusClient {
    async fn hotels_by_city(
        &self,
        token: &str,
        city_code: &str,
        radius_km: u32,
    ) -> Result<Vec<InventoryItem>, TransportError> {
        let url = format!(
            "{}/v1/reference-data/locations/hotels/by-city",
            self.config.base_url
        );
        let radius = radius_km.to_string();
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("cityCode", city_code),
                ("radius", radius.as_str()),
                ("radiusUnit", "KM"),
            ])
            .send()
            .await?;
        let envelope: DataEnvelope<InventoryItem> = decode(response).await?;
        debug!(city_code, hotels = envelope.data.len(), "Fetched hotel list");
        Ok(envelope.data)
    }

    async fn hotel_offers(
        &self,
        token: &str,
        query: &OfferQuery,
    ) -> Result<Vec<HotelOffer>, TransportError> {
        let url = format!("{}/v3/shopping/hotel-offers", self.config.base_url);
        let hotel_ids = query.hotel_ids.join(",");
        let adults = query.adults.max(1).to_string();
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("hotelIds", hotel_ids.as_str()),
                ("checkInDate", query.check_in_date.as_str()),
                ("checkOutDate", query.check_out_date.as_str()),
                ("adults", adults.as_str()),
                ("currency", query.currency.as_str()),
            ])
            .send()
            .await?;
        let envelope: DataEnvelope<HotelOffer> = decode(response).await?;
        Ok(envelope.data)
    }
}

#[derive(Debug, Deserialize)]
struct UsdRates {
    usd: HashMap<String, f64>,
}

// Daily USD exchange rate table
pub struct CurrencyApiClient {
    http: Client,
    base_url: String,
}

impl CurrencyApiClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RateProvider for CurrencyApiClient {
    async fn fetch_usd_rates(&self) -> Result<HashMap<String, f64>, TransportError> {
        let url = format!("{}/currencies/usd.json", self.base_url);
        let response = self.http.get(&url).send().await?;
        let table: UsdRates = decode(response).await?;
        Ok(table.usd)
    }
}

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<PlaceResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    #[serde(default)]
    name: String,
    geometry: Option<PlaceGeometry>,
    #[serde(default)]
    photos: Vec<PlacePhoto>,
}

#[derive(Debug, Deserialize)]
struct PlaceGeometry {
    location: PlaceLocation,
}

#[derive(Debug, Deserialize)]
struct PlaceLocation {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct PlacePhoto {
    photo_reference: String,
}

// Google Places text search and photo endpoint
pub struct PlacesClient {
    http: Client,
    config: PlacesConfig,
}

impl PlacesClient {
    pub fn new(http: Client, config: PlacesConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl PlaceLookup for PlacesClient {
    async fn search_text(
        &self,
        query: &str,
        near: GeoPoint,
    ) -> Result<Vec<PlaceCandidate>, TransportError> {
        let url = format!("{}/textsearch/json", self.config.base_url);
        let location = format!("{},{}", near.latitude, near.longitude);
        let radius = PLACE_SEARCH_RADIUS_M.to_string();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("query", query),
                ("location", location.as_str()),
                ("radius", radius.as_str()),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await?;
        let body: TextSearchResponse = decode(response).await?;

        match body.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(body
                .results
                .into_iter()
                .map(|r| PlaceCandidate {
                    name: r.name,
                    location: r.geometry.map(|g| GeoPoint {
                        latitude: g.location.lat,
                        longitude: g.location.lng,
                    }),
                    photo_reference: r.photos.into_iter().next().map(|p| p.photo_reference),
                })
                .collect()),
            other => Err(TransportError::Decode(format!(
                "place search status {}: {}",
                other,
                body.error_message.unwrap_or_default()
            ))),
        }
    }

    async fn photo_url(
        &self,
        photo_reference: &str,
        max_width: u32,
    ) -> Result<String, TransportError> {
        let max_width = max_width.to_string();
        Url::parse_with_params(
            &format!("{}/photo", self.config.base_url),
            &[
                ("maxwidth", max_width.as_str()),
                ("photo_reference", photo_reference),
                ("key", self.config.api_key.as_str()),
            ],
        )
        .map(String::from)
        .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: String,
}

// Gemini generateContent endpoint
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(http: Client, config: GeminiConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, TransportError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let mime_type = match request.response_format {
            ResponseFormat::Json => "application/json",
        };
        let body = json!({
            "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
            "contents": [{ "role": "user", "parts": [{ "text": request.user_prompt }] }],
            "generationConfig": {
                "temperature": request.temperature,
                "responseMimeType": mime_type,
            },
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let parsed: GenerateContentResponse = decode(response).await?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(TransportError::Decode(
                "generative response had no text candidates".to_string(),
            ));
        }
        Ok(text)
    }
}
