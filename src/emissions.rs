// Batch carbon estimates for hotel stays
// One generative call per batch. Every requested hotel gets an estimate: ids the model
// skips, and whole batches whose generation fails, use the fixed fallback below.

use crate::generative::GenerativeSchemaClient;
use crate::schema::{Field, Schema};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

pub const FALLBACK_DAILY_KG: f64 = 25.0;
// Stay totals below this are "low"
pub const LOW_BELOW_KG: f64 = 60.0;
// Stay totals above this are "high"
pub const HIGH_ABOVE_KG: f64 = 120.0;

const ESTIMATE_INSTRUCTION: &str = "You are a sustainability analyst for hotel stays. \
For every hotel listed, estimate the carbon footprint of the stay in kilograms of CO2e \
for the whole party: daily_emissions_kg per night and total_emissions_kg for all nights. \
Rate each stay \"low\" when the total is below 60 kg, \"high\" when it is above 120 kg, \
and \"medium\" otherwise. Return one entry per hotel, using the hotel id exactly as given.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmissionsRating {
    Low,
    Medium,
    High,
}

impl EmissionsRating {
    pub fn from_total_kg(total_kg: f64) -> Self {
        if total_kg < LOW_BELOW_KG {
            EmissionsRating::Low
        } else if total_kg > HIGH_ABOVE_KG {
            EmissionsRating::High
        } else {
            EmissionsRating::Medium
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissionsEstimate {
    pub daily_emissions_kg: f64,
    pub total_emissions_kg: f64,
    pub rating: EmissionsRating,
}

impl EmissionsEstimate {
    pub fn fallback(nights: u32) -> Self {
        let total = FALLBACK_DAILY_KG * nights as f64;
        Self {
            daily_emissions_kg: FALLBACK_DAILY_KG,
            total_emissions_kg: total,
            rating: EmissionsRating::from_total_kg(total),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HotelDescriptor {
    pub id: String,
    pub name: String,
    pub hotel_type: String,
    pub room_type: Option<String>,
    pub location: Option<String>,
}

// Shape the model is asked to return, one per hotel
#[derive(Debug, Deserialize)]
struct ModelEstimate {
    hotel_id: String,
    daily_emissions_kg: f64,
    total_emissions_kg: f64,
    rating: EmissionsRating,
}

pub fn estimate_schema() -> Schema {
    Schema::array(Schema::object(vec![
        Field::required("hotel_id", Schema::string()),
        Field::required("daily_emissions_kg", Schema::non_negative()),
        Field::required("total_emissions_kg", Schema::non_negative()),
        Field::required("rating", Schema::one_of(&["low", "medium", "high"])),
    ]))
}

pub struct BatchEmissionsEstimator {
    client: Arc<GenerativeSchemaClient>,
    schema: Schema,
}

impl BatchEmissionsEstimator {
    pub fn new(client: Arc<GenerativeSchemaClient>) -> Self {
        Self {
            client,
            schema: estimate_schema(),
        }
    }

    pub async fn estimate(
        &self,
        items: &[HotelDescriptor],
        nights: u32,
        guests: u32,
    ) -> HashMap<String, EmissionsEstimate> {
        if items.is_empty() {
            return HashMap::new();
        }
        let nights = nights.max(1);
        let guests = guests.max(1);

        let prompt = build_prompt(items, nights, guests);
        let generated: Vec<ModelEstimate> = match self
            .client
            .generate(&self.schema, ESTIMATE_INSTRUCTION, &prompt)
            .await
        {
            Ok(generated) => generated,
            Err(e) => {
                warn!(error = %e, hotels = items.len(), nights, "Emissions generation failed, using fallback for batch");
                return items
                    .iter()
                    .map(|item| (item.id.clone(), EmissionsEstimate::fallback(nights)))
                    .collect();
            }
        };

        let requested: HashSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
        let mut estimates = HashMap::with_capacity(items.len());
        for model in generated {
            if !requested.contains(model.hotel_id.as_str()) {
                debug!(hotel_id = %model.hotel_id, "Ignoring estimate for unrequested hotel");
                continue;
            }
            estimates
                .entry(model.hotel_id)
                .or_insert(EmissionsEstimate {
                    daily_emissions_kg: model.daily_emissions_kg,
                    total_emissions_kg: model.total_emissions_kg,
                    rating: model.rating,
                });
        }

        for item in items {
            if !estimates.contains_key(&item.id) {
                warn!(hotel_id = %item.id, "Model omitted hotel, using fallback estimate");
                estimates.insert(item.id.clone(), EmissionsEstimate::fallback(nights));
            }
        }
        estimates
    }
}

fn build_prompt(items: &[HotelDescriptor], nights: u32, guests: u32) -> String {
    let mut prompt = format!(
        "Stay length: {} nights. Guests: {}.\nHotels ({}):\n",
        nights,
        guests,
        items.len()
    );
    for item in items {
        let _ = write!(
            prompt,
            "- id: {} | name: {} | type: {}",
            item.id, item.name, item.hotel_type
        );
        if let Some(room) = &item.room_type {
            let _ = write!(prompt, " | room: {}", room);
        }
        if let Some(location) = &item.location {
            let _ = write!(prompt, " | location: {}", location);
        }
        prompt.push('\n');
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generative::GenerationConfig;
    use crate::provider::mock::MockBackend;
    use crate::provider::TransportError;
    use std::time::Duration;
    use test_case::test_case;

    fn descriptor(id: &str) -> HotelDescriptor {
        HotelDescriptor {
            id: id.to_string(),
            name: format!("Hotel {}", id),
            hotel_type: "hotel".to_string(),
            room_type: Some("Deluxe King Room".to_string()),
            location: Some("NYC".to_string()),
        }
    }

    fn estimator(backend: Arc<MockBackend>) -> BatchEmissionsEstimator {
        let config = GenerationConfig {
            retry_delay: Duration::ZERO,
            ..GenerationConfig::default()
        };
        BatchEmissionsEstimator::new(Arc::new(GenerativeSchemaClient::new(backend, config)))
    }

    fn ids(map: &HashMap<String, EmissionsEstimate>) -> HashSet<String> {
        map.keys().cloned().collect()
    }

    #[test_case(2, 50.0, EmissionsRating::Low ; "two nights is low")]
    #[test_case(3, 75.0, EmissionsRating::Medium ; "three nights is medium")]
    #[test_case(4, 100.0, EmissionsRating::Medium ; "four nights is medium")]
    #[test_case(5, 125.0, EmissionsRating::High ; "five nights is high")]
    #[test_case(6, 150.0, EmissionsRating::High ; "six nights is high")]
    fn test_fallback_formula(nights: u32, total: f64, rating: EmissionsRating) {
        let estimate = EmissionsEstimate::fallback(nights);
        assert_eq!(estimate.daily_emissions_kg, 25.0);
        assert_eq!(estimate.total_emissions_kg, total);
        assert_eq!(estimate.rating, rating);
    }

    #[test]
    fn test_rating_boundaries_are_inclusive_medium() {
        assert_eq!(EmissionsRating::from_total_kg(59.99), EmissionsRating::Low);
        assert_eq!(EmissionsRating::from_total_kg(60.0), EmissionsRating::Medium);
        assert_eq!(EmissionsRating::from_total_kg(120.0), EmissionsRating::Medium);
        assert_eq!(EmissionsRating::from_total_kg(120.01), EmissionsRating::High);
    }

    #[test]
    fn test_estimate_serializes_for_clients() {
        let value = serde_json::to_value(EmissionsEstimate::fallback(3)).unwrap();
        assert_eq!(value["dailyEmissionsKg"], 25.0);
        assert_eq!(value["totalEmissionsKg"], 75.0);
        assert_eq!(value["rating"], "medium");
    }

    #[tokio::test]
    async fn test_empty_batch_skips_backend() {
        let backend = Arc::new(MockBackend::default());
        let result = estimator(backend.clone()).estimate(&[], 3, 2).await;
        assert!(result.is_empty());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_model_estimates_used_and_gaps_filled() {
        let backend = Arc::new(MockBackend::with_responses(vec![Ok(r#"```json
[
  {"hotel_id": "A", "daily_emissions_kg": 10.0, "total_emissions_kg": 40.0, "rating": "low"},
  {"hotel_id": "ZZZ", "daily_emissions_kg": 99.0, "total_emissions_kg": 999.0, "rating": "high"},
  {"hotel_id": "A", "daily_emissions_kg": 50.0, "total_emissions_kg": 200.0, "rating": "high"}
]
```"#
            .to_string())]));
        let items = vec![descriptor("A"), descriptor("B")];

        let result = estimator(backend.clone()).estimate(&items, 4, 2).await;

        assert_eq!(ids(&result), HashSet::from(["A".to_string(), "B".to_string()]));
        assert_eq!(result["A"].total_emissions_kg, 40.0);
        assert_eq!(result["A"].rating, EmissionsRating::Low);
        assert_eq!(result["B"], EmissionsEstimate::fallback(4));
        assert_eq!(backend.calls(), 1);

        let prompt = backend.requests.lock()[0].user_prompt.clone();
        assert!(prompt.contains("Stay length: 4 nights. Guests: 2."));
        assert!(prompt.contains("- id: B | name: Hotel B | type: hotel | room: Deluxe King Room | location: NYC"));
    }

    #[tokio::test]
    async fn test_generation_failure_falls_back_for_whole_batch() {
        let backend = Arc::new(MockBackend::with_responses(vec![
            Err(TransportError::Status {
                status: 503,
                message: "overloaded".to_string(),
            }),
            Ok("{\"estimates\": []}".to_string()),
            Ok("I cannot help with that".to_string()),
        ]));
        let items: Vec<_> = ["A", "B", "C"].iter().map(|id| descriptor(id)).collect();

        let result = estimator(backend.clone()).estimate(&items, 2, 1).await;

        assert_eq!(result.len(), 3);
        for item in &items {
            assert_eq!(result[&item.id], EmissionsEstimate::fallback(2));
            assert_eq!(result[&item.id].rating, EmissionsRating::Low);
        }
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_model_answer_still_covers_every_id() {
        let backend = Arc::new(MockBackend::with_responses(vec![Ok("[]".to_string())]));
        let items: Vec<_> = (0..12).map(|i| descriptor(&format!("H{}", i))).collect();

        let result = estimator(backend).estimate(&items, 6, 3).await;

        let expected: HashSet<String> = items.iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids(&result), expected);
        assert!(result.values().all(|e| e.rating == EmissionsRating::High));
    }

    #[tokio::test]
    async fn test_zero_nights_treated_as_one() {
        let backend = Arc::new(MockBackend::default());
        let result = estimator(backend).estimate(&[descriptor("A")], 0, 0).await;
        assert_eq!(result["A"].total_emissions_kg, 25.0);
    }
}
