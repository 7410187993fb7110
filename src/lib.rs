// Hotel offer aggregation and enrichment engine

pub mod cache_stats;
pub mod clients;
pub mod clock;
pub mod config;
pub mod credential_cache;
pub mod currency;
pub mod emissions;
pub mod generative;
pub mod inventory;
pub mod pipeline;
pub mod provider;
pub mod rate_cache;
pub mod schema;

// Re-export key types for convenience
pub use cache_stats::CacheStatsReport;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use credential_cache::{AuthError, CredentialCache, CredentialCacheConfig};
pub use currency::CurrencyNormalizer;
pub use emissions::{BatchEmissionsEstimator, EmissionsEstimate, EmissionsRating, HotelDescriptor};
pub use generative::{GenerationConfig, GenerationError, GenerativeSchemaClient};
pub use inventory::{
    FetchConfig, InventoryError, InventoryPage, ListedOffer, PaginatedInventoryFetcher,
    PaginationState, SearchParams,
};
pub use pipeline::{EnrichedOffer, EnrichedPage, EnrichmentPipeline, PipelineError};
pub use provider::{HotelOffer, InventoryItem, Price, TransportError};
pub use rate_cache::{RateCache, RateCacheConfig, RateFetchError};
pub use schema::{Field, Schema, SchemaViolation};
