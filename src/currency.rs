// Best-effort conversion of offer prices into USD
// Never fails: a missing rate or an unavailable rate table leaves amounts as they were.

use crate::provider::{Price, PriceAverage, PriceChange, PriceVariations};
use crate::rate_cache::RateCache;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

pub const BASE_CURRENCY: &str = "USD";

pub struct CurrencyNormalizer {
    rates: Arc<RateCache>,
}

impl CurrencyNormalizer {
    pub fn new(rates: Arc<RateCache>) -> Self {
        Self { rates }
    }

    pub async fn convert(&self, amount: &str, from_currency: &str) -> String {
        if is_base_currency(from_currency) {
            return amount.to_string();
        }
        match self.rates.get_rates().await {
            Ok(rates) => convert_with(&rates, amount, from_currency),
            Err(e) => {
                warn!(error = %e, currency = from_currency, "Passing amount through unconverted");
                amount.to_string()
            }
        }
    }

    pub async fn convert_price(&self, price: &Price) -> Price {
        if is_base_currency(&price.currency) {
            return price.clone();
        }
        match self.rates.get_rates().await {
            Ok(rates) => convert_price_with(&rates, price),
            Err(e) => {
                warn!(error = %e, currency = %price.currency, "Leaving price in original currency");
                price.clone()
            }
        }
    }
}

fn is_base_currency(code: &str) -> bool {
    code.eq_ignore_ascii_case(BASE_CURRENCY)
}

// amount / rate, rounded half-up to cents
pub fn convert_with(rates: &HashMap<String, f64>, amount: &str, from_currency: &str) -> String {
    if is_base_currency(from_currency) {
        return amount.to_string();
    }

    let code = from_currency.to_lowercase();
    let rate = match rates.get(&code) {
        Some(rate) if rate.is_finite() && *rate > 0.0 => *rate,
        _ => {
            warn!(currency = %code, "No usable exchange rate, amount left unchanged");
            return amount.to_string();
        }
    };

    match amount.trim().parse::<f64>() {
        Ok(value) => format!("{:.2}", round_half_up(value / rate)),
        Err(_) => {
            warn!(amount, currency = %code, "Amount is not a decimal, left unchanged");
            amount.to_string()
        }
    }
}

fn round_half_up(value: f64) -> f64 {
    // Nudge past binary representation error (e.g. 1.005 stored as 1.00499...).
    // The nudge grows with magnitude so it stays a few ulps wide for large amounts.
    let scaled = value * 100.0;
    let nudged = scaled + scaled.signum() * (scaled.abs() * 4.0 * f64::EPSILON).max(1e-9);
    if value >= 0.0 {
        (nudged + 0.5).floor() / 100.0
    } else {
        -((-nudged) + 0.5).floor() / 100.0
    }
}

pub fn convert_price_with(rates: &HashMap<String, f64>, price: &Price) -> Price {
    if is_base_currency(&price.currency) {
        return price.clone();
    }

    let from = price.currency.as_str();
    let convert_opt =
        |amount: &Option<String>| amount.as_deref().map(|a| convert_with(rates, a, from));

    Price {
        currency: BASE_CURRENCY.to_string(),
        base: convert_opt(&price.base),
        total: convert_with(rates, &price.total, from),
        variations: price.variations.as_ref().map(|v| PriceVariations {
            average: v.average.as_ref().map(|a| PriceAverage {
                base: convert_opt(&a.base),
                total: convert_opt(&a.total),
            }),
            changes: v
                .changes
                .iter()
                .map(|c| PriceChange {
                    start_date: c.start_date.clone(),
                    end_date: c.end_date.clone(),
                    base: convert_opt(&c.base),
                    total: convert_opt(&c.total),
                })
                .collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::provider::mock::MockRates;
    use crate::rate_cache::RateCacheConfig;
    use test_case::test_case;

    fn rates() -> HashMap<String, f64> {
        HashMap::from([("eur".to_string(), 0.8), ("jpy".to_string(), 150.0)])
    }

    fn normalizer(provider: Arc<MockRates>) -> CurrencyNormalizer {
        let cache = RateCache::new(
            provider,
            Arc::new(ManualClock::new(0)),
            RateCacheConfig::default(),
        );
        CurrencyNormalizer::new(Arc::new(cache))
    }

    fn eur_price() -> Price {
        Price {
            currency: "EUR".to_string(),
            base: Some("80.00".to_string()),
            total: "100.00".to_string(),
            variations: Some(PriceVariations {
                average: Some(PriceAverage {
                    base: Some("20.00".to_string()),
                    total: None,
                }),
                changes: vec![
                    PriceChange {
                        start_date: "2024-06-01".to_string(),
                        end_date: "2024-06-03".to_string(),
                        base: Some("16.00".to_string()),
                        total: None,
                    },
                    PriceChange {
                        start_date: "2024-06-03".to_string(),
                        end_date: "2024-06-05".to_string(),
                        base: Some("24.00".to_string()),
                        total: Some("30.00".to_string()),
                    },
                ],
            }),
        }
    }

    #[test_case("100", "EUR", "125.00" ; "divides by rate")]
    #[test_case("100", "eur", "125.00" ; "lookup is case insensitive")]
    #[test_case("15000", "JPY", "100.00" ; "large rate")]
    #[test_case("0.10", "EUR", "0.13" ; "rounds half up")]
    #[test_case("100", "USD", "100" ; "base currency is identity")]
    #[test_case("100", "XYZ", "100" ; "missing rate passes through")]
    #[test_case("n/a", "EUR", "n/a" ; "non numeric passes through")]
    fn test_convert_with(amount: &str, from: &str, expected: &str) {
        assert_eq!(convert_with(&rates(), amount, from), expected);
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(1.005), 1.01);
        assert_eq!(round_half_up(2.675), 2.68);
        assert_eq!(round_half_up(1.004), 1.0);
        assert_eq!(round_half_up(-1.005), -1.01);
        assert_eq!(round_half_up(10_000_000.005), 10_000_000.01);
        assert_eq!(round_half_up(12_345_678.125), 12_345_678.13);
        assert_eq!(round_half_up(987_654_321.004), 987_654_321.0);
    }

    #[test]
    fn test_convert_price_touches_every_amount() {
        let converted = convert_price_with(&rates(), &eur_price());

        assert_eq!(converted.currency, "USD");
        assert_eq!(converted.base.as_deref(), Some("100.00"));
        assert_eq!(converted.total, "125.00");
        let variations = converted.variations.unwrap();
        assert_eq!(variations.average.unwrap().base.as_deref(), Some("25.00"));
        assert_eq!(variations.changes[0].base.as_deref(), Some("20.00"));
        assert_eq!(variations.changes[1].base.as_deref(), Some("30.00"));
        assert_eq!(variations.changes[1].total.as_deref(), Some("37.50"));
        assert_eq!(variations.changes[1].start_date, "2024-06-03");
    }

    #[test]
    fn test_convert_price_is_idempotent() {
        let once = convert_price_with(&rates(), &eur_price());
        let twice = convert_price_with(&rates(), &once);
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_normalizer_converts_via_cache() {
        let provider = Arc::new(MockRates::new(&[("eur", 0.8)]));
        let normalizer = normalizer(provider.clone());

        assert_eq!(normalizer.convert("40", "EUR").await, "50.00");
        let price = normalizer.convert_price(&eur_price()).await;
        assert_eq!(price.total, "125.00");
        assert_eq!(provider.calls(), 1);

        // USD input never touches the rate provider
        let usd = normalizer.convert_price(&price).await;
        assert_eq!(usd, price);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_normalizer_passes_through_without_rates() {
        let provider = Arc::new(MockRates::new(&[]));
        provider.set_down();
        let normalizer = normalizer(provider);

        assert_eq!(normalizer.convert("40", "EUR").await, "40");
        let original = eur_price();
        assert_eq!(normalizer.convert_price(&original).await, original);
    }
}
