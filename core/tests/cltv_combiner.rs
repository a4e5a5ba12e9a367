use cltv_core::{
    combiner::CltvCombiner,
    config::CltvConfig,
    error::CltvError,
    features::CustomerFeatures,
    model::{SpendPredictor, TransactionPredictor},
    monetary::MonetaryParameters,
    purchase_timing::PurchaseTimingParameters,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Transacts at a constant rate forever.
struct SteadyBuyer {
    rate: f64,
}

impl TransactionPredictor for SteadyBuyer {
    fn expected_transactions(&self, horizon: f64, _customer: &CustomerFeatures) -> f64 {
        self.rate * horizon
    }

    fn probability_alive(&self, _customer: &CustomerFeatures) -> f64 {
        1.0
    }
}

/// Echoes the observed average, except for customers named "unknown".
struct ObservedSpend;

impl SpendPredictor for ObservedSpend {
    fn expected_average_spend(&self, customer: &CustomerFeatures) -> Option<f64> {
        (customer.customer_id != "unknown").then_some(customer.monetary)
    }
}

fn combiner(horizon: f64, period: f64, rate: f64) -> CltvCombiner {
    CltvCombiner::new(&CltvConfig {
        horizon_length: horizon,
        period_length: period,
        discount_rate: rate,
        ..CltvConfig::default_test()
    })
}

fn customer(id: &str, monetary: f64) -> CustomerFeatures {
    CustomerFeatures::new(id, 4, 20.0, 30.0, monetary)
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// A partial last period is truncated at the horizon.
#[test]
fn periods_cover_the_horizon_exactly() {
    let periods = combiner(12.0, 4.345, 0.01).periods();
    assert_eq!(periods.len(), 3);
    assert_eq!(periods[0], (1, 0.0, 4.345));
    assert!((periods[2].1 - 8.69).abs() < 1e-12);
    assert_eq!(periods[2].2, 12.0);

    let weekly = combiner(12.0, 1.0, 0.01).periods();
    assert_eq!(weekly.len(), 12);
    assert_eq!(weekly[11], (12, 11.0, 12.0));
}

/// Without discounting the period increments telescope to the horizon forecast.
#[test]
fn undiscounted_value_is_horizon_forecast_times_spend() {
    let value = combiner(12.0, 1.0, 0.0).discounted_value(&SteadyBuyer { rate: 0.5 }, &customer("a", 40.0), 40.0);
    assert!((value - 0.5 * 12.0 * 40.0).abs() < 1e-9, "value = {value}");
}

/// Each period's revenue is discounted by (1 + rate)^index.
#[test]
fn each_period_is_discounted_by_its_index() {
    let rate = 0.01;
    let value = combiner(12.0, 1.0, rate).discounted_value(&SteadyBuyer { rate: 0.5 }, &customer("a", 40.0), 40.0);
    let expected: f64 = (1..=12).map(|i| 0.5 * 40.0 / (1.0 + rate).powi(i)).sum();
    assert!((value - expected).abs() < 1e-9, "{value} vs {expected}");
    assert!(value < 0.5 * 12.0 * 40.0);
}

/// Customers outside a model's domain are dropped and reported, never zero-filled.
#[test]
fn uncovered_customers_are_dropped_and_reported() {
    let features = vec![customer("a", 40.0), customer("unknown", 40.0), customer("b", 10.0)];
    let combined = combiner(12.0, 4.0, 0.01)
        .combine(&SteadyBuyer { rate: 0.2 }, &ObservedSpend, &features)
        .unwrap();

    let scored: Vec<&str> = combined.predictions.iter().map(|p| p.customer_id.as_str()).collect();
    assert_eq!(scored, vec!["a", "b"]);
    assert_eq!(combined.dropped.len(), 1);
    assert_eq!(combined.dropped[0].customer_id, "unknown");
}

#[test]
fn nobody_scored_is_a_data_quality_error() {
    let features = vec![customer("unknown", 40.0)];
    let result = combiner(12.0, 4.0, 0.01).combine(&SteadyBuyer { rate: 0.2 }, &ObservedSpend, &features);
    assert!(matches!(result, Err(CltvError::DataQuality(_))), "got {result:?}");
}

/// With fitted-style parameters every row carries forecasts for each configured horizon.
#[test]
fn predictions_carry_every_horizon() {
    let timing = PurchaseTimingParameters::new(0.243, 4.414, 0.793, 2.426);
    let monetary = MonetaryParameters::new(6.25, 3.74, 15.44);
    let features = vec![customer("a", 40.0), CustomerFeatures::new("z", 0, 0.0, 30.0, 25.0)];

    let combined = combiner(12.0, 4.345, 0.01).combine(&timing, &monetary, &features).unwrap();

    assert_eq!(combined.predictions.len(), 1, "frequency 0 is outside the monetary domain");
    assert_eq!(combined.dropped[0].customer_id, "z");
    let p = &combined.predictions[0];
    let horizons: Vec<f64> = p.forecasts.iter().map(|f| f.horizon).collect();
    assert_eq!(horizons, vec![1.0, 4.0, 12.0]);
    assert!(p.forecasts.windows(2).all(|w| w[0].expected_transactions <= w[1].expected_transactions));
    assert!(p.cltv > 0.0);
    assert!(p.cltv < p.forecasts[2].expected_transactions * p.expected_average_spend);
    assert!(p.segment.is_none());
}
