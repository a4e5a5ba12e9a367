//! Parameter recovery: fit both models on populations drawn from known
//! parameters and check the estimates land near the truth.

use cltv_core::{
    config::ModelFitConfig,
    features::CustomerFeatures,
    monetary::{MonetaryModel, MonetaryParameters},
    purchase_timing::{PurchaseTimingModel, PurchaseTimingParameters},
    synthetic::{SyntheticConfig, SyntheticPopulation},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn true_timing() -> PurchaseTimingParameters {
    PurchaseTimingParameters::new(0.5, 2.0, 0.7, 2.8)
}

fn true_monetary() -> MonetaryParameters {
    MonetaryParameters::new(6.0, 4.0, 15.0)
}

fn population(seed: u64, customers: usize) -> Vec<CustomerFeatures> {
    SyntheticPopulation::generate(&SyntheticConfig {
        timing: true_timing(),
        monetary: true_monetary(),
        customers,
        min_observation: 30.0,
        max_observation: 52.0,
        seed,
    })
    .features()
}

fn relative_error(estimate: f64, truth: f64) -> f64 {
    (estimate - truth).abs() / truth
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Mean purchase rate r/α and mean dropout a/(a+b) are recovered from 4000 customers.
#[test]
fn purchase_timing_parameters_are_recovered() {
    let features = population(0x5EED_0001, 4000);
    let fit = PurchaseTimingModel::new(ModelFitConfig::with_penalizer(0.0)).fit(&features).unwrap();
    let (truth, got) = (true_timing(), fit.params);

    let rate_err = relative_error(got.r / got.alpha, truth.r / truth.alpha);
    assert!(rate_err < 0.10, "mean rate off by {:.1}%: {got:?}", rate_err * 100.0);

    let dropout_err = relative_error(got.a / (got.a + got.b), truth.a / (truth.a + truth.b));
    assert!(dropout_err < 0.15, "mean dropout off by {:.1}%: {got:?}", dropout_err * 100.0);

    for (name, estimate, expected) in [("r", got.r, truth.r), ("alpha", got.alpha, truth.alpha)] {
        let err = relative_error(estimate, expected);
        assert!(err < 0.25, "{name} off by {:.1}%: {got:?}", err * 100.0);
    }

    // The dropout shapes trade off against each other; bound each loosely.
    for (name, estimate, expected) in [("a", got.a, truth.a), ("b", got.b, truth.b)] {
        let err = relative_error(estimate, expected);
        assert!(err < 0.60, "{name} off by {:.1}%: {got:?}", err * 100.0);
    }
}

/// Population mean spend p·v/(q−1) is recovered from the repeat customers.
#[test]
fn monetary_parameters_are_recovered() {
    let features = population(0x5EED_0002, 4000);
    let fit = MonetaryModel::new(ModelFitConfig::with_penalizer(0.0)).fit(&features).unwrap();

    assert!(fit.customers > 1500, "only {} repeat customers drawn", fit.customers);
    let truth = true_monetary().population_mean_spend().unwrap();
    let got = fit.params.population_mean_spend().expect("fitted q should exceed 1");
    let err = relative_error(got, truth);
    assert!(err < 0.10, "population mean spend {got} vs {truth} ({:?})", fit.params);

    let (truth, got) = (true_monetary(), fit.params);
    for (name, estimate, expected) in [("p", got.p, truth.p), ("q", got.q, truth.q), ("v", got.v, truth.v)] {
        let err = relative_error(estimate, expected);
        assert!(err < 0.50, "{name} off by {:.1}%: {got:?}", err * 100.0);
    }
}

/// Same seed, same population, same fit.
#[test]
fn recovery_is_reproducible() {
    let a = population(42, 300);
    let b = population(42, 300);
    assert_eq!(a, b);

    let model = PurchaseTimingModel::new(ModelFitConfig::with_penalizer(0.001));
    let fit_a = model.fit(&a).unwrap();
    let fit_b = model.fit(&b).unwrap();
    assert_eq!(fit_a.params, fit_b.params);
}
