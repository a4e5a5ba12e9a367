use cltv_core::{
    config::CltvConfig,
    error::CltvError,
    features::CustomerHistory,
    pipeline::CltvPipeline,
    rfm::{RfmScorer, RfmSegment},
    transaction::TransactionRecord,
};
use chrono::{Duration, NaiveDateTime};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn cutoff() -> NaiveDateTime {
    CltvConfig::default().observation_cutoff
}

fn history(id: &str, days_since_last: i64, invoices: usize, spend: f64) -> CustomerHistory {
    let last = cutoff() - Duration::days(days_since_last);
    CustomerHistory {
        customer_id: id.to_string(),
        first_purchase: last - Duration::days(30),
        last_purchase: last,
        invoices,
        units: invoices as f64,
        total_spend: spend,
    }
}

/// Ten customers: recency 10..100 days, one invoice each, spend 100..1000.
fn ladder() -> Vec<CustomerHistory> {
    (0..10)
        .map(|i| history(&format!("c{i}"), 10 * (i + 1), 1, 100.0 * (i + 1) as f64))
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Recency scores fall as days since the last purchase grow; equal invoice
/// counts are ranked in input order.
#[test]
fn ladder_scores_and_segments() {
    let scores = RfmScorer::new(&CltvConfig::default()).score(&ladder()).unwrap();

    let recency: Vec<u8> = scores.iter().map(|s| s.recency_score).collect();
    let frequency: Vec<u8> = scores.iter().map(|s| s.frequency_score).collect();
    let monetary: Vec<u8> = scores.iter().map(|s| s.monetary_score).collect();
    assert_eq!(recency, vec![5, 5, 4, 4, 3, 3, 2, 2, 1, 1]);
    assert_eq!(frequency, vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);
    assert_eq!(monetary, vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);

    assert_eq!(scores[0].rfm_score(), "51");
    assert_eq!(scores[0].segment, RfmSegment::NewCustomers);
    assert_eq!(scores[2].segment, RfmSegment::PotentialLoyalists);
    assert_eq!(scores[4].segment, RfmSegment::NeedAttention);
    assert_eq!(scores[6].segment, RfmSegment::AtRisk);
    assert_eq!(scores[9].segment, RfmSegment::CantLose);
    assert_eq!(scores[9].recency_days, 100);
}

#[test]
fn segment_grid_covers_every_score_pair() {
    let expect = [
        ((1, 1), RfmSegment::Hibernating),
        ((2, 2), RfmSegment::Hibernating),
        ((2, 3), RfmSegment::AtRisk),
        ((1, 5), RfmSegment::CantLose),
        ((3, 2), RfmSegment::AboutToSleep),
        ((3, 3), RfmSegment::NeedAttention),
        ((3, 5), RfmSegment::LoyalCustomers),
        ((4, 4), RfmSegment::LoyalCustomers),
        ((4, 1), RfmSegment::Promising),
        ((5, 1), RfmSegment::NewCustomers),
        ((4, 3), RfmSegment::PotentialLoyalists),
        ((5, 2), RfmSegment::PotentialLoyalists),
        ((5, 4), RfmSegment::Champions),
        ((5, 5), RfmSegment::Champions),
    ];
    for ((r, f), segment) in expect {
        assert_eq!(RfmSegment::from_scores(r, f), segment, "scores {r}{f}");
    }
    for r in 1..=5 {
        for f in 1..=5 {
            assert!(RfmSegment::ALL.contains(&RfmSegment::from_scores(r, f)));
        }
    }
}

#[test]
fn summary_reports_means_per_segment() {
    let scorer = RfmScorer::new(&CltvConfig::default());
    let report = scorer.run(&ladder()).unwrap();

    assert_eq!(report.segments.len(), 5);
    assert!(report.segments.iter().all(|s| s.count == 2));
    let new = report.segments.iter().find(|s| s.segment == RfmSegment::NewCustomers).unwrap();
    assert_eq!(new.mean_recency, 15.0);
    assert_eq!(new.mean_frequency, 1.0);
    assert_eq!(new.mean_monetary, 150.0);
}

/// Identical spend everywhere cannot be cut into quintiles.
#[test]
fn flat_monetary_is_insufficient_data() {
    let flat: Vec<CustomerHistory> = (0..10).map(|i| history(&format!("c{i}"), 10 * (i + 1), 2, 50.0)).collect();
    let result = RfmScorer::new(&CltvConfig::default()).score(&flat);
    assert!(matches!(result, Err(CltvError::InsufficientData(_))), "got {result:?}");
}

#[test]
fn customers_without_spend_are_skipped() {
    let mut histories = ladder();
    histories.push(history("zero", 5, 3, 0.0));
    let scores = RfmScorer::new(&CltvConfig::default()).score(&histories).unwrap();
    assert_eq!(scores.len(), 10);
    assert!(scores.iter().all(|s| s.customer_id != "zero"));
}

/// From a raw log: cancellations are ignored and single-invoice buyers are scored.
#[test]
fn pipeline_scores_raw_transactions() {
    let mut log = Vec::new();
    for i in 0..10i64 {
        let customer = format!("c{i}");
        for k in 0..=i {
            let when = cutoff() - Duration::days(10 * (i + 1) + 7 * k);
            log.push(TransactionRecord::new(format!("{i:02}{k:02}"), Some(customer.clone()), when, 1.0, 20.0 + i as f64));
        }
    }
    log.push(TransactionRecord::new("C9999", Some("c0".to_string()), cutoff() - Duration::days(1), 1.0, 500.0));

    let report = CltvPipeline::new(CltvConfig::default()).unwrap().rfm(&log).unwrap();
    assert_eq!(report.customers.len(), 10);

    let c0 = report.customers.iter().find(|c| c.customer_id == "c0").unwrap();
    assert_eq!(c0.frequency, 1);
    assert_eq!(c0.recency_days, 10);
    assert_eq!(c0.rfm_score(), "51");
    let c9 = report.customers.iter().find(|c| c.customer_id == "c9").unwrap();
    assert_eq!(c9.frequency, 10);
    assert_eq!(c9.rfm_score(), "15");
}
