use cltv_core::{
    error::CltvError,
    segmenter::{Segment, Segmenter},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn labels(segments: &[Segment]) -> String {
    segments.iter().map(Segment::label).collect()
}

fn bucket_sizes(segments: &[Segment], count: usize) -> Vec<usize> {
    let mut sizes = vec![0; count];
    for s in segments {
        sizes[s.tier()] += 1;
    }
    sizes
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn four_segments_are_labelled_d_to_a() {
    let all: String = Segment::all(4).iter().map(Segment::label).collect();
    assert_eq!(all, "DCBA");
    assert!(Segment::all(4).windows(2).all(|w| w[0] < w[1]), "labels are ordered lowest first");
}

/// Exactly four customers still split into four non-empty buckets.
#[test]
fn four_customers_fill_four_buckets() {
    let segments = Segmenter::new(4).assign(&[30.0, 10.0, 40.0, 20.0]).unwrap();
    assert_eq!(labels(&segments), "BDAC");
}

/// Fewer customers than buckets: the extremes still reach the bottom and top tiers.
#[test]
fn short_population_spans_bottom_to_top() {
    let segmenter = Segmenter::new(4);
    assert_eq!(labels(&segmenter.assign(&[1.0, 2.0, 3.0]).unwrap()), "DCA");
    assert_eq!(labels(&segmenter.assign(&[3.0, 1.0, 2.0]).unwrap()), "ADC");
    assert_eq!(labels(&segmenter.assign(&[8.0, 2.0]).unwrap()), "AD");
    assert_eq!(labels(&segmenter.assign(&[8.0]).unwrap()), "A");
}

/// Bucket sizes differ by at most one customer.
#[test]
fn bucket_sizes_are_balanced() {
    for n in [4usize, 5, 10, 37, 1000] {
        let values: Vec<f64> = (0..n).map(|i| ((i * 7919) % 1009) as f64 + i as f64 * 1e-3).collect();
        let segments = Segmenter::new(4).assign(&values).unwrap();
        let sizes = bucket_sizes(&segments, 4);
        let spread = sizes.iter().max().unwrap() - sizes.iter().min().unwrap();
        assert!(spread <= 1, "n={n}: sizes {sizes:?}");
        assert_eq!(sizes.iter().sum::<usize>(), n);
    }
}

/// Higher CLTV never lands in a lower segment.
#[test]
fn segments_are_monotone_in_value() {
    let values = [5.0, 1.0, 9.0, 3.0, 7.0, 2.0, 8.0, 4.0, 6.0];
    let segments = Segmenter::new(4).assign(&values).unwrap();
    for i in 0..values.len() {
        for j in 0..values.len() {
            if values[i] < values[j] {
                assert!(segments[i] <= segments[j], "{} in {} but {} in {}", values[i], segments[i], values[j], segments[j]);
            }
        }
    }
}

/// Ties at a boundary are split by input order, and reruns agree exactly.
#[test]
fn ties_break_by_input_order_deterministically() {
    let values = [1.0, 5.0, 5.0, 5.0, 5.0, 2.0, 3.0, 9.0];
    let segmenter = Segmenter::new(4);
    let first = segmenter.assign(&values).unwrap();
    let second = segmenter.assign(&values).unwrap();
    assert_eq!(first, second);

    // Sorted order: 1.0, 2.0, 3.0, 5.0(#1), 5.0(#2), 5.0(#3), 5.0(#4), 9.0
    assert_eq!(labels(&first), "DCBBADCA");
}

#[test]
fn too_few_distinct_values_is_insufficient_data() {
    let result = Segmenter::new(4).assign(&[1.0, 1.0, 1.0, 2.0, 2.0]);
    assert!(matches!(result, Err(CltvError::InsufficientData(_))), "got {result:?}");

    let empty = Segmenter::new(4).assign(&[]);
    assert!(matches!(empty, Err(CltvError::InsufficientData(_))), "got {empty:?}");
}

#[test]
fn non_finite_values_are_rejected() {
    let result = Segmenter::new(4).assign(&[1.0, f64::NAN, 3.0, 4.0]);
    assert!(matches!(result, Err(CltvError::InvalidInput(_))), "got {result:?}");
}

#[test]
fn summary_reports_count_mean_and_total() {
    let values = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0];
    let segmenter = Segmenter::new(4);
    let segments = segmenter.assign(&values).unwrap();
    let summary = segmenter.summarize(&values, &segments);

    assert_eq!(summary.len(), 4);
    assert_eq!(summary[0].segment.label(), 'D');
    assert_eq!(summary[0].count, 2);
    assert_eq!(summary[0].total, 30.0);
    assert_eq!(summary[3].segment.label(), 'A');
    assert_eq!(summary[3].mean, 75.0);
}
