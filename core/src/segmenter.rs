//! Quantile segmentation of the CLTV distribution.
//!
//! Customers are ranked by CLTV with a stable sort (ties keep input order)
//! and split into `segment_count` buckets whose sizes differ by at most one.
//! The lowest bucket gets the last letter, the highest gets `A`.
//!
//! With fewer customers than buckets, ranks are spread from the bottom tier
//! to the top tier, so the lowest customer is always in the last bucket and
//! the highest always in `A` (three customers in four buckets: `D`, `C`, `A`).

use crate::error::{CltvError, CltvResult};
use serde::{Serialize, Serializer};

/// An ordinal segment label: tier 0 is the lowest-value bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Segment {
    tier:  u8,
    count: u8,
}

impl Segment {
    /// All labels for `count` segments, lowest first.
    pub fn all(count: usize) -> Vec<Segment> {
        (0..count).map(|tier| Segment { tier: tier as u8, count: count as u8 }).collect()
    }

    pub fn tier(&self) -> usize {
        self.tier as usize
    }

    /// `A` for the top tier, then `B`, `C`, ... downwards.
    pub fn label(&self) -> char {
        (b'A' + (self.count - 1 - self.tier)) as char
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for Segment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(self.label())
    }
}

/// Count, mean and total CLTV of one segment.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub count:   usize,
    pub mean:    f64,
    pub total:   f64,
}

pub struct Segmenter {
    segment_count: usize,
}

impl Segmenter {
    pub fn new(segment_count: usize) -> Self {
        Self { segment_count }
    }

    /// Label every value. Output is index-aligned with `values`.
    pub fn assign(&self, values: &[f64]) -> CltvResult<Vec<Segment>> {
        let n = values.len();
        let k = self.segment_count;
        if k == 0 || k > 26 {
            return Err(CltvError::InvalidInput(format!("segment_count must be in 1..=26, got {k}")));
        }
        if n == 0 {
            return Err(CltvError::InsufficientData("no CLTV values to segment".into()));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(CltvError::InvalidInput(format!("non-finite CLTV value {bad}")));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));

        let distinct = 1 + order.windows(2).filter(|w| values[w[0]] != values[w[1]]).count();
        let needed = k.min(n);
        if distinct < needed {
            return Err(CltvError::InsufficientData(format!(
                "{distinct} distinct CLTV values cannot form {needed} quantile buckets"
            )));
        }

        let labels = Segment::all(k);
        let mut assigned = vec![labels[0]; n];
        for (rank, &idx) in order.iter().enumerate() {
            assigned[idx] = labels[Self::tier_of(rank, n, k)];
        }
        Ok(assigned)
    }

    fn tier_of(rank: usize, n: usize, k: usize) -> usize {
        if n >= k {
            rank * k / n
        } else if n == 1 {
            k - 1
        } else {
            rank * (k - 1) / (n - 1)
        }
    }

    /// Per-segment totals, lowest segment first. Empty segments are reported with zero count.
    pub fn summarize(&self, values: &[f64], segments: &[Segment]) -> Vec<SegmentSummary> {
        Segment::all(self.segment_count)
            .into_iter()
            .map(|segment| {
                let members: Vec<f64> = values
                    .iter()
                    .zip(segments)
                    .filter(|(_, s)| **s == segment)
                    .map(|(v, _)| *v)
                    .collect();
                let total: f64 = members.iter().sum();
                let mean = if members.is_empty() { 0.0 } else { total / members.len() as f64 };
                SegmentSummary { segment, count: members.len(), mean, total }
            })
            .collect()
    }
}
