//! RFM scoring: quintile scores for recency, frequency and monetary value,
//! and the named customer segments derived from them.
//!
//! Recency here is calendar days from the last purchase to the observation
//! cutoff, frequency is the number of distinct invoices and monetary is total
//! spend. This is the descriptive view of a customer base and does not share
//! units with the model features.
//!
//! RULES:
//!   - Scores run 1..=5, 5 being best (most recent, most frequent, highest spend).
//!   - Frequency is ranked first (ties in input order) so its bins never collapse.
//!   - The segment depends on the recency and frequency scores only.

use crate::{
    config::CltvConfig,
    error::{CltvError, CltvResult},
    features::{quantile, CustomerHistory},
    types::CustomerId,
};
use chrono::NaiveDateTime;
use serde::Serialize;

pub const SCORE_BINS: usize = 5;

/// Equal-frequency bin of each value, 0-based and index-aligned with `values`.
///
/// Edges are the linear-interpolated quantiles at `i / bins`; a value lands in
/// the first bin whose upper edge it does not exceed, so equal values always
/// share a bin. Fails when two edges coincide.
pub fn quantile_bins(values: &[f64], bins: usize) -> CltvResult<Vec<usize>> {
    if values.is_empty() || bins == 0 {
        return Err(CltvError::InsufficientData("nothing to bin".into()));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(CltvError::InvalidInput("cannot bin non-finite values".into()));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let edges: Vec<f64> = (0..=bins).map(|i| quantile(&sorted, i as f64 / bins as f64)).collect();
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(CltvError::InsufficientData(format!(
            "bin edges {edges:?} are not distinct; {bins} bins cannot be formed"
        )));
    }

    Ok(values
        .iter()
        .map(|v| edges[1..].iter().position(|edge| v <= edge).unwrap_or(bins - 1))
        .collect())
}

/// Named segment from the recency/frequency score grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RfmSegment {
    Hibernating,
    AtRisk,
    CantLose,
    AboutToSleep,
    NeedAttention,
    LoyalCustomers,
    Promising,
    NewCustomers,
    PotentialLoyalists,
    Champions,
}

impl RfmSegment {
    pub const ALL: [RfmSegment; 10] = [
        Self::Hibernating,
        Self::AtRisk,
        Self::CantLose,
        Self::AboutToSleep,
        Self::NeedAttention,
        Self::LoyalCustomers,
        Self::Promising,
        Self::NewCustomers,
        Self::PotentialLoyalists,
        Self::Champions,
    ];

    /// Grid lookup. Scores outside 1..=5 are clamped.
    pub fn from_scores(recency: u8, frequency: u8) -> Self {
        match (recency.clamp(1, 5), frequency.clamp(1, 5)) {
            (1..=2, 1..=2) => Self::Hibernating,
            (1..=2, 3..=4) => Self::AtRisk,
            (1..=2, _) => Self::CantLose,
            (3, 1..=2) => Self::AboutToSleep,
            (3, 3) => Self::NeedAttention,
            (3..=4, 4..=5) => Self::LoyalCustomers,
            (4, 1) => Self::Promising,
            (5, 1) => Self::NewCustomers,
            (4..=5, 2..=3) => Self::PotentialLoyalists,
            _ => Self::Champions,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hibernating => "hibernating",
            Self::AtRisk => "at_risk",
            Self::CantLose => "cant_lose",
            Self::AboutToSleep => "about_to_sleep",
            Self::NeedAttention => "need_attention",
            Self::LoyalCustomers => "loyal_customers",
            Self::Promising => "promising",
            Self::NewCustomers => "new_customers",
            Self::PotentialLoyalists => "potential_loyalists",
            Self::Champions => "champions",
        }
    }
}

impl std::fmt::Display for RfmSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RfmScore {
    pub customer_id:     CustomerId,
    pub recency_days:    i64,
    pub frequency:       usize,
    pub monetary:        f64,
    pub recency_score:   u8,
    pub frequency_score: u8,
    pub monetary_score:  u8,
    pub segment:         RfmSegment,
}

impl RfmScore {
    /// Recency and frequency scores as a two-digit code, e.g. `"55"`.
    pub fn rfm_score(&self) -> String {
        format!("{}{}", self.recency_score, self.frequency_score)
    }
}

/// Mean recency, frequency and monetary value of one named segment.
#[derive(Debug, Clone, Serialize)]
pub struct RfmSegmentSummary {
    pub segment:        RfmSegment,
    pub count:          usize,
    pub mean_recency:   f64,
    pub mean_frequency: f64,
    pub mean_monetary:  f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RfmReport {
    pub customers: Vec<RfmScore>,
    pub segments:  Vec<RfmSegmentSummary>,
}

pub struct RfmScorer {
    observation_cutoff: NaiveDateTime,
}

impl RfmScorer {
    pub fn new(config: &CltvConfig) -> Self {
        Self { observation_cutoff: config.observation_cutoff }
    }

    pub fn run(&self, histories: &[CustomerHistory]) -> CltvResult<RfmReport> {
        let customers = self.score(histories)?;
        let segments = Self::summarize(&customers);
        log::info!(
            "rfm: {} customers in {} segments",
            customers.len(),
            segments.len()
        );
        Ok(RfmReport { customers, segments })
    }

    /// Score every customer with positive spend. Output keeps input order.
    pub fn score(&self, histories: &[CustomerHistory]) -> CltvResult<Vec<RfmScore>> {
        let kept: Vec<&CustomerHistory> = histories.iter().filter(|h| h.total_spend > 0.0).collect();
        if kept.is_empty() {
            return Err(CltvError::InsufficientData("no customers with positive spend to score".into()));
        }

        let recency_days: Vec<i64> = kept
            .iter()
            .map(|h| (self.observation_cutoff - h.last_purchase).num_days())
            .collect();
        if let Some(pos) = recency_days.iter().position(|d| *d < 0) {
            return Err(CltvError::InvalidInput(format!(
                "customer {}: last purchase falls after observation cutoff {}",
                kept[pos].customer_id, self.observation_cutoff
            )));
        }

        let recency: Vec<f64> = recency_days.iter().map(|d| *d as f64).collect();
        let monetary: Vec<f64> = kept.iter().map(|h| h.total_spend).collect();
        let frequency_ranks = rank_first(&kept.iter().map(|h| h.invoices).collect::<Vec<_>>());

        let recency_bins = quantile_bins(&recency, SCORE_BINS).map_err(|e| Self::context("recency", e))?;
        let frequency_bins = quantile_bins(&frequency_ranks, SCORE_BINS).map_err(|e| Self::context("frequency", e))?;
        let monetary_bins = quantile_bins(&monetary, SCORE_BINS).map_err(|e| Self::context("monetary", e))?;

        Ok(kept
            .iter()
            .enumerate()
            .map(|(i, h)| {
                // Fewer days since the last purchase is better.
                let recency_score = (SCORE_BINS - recency_bins[i]) as u8;
                let frequency_score = (frequency_bins[i] + 1) as u8;
                RfmScore {
                    customer_id: h.customer_id.clone(),
                    recency_days: recency_days[i],
                    frequency: h.invoices,
                    monetary: h.total_spend,
                    recency_score,
                    frequency_score,
                    monetary_score: (monetary_bins[i] + 1) as u8,
                    segment: RfmSegment::from_scores(recency_score, frequency_score),
                }
            })
            .collect())
    }

    /// Per-segment means, in [`RfmSegment::ALL`] order. Empty segments are omitted.
    pub fn summarize(scores: &[RfmScore]) -> Vec<RfmSegmentSummary> {
        RfmSegment::ALL
            .iter()
            .filter_map(|&segment| {
                let members: Vec<&RfmScore> = scores.iter().filter(|s| s.segment == segment).collect();
                if members.is_empty() {
                    return None;
                }
                let n = members.len() as f64;
                Some(RfmSegmentSummary {
                    segment,
                    count: members.len(),
                    mean_recency: members.iter().map(|s| s.recency_days as f64).sum::<f64>() / n,
                    mean_frequency: members.iter().map(|s| s.frequency as f64).sum::<f64>() / n,
                    mean_monetary: members.iter().map(|s| s.monetary).sum::<f64>() / n,
                })
            })
            .collect()
    }

    fn context(dimension: &str, error: CltvError) -> CltvError {
        match error {
            CltvError::InsufficientData(msg) => CltvError::InsufficientData(format!("{dimension} scores: {msg}")),
            other => other,
        }
    }
}

/// 1-based ranks, ties broken by position.
fn rank_first(values: &[usize]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by_key(|&i| values[i]);
    let mut ranks = vec![0.0; values.len()];
    for (rank, &idx) in order.iter().enumerate() {
        ranks[idx] = (rank + 1) as f64;
    }
    ranks
}
