//! Feature extractor: transaction log -> per-customer RFM feature vectors.
//!
//! [`FeatureExtractor::histories`] stops after cleaning and aggregation and
//! is the shared input of the RFM and historical-value analyses.
//!
//! Pipeline, in order:
//!   1. Drop lines without a customer, cancelled invoices, and
//!      non-positive (or non-finite) quantities and unit prices.
//!   2. Cap quantity and unit price at their upper percentile fence.
//!   3. Aggregate per customer: recency, T, frequency, monetary.
//!   4. Drop customers at or below the frequency floor.
//!   5. Fail if too few customers remain to fit the models.

use crate::{
    config::{CltvConfig, OutlierConfig},
    error::{CltvError, CltvResult},
    transaction::TransactionRecord,
    types::{CustomerId, ModelTime},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Recency / T / frequency / monetary for one customer.
///
/// `recency` and `t` are in model time units. `frequency` counts repeat
/// transactions (distinct invoices minus one). `monetary` is the mean
/// invoice value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerFeatures {
    pub customer_id: CustomerId,
    pub recency:     ModelTime,
    #[serde(rename = "T")]
    pub t:           ModelTime,
    pub frequency:   u32,
    pub monetary:    f64,
}

impl CustomerFeatures {
    pub fn new(
        customer_id: impl Into<CustomerId>,
        frequency: u32,
        recency: ModelTime,
        t: ModelTime,
        monetary: f64,
    ) -> Self {
        Self { customer_id: customer_id.into(), recency, t, frequency, monetary }
    }

    /// Checks the purchase-timing invariants: finite, non-negative, recency <= T.
    pub fn validate_timing(&self) -> CltvResult<()> {
        if !(self.recency.is_finite() && self.t.is_finite()) {
            return Err(CltvError::InvalidInput(format!(
                "customer {}: non-finite recency/T ({}, {})",
                self.customer_id, self.recency, self.t
            )));
        }
        if self.recency < 0.0 || self.t < 0.0 {
            return Err(CltvError::InvalidInput(format!(
                "customer {}: negative recency/T ({}, {})",
                self.customer_id, self.recency, self.t
            )));
        }
        if self.recency > self.t {
            return Err(CltvError::InvalidInput(format!(
                "customer {}: recency {} exceeds T {}",
                self.customer_id, self.recency, self.t
            )));
        }
        Ok(())
    }

    /// Checks the monetary invariant: finite and strictly positive.
    pub fn validate_spend(&self) -> CltvResult<()> {
        if !(self.monetary.is_finite() && self.monetary > 0.0) {
            return Err(CltvError::InvalidInput(format!(
                "customer {}: monetary value must be > 0, got {}",
                self.customer_id, self.monetary
            )));
        }
        Ok(())
    }
}

// ── Outlier capping ─────────────────────────────────────────────────────────

/// Linear-interpolated quantile of an ascending slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Upper cap derived from two percentiles: `q_hi + m * (q_hi - q_lo)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierFence {
    pub upper: f64,
}

impl OutlierFence {
    pub fn compute(values: &[f64], config: &OutlierConfig) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let q_lo = quantile(&sorted, config.lower_quantile);
        let q_hi = quantile(&sorted, config.upper_quantile);
        Some(Self { upper: q_hi + config.fence_multiplier * (q_hi - q_lo) })
    }

    /// Clip values above the fence down to it. Returns how many moved.
    /// Nothing is clipped from below.
    pub fn apply(&self, values: &mut [f64]) -> usize {
        let mut clipped = 0;
        for v in values.iter_mut().filter(|v| **v > self.upper) {
            *v = self.upper;
            clipped += 1;
        }
        clipped
    }
}

// ── Extractor ───────────────────────────────────────────────────────────────

struct CleanLine<'a> {
    customer_id: &'a str,
    invoice:     &'a str,
    timestamp:   NaiveDateTime,
    quantity:    f64,
    unit_price:  f64,
}

struct CustomerAccumulator<'a> {
    first:    NaiveDateTime,
    last:     NaiveDateTime,
    invoices: HashSet<&'a str>,
    units:    f64,
    total:    f64,
}

/// Raw per-customer totals over the cleaned log, in calendar time.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CustomerHistory {
    pub customer_id:    CustomerId,
    pub first_purchase: NaiveDateTime,
    pub last_purchase:  NaiveDateTime,
    /// Distinct invoices, first purchase included.
    pub invoices:       usize,
    pub units:          f64,
    pub total_spend:    f64,
}

pub struct FeatureExtractor {
    config: CltvConfig,
}

impl FeatureExtractor {
    pub fn new(config: CltvConfig) -> Self {
        Self { config }
    }

    /// Run the full extraction over a transaction snapshot.
    pub fn extract(&self, transactions: &[TransactionRecord]) -> CltvResult<Vec<CustomerFeatures>> {
        let mut lines = Self::clean(transactions);
        if lines.is_empty() {
            return Err(CltvError::DataQuality(format!(
                "no usable transactions among {} records",
                transactions.len()
            )));
        }

        let clipped = self.cap_outliers(&mut lines);
        let aggregated = self.to_features(Self::aggregate(&lines))?;
        let customer_count = aggregated.len();
        let features = self.apply_frequency_floor(aggregated);

        log::info!(
            "feature extraction: {} of {} records kept, {} values capped, {} customers, {} above frequency floor {}",
            lines.len(),
            transactions.len(),
            clipped,
            customer_count,
            features.len(),
            self.config.frequency_floor
        );

        self.ensure_minimum(features.len())?;
        Ok(features)
    }

    /// Clean and aggregate without outlier capping or the frequency floor.
    /// Customers are returned in identifier order.
    pub fn histories(&self, transactions: &[TransactionRecord]) -> CltvResult<Vec<CustomerHistory>> {
        let lines = Self::clean(transactions);
        if lines.is_empty() {
            return Err(CltvError::DataQuality(format!(
                "no usable transactions among {} records",
                transactions.len()
            )));
        }
        let histories = Self::aggregate(&lines);
        if let Some(late) = histories.iter().find(|h| h.last_purchase > self.config.observation_cutoff) {
            return Err(CltvError::InvalidInput(format!(
                "customer {}: last transaction {} falls after observation cutoff {}",
                late.customer_id, late.last_purchase, self.config.observation_cutoff
            )));
        }
        log::info!(
            "customer histories: {} of {} records kept, {} customers",
            lines.len(),
            transactions.len(),
            histories.len()
        );
        Ok(histories)
    }

    /// Keep customers whose repeat count exceeds the configured floor.
    pub fn apply_frequency_floor(&self, features: Vec<CustomerFeatures>) -> Vec<CustomerFeatures> {
        let floor = self.config.frequency_floor;
        features.into_iter().filter(|f| f.frequency > floor).collect()
    }

    pub fn ensure_minimum(&self, customers: usize) -> CltvResult<()> {
        if customers < self.config.min_customers_for_fit {
            return Err(CltvError::DataQuality(format!(
                "{customers} customers remain after filtering; at least {} are needed to fit",
                self.config.min_customers_for_fit
            )));
        }
        Ok(())
    }

    fn clean(transactions: &[TransactionRecord]) -> Vec<CleanLine<'_>> {
        transactions
            .iter()
            .filter(|t| !t.cancelled)
            .filter(|t| t.quantity.is_finite() && t.quantity > 0.0)
            .filter(|t| t.unit_price.is_finite() && t.unit_price > 0.0)
            .filter_map(|t| {
                let customer_id = t.customer_id.as_deref().filter(|c| !c.trim().is_empty())?;
                Some(CleanLine {
                    customer_id,
                    invoice: &t.invoice,
                    timestamp: t.timestamp,
                    quantity: t.quantity,
                    unit_price: t.unit_price,
                })
            })
            .collect()
    }

    /// Quantity and unit price are fenced independently.
    fn cap_outliers(&self, lines: &mut [CleanLine<'_>]) -> usize {
        let mut quantities: Vec<f64> = lines.iter().map(|l| l.quantity).collect();
        let mut prices: Vec<f64> = lines.iter().map(|l| l.unit_price).collect();

        let mut clipped = 0;
        if let Some(fence) = OutlierFence::compute(&quantities, &self.config.outliers) {
            log::debug!("quantity fence at {}", fence.upper);
            clipped += fence.apply(&mut quantities);
        }
        if let Some(fence) = OutlierFence::compute(&prices, &self.config.outliers) {
            log::debug!("unit price fence at {}", fence.upper);
            clipped += fence.apply(&mut prices);
        }

        for (line, (q, p)) in lines.iter_mut().zip(quantities.into_iter().zip(prices)) {
            line.quantity = q;
            line.unit_price = p;
        }
        clipped
    }

    fn aggregate(lines: &[CleanLine<'_>]) -> Vec<CustomerHistory> {
        let mut by_customer: BTreeMap<&str, CustomerAccumulator<'_>> = BTreeMap::new();
        for line in lines {
            let acc = by_customer.entry(line.customer_id).or_insert_with(|| CustomerAccumulator {
                first: line.timestamp,
                last: line.timestamp,
                invoices: HashSet::new(),
                units: 0.0,
                total: 0.0,
            });
            acc.first = acc.first.min(line.timestamp);
            acc.last = acc.last.max(line.timestamp);
            acc.invoices.insert(line.invoice);
            acc.units += line.quantity;
            acc.total += line.quantity * line.unit_price;
        }

        by_customer
            .into_iter()
            .map(|(customer_id, acc)| CustomerHistory {
                customer_id: customer_id.to_string(),
                first_purchase: acc.first,
                last_purchase: acc.last,
                invoices: acc.invoices.len(),
                units: acc.units,
                total_spend: acc.total,
            })
            .collect()
    }

    fn to_features(&self, histories: Vec<CustomerHistory>) -> CltvResult<Vec<CustomerFeatures>> {
        let divisor = self.config.time_unit_divisor;
        let cutoff = self.config.observation_cutoff;
        let mut features = Vec::with_capacity(histories.len());
        for history in histories {
            if !(history.total_spend > 0.0) {
                log::debug!("customer {}: non-positive total spend, excluded", history.customer_id);
                continue;
            }
            let recency_days = (history.last_purchase - history.first_purchase).num_days();
            let t_days = (cutoff - history.first_purchase).num_days();
            if recency_days > t_days {
                return Err(CltvError::InvalidInput(format!(
                    "customer {}: last transaction {} falls after observation cutoff {cutoff}",
                    history.customer_id, history.last_purchase
                )));
            }
            let feature = CustomerFeatures {
                recency: recency_days as f64 / divisor,
                t: t_days as f64 / divisor,
                frequency: (history.invoices - 1) as u32,
                monetary: history.total_spend / history.invoices as f64,
                customer_id: history.customer_id,
            };
            feature.validate_timing()?;
            features.push(feature);
        }
        Ok(features)
    }
}
