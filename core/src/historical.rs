//! Historical customer value: a model-free CLTV computed from past spend.
//!
//!   average_order_value = total_spend / invoices
//!   purchase_frequency  = invoices / customers
//!   customer_value      = average_order_value · purchase_frequency
//!   churn_rate          = 1 − (customers with more than one invoice) / customers
//!   profit              = total_spend · profit_margin
//!   cltv                = customer_value / churn_rate · profit
//!
//! Customers are then split into the same ordinal segments as the
//! probabilistic CLTV.

use crate::{
    config::CltvConfig,
    error::{CltvError, CltvResult},
    features::CustomerHistory,
    segmenter::{Segment, SegmentSummary, Segmenter},
    types::CustomerId,
};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HistoricalValue {
    pub customer_id:         CustomerId,
    pub invoices:            usize,
    pub units:               f64,
    pub total_spend:         f64,
    pub average_order_value: f64,
    pub purchase_frequency:  f64,
    pub customer_value:      f64,
    pub profit:              f64,
    pub cltv:                f64,
    pub segment:             Option<Segment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoricalReport {
    pub repeat_rate: f64,
    pub churn_rate:  f64,
    pub customers:   Vec<HistoricalValue>,
    pub segments:    Vec<SegmentSummary>,
}

pub struct HistoricalValuation {
    profit_margin: f64,
    segment_count: usize,
}

impl HistoricalValuation {
    pub fn new(config: &CltvConfig) -> Self {
        Self {
            profit_margin: config.profit_margin,
            segment_count: config.segment_count,
        }
    }

    pub fn evaluate(&self, histories: &[CustomerHistory]) -> CltvResult<HistoricalReport> {
        let kept: Vec<&CustomerHistory> = histories
            .iter()
            .filter(|h| h.invoices > 0 && h.total_spend > 0.0)
            .collect();
        if kept.is_empty() {
            return Err(CltvError::InsufficientData("no customers with positive spend to value".into()));
        }

        let customers = kept.len() as f64;
        let repeat_rate = kept.iter().filter(|h| h.invoices > 1).count() as f64 / customers;
        let churn_rate = 1.0 - repeat_rate;
        if churn_rate <= 0.0 {
            return Err(CltvError::DataQuality(
                "every customer purchased more than once; churn rate is zero".into(),
            ));
        }

        let mut values: Vec<HistoricalValue> = kept
            .iter()
            .map(|h| {
                let average_order_value = h.total_spend / h.invoices as f64;
                let purchase_frequency = h.invoices as f64 / customers;
                let customer_value = average_order_value * purchase_frequency;
                let profit = h.total_spend * self.profit_margin;
                HistoricalValue {
                    customer_id: h.customer_id.clone(),
                    invoices: h.invoices,
                    units: h.units,
                    total_spend: h.total_spend,
                    average_order_value,
                    purchase_frequency,
                    customer_value,
                    profit,
                    cltv: customer_value / churn_rate * profit,
                    segment: None,
                }
            })
            .collect();

        let segmenter = Segmenter::new(self.segment_count);
        let cltv: Vec<f64> = values.iter().map(|v| v.cltv).collect();
        let segments = segmenter.assign(&cltv)?;
        for (value, segment) in values.iter_mut().zip(&segments) {
            value.segment = Some(*segment);
        }

        log::info!(
            "historical value: {} customers, repeat rate {:.3}, churn rate {:.3}",
            values.len(),
            repeat_rate,
            churn_rate
        );

        Ok(HistoricalReport {
            repeat_rate,
            churn_rate,
            segments: segmenter.summarize(&cltv, &segments),
            customers: values,
        })
    }
}
