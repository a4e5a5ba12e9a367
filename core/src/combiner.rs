//! CLTV combiner: discounted sum of per-period expected revenue.
//!
//! For period i (1-based) covering (start, end] of the horizon:
//!   revenue_i = (E[X(end)] − E[X(start)]) · expected average spend
//!   cltv      = Σ revenue_i / (1 + rate)^i
//! The last period is truncated at the horizon when it does not divide evenly.

use crate::{
    config::CltvConfig,
    error::{CltvError, CltvResult},
    features::CustomerFeatures,
    model::{SpendPredictor, TransactionPredictor},
    segmenter::Segment,
    types::{CustomerId, ModelTime},
};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HorizonForecast {
    pub horizon:               ModelTime,
    pub expected_transactions: f64,
}

/// Scored customer. `segment` is filled in by the segmenter.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerPrediction {
    pub customer_id:            CustomerId,
    pub forecasts:              Vec<HorizonForecast>,
    pub probability_alive:      f64,
    pub expected_average_spend: f64,
    pub cltv:                   f64,
    pub segment:                Option<Segment>,
}

/// A customer left out of scoring, and why.
#[derive(Debug, Clone, Serialize)]
pub struct DroppedCustomer {
    pub customer_id: CustomerId,
    pub reason:      String,
}

#[derive(Debug, Clone, Default)]
pub struct Combined {
    pub predictions: Vec<CustomerPrediction>,
    pub dropped:     Vec<DroppedCustomer>,
}

pub struct CltvCombiner {
    horizon_length:      ModelTime,
    period_length:       ModelTime,
    discount_rate:       f64,
    prediction_horizons: Vec<ModelTime>,
}

impl CltvCombiner {
    pub fn new(config: &CltvConfig) -> Self {
        Self {
            horizon_length:      config.horizon_length,
            period_length:       config.period_length,
            discount_rate:       config.discount_rate,
            prediction_horizons: config.prediction_horizons.clone(),
        }
    }

    /// Period boundaries `(index, start, end)` covering the horizon.
    pub fn periods(&self) -> Vec<(u32, ModelTime, ModelTime)> {
        let count = (self.horizon_length / self.period_length - 1e-9).ceil().max(1.0) as u32;
        (1..=count)
            .map(|i| {
                let start = (i - 1) as f64 * self.period_length;
                let end = (i as f64 * self.period_length).min(self.horizon_length);
                (i, start, end)
            })
            .collect()
    }

    /// Discounted CLTV for one customer. Non-finite when the timing model
    /// cannot score the customer.
    pub fn discounted_value<T>(&self, timing: &T, customer: &CustomerFeatures, spend: f64) -> f64
    where
        T: TransactionPredictor,
    {
        let mut previous = 0.0;
        let mut value = 0.0;
        for (index, _start, end) in self.periods() {
            let cumulative = timing.expected_transactions(end, customer);
            if !cumulative.is_finite() {
                return f64::NAN;
            }
            let increment = (cumulative - previous).max(0.0);
            value += increment * spend / (1.0 + self.discount_rate).powi(index as i32);
            previous = cumulative;
        }
        value
    }

    /// Score every customer. Customers either model cannot score are
    /// dropped with a warning.
    pub fn combine<T, S>(
        &self,
        timing: &T,
        spend_model: &S,
        features: &[CustomerFeatures],
    ) -> CltvResult<Combined>
    where
        T: TransactionPredictor,
        S: SpendPredictor,
    {
        let mut combined = Combined::default();
        for customer in features {
            customer.validate_timing()?;

            let Some(spend) = spend_model.expected_average_spend(customer) else {
                drop_customer(&mut combined, customer, "outside the monetary model's domain".into());
                continue;
            };

            let cltv = self.discounted_value(timing, customer, spend);
            let forecasts: Vec<HorizonForecast> = self
                .prediction_horizons
                .iter()
                .map(|&horizon| HorizonForecast {
                    horizon,
                    expected_transactions: timing.expected_transactions(horizon, customer),
                })
                .collect();
            let probability_alive = timing.probability_alive(customer);

            if !cltv.is_finite()
                || !probability_alive.is_finite()
                || forecasts.iter().any(|f| !f.expected_transactions.is_finite())
            {
                drop_customer(&mut combined, customer, "outside the purchase-timing model's domain".into());
                continue;
            }

            combined.predictions.push(CustomerPrediction {
                customer_id: customer.customer_id.clone(),
                forecasts,
                probability_alive,
                expected_average_spend: spend,
                cltv,
                segment: None,
            });
        }

        if combined.predictions.is_empty() && !features.is_empty() {
            return Err(CltvError::DataQuality(format!(
                "none of {} customers could be scored",
                features.len()
            )));
        }

        log::info!(
            "cltv combiner: {} customers scored, {} dropped, {} periods of {} over horizon {}",
            combined.predictions.len(),
            combined.dropped.len(),
            self.periods().len(),
            self.period_length,
            self.horizon_length
        );
        Ok(combined)
    }
}

fn drop_customer(combined: &mut Combined, customer: &CustomerFeatures, reason: String) {
    log::warn!("customer {} dropped from scoring: {reason}", customer.customer_id);
    combined.dropped.push(DroppedCustomer { customer_id: customer.customer_id.clone(), reason });
}
