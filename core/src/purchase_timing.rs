//! Purchase-timing model (BG-NBD).
//!
//! While active, a customer transacts as a Poisson process with rate
//! λ ~ Gamma(r, α). After every repeat transaction they drop out for good
//! with probability p ~ Beta(a, b). Only (frequency, recency, T) are needed
//! to evaluate the likelihood and the conditional forecasts.

use crate::{
    config::ModelFitConfig,
    error::{CltvError, CltvResult},
    features::CustomerFeatures,
    model::TransactionPredictor,
    optimizer,
    special::{ln_add_exp, ln_gamma, ln_hyp2f1},
    types::ModelTime,
};
use serde::{Deserialize, Serialize};

/// Largest `T` after internal rescaling; keeps α near unit scale during the search.
const FIT_TIME_SCALE: f64 = 10.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PurchaseTimingParameters {
    /// Shape of the purchase-rate distribution.
    pub r: f64,
    /// Scale of the purchase-rate distribution, in model time units.
    pub alpha: f64,
    /// Dropout Beta shape parameters.
    pub a: f64,
    pub b: f64,
}

impl PurchaseTimingParameters {
    pub fn new(r: f64, alpha: f64, a: f64, b: f64) -> Self {
        Self { r, alpha, a, b }
    }

    fn from_log(log_params: &[f64]) -> Self {
        Self::new(
            log_params[0].exp(),
            log_params[1].exp(),
            log_params[2].exp(),
            log_params[3].exp(),
        )
    }

    fn is_valid(&self) -> bool {
        [self.r, self.alpha, self.a, self.b].iter().all(|v| v.is_finite() && *v > 0.0)
    }

    fn sum_of_squares(&self) -> f64 {
        self.r * self.r + self.alpha * self.alpha + self.a * self.a + self.b * self.b
    }

    /// Individual log-likelihood of `x` repeat transactions, the last at
    /// `t_x`, over an observation window of length `t`.
    pub fn log_likelihood(&self, x: f64, t_x: f64, t: f64) -> f64 {
        let Self { r, alpha, a, b } = *self;
        let a1 = ln_gamma(r + x) - ln_gamma(r) + r * alpha.ln();
        let a2 = ln_gamma(a + b) + ln_gamma(b + x) - ln_gamma(b) - ln_gamma(a + b + x);
        let a3 = -(r + x) * (alpha + t).ln();
        let tail = if x > 0.0 {
            let a4 = a.ln() - (b + x - 1.0).ln() - (r + x) * (alpha + t_x).ln();
            ln_add_exp(a3, a4)
        } else {
            a3
        };
        a1 + a2 + tail
    }
}

impl TransactionPredictor for PurchaseTimingParameters {
    fn expected_transactions(&self, horizon: ModelTime, customer: &CustomerFeatures) -> f64 {
        if horizon <= 0.0 {
            return 0.0;
        }
        let Self { r, alpha, a, b } = *self;
        let x = customer.frequency as f64;
        let (t_x, t) = (customer.recency, customer.t);

        let z = horizon / (alpha + t + horizon);
        let ln_hyp = ln_hyp2f1(r + x, b + x, a + b + x - 1.0, z);
        let leading = (a + b + x - 1.0) / (a - 1.0);
        let survival = 1.0 - (ln_hyp + (r + x) * ((alpha + t) / (alpha + t + horizon)).ln()).exp();

        let dropout_odds = if x > 0.0 {
            a / (b + x - 1.0) * ((alpha + t) / (alpha + t_x)).powf(r + x)
        } else {
            0.0
        };
        leading * survival / (1.0 + dropout_odds)
    }

    fn probability_alive(&self, customer: &CustomerFeatures) -> f64 {
        if customer.frequency == 0 {
            return 1.0;
        }
        let x = customer.frequency as f64;
        let Self { r, alpha, a, b } = *self;
        let odds = a / (b + x - 1.0) * ((alpha + customer.t) / (alpha + customer.recency)).powf(r + x);
        1.0 / (1.0 + odds)
    }
}

/// Outcome of a successful fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseTimingFit {
    pub params: PurchaseTimingParameters,
    /// Penalised mean negative log-likelihood at the optimum (rescaled time).
    pub objective: f64,
    pub iterations: usize,
    pub customers: usize,
}

pub struct PurchaseTimingModel {
    config: ModelFitConfig,
}

impl PurchaseTimingModel {
    pub fn new(config: ModelFitConfig) -> Self {
        Self { config }
    }

    /// Penalised maximum-likelihood fit over (frequency, recency, T).
    pub fn fit(&self, features: &[CustomerFeatures]) -> CltvResult<PurchaseTimingFit> {
        if features.is_empty() {
            return Err(CltvError::InvalidInput("purchase-timing fit needs at least one customer".into()));
        }
        for customer in features {
            customer.validate_timing()?;
        }

        let max_t = features.iter().fold(0.0_f64, |m, c| m.max(c.t));
        if !(max_t > 0.0) {
            return Err(CltvError::InvalidInput("every customer has T = 0".into()));
        }
        let scale = FIT_TIME_SCALE / max_t;
        let data: Vec<(f64, f64, f64)> = features
            .iter()
            .map(|c| (c.frequency as f64, c.recency * scale, c.t * scale))
            .collect();
        let n = data.len() as f64;
        let penalizer = self.config.penalizer_coefficient;

        let objective = |log_params: &[f64]| {
            let params = PurchaseTimingParameters::from_log(log_params);
            if !params.is_valid() {
                return f64::INFINITY;
            }
            let ll: f64 = data.iter().map(|&(x, t_x, t)| params.log_likelihood(x, t_x, t)).sum();
            -ll / n + penalizer * params.sum_of_squares()
        };

        let minimum = optimizer::minimize("purchase_timing", objective, vec![0.0; 4], &self.config.optimizer)?;
        let mut params = PurchaseTimingParameters::from_log(&minimum.x);
        params.alpha /= scale;

        log::info!(
            "purchase-timing fit: r={:.4} alpha={:.4} a={:.4} b={:.4} ({} customers, {} iterations)",
            params.r, params.alpha, params.a, params.b, features.len(), minimum.iterations
        );

        Ok(PurchaseTimingFit {
            params,
            objective: minimum.value,
            iterations: minimum.iterations,
            customers: features.len(),
        })
    }
}
