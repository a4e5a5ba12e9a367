//! Monetary model (Gamma-Gamma).
//!
//! Each transaction value is Gamma(p, ν) with a customer-specific rate
//! ν ~ Gamma(q, v). Spend is assumed independent of purchase timing; the
//! model does not check this, and a correlated sample only degrades the
//! forecasts. Customers with no repeat transactions carry no information
//! here and are outside the model's domain.

use crate::{
    config::ModelFitConfig,
    error::{CltvError, CltvResult},
    features::CustomerFeatures,
    model::SpendPredictor,
    optimizer,
    special::ln_gamma,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MonetaryParameters {
    pub p: f64,
    pub q: f64,
    /// Scale of the spend-rate distribution, in currency units.
    pub v: f64,
}

impl MonetaryParameters {
    pub fn new(p: f64, q: f64, v: f64) -> Self {
        Self { p, q, v }
    }

    fn from_log(log_params: &[f64]) -> Self {
        Self::new(log_params[0].exp(), log_params[1].exp(), log_params[2].exp())
    }

    fn is_valid(&self) -> bool {
        [self.p, self.q, self.v].iter().all(|v| v.is_finite() && *v > 0.0)
    }

    /// Log-density of an average spend `m` over `x` transactions.
    pub fn log_likelihood(&self, x: f64, m: f64) -> f64 {
        let Self { p, q, v } = *self;
        let px = p * x;
        ln_gamma(px + q) - ln_gamma(px) - ln_gamma(q) + q * v.ln() + (px - 1.0) * m.ln() + px * x.ln()
            - (px + q) * (x * m + v).ln()
    }

    /// Mean spend across the population, `p·v/(q−1)`; undefined for `q <= 1`.
    pub fn population_mean_spend(&self) -> Option<f64> {
        (self.q > 1.0).then(|| self.p * self.v / (self.q - 1.0))
    }

    /// Weight given to a customer's own average after `frequency` transactions.
    pub fn individual_weight(&self, frequency: u32) -> Option<f64> {
        let px = self.p * frequency as f64;
        let denominator = px + self.q - 1.0;
        (denominator > 0.0).then(|| px / denominator)
    }
}

impl SpendPredictor for MonetaryParameters {
    /// Shrinks the observed average toward the population mean:
    /// `(1 − w)·population + w·observed`, written in a form that stays
    /// defined when `q <= 1`.
    fn expected_average_spend(&self, customer: &CustomerFeatures) -> Option<f64> {
        if customer.frequency == 0 || !(customer.monetary > 0.0) {
            return None;
        }
        let x = customer.frequency as f64;
        let denominator = self.p * x + self.q - 1.0;
        if !(denominator > 0.0) {
            return None;
        }
        Some(self.p * (self.v + x * customer.monetary) / denominator)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonetaryFit {
    pub params: MonetaryParameters,
    /// Penalised mean negative log-likelihood at the optimum (rescaled spend).
    pub objective: f64,
    pub iterations: usize,
    pub customers: usize,
}

pub struct MonetaryModel {
    config: ModelFitConfig,
}

impl MonetaryModel {
    pub fn new(config: ModelFitConfig) -> Self {
        Self { config }
    }

    /// Penalised maximum-likelihood fit over (frequency, monetary) pairs.
    /// Customers without repeat transactions are skipped.
    pub fn fit(&self, features: &[CustomerFeatures]) -> CltvResult<MonetaryFit> {
        let mut data = Vec::with_capacity(features.len());
        for customer in features {
            customer.validate_spend()?;
            if customer.frequency > 0 {
                data.push((customer.frequency as f64, customer.monetary));
            }
        }
        if data.is_empty() {
            return Err(CltvError::InvalidInput(
                "monetary fit needs at least one customer with repeat transactions".into(),
            ));
        }
        let skipped = features.len() - data.len();
        if skipped > 0 {
            log::debug!("monetary fit: {skipped} customers without repeat transactions skipped");
        }

        let n = data.len() as f64;
        let scale = n / data.iter().map(|&(_, m)| m).sum::<f64>();
        for (_, m) in data.iter_mut() {
            *m *= scale;
        }
        let penalizer = self.config.penalizer_coefficient;

        let objective = |log_params: &[f64]| {
            let params = MonetaryParameters::from_log(log_params);
            if !params.is_valid() {
                return f64::INFINITY;
            }
            let ll: f64 = data.iter().map(|&(x, m)| params.log_likelihood(x, m)).sum();
            -ll / n + penalizer * (params.p * params.p + params.q * params.q + params.v * params.v)
        };

        let minimum = optimizer::minimize("monetary", objective, vec![0.0; 3], &self.config.optimizer)?;
        let mut params = MonetaryParameters::from_log(&minimum.x);
        params.v /= scale;

        log::info!(
            "monetary fit: p={:.4} q={:.4} v={:.4} ({} customers, {} iterations)",
            params.p, params.q, params.v, data.len(), minimum.iterations
        );
        if params.q <= 1.0 {
            log::warn!("monetary fit: q={:.4} <= 1, population mean spend is undefined", params.q);
        }

        Ok(MonetaryFit {
            params,
            objective: minimum.value,
            iterations: minimum.iterations,
            customers: data.len(),
        })
    }
}
