//! Prediction traits shared by the fitted models.
//!
//! RULE: The CLTV combiner only talks to fitted models through these
//! traits. It never reads model parameters directly.

use crate::{features::CustomerFeatures, types::ModelTime};

/// Anything that can forecast a customer's transaction count.
pub trait TransactionPredictor {
    /// Expected number of transactions in `(T, T + horizon]`, conditioned
    /// on the customer's own history. Non-decreasing in `horizon` and
    /// zero at `horizon == 0`. May be non-finite when the customer falls
    /// outside the model's domain.
    fn expected_transactions(&self, horizon: ModelTime, customer: &CustomerFeatures) -> f64;

    /// Probability the customer is still active at the end of the observation window.
    fn probability_alive(&self, customer: &CustomerFeatures) -> f64;
}

/// Anything that can forecast a customer's average transaction value.
pub trait SpendPredictor {
    /// `None` when the customer lies outside the model's domain.
    fn expected_average_spend(&self, customer: &CustomerFeatures) -> Option<f64>;
}
