//! Synthetic customer populations drawn from known model parameters.
//!
//! Each customer gets a purchase rate λ ~ Gamma(r, α), a dropout
//! probability p ~ Beta(a, b), a spend rate ν ~ Gamma(q, v) and an
//! observation window T ~ Uniform[min, max]. The first purchase happens at
//! time 0; repeat purchases follow a Poisson(λ) process, and after each
//! repeat purchase the customer drops out with probability p. Every
//! purchase value is drawn from Gamma(p_spend, ν).

use crate::{
    features::CustomerFeatures,
    monetary::MonetaryParameters,
    purchase_timing::PurchaseTimingParameters,
    rng::{RngBank, StreamSlot},
    transaction::TransactionRecord,
    types::{CustomerId, ModelTime},
};
use chrono::{Duration, NaiveDateTime};

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub timing:          PurchaseTimingParameters,
    pub monetary:        MonetaryParameters,
    pub customers:       usize,
    pub min_observation: ModelTime,
    pub max_observation: ModelTime,
    pub seed:            u64,
}

#[derive(Debug, Clone)]
pub struct SyntheticCustomer {
    pub customer_id: CustomerId,
    /// Observation window length.
    pub t: ModelTime,
    /// Repeat purchase times, measured from the first purchase.
    pub repeat_times: Vec<ModelTime>,
    /// One value per purchase, first purchase included.
    pub spends: Vec<f64>,
}

impl SyntheticCustomer {
    /// Features as the monetary model defines them: `monetary` is the mean
    /// of the repeat purchases only (all purchases for a one-time buyer).
    ///
    /// This differs from running [`SyntheticPopulation::transactions`]
    /// through the feature extractor, which averages over every invoice,
    /// the first one included.
    pub fn features(&self) -> CustomerFeatures {
        let frequency = self.repeat_times.len() as u32;
        let recency = self.repeat_times.last().copied().unwrap_or(0.0);
        let repeat_spends = if self.spends.len() > 1 { &self.spends[1..] } else { &self.spends[..] };
        let monetary = repeat_spends.iter().sum::<f64>() / repeat_spends.len() as f64;
        CustomerFeatures::new(self.customer_id.clone(), frequency, recency, self.t, monetary)
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticPopulation {
    pub customers: Vec<SyntheticCustomer>,
}

impl SyntheticPopulation {
    pub fn generate(config: &SyntheticConfig) -> Self {
        let bank = RngBank::new(config.seed);
        let mut rate_rng = bank.for_stream(StreamSlot::PurchaseRate);
        let mut dropout_rng = bank.for_stream(StreamSlot::Dropout);
        let mut window_rng = bank.for_stream(StreamSlot::Observation);
        let mut gap_rng = bank.for_stream(StreamSlot::InterPurchase);
        let mut scale_rng = bank.for_stream(StreamSlot::SpendScale);
        let mut spend_rng = bank.for_stream(StreamSlot::Spend);

        let PurchaseTimingParameters { r, alpha, a, b } = config.timing;
        let MonetaryParameters { p, q, v } = config.monetary;
        let span = config.max_observation - config.min_observation;

        let customers = (0..config.customers)
            .map(|i| {
                let rate = rate_rng.gamma(r, alpha);
                let dropout = dropout_rng.beta(a, b);
                let t = config.min_observation + span * window_rng.next_f64();

                let mut repeat_times = Vec::new();
                let mut now = 0.0;
                loop {
                    now += gap_rng.exponential(rate);
                    if now > t {
                        break;
                    }
                    repeat_times.push(now);
                    if dropout_rng.chance(dropout) {
                        break;
                    }
                }

                let spend_rate = scale_rng.gamma(q, v);
                let spends = (0..=repeat_times.len()).map(|_| spend_rng.gamma(p, spend_rate)).collect();

                SyntheticCustomer { customer_id: format!("SYN{i:06}"), t, repeat_times, spends }
            })
            .collect();

        Self { customers }
    }

    pub fn features(&self) -> Vec<CustomerFeatures> {
        self.customers.iter().map(SyntheticCustomer::features).collect()
    }

    /// Render the population as a transaction log ending at `cutoff`.
    /// One invoice per purchase, first purchase included; `days_per_unit`
    /// converts model time to days.
    pub fn transactions(&self, cutoff: NaiveDateTime, days_per_unit: f64) -> Vec<TransactionRecord> {
        let to_duration = |units: f64| Duration::seconds((units * days_per_unit * 86_400.0).round() as i64);
        self.customers
            .iter()
            .flat_map(|customer| {
                let first = cutoff - to_duration(customer.t);
                std::iter::once(0.0)
                    .chain(customer.repeat_times.iter().copied())
                    .zip(&customer.spends)
                    .enumerate()
                    .map(move |(k, (offset, spend))| {
                        TransactionRecord::new(
                            format!("{}-{k:04}", customer.customer_id),
                            Some(customer.customer_id.clone()),
                            first + to_duration(offset),
                            1.0,
                            *spend,
                        )
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
