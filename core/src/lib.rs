//! Probabilistic customer lifetime value engine.
//!
//! Raw transactions become per-customer RFM feature vectors, a BG-NBD
//! purchase-timing model and a Gamma-Gamma monetary model are fitted by
//! penalised maximum likelihood, their forecasts are combined into a
//! discounted CLTV over a horizon, and the CLTV distribution is cut into
//! ordinal quantile segments.
//!
//! Two descriptive analyses share the same cleaned customer histories:
//! RFM quintile scoring with named segments, and a model-free historical
//! CLTV.

pub mod combiner;
pub mod config;
pub mod error;
pub mod features;
pub mod historical;
pub mod model;
pub mod monetary;
pub mod optimizer;
pub mod pipeline;
pub mod purchase_timing;
pub mod rfm;
pub mod rng;
pub mod segmenter;
pub mod special;
pub mod synthetic;
pub mod transaction;
pub mod types;
