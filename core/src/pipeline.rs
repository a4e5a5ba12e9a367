//! The scoring pipeline: the single entry point that wires every component.
//!
//! EXECUTION ORDER (fixed):
//!   1. Feature extraction          (skipped by run_features)
//!   2. Purchase-timing fit  ┐
//!   3. Monetary fit         ┘ on two scoped threads, independent of each other
//!   4. CLTV combination
//!   5. Segmentation
//!
//! `rfm` and `historical` are separate entry points over the same cleaned
//! customer histories; neither fits a model.
//!
//! RULES:
//!   - Every run is a pure function of its inputs and the config.
//!   - A failed fit aborts the run; there is no fallback to default parameters.
//!   - Customers neither model can score are dropped and reported, never zero-filled.

use crate::{
    combiner::{CltvCombiner, CustomerPrediction, DroppedCustomer},
    config::CltvConfig,
    error::{CltvError, CltvResult},
    features::{CustomerFeatures, FeatureExtractor},
    historical::{HistoricalReport, HistoricalValuation},
    monetary::{MonetaryFit, MonetaryModel},
    purchase_timing::{PurchaseTimingFit, PurchaseTimingModel},
    rfm::{RfmReport, RfmScorer},
    segmenter::{SegmentSummary, Segmenter},
    transaction::TransactionRecord,
};
use serde::Serialize;

/// Everything one scoring run produces.
#[derive(Debug, Clone, Serialize)]
pub struct CltvReport {
    pub customers_extracted: usize,
    pub purchase_timing:     PurchaseTimingFit,
    pub monetary:            MonetaryFit,
    pub predictions:         Vec<CustomerPrediction>,
    pub dropped:             Vec<DroppedCustomer>,
    pub segments:            Vec<SegmentSummary>,
}

impl CltvReport {
    /// Pretty-printed JSON, the format the runner writes to disk.
    pub fn to_json(&self) -> CltvResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct CltvPipeline {
    config: CltvConfig,
}

impl CltvPipeline {
    pub fn new(config: CltvConfig) -> CltvResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CltvConfig {
        &self.config
    }

    /// Score a raw transaction snapshot end to end.
    pub fn run(&self, transactions: &[TransactionRecord]) -> CltvResult<CltvReport> {
        let features = FeatureExtractor::new(self.config.clone()).extract(transactions)?;
        self.score(features)
    }

    /// Score already-extracted feature vectors. The frequency floor and the
    /// minimum customer count still apply.
    pub fn run_features(&self, features: Vec<CustomerFeatures>) -> CltvResult<CltvReport> {
        let extractor = FeatureExtractor::new(self.config.clone());
        let before = features.len();
        let features = extractor.apply_frequency_floor(features);
        log::info!(
            "{} of {} customers above frequency floor {}",
            features.len(),
            before,
            self.config.frequency_floor
        );
        extractor.ensure_minimum(features.len())?;
        self.score(features)
    }

    /// RFM quintile scores and named segments.
    pub fn rfm(&self, transactions: &[TransactionRecord]) -> CltvResult<RfmReport> {
        let histories = FeatureExtractor::new(self.config.clone()).histories(transactions)?;
        RfmScorer::new(&self.config).run(&histories)
    }

    /// Model-free CLTV from past spend, segmented like the probabilistic one.
    pub fn historical(&self, transactions: &[TransactionRecord]) -> CltvResult<HistoricalReport> {
        let histories = FeatureExtractor::new(self.config.clone()).histories(transactions)?;
        HistoricalValuation::new(&self.config).evaluate(&histories)
    }

    fn score(&self, features: Vec<CustomerFeatures>) -> CltvResult<CltvReport> {
        let timing_model = PurchaseTimingModel::new(self.config.purchase_timing.clone());
        let monetary_model = MonetaryModel::new(self.config.monetary.clone());

        let (timing_fit, monetary_fit) = std::thread::scope(|scope| {
            let timing = scope.spawn(|| timing_model.fit(&features));
            let monetary = monetary_model.fit(&features);
            (timing.join(), monetary)
        });
        let timing_fit = timing_fit
            .map_err(|_| CltvError::Other(anyhow::anyhow!("purchase-timing fit thread panicked")))??;
        let monetary_fit = monetary_fit?;

        let combined = CltvCombiner::new(&self.config).combine(&timing_fit.params, &monetary_fit.params, &features)?;
        let mut predictions = combined.predictions;

        let segmenter = Segmenter::new(self.config.segment_count);
        let values: Vec<f64> = predictions.iter().map(|p| p.cltv).collect();
        let segments = segmenter.assign(&values)?;
        for (prediction, segment) in predictions.iter_mut().zip(&segments) {
            prediction.segment = Some(*segment);
        }
        let summary = segmenter.summarize(&values, &segments);

        log::info!(
            "scoring run complete: {} customers scored, {} dropped",
            predictions.len(),
            combined.dropped.len()
        );

        Ok(CltvReport {
            customers_extracted: features.len(),
            purchase_timing: timing_fit,
            monetary: monetary_fit,
            predictions,
            dropped: combined.dropped,
            segments: summary,
        })
    }
}
