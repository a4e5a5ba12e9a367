use crate::error::{CltvError, CltvResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_PURCHASE_TIMING_PENALIZER: f64 = 0.001;
pub const DEFAULT_MONETARY_PENALIZER: f64 = 0.01;

/// Stopping rules for the log-space BFGS search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_iterations: usize,
    /// Converged once the infinity-norm of the gradient drops below this.
    pub gradient_tolerance: f64,
    /// Converged once a step changes the objective by less than this (relative).
    pub function_tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            gradient_tolerance: 1e-6,
            function_tolerance: 1e-12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelFitConfig {
    /// L2 penalty on the natural parameters, added to the mean negative log-likelihood.
    pub penalizer_coefficient: f64,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

impl ModelFitConfig {
    pub fn with_penalizer(penalizer_coefficient: f64) -> Self {
        Self {
            penalizer_coefficient,
            optimizer: OptimizerConfig::default(),
        }
    }
}

/// A model section as written in a config file, where the penalizer may be
/// left out. Each model supplies its own default.
#[derive(Deserialize)]
struct ModelFitSection {
    penalizer_coefficient: Option<f64>,
    #[serde(default)]
    optimizer: OptimizerConfig,
}

impl ModelFitSection {
    fn or_penalizer(self, default: f64) -> ModelFitConfig {
        ModelFitConfig {
            penalizer_coefficient: self.penalizer_coefficient.unwrap_or(default),
            optimizer: self.optimizer,
        }
    }
}

fn purchase_timing_section<'de, D: Deserializer<'de>>(d: D) -> Result<ModelFitConfig, D::Error> {
    ModelFitSection::deserialize(d).map(|s| s.or_penalizer(DEFAULT_PURCHASE_TIMING_PENALIZER))
}

fn monetary_section<'de, D: Deserializer<'de>>(d: D) -> Result<ModelFitConfig, D::Error> {
    ModelFitSection::deserialize(d).map(|s| s.or_penalizer(DEFAULT_MONETARY_PENALIZER))
}

/// Percentile fence used to cap quantity and unit price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutlierConfig {
    pub lower_quantile: f64,
    pub upper_quantile: f64,
    pub fence_multiplier: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            lower_quantile: 0.01,
            upper_quantile: 0.99,
            fence_multiplier: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CltvConfig {
    /// Fixed end of the observation window; defines `T`.
    pub observation_cutoff: NaiveDateTime,
    /// Days per model time unit (7.0 = weeks).
    pub time_unit_divisor: f64,
    /// Customers with `frequency <= frequency_floor` are excluded.
    pub frequency_floor: u32,
    pub min_customers_for_fit: usize,
    pub outliers: OutlierConfig,
    #[serde(deserialize_with = "purchase_timing_section")]
    pub purchase_timing: ModelFitConfig,
    #[serde(deserialize_with = "monetary_section")]
    pub monetary: ModelFitConfig,
    /// CLTV horizon, in model time units.
    pub horizon_length: f64,
    /// Length of one discounting period, in model time units.
    pub period_length: f64,
    /// Discount rate applied per period.
    pub discount_rate: f64,
    /// Horizons (model time units) reported as expected transaction counts.
    pub prediction_horizons: Vec<f64>,
    pub segment_count: usize,
    /// Share of spend kept as profit in the historical value calculation.
    pub profit_margin: f64,
}

impl Default for CltvConfig {
    fn default() -> Self {
        Self {
            observation_cutoff: chrono::NaiveDate::from_ymd_opt(2011, 12, 11)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
            time_unit_divisor: 7.0,
            frequency_floor: 1,
            min_customers_for_fit: 10,
            outliers: OutlierConfig::default(),
            purchase_timing: ModelFitConfig::with_penalizer(DEFAULT_PURCHASE_TIMING_PENALIZER),
            monetary: ModelFitConfig::with_penalizer(DEFAULT_MONETARY_PENALIZER),
            horizon_length: 12.0,
            period_length: 4.345,
            discount_rate: 0.01,
            prediction_horizons: vec![1.0, 4.0, 12.0],
            segment_count: 4,
            profit_margin: 0.10,
        }
    }
}

impl CltvConfig {
    /// Load from a JSON file. Missing fields fall back to defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: CltvConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Config with hardcoded values for use in tests: small populations
    /// are allowed and horizons are weekly.
    pub fn default_test() -> Self {
        Self {
            min_customers_for_fit: 3,
            period_length: 1.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> CltvResult<()> {
        let invalid = |msg: String| Err(CltvError::InvalidInput(msg));

        if !(self.time_unit_divisor > 0.0) {
            return invalid(format!("time_unit_divisor must be > 0, got {}", self.time_unit_divisor));
        }
        if !(self.horizon_length > 0.0) {
            return invalid(format!("horizon_length must be > 0, got {}", self.horizon_length));
        }
        if !(self.period_length > 0.0) {
            return invalid(format!("period_length must be > 0, got {}", self.period_length));
        }
        if !(self.discount_rate >= 0.0) {
            return invalid(format!("discount_rate must be >= 0, got {}", self.discount_rate));
        }
        for (name, fit) in [("purchase_timing", &self.purchase_timing), ("monetary", &self.monetary)] {
            if !(fit.penalizer_coefficient >= 0.0) {
                return invalid(format!(
                    "{name}.penalizer_coefficient must be >= 0, got {}",
                    fit.penalizer_coefficient
                ));
            }
            if fit.optimizer.max_iterations == 0 {
                return invalid(format!("{name}.optimizer.max_iterations must be > 0"));
            }
        }
        let o = &self.outliers;
        if !(0.0 < o.lower_quantile && o.lower_quantile < o.upper_quantile && o.upper_quantile < 1.0) {
            return invalid(format!(
                "outlier quantiles must satisfy 0 < lower < upper < 1, got {} / {}",
                o.lower_quantile, o.upper_quantile
            ));
        }
        if !(o.fence_multiplier >= 0.0) {
            return invalid(format!("fence_multiplier must be >= 0, got {}", o.fence_multiplier));
        }
        if self.prediction_horizons.iter().any(|h| !(*h > 0.0)) {
            return invalid("prediction_horizons must all be > 0".into());
        }
        if !(self.profit_margin > 0.0 && self.profit_margin.is_finite()) {
            return invalid(format!("profit_margin must be > 0, got {}", self.profit_margin));
        }
        if !(1..=26).contains(&self.segment_count) {
            return invalid(format!("segment_count must be in 1..=26, got {}", self.segment_count));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        CltvConfig::default().validate().unwrap();
        CltvConfig::default_test().validate().unwrap();
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: CltvConfig = serde_json::from_str(
            r#"{ "discount_rate": 0.02, "purchase_timing": { "penalizer_coefficient": 0.1 } }"#,
        )
        .unwrap();
        assert_eq!(config.discount_rate, 0.02);
        assert_eq!(config.purchase_timing.penalizer_coefficient, 0.1);
        assert_eq!(config.purchase_timing.optimizer, OptimizerConfig::default());
        assert_eq!(config.monetary.penalizer_coefficient, 0.01);
        assert_eq!(config.segment_count, 4);
    }

    #[test]
    fn section_without_penalizer_keeps_model_default() {
        let config: CltvConfig = serde_json::from_str(
            r#"{
                "purchase_timing": { "optimizer": { "max_iterations": 200 } },
                "monetary": { "optimizer": { "max_iterations": 50 } }
            }"#,
        )
        .unwrap();
        assert_eq!(config.purchase_timing.penalizer_coefficient, DEFAULT_PURCHASE_TIMING_PENALIZER);
        assert_eq!(config.purchase_timing.optimizer.max_iterations, 200);
        assert_eq!(config.monetary.penalizer_coefficient, DEFAULT_MONETARY_PENALIZER);
        assert_eq!(config.monetary.optimizer.max_iterations, 50);
        assert_eq!(
            config.monetary.optimizer.gradient_tolerance,
            OptimizerConfig::default().gradient_tolerance
        );

        let empty_section: CltvConfig = serde_json::from_str(r#"{ "monetary": {} }"#).unwrap();
        assert_eq!(empty_section.monetary, ModelFitConfig::with_penalizer(DEFAULT_MONETARY_PENALIZER));
    }

    #[test]
    fn shipped_config_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../data/cltv_config.json");
        let config = CltvConfig::load(path).unwrap();
        assert_eq!(config.period_length, 4.345);
        assert_eq!(config.prediction_horizons, vec![1.0, 4.0, 12.0]);
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            CltvConfig { time_unit_divisor: 0.0, ..CltvConfig::default() },
            CltvConfig { discount_rate: -0.1, ..CltvConfig::default() },
            CltvConfig { segment_count: 0, ..CltvConfig::default() },
            CltvConfig { profit_margin: 0.0, ..CltvConfig::default() },
            CltvConfig { prediction_horizons: vec![4.0, -1.0], ..CltvConfig::default() },
            CltvConfig {
                outliers: OutlierConfig { lower_quantile: 0.9, upper_quantile: 0.1, fence_multiplier: 1.5 },
                ..CltvConfig::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(CltvError::InvalidInput(_))));
        }
    }
}
