//! cltv-runner: headless batch scorer for the CLTV engine.
//!
//! Usage:
//!   cltv-runner --input transactions.json --config cltv_config.json --output predictions.json
//!   cltv-runner --synthetic 2000 --seed 12345
//!   cltv-runner --input transactions.json --analysis rfm
//!
//! `--analysis` selects `probabilistic` (default), `rfm` or `historical`.

use anyhow::{bail, Result};
use cltv_core::{
    config::CltvConfig,
    monetary::MonetaryParameters,
    historical::HistoricalReport,
    pipeline::{CltvPipeline, CltvReport},
    purchase_timing::PurchaseTimingParameters,
    rfm::RfmReport,
    synthetic::{SyntheticConfig, SyntheticPopulation},
    transaction::TransactionRecord,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let input = parse_str(&args, "--input");
    let config_path = parse_str(&args, "--config");
    let output = parse_str(&args, "--output");
    let synthetic = parse_arg(&args, "--synthetic", 0usize);
    let seed = parse_arg(&args, "--seed", 42u64);
    let analysis = parse_str(&args, "--analysis").unwrap_or("probabilistic");

    let config = match config_path {
        Some(path) => CltvConfig::load(path)?,
        None => CltvConfig::default(),
    };

    println!("cltv-runner");
    println!("  input:     {}", input.unwrap_or(if synthetic > 0 { "synthetic" } else { "-" }));
    println!("  config:    {}", config_path.unwrap_or("defaults"));
    println!("  analysis:  {analysis}");
    println!("  cutoff:    {}", config.observation_cutoff);
    println!("  horizon:   {} (periods of {})", config.horizon_length, config.period_length);
    println!();

    let transactions = match (input, synthetic) {
        (Some(path), _) => load_transactions(path)?,
        (None, n) if n > 0 => synthetic_transactions(&config, n, seed),
        _ => bail!("either --input <file> or --synthetic <customers> is required"),
    };

    let pipeline = CltvPipeline::new(config)?;
    let json = match analysis {
        "probabilistic" => {
            let report = pipeline.run(&transactions)?;
            print_summary(&report, transactions.len());
            report.to_json()?
        }
        "rfm" => {
            let report = pipeline.rfm(&transactions)?;
            print_rfm(&report);
            serde_json::to_string_pretty(&report)?
        }
        "historical" => {
            let report = pipeline.historical(&transactions)?;
            print_historical(&report);
            serde_json::to_string_pretty(&report)?
        }
        other => bail!("unknown --analysis {other}; expected probabilistic, rfm or historical"),
    };

    if let Some(path) = output {
        std::fs::write(path, json)?;
        log::info!("{analysis} results written to {path}");
    }
    Ok(())
}

fn load_transactions(path: &str) -> Result<Vec<TransactionRecord>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    Ok(serde_json::from_str(&content)?)
}

fn synthetic_transactions(config: &CltvConfig, customers: usize, seed: u64) -> Vec<TransactionRecord> {
    let population = SyntheticPopulation::generate(&SyntheticConfig {
        timing: PurchaseTimingParameters::new(0.243, 4.414, 0.793, 2.426),
        monetary: MonetaryParameters::new(6.25, 3.74, 15.44),
        customers,
        min_observation: 26.0,
        max_observation: 52.0,
        seed,
    });
    population.transactions(config.observation_cutoff, config.time_unit_divisor)
}

fn print_summary(report: &CltvReport, records: usize) {
    let t = &report.purchase_timing;
    let m = &report.monetary;

    println!("=== RUN SUMMARY ===");
    println!("  records:        {records}");
    println!("  customers:      {}", report.customers_extracted);
    println!("  scored:         {}", report.predictions.len());
    println!("  dropped:        {}", report.dropped.len());
    println!(
        "  BG-NBD:         r={:.4} alpha={:.4} a={:.4} b={:.4} ({} iters)",
        t.params.r, t.params.alpha, t.params.a, t.params.b, t.iterations
    );
    println!(
        "  Gamma-Gamma:    p={:.4} q={:.4} v={:.4} ({} iters)",
        m.params.p, m.params.q, m.params.v, m.iterations
    );

    println!();
    println!("=== TOP 10 CUSTOMERS ===");
    let mut ranked: Vec<_> = report.predictions.iter().collect();
    ranked.sort_by(|a, b| b.cltv.total_cmp(&a.cltv));
    for p in ranked.iter().take(10) {
        let forecasts: Vec<String> = p
            .forecasts
            .iter()
            .map(|f| format!("{}w:{:.3}", f.horizon, f.expected_transactions))
            .collect();
        println!(
            "  {:<12} | CLTV {:>10.2} | avg spend {:>8.2} | alive {:.3} | {} | {}",
            p.customer_id,
            p.cltv,
            p.expected_average_spend,
            p.probability_alive,
            forecasts.join(" "),
            p.segment.map(|s| s.label()).unwrap_or('-'),
        );
    }

    println!();
    println!("=== SEGMENTS ===");
    for s in report.segments.iter().rev() {
        println!(
            "  {} | count {:>6} | mean {:>10.2} | total {:>12.2}",
            s.segment, s.count, s.mean, s.total
        );
    }
}

fn print_rfm(report: &RfmReport) {
    println!("=== RFM SEGMENTS ===");
    for s in &report.segments {
        println!(
            "  {:<20} | count {:>6} | recency {:>8.1}d | frequency {:>6.2} | monetary {:>10.2}",
            s.segment.name(), s.count, s.mean_recency, s.mean_frequency, s.mean_monetary
        );
    }
    let champions = report.customers.iter().filter(|c| c.rfm_score() == "55").count();
    println!("  customers scored 55: {champions} of {}", report.customers.len());
}

fn print_historical(report: &HistoricalReport) {
    println!("=== HISTORICAL VALUE ===");
    println!("  customers:      {}", report.customers.len());
    println!("  repeat rate:    {:.3}", report.repeat_rate);
    println!("  churn rate:     {:.3}", report.churn_rate);

    println!();
    println!("=== TOP 10 CUSTOMERS ===");
    let mut ranked: Vec<_> = report.customers.iter().collect();
    ranked.sort_by(|a, b| b.cltv.total_cmp(&a.cltv));
    for c in ranked.iter().take(10) {
        println!(
            "  {:<12} | CLTV {:>12.2} | invoices {:>4} | spend {:>10.2} | {}",
            c.customer_id,
            c.cltv,
            c.invoices,
            c.total_spend,
            c.segment.map(|s| s.label()).unwrap_or('-'),
        );
    }

    println!();
    println!("=== SEGMENTS ===");
    for s in report.segments.iter().rev() {
        println!(
            "  {} | count {:>6} | mean {:>12.2} | total {:>14.2}",
            s.segment, s.count, s.mean, s.total
        );
    }
}

fn parse_str<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
