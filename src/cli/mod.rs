//! Placement CLI Module
//!
//! Command-line interface for fitting the artifacts and predicting single cases.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::PlacementConfig;
use crate::export::save_artifacts;
use crate::features::FeatureSchema;
use crate::inference::{PlacementPipeline, PredictionRequest, PredictionResponse, ThresholdPolicy};
use crate::training::Trainer;
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const BAR_WIDTH: usize = 30;

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn bad(s: &str) -> ColoredString    { s.truecolor(235, 110, 110) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn bar(share: f64) -> String {
    let filled = (share.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "placement")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Student placement prediction with per-feature explanations")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit the scaler and forest on a labelled CSV and save both artifacts
    Train {
        /// Input CSV with the 8 feature columns and the label column
        #[arg(short, long)]
        data: PathBuf,

        /// Directory for scaler.json and model.json
        #[arg(short, long)]
        output: PathBuf,

        /// Label column name (overrides the config file)
        #[arg(short, long)]
        target: Option<String>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Predict and explain one case
    Predict {
        /// Directory holding scaler.json and model.json
        #[arg(short, long)]
        artifacts: PathBuf,

        /// JSON file with one object of named fields
        #[arg(short, long, conflicts_with = "set", required_unless_present = "set")]
        input: Option<PathBuf>,

        /// Field value as NAME=VALUE (repeat for every field)
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,

        /// Decision threshold (overrides the config file)
        #[arg(long)]
        threshold: Option<f64>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the feature schema
    Schema,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PlacementConfig> {
    Ok(match path {
        Some(p) => PlacementConfig::load(p)?,
        None => PlacementConfig::default(),
    })
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data_path: &Path,
    output: &Path,
    target: Option<&str>,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(target) = target {
        config.training.target_column = target.to_string();
    }
    config.validate()?;

    section("Train");

    let schema = Arc::new(FeatureSchema::placement());

    step_run("Loading data");
    let start = Instant::now();
    let dataset = DataLoader::new().load_csv(
        data_path,
        Arc::clone(&schema),
        &config.training.target_column,
    )?;
    step_done(&format!(
        "{} rows, {:.1}% placed in {:?}",
        dataset.n_samples(),
        dataset.positive_rate() * 100.0,
        start.elapsed()
    ));

    step_run(&format!(
        "Fitting {} trees",
        config.training.forest.n_estimators.to_string().cyan()
    ));
    let policy = ThresholdPolicy::new(config.inference.threshold)?;
    let outcome = Trainer::new(config.training.clone()).fit(&dataset, &policy)?;
    step_done(&format!("{:.3}s", outcome.training_time_secs));

    section(&format!(
        "Held-out report ({} rows, threshold {})",
        outcome.n_test, outcome.report.threshold
    ));
    for line in outcome.report.to_string().lines() {
        println!("  {}", line);
    }

    if let Some(importances) = outcome.forest.feature_importances() {
        section("Feature importances");
        let mut ranked: Vec<(&str, f64)> = schema.names().zip(importances.iter().copied()).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (name, value) in ranked {
            println!("  {:<24} {} {:.3}", muted(name), bar(value), value);
        }
    }

    println!();
    let paths = save_artifacts(output, &schema, &outcome.scaler, &outcome.forest)?;
    step_ok(&format!("Saved {}", paths.scaler.display()));
    step_ok(&format!("Saved {}", paths.model.display()));
    println!();

    Ok(())
}

pub fn cmd_predict(
    artifacts: &Path,
    input: Option<&Path>,
    set: &[String],
    threshold: Option<f64>,
    config_path: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(threshold) = threshold {
        config = config.with_threshold(threshold);
    }

    let request = match input {
        Some(path) => PredictionRequest::from_json_str(&std::fs::read_to_string(path)?)?,
        None => PredictionRequest::from_pairs(parse_assignments(set)?),
    };

    let pipeline = PlacementPipeline::load(artifacts, FeatureSchema::placement(), &config.inference)?;
    let response = pipeline.predict(&request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

pub fn cmd_schema() -> anyhow::Result<()> {
    let schema = FeatureSchema::placement();
    section(&format!("Feature schema v{}", schema.version));
    for (i, field) in schema.fields().iter().enumerate() {
        let bound = field
            .min
            .map(|m| format!(">= {}", m))
            .unwrap_or_default();
        println!("  {:>2}  {:<24} {}", i, field.name, muted(&bound));
    }
    println!();
    Ok(())
}

fn parse_assignments(set: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    set.iter()
        .map(|s| {
            s.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| anyhow::anyhow!("expected NAME=VALUE, got '{}'", s))
        })
        .collect()
}

fn print_response(response: &PredictionResponse) {
    section("Prediction");
    let verdict = if response.decision {
        ok("PLACED")
    } else {
        bad("NOT PLACED")
    };
    println!("  {:<16} {}", muted("Decision"), verdict.bold());
    println!(
        "  {:<16} {}",
        muted("Probability"),
        format!("{:.4}", response.probability).white().bold()
    );
    println!("  {:<16} {}", muted("Threshold"), format!("{}", response.threshold).white());
    println!("  {:<16} {}", muted("Base value"), format!("{:.4}", response.base_value).white());

    section("Contribution shares");
    for (name, share) in response.ranked_shares() {
        let signed = response.attribution.get(&name).copied().unwrap_or(0.0);
        let sign = if signed >= 0.0 { ok("+") } else { bad("-") };
        println!(
            "  {:<24} {} {:>5.1}% {}",
            muted(&name),
            bar(share),
            share * 100.0,
            sign
        );
    }
    println!();
}
