//! Training run command.

use crate::config::load_config;
use anyhow::{Context, Result};
use colored::Colorize;
use p8_training::{
    Orchestrator, PromotionOutcome, RunReport, Trainer, TorchProbe, TracingProgressSink, UltralyticsCli,
};
use std::path::Path;

pub async fn execute(config_path: Option<&Path>, json_output: bool) -> Result<()> {
    let config = load_config(config_path)?;

    let trainer = UltralyticsCli::from_settings(&config.trainer);
    if !trainer.is_available().await {
        anyhow::bail!(
            "Trainer CLI '{}' not found or not working. Install with: pip install ultralytics",
            config.trainer.command
        );
    }

    let probe = TorchProbe::new(config.probe.python.clone());
    let orchestrator = Orchestrator::new(config, trainer, probe);
    let report = orchestrator.run(&TracingProgressSink).await.context("Training run failed")?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    println!();
    println!("{}", "Training complete".bold().green());
    println!("  Device: {}", report.device.to_string().cyan());
    println!("  Seed: {}", report.seed.to_string().cyan());
    println!("  Run: {}", report.result.save_dir.display().to_string().dimmed());
    println!("  Metrics: {}", report.result.metrics);

    match &report.promotion {
        PromotionOutcome::Promoted { path, sha256 } => {
            println!("  Deployed: {}", path.display().to_string().green());
            println!("  SHA-256: {}", sha256.dimmed());
        }
        PromotionOutcome::Skipped { reason } => {
            println!("  Deployed: {}", format!("unchanged ({reason})").yellow());
        }
    }
    println!();
}
