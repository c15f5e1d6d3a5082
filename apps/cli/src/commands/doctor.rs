//! Doctor command implementation.
//!
//! Probes the trainer and accelerator once and checks the configured paths.

use crate::config::load_config;
use colored::Colorize;
use p8_training::{AcceleratorProbe, Trainer, TorchProbe, UltralyticsCli};
use serde_json::json;
use std::path::Path;

pub async fn execute(config_path: Option<&Path>, json_output: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let trainer_ok = UltralyticsCli::from_settings(&config.trainer).is_available().await;
    let accelerator = TorchProbe::new(config.probe.python.clone()).probe().await;
    let seed_present = config.customer_checkpoint.is_file();
    let dataset_present = config.dataset.is_file();

    if json_output {
        let out = json!({
            "trainer": { "command": config.trainer.command, "available": trainer_ok },
            "accelerator": accelerator.as_ref().map(|a| json!({
                "device": a.device.to_string(),
                "name": a.name,
                "memory_gb": a.memory_gb,
            })),
            "customer_checkpoint": { "path": config.customer_checkpoint, "present": seed_present },
            "dataset": { "path": config.dataset, "present": dataset_present },
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", "P8 Train Doctor".bold().cyan());
    println!();

    println!("{}", "Trainer:".bold());
    if trainer_ok {
        println!("  {}: {}", config.trainer.command, "✓ Available".green());
    } else {
        println!("  {}: {}", config.trainer.command, "✗ Not found".red());
        println!("  {}", "Fix: pip install ultralytics".yellow());
    }
    println!();

    println!("{}", "Accelerator:".bold());
    match &accelerator {
        Some(a) => {
            let name = a.name.clone().unwrap_or_default();
            println!("  {}: {} {}", "Device".dimmed(), a.device.to_string().green(), name);
        }
        None => println!("  {}", "⚠ None detected, training will use CPU".yellow()),
    }
    println!();

    println!("{}", "Paths:".bold());
    print_path("Seed checkpoint", &config.customer_checkpoint, seed_present, "pretrained fallback");
    print_path("Dataset", &config.dataset, dataset_present, "training will fail");
    println!();

    Ok(())
}

fn print_path(label: &str, path: &Path, present: bool, when_missing: &str) {
    let status = if present {
        "✓".green().to_string()
    } else {
        format!("✗ missing ({when_missing})").yellow().to_string()
    };
    println!("  {}: {} {}", label, path.display().to_string().dimmed(), status);
}
