//! Status command implementation.
//!
//! Shows what is currently deployed for downstream inference.

use crate::config::load_config;
use colored::Colorize;
use serde_json::json;
use std::path::Path;

pub async fn execute(config_path: Option<&Path>, json_output: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let target = &config.deploy;
    let checkpoint = target.checkpoint_path();
    let deployed = checkpoint.is_file();
    let manifest = target.deployed_manifest()?;

    if json_output {
        let out = json!({
            "checkpoint": checkpoint,
            "deployed": deployed,
            "promotion_policy": config.promotion,
            "manifest": manifest,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("{}", "P8 Detector Status".bold().cyan());
    println!();
    println!("  Checkpoint: {}", checkpoint.display().to_string().dimmed());

    if !deployed {
        println!("  Deployed: {}", "✗ Not found".red());
        println!();
        println!("  {}", "Run `p8-train` to train and deploy a model.".dimmed());
        println!();
        return Ok(());
    }

    println!("  Deployed: {}", "✓".green());
    match manifest {
        Some(m) => {
            println!("  Promoted: {}", m.promoted_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("  Source: {}", m.source.display().to_string().dimmed());
            println!("  Seed: {}", m.seed);
            println!("  Metrics: {}", m.metrics);
            println!("  SHA-256: {}", m.sha256.dimmed());
        }
        None => println!("  Manifest: {}", "none (deployed outside p8-train)".yellow()),
    }
    println!();
    Ok(())
}
