//! Dataset descriptor generation.

use anyhow::Context;
use colored::Colorize;
use std::path::Path;

/// Write `dataset.yaml` for `root` from its `classes.txt`.
pub async fn execute(root: &Path) -> anyhow::Result<()> {
    let descriptor = p8_training::generate_dataset_descriptor(root)
        .with_context(|| format!("Failed to prepare dataset at {}", root.display()))?;

    println!();
    println!("{}", "Dataset descriptor ready".bold().green());
    println!("  Path: {}", descriptor.to_string().cyan());
    println!("  {}", "Point `dataset` in p8-train.toml at this file to train on it.".dimmed());
    println!();
    Ok(())
}
