//! CLI configuration loading.

use anyhow::Context;
use p8_training::OrchestratorConfig;
use std::path::Path;

/// Load the orchestrator configuration.
///
/// Precedence:
/// 1. `--config <path>` (must exist)
/// 2. Local config file (./p8-train.toml)
/// 3. Defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<OrchestratorConfig> {
    OrchestratorConfig::discover(path).context("Failed to load configuration")
}
