use crate::device::Device;
use crate::error::{TrainingError, TrainingResult};
use crate::layout::RunLayout;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validation metrics from the final epoch of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RunMetrics {
    pub epochs_completed: Option<u32>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub map50: Option<f64>,
    pub map50_95: Option<f64>,
}

impl RunMetrics {
    /// Read the last row of a trainer `results.csv`.
    ///
    /// Column headers are padded by the trainer and trimmed here. A missing
    /// file yields empty metrics.
    pub fn from_results_csv(path: &Path) -> TrainingResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let column = |name: &str| headers.iter().position(|h| h == name);
        let epoch_col = column("epoch");
        let precision_col = column("metrics/precision(B)");
        let recall_col = column("metrics/recall(B)");
        let map50_col = column("metrics/mAP50(B)");
        let map50_95_col = column("metrics/mAP50-95(B)");

        let Some(last) = reader.records().filter_map(Result::ok).last() else {
            return Ok(Self::default());
        };

        let float = |idx: Option<usize>| idx.and_then(|i| last.get(i)).and_then(|v| v.parse::<f64>().ok());

        Ok(Self {
            epochs_completed: epoch_col
                .and_then(|i| last.get(i))
                .and_then(|v| v.parse::<f64>().ok())
                .map(|v| v as u32),
            precision: float(precision_col),
            recall: float(recall_col),
            map50: float(map50_col),
            map50_95: float(map50_95_col),
        })
    }

    /// Same as [`Self::from_results_csv`], logging instead of failing.
    #[must_use]
    pub fn read_or_default(path: &Path) -> Self {
        match Self::from_results_csv(path) {
            Ok(metrics) => metrics,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "could not read run metrics");
                Self::default()
            }
        }
    }
}

fn fmt_metric(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.4}"))
}

impl std::fmt::Display for RunMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mAP50: {}, mAP50-95: {}", fmt_metric(self.map50), fmt_metric(self.map50_95))
    }
}

/// What a finished trainer run exposes to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Directory the trainer saved this run into.
    pub save_dir: PathBuf,
    #[serde(default)]
    pub metrics: RunMetrics,
}

impl RunResult {
    /// Build a result for `save_dir`, picking up whatever metrics it holds.
    #[must_use]
    pub fn from_save_dir(save_dir: PathBuf) -> Self {
        let metrics = RunMetrics::read_or_default(&RunLayout::new(save_dir.clone()).results_csv());
        Self { save_dir, metrics }
    }

    #[must_use]
    pub fn layout(&self) -> RunLayout {
        RunLayout::new(self.save_dir.clone())
    }

    #[must_use]
    pub fn best_checkpoint(&self) -> PathBuf {
        self.layout().best_checkpoint()
    }

    #[must_use]
    pub fn last_checkpoint(&self) -> PathBuf {
        self.layout().last_checkpoint()
    }
}

/// Sidecar written next to a deployed checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentManifest {
    pub promoted_at: DateTime<Utc>,
    /// Run checkpoint the deployment was copied from.
    pub source: PathBuf,
    pub sha256: String,
    pub seed: String,
    pub device: Option<Device>,
    #[serde(default)]
    pub metrics: RunMetrics,
}

impl DeploymentManifest {
    pub fn read(path: &Path) -> TrainingResult<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read the manifest if one exists.
    pub fn read_optional(path: &Path) -> TrainingResult<Option<Self>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write(&self, path: &Path) -> TrainingResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

pub fn sha256_file(path: &Path) -> TrainingResult<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Fail unless `path` is an existing file.
pub fn require_file(path: &Path, what: &str) -> TrainingResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(TrainingError::Artifact(format!("{what} does not exist: {}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RESULTS_CSV: &str = "                  epoch,         train/box_loss,   metrics/precision(B),      metrics/recall(B),       metrics/mAP50(B),    metrics/mAP50-95(B)
                      1,                 1.2345,                0.41000,                0.30000,                0.25000,                0.12000
                      2,                 1.1000,                0.61234,                0.55000,                0.58120,                0.33456
";

    #[test]
    fn test_metrics_from_results_csv_takes_last_row() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("results.csv");
        std::fs::write(&path, RESULTS_CSV).unwrap();

        let metrics = RunMetrics::from_results_csv(&path).unwrap();
        assert_eq!(metrics.epochs_completed, Some(2));
        assert_eq!(metrics.precision, Some(0.61234));
        assert_eq!(metrics.recall, Some(0.55));
        assert_eq!(metrics.map50, Some(0.5812));
        assert_eq!(metrics.map50_95, Some(0.33456));
    }

    #[test]
    fn test_metrics_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let metrics = RunMetrics::from_results_csv(&temp.path().join("results.csv")).unwrap();
        assert_eq!(metrics, RunMetrics::default());
        assert_eq!(metrics.to_string(), "mAP50: N/A, mAP50-95: N/A");
    }

    #[test]
    fn test_run_result_paths() {
        let result = RunResult::from_save_dir(PathBuf::from("runs/detect/train"));
        assert_eq!(result.best_checkpoint(), PathBuf::from("runs/detect/train/weights/best.pt"));
        assert_eq!(result.metrics, RunMetrics::default());
    }

    #[test]
    fn test_sha256_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.bin");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_manifest_read_optional_missing() {
        let temp = TempDir::new().unwrap();
        assert!(DeploymentManifest::read_optional(&temp.path().join("m.json")).unwrap().is_none());
    }
}
