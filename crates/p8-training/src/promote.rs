//! Publishing a run's best checkpoint to the deployment path.

use crate::artifacts::{require_file, sha256_file, DeploymentManifest, RunMetrics, RunResult};
use crate::device::Device;
use crate::error::TrainingResult;
use crate::seed::SeedCheckpoint;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Where downstream inference picks up the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentTarget {
    pub dir: PathBuf,
    pub filename: String,
}

impl Default for DeploymentTarget {
    fn default() -> Self {
        Self { dir: PathBuf::from("../customers/troester/models"), filename: "plc_model.pt".to_string() }
    }
}

impl DeploymentTarget {
    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(format!("{}.manifest.json", self.filename))
    }

    /// Manifest sidecar as written at the last promotion, if any.
    pub fn current_manifest(&self) -> TrainingResult<Option<DeploymentManifest>> {
        DeploymentManifest::read_optional(&self.manifest_path())
    }

    /// Manifest that still describes the checkpoint on disk.
    ///
    /// A sidecar whose checkpoint is gone or was replaced out of band is ignored.
    pub fn deployed_manifest(&self) -> TrainingResult<Option<DeploymentManifest>> {
        let Some(manifest) = self.current_manifest()? else {
            return Ok(None);
        };

        let checkpoint = self.checkpoint_path();
        if !checkpoint.is_file() {
            warn!("Ignoring manifest, deployed checkpoint is missing: {}", checkpoint.display());
            return Ok(None);
        }
        if sha256_file(&checkpoint)? != manifest.sha256 {
            warn!("Ignoring manifest, deployed checkpoint changed: {}", checkpoint.display());
            return Ok(None);
        }
        Ok(Some(manifest))
    }
}

/// Whether a new run may replace the deployed checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionPolicy {
    /// Always deploy the latest run's best checkpoint.
    #[default]
    Always,
    /// Deploy only when mAP50-95 beats the deployed checkpoint's.
    IfImproved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PromotionOutcome {
    Promoted { path: PathBuf, sha256: String },
    Skipped { reason: String },
}

impl PromotionOutcome {
    #[must_use]
    pub fn is_promoted(&self) -> bool {
        matches!(self, Self::Promoted { .. })
    }
}

/// Decide whether `candidate` may replace `deployed`. `Err` holds the skip reason.
pub fn check_policy(
    policy: PromotionPolicy,
    deployed: Option<&DeploymentManifest>,
    candidate: &RunMetrics,
) -> Result<(), String> {
    if policy == PromotionPolicy::Always {
        return Ok(());
    }

    let Some(previous) = deployed.and_then(|m| m.metrics.map50_95) else {
        return Ok(());
    };

    match candidate.map50_95 {
        Some(new) if new > previous => Ok(()),
        Some(new) => Err(format!("mAP50-95 {new:.4} does not improve on deployed {previous:.4}")),
        None => Err(format!("run reported no mAP50-95; deployed model has {previous:.4}")),
    }
}

/// Copy `weights/best.pt` of a finished run to the deployment path.
///
/// The source is checked before the deployment directory is touched. The copy
/// lands in a temporary file next to the target and is renamed over it.
pub fn promote_best(
    result: &RunResult,
    target: &DeploymentTarget,
    policy: PromotionPolicy,
    seed: &SeedCheckpoint,
    device: Option<Device>,
) -> TrainingResult<PromotionOutcome> {
    let source = result.best_checkpoint();
    require_file(&source, "best checkpoint")?;

    if policy != PromotionPolicy::Always {
        let deployed = target.deployed_manifest()?;
        if let Err(reason) = check_policy(policy, deployed.as_ref(), &result.metrics) {
            warn!("Promotion skipped: {}", reason);
            return Ok(PromotionOutcome::Skipped { reason });
        }
    }

    std::fs::create_dir_all(&target.dir)?;
    let dest = target.checkpoint_path();
    replace_file(&source, &dest)?;

    let sha256 = sha256_file(&dest)?;
    let manifest = DeploymentManifest {
        promoted_at: Utc::now(),
        source,
        sha256: sha256.clone(),
        seed: seed.reference(),
        device,
        metrics: result.metrics.clone(),
    };
    manifest.write(&target.manifest_path())?;

    info!("Model promoted: {}", dest.display());
    Ok(PromotionOutcome::Promoted { path: dest, sha256 })
}

/// Copy `source` over `dest` via a sibling temp file, keeping the source's permissions.
fn replace_file(source: &Path, dest: &Path) -> TrainingResult<()> {
    let dir = dest.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let mut input = File::open(source)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    std::io::copy(&mut input, &mut tmp)?;
    tmp.flush()?;
    tmp.as_file().set_permissions(input.metadata()?.permissions())?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
