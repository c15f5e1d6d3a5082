use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Starting weights for a fine-tuning run. Never modified by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeedCheckpoint {
    /// A customer-specific checkpoint from an earlier run (transfer learning).
    Customer { path: PathBuf },
    /// A generic pretrained identifier resolved by the trainer.
    Pretrained { id: String },
}

impl SeedCheckpoint {
    /// String handed to the trainer's `model=` option.
    #[must_use]
    pub fn reference(&self) -> String {
        match self {
            Self::Customer { path } => path.display().to_string(),
            Self::Pretrained { id } => id.clone(),
        }
    }

    #[must_use]
    pub fn is_customer(&self) -> bool {
        matches!(self, Self::Customer { .. })
    }
}

impl std::fmt::Display for SeedCheckpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer { path } => write!(f, "customer checkpoint {}", path.display()),
            Self::Pretrained { id } => write!(f, "pretrained {id}"),
        }
    }
}

/// Continue from `candidate` when it exists, otherwise start from `pretrained_id`.
pub fn select_seed(candidate: &Path, pretrained_id: &str) -> SeedCheckpoint {
    if candidate.exists() {
        info!("Previous model found: {} (transfer learning)", candidate.display());
        SeedCheckpoint::Customer { path: candidate.to_path_buf() }
    } else {
        info!("No previous model at {}, starting from {}", candidate.display(), pretrained_id);
        SeedCheckpoint::Pretrained { id: pretrained_id.to_string() }
    }
}
