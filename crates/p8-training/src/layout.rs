use std::path::{Path, PathBuf};

/// Filesystem layout of a trainer run directory.
///
/// The trainer owns this directory; we only read from it.
///
/// ```text
/// <save_dir>/
///   results.csv
///   weights/best.pt
///   weights/last.pt
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Layout the trainer uses when `exist_ok` keeps the run name stable.
    #[must_use]
    pub fn for_project(project: &Path, name: &str) -> Self {
        Self::new(project.join(name))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn weights_dir(&self) -> PathBuf {
        self.root.join("weights")
    }

    #[must_use]
    pub fn best_checkpoint(&self) -> PathBuf {
        self.weights_dir().join("best.pt")
    }

    #[must_use]
    pub fn last_checkpoint(&self) -> PathBuf {
        self.weights_dir().join("last.pt")
    }

    #[must_use]
    pub fn results_csv(&self) -> PathBuf {
        self.root.join("results.csv")
    }
}
