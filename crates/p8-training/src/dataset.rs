use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Path to a trainer dataset descriptor (image/label roots and class names).
///
/// Passed through to the trainer as-is; its contents are the trainer's concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetDescriptor(pub PathBuf);

impl DatasetDescriptor {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.0.is_file()
    }
}

impl std::fmt::Display for DatasetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Descriptor document layout written by [`generate_dataset_descriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetYaml {
    pub path: PathBuf,
    pub train: String,
    pub val: String,
    pub names: BTreeMap<usize, String>,
}

pub const CLASSES_FILE: &str = "classes.txt";
pub const DESCRIPTOR_FILE: &str = "dataset.yaml";

/// Read class names from `classes.txt`, one per line, blanks ignored.
pub fn read_class_names(path: &Path) -> TrainingResult<Vec<String>> {
    if !path.exists() {
        return Err(TrainingError::Dataset(format!("class list not found: {}", path.display())));
    }
    let contents = std::fs::read_to_string(path)?;
    let names: Vec<String> =
        contents.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect();
    if names.is_empty() {
        return Err(TrainingError::Dataset(format!("class list is empty: {}", path.display())));
    }
    Ok(names)
}

/// Write `<root>/dataset.yaml` from `<root>/classes.txt`.
///
/// The dataset root is made absolute. Validation reuses the training split.
pub fn generate_dataset_descriptor(root: &Path) -> TrainingResult<DatasetDescriptor> {
    let root = std::fs::canonicalize(root).map_err(|e| {
        TrainingError::Dataset(format!("dataset root {} is not accessible: {}", root.display(), e))
    })?;

    let names = read_class_names(&root.join(CLASSES_FILE))?;
    let doc = DatasetYaml {
        path: root.clone(),
        train: "images/train".to_string(),
        val: "images/train".to_string(),
        names: names.iter().cloned().enumerate().collect(),
    };

    let yaml_path = root.join(DESCRIPTOR_FILE);
    std::fs::write(&yaml_path, serde_yaml::to_string(&doc)?)?;

    info!("Dataset descriptor written: {}", yaml_path.display());
    info!("Classes ({}): {}", names.len(), names.join(", "));
    Ok(DatasetDescriptor(yaml_path))
}
