//! Orchestrator configuration.
//!
//! Every path and hyperparameter the training run depends on lives here as a
//! named field. `Default` reproduces the values the PLC / terminal / contactor
//! model has always been trained with, so an absent config file behaves like
//! the historical script.

use crate::device::DeviceSetting;
use crate::error::{TrainingError, TrainingResult};
use crate::promote::{DeploymentTarget, PromotionPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the current directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "p8-train.toml";

/// Top-level configuration for one orchestrated training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Customer-specific checkpoint to continue from when present.
    pub customer_checkpoint: PathBuf,
    /// Generic pretrained checkpoint identifier used otherwise.
    pub pretrained_model: String,
    /// Dataset descriptor handed to the trainer untouched.
    pub dataset: PathBuf,
    pub promotion: PromotionPolicy,
    pub device: DeviceSetting,
    pub run: RunConfig,
    pub deploy: DeploymentTarget,
    pub trainer: TrainerSettings,
    pub probe: ProbeSettings,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            customer_checkpoint: PathBuf::from("../customers/troester/models/plc_model_backup.pt"),
            pretrained_model: "yolov8n.pt".to_string(),
            dataset: PathBuf::from("../multi_class_data.yaml"),
            promotion: PromotionPolicy::default(),
            device: DeviceSetting::default(),
            run: RunConfig::default(),
            deploy: DeploymentTarget::default(),
            trainer: TrainerSettings::default(),
            probe: ProbeSettings::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn load_from_file(path: &Path) -> TrainingResult<Self> {
        if !path.exists() {
            return Err(TrainingError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| TrainingError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration for this invocation.
    ///
    /// An explicit path must exist. Otherwise `./p8-train.toml` is used when
    /// present, falling back to the built-in defaults.
    pub fn discover(explicit: Option<&Path>) -> TrainingResult<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::load_from_file(&local);
        }

        Ok(Self::default())
    }

    pub fn save_to_file(&self, path: &Path) -> TrainingResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TrainingError::Config(format!("failed to serialize: {}", e)))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.pretrained_model.trim().is_empty() {
            return Err(TrainingError::InvalidRun("pretrained_model is required".to_string()));
        }
        if self.deploy.filename.trim().is_empty() {
            return Err(TrainingError::InvalidRun("deploy.filename is required".to_string()));
        }
        if self.trainer.command.trim().is_empty() {
            return Err(TrainingError::InvalidRun("trainer.command is required".to_string()));
        }
        self.run.validate()
    }
}

/// Scalar hyperparameters for a single training invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub epochs: u32,
    pub imgsz: u32,
    pub batch: u32,
    /// Early stopping: epochs without improvement before the trainer stops.
    pub patience: u32,
    pub save: bool,
    /// Write an intermediate checkpoint every N epochs. 0 disables.
    pub save_period: u32,
    pub workers: u32,
    /// Output project directory.
    pub project: String,
    /// Run name inside the project directory.
    pub name: String,
    /// Reuse `<project>/<name>` instead of allocating a fresh suffix.
    pub exist_ok: bool,
    pub verbose: bool,
    pub augmentation: Augmentation,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            imgsz: 640,
            batch: 8,
            patience: 20,
            save: true,
            save_period: 10,
            workers: 8,
            project: "multi_class_training".to_string(),
            name: "terminal_contactor_v1".to_string(),
            exist_ok: true,
            verbose: true,
            augmentation: Augmentation::default(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> TrainingResult<()> {
        if self.epochs == 0 {
            return Err(TrainingError::InvalidRun("epochs must be >= 1".to_string()));
        }
        if self.imgsz == 0 {
            return Err(TrainingError::InvalidRun("imgsz must be >= 1".to_string()));
        }
        if self.batch == 0 {
            return Err(TrainingError::InvalidRun("batch must be >= 1".to_string()));
        }
        if self.project.trim().is_empty() {
            return Err(TrainingError::InvalidRun("run.project is required".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(TrainingError::InvalidRun("run.name is required".to_string()));
        }
        Ok(())
    }
}

/// Augmentation knobs forwarded to the trainer.
///
/// Vertical flips stay off by default: schematic symbols are orientation-sensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Augmentation {
    pub hsv_h: f64,
    pub hsv_s: f64,
    pub hsv_v: f64,
    pub degrees: f64,
    pub translate: f64,
    pub scale: f64,
    pub flipud: f64,
    pub fliplr: f64,
    pub mosaic: f64,
    pub mixup: f64,
}

impl Default for Augmentation {
    fn default() -> Self {
        Self {
            hsv_h: 0.015,
            hsv_s: 0.7,
            hsv_v: 0.4,
            degrees: 10.0,
            translate: 0.1,
            scale: 0.5,
            flipud: 0.0,
            fliplr: 0.5,
            mosaic: 1.0,
            mixup: 0.1,
        }
    }
}

impl Augmentation {
    /// Name/value pairs in the order the trainer documents them.
    #[must_use]
    pub fn pairs(&self) -> [(&'static str, f64); 10] {
        [
            ("hsv_h", self.hsv_h),
            ("hsv_s", self.hsv_s),
            ("hsv_v", self.hsv_v),
            ("degrees", self.degrees),
            ("translate", self.translate),
            ("scale", self.scale),
            ("flipud", self.flipud),
            ("fliplr", self.fliplr),
            ("mosaic", self.mosaic),
            ("mixup", self.mixup),
        ]
    }
}

/// How the external trainer is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSettings {
    /// Executable for the ultralytics CLI.
    pub command: String,
    /// Task mode (`detect`, `obb`, `classify`, ...).
    pub task: String,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self { command: "yolo".to_string(), task: "detect".to_string() }
    }
}

/// How accelerator availability is probed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Python interpreter that has `torch` installed.
    pub python: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self { python: "python3".to_string() }
    }
}
