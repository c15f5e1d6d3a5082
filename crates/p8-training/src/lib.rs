//! P8 Training
//!
//! Orchestration for fine-tuning the schematic object detector:
//! - Choosing a compute device and a seed checkpoint
//! - Running an external trainer behind the `Trainer` capability
//! - Reading run output (best checkpoint, validation metrics)
//! - Promoting the best checkpoint to the deployment path

pub mod artifacts;
pub mod config;
pub mod dataset;
pub mod device;
pub mod error;
pub mod layout;
pub mod orchestrator;
pub mod progress;
pub mod promote;
pub mod seed;
pub mod trainer;
pub mod ultralytics;

pub use artifacts::{sha256_file, DeploymentManifest, RunMetrics, RunResult};
pub use config::{Augmentation, OrchestratorConfig, ProbeSettings, RunConfig, TrainerSettings, DEFAULT_CONFIG_FILE};
pub use dataset::{generate_dataset_descriptor, DatasetDescriptor};
pub use device::{select_device, Accelerator, AcceleratorProbe, Device, DeviceSetting, FixedProbe, TorchProbe};
pub use error::{TrainingError, TrainingResult};
pub use layout::RunLayout;
pub use orchestrator::{Orchestrator, RunReport};
pub use progress::{ProgressEvent, ProgressSink, RecordingProgressSink, TracingProgressSink};
pub use promote::{check_policy, promote_best, DeploymentTarget, PromotionOutcome, PromotionPolicy};
pub use seed::{select_seed, SeedCheckpoint};
pub use trainer::Trainer;
pub use ultralytics::{UltralyticsCli, UltralyticsModel};
