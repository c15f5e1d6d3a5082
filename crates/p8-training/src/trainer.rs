use crate::artifacts::RunResult;
use crate::config::RunConfig;
use crate::dataset::DatasetDescriptor;
use crate::device::Device;
use crate::error::TrainingResult;
use crate::progress::ProgressSink;
use crate::seed::SeedCheckpoint;
use async_trait::async_trait;

/// An object-detection training backend.
///
/// The orchestrator only needs to load starting weights and run one
/// synchronous training pass that reports where it saved its output.
#[async_trait]
pub trait Trainer: Send + Sync {
    /// Loaded starting weights, in whatever form the backend needs.
    type Model: Send;

    fn id(&self) -> &'static str;

    /// Whether the backend can run on this machine.
    async fn is_available(&self) -> bool;

    fn load_checkpoint(&self, seed: &SeedCheckpoint) -> TrainingResult<Self::Model>;

    /// Train until completion. Errors are returned as-is; nothing is retried.
    async fn train(
        &self,
        model: Self::Model,
        dataset: &DatasetDescriptor,
        run: &RunConfig,
        device: &Device,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<RunResult>;
}
