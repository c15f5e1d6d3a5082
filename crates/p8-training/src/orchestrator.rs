//! One end-to-end fine-tuning run.
//!
//! Strictly linear: select device, select seed, train, promote. Every error
//! after device selection is returned to the caller unchanged; nothing is
//! retried and partially written run output is left where it is.

use crate::artifacts::RunResult;
use crate::config::OrchestratorConfig;
use crate::dataset::DatasetDescriptor;
use crate::device::{AcceleratorProbe, Device};
use crate::error::TrainingResult;
use crate::progress::ProgressSink;
use crate::promote::{promote_best, PromotionOutcome};
use crate::seed::{select_seed, SeedCheckpoint};
use crate::trainer::Trainer;
use serde::Serialize;
use tracing::info;

/// Everything a completed run decided and produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub device: Device,
    pub seed: SeedCheckpoint,
    pub result: RunResult,
    pub promotion: PromotionOutcome,
}

pub struct Orchestrator<T, P> {
    config: OrchestratorConfig,
    trainer: T,
    probe: P,
}

impl<T, P> Orchestrator<T, P>
where
    T: Trainer,
    P: AcceleratorProbe,
{
    pub fn new(config: OrchestratorConfig, trainer: T, probe: P) -> Self {
        Self { config, trainer, probe }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn trainer(&self) -> &T {
        &self.trainer
    }

    pub async fn select_device(&self) -> Device {
        self.config.device.resolve(&self.probe).await
    }

    pub fn select_seed(&self) -> SeedCheckpoint {
        select_seed(&self.config.customer_checkpoint, &self.config.pretrained_model)
    }

    pub async fn run(&self, progress: &dyn ProgressSink) -> TrainingResult<RunReport> {
        self.config.validate()?;

        let device = self.select_device().await;
        let seed = self.select_seed();

        let run = &self.config.run;
        info!(
            "Training with {}: epochs={} imgsz={} batch={} patience={} device={}",
            self.trainer.id(),
            run.epochs,
            run.imgsz,
            run.batch,
            run.patience,
            device
        );

        let model = self.trainer.load_checkpoint(&seed)?;
        let dataset = DatasetDescriptor::new(self.config.dataset.clone());
        let result = self.trainer.train(model, &dataset, run, &device, progress).await?;

        info!("Training complete. Best model: {}", result.best_checkpoint().display());
        info!("Metrics: {}", result.metrics);

        let promotion =
            promote_best(&result, &self.config.deploy, self.config.promotion, &seed, Some(device))?;

        Ok(RunReport { device, seed, result, promotion })
    }
}
