//! Trainer backed by the ultralytics `yolo` command-line tool.

use crate::artifacts::RunResult;
use crate::config::{RunConfig, TrainerSettings};
use crate::dataset::DatasetDescriptor;
use crate::device::Device;
use crate::error::{TrainingError, TrainingResult};
use crate::layout::RunLayout;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::seed::SeedCheckpoint;
use crate::trainer::Trainer;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

static ANSI_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("ANSI regex should be valid"));

// "      3/50      2.39G      1.234 ..." (GPU_mem column is "0G" on CPU)
static EPOCH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)/(\d+)\s+[\d.]+G\b").expect("epoch regex should be valid")
});

static SAVE_DIR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Results saved to (.+)$").expect("save dir regex should be valid"));

/// Lines of trainer output kept for error messages.
const TAIL_LINES: usize = 20;

/// Upper bound for `yolo version`; the first call may import torch.
const VERSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Starting weights as the CLI understands them: a path or a hub identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UltralyticsModel {
    pub reference: String,
}

#[derive(Debug, Clone)]
pub struct UltralyticsCli {
    command: String,
    task: String,
}

impl UltralyticsCli {
    #[must_use]
    pub fn new(command: impl Into<String>, task: impl Into<String>) -> Self {
        Self { command: command.into(), task: task.into() }
    }

    #[must_use]
    pub fn from_settings(settings: &TrainerSettings) -> Self {
        Self::new(settings.command.clone(), settings.task.clone())
    }

    /// Arguments for `yolo <task> train ...`.
    #[must_use]
    pub fn train_args(
        &self,
        model: &UltralyticsModel,
        dataset: &DatasetDescriptor,
        run: &RunConfig,
        device: &Device,
    ) -> Vec<String> {
        let save_period = if run.save_period == 0 { -1 } else { i64::from(run.save_period) };
        let mut args = vec![
            self.task.clone(),
            "train".to_string(),
            format!("model={}", model.reference),
            format!("data={}", dataset.path().display()),
            format!("epochs={}", run.epochs),
            format!("imgsz={}", run.imgsz),
            format!("batch={}", run.batch),
            format!("device={}", device.trainer_arg()),
            format!("patience={}", run.patience),
            format!("save={}", py_bool(run.save)),
            format!("save_period={save_period}"),
            format!("workers={}", run.workers),
            format!("project={}", run.project),
            format!("name={}", run.name),
            format!("exist_ok={}", py_bool(run.exist_ok)),
            format!("verbose={}", py_bool(run.verbose)),
        ];
        args.extend(run.augmentation.pairs().iter().map(|(k, v)| format!("{k}={v}")));
        args
    }
}

fn py_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

/// Decode and clear a buffered line. Bytes that are not UTF-8 are replaced.
fn take_line(buf: &mut Vec<u8>) -> String {
    let line = String::from_utf8_lossy(buf).trim_end_matches(['\n', '\r']).to_string();
    buf.clear();
    line
}

/// Reduce a raw output line to what a terminal would finally show.
fn clean_line(raw: &str) -> String {
    let last = raw.rsplit('\r').find(|s| !s.trim().is_empty()).unwrap_or("");
    ANSI_REGEX.replace_all(last, "").trim_end().to_string()
}

fn parse_epoch(line: &str) -> Option<(u32, u32)> {
    let caps = EPOCH_REGEX.captures(line)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

fn parse_save_dir(line: &str) -> Option<PathBuf> {
    SAVE_DIR_REGEX.captures(line).map(|caps| PathBuf::from(caps[1].trim()))
}

#[async_trait]
impl Trainer for UltralyticsCli {
    type Model = UltralyticsModel;

    fn id(&self) -> &'static str {
        "ultralytics-cli"
    }

    async fn is_available(&self) -> bool {
        let mut command = Command::new(&self.command);
        command
            .arg("version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(VERSION_TIMEOUT, command.status()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!(command = %self.command, error = %e, "trainer CLI could not start");
                false
            }
            Err(_) => {
                warn!(command = %self.command, "trainer CLI did not answer 'version' within {:?}", VERSION_TIMEOUT);
                false
            }
        }
    }

    fn load_checkpoint(&self, seed: &SeedCheckpoint) -> TrainingResult<UltralyticsModel> {
        if let SeedCheckpoint::Customer { path } = seed {
            if !path.is_file() {
                return Err(TrainingError::Trainer(format!(
                    "seed checkpoint disappeared: {}",
                    path.display()
                )));
            }
        }
        Ok(UltralyticsModel { reference: seed.reference() })
    }

    async fn train(
        &self,
        model: UltralyticsModel,
        dataset: &DatasetDescriptor,
        run: &RunConfig,
        device: &Device,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<RunResult> {
        let args = self.train_args(&model, dataset, run, device);
        let run_id = run.name.clone();
        debug!(command = %self.command, args = ?args, "spawning trainer");

        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TrainingError::Trainer(format!("failed to start '{}': {}", self.command, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TrainingError::Trainer("trainer stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TrainingError::Trainer("trainer stderr not captured".to_string()))?;

        progress.on_event(ProgressEvent::Started { run: run_id.clone() });

        let mut out_reader = BufReader::new(stdout);
        let mut err_reader = BufReader::new(stderr);
        let (mut out_buf, mut err_buf) = (Vec::new(), Vec::new());
        let (mut out_done, mut err_done) = (false, false);
        let mut reported_save_dir: Option<PathBuf> = None;
        let mut last_epoch = 0;
        let mut tail: VecDeque<String> = VecDeque::with_capacity(TAIL_LINES);

        while !(out_done && err_done) {
            let raw = tokio::select! {
                read = out_reader.read_until(b'\n', &mut out_buf), if !out_done => {
                    if read? == 0 { out_done = true; continue; }
                    take_line(&mut out_buf)
                },
                read = err_reader.read_until(b'\n', &mut err_buf), if !err_done => {
                    if read? == 0 { err_done = true; continue; }
                    take_line(&mut err_buf)
                },
            };

            let line = clean_line(&raw);
            if line.is_empty() {
                continue;
            }

            if let Some((epoch, total)) = parse_epoch(&line) {
                if epoch != last_epoch {
                    last_epoch = epoch;
                    progress.on_event(ProgressEvent::Epoch { run: run_id.clone(), epoch, total });
                }
            }
            if let Some(dir) = parse_save_dir(&line) {
                reported_save_dir = Some(dir);
            }

            if tail.len() == TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.clone());
            progress.on_event(ProgressEvent::Line { run: run_id.clone(), line });
        }

        let status = child.wait().await?;
        if !status.success() {
            let tail: Vec<String> = tail.into_iter().collect();
            return Err(TrainingError::Trainer(format!(
                "'{}' exited with {}\n{}",
                self.command,
                status,
                tail.join("\n")
            )));
        }

        progress.on_event(ProgressEvent::Finished { run: run_id });

        let save_dir = reported_save_dir.unwrap_or_else(|| {
            RunLayout::for_project(Path::new(&run.project), &run.name).root().to_path_buf()
        });
        info!("Run output: {}", save_dir.display());
        Ok(RunResult::from_save_dir(save_dir))
    }
}
