//! Compute device selection.
//!
//! The trainer runs on whatever device we hand it. Availability is asked of
//! the same Python runtime the trainer uses, so "accelerated" means the
//! trainer will actually see the GPU.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Device handed to the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Device {
    Cuda { index: u32 },
    Mps,
    Cpu,
}

impl Device {
    #[must_use]
    pub fn is_accelerated(&self) -> bool {
        !matches!(self, Self::Cpu)
    }

    /// Value for the trainer's `device=` option.
    #[must_use]
    pub fn trainer_arg(&self) -> String {
        match self {
            Self::Cuda { index } => index.to_string(),
            Self::Mps => "mps".to_string(),
            Self::Cpu => "cpu".to_string(),
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cuda { index } => write!(f, "GPU (CUDA:{index})"),
            Self::Mps => write!(f, "GPU (Apple MPS)"),
            Self::Cpu => write!(f, "CPU"),
        }
    }
}

/// An accelerator reported by a probe.
#[derive(Debug, Clone, PartialEq)]
pub struct Accelerator {
    pub device: Device,
    pub name: Option<String>,
    pub memory_gb: Option<f64>,
}

impl Accelerator {
    #[must_use]
    pub fn cuda(index: u32) -> Self {
        Self { device: Device::Cuda { index }, name: None, memory_gb: None }
    }

    #[must_use]
    pub fn mps() -> Self {
        Self { device: Device::Mps, name: None, memory_gb: None }
    }
}

/// Reports whether an accelerator is usable right now.
#[async_trait]
pub trait AcceleratorProbe: Send + Sync {
    async fn probe(&self) -> Option<Accelerator>;
}

/// Probe with a predetermined answer.
#[derive(Debug, Clone, Default)]
pub struct FixedProbe(pub Option<Accelerator>);

impl FixedProbe {
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }
}

#[async_trait]
impl AcceleratorProbe for FixedProbe {
    async fn probe(&self) -> Option<Accelerator> {
        self.0.clone()
    }
}

const TORCH_PROBE_SCRIPT: &str = r#"import json, torch
out = {"cuda": torch.cuda.is_available(), "mps": bool(getattr(torch.backends, "mps", None) and torch.backends.mps.is_available())}
if out["cuda"]:
    props = torch.cuda.get_device_properties(0)
    out["name"] = props.name
    out["memory"] = props.total_memory
print(json.dumps(out))
"#;

/// Importing torch can take a while on a cold cache.
const PROBE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct TorchReport {
    cuda: bool,
    #[serde(default)]
    mps: bool,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    memory: Option<u64>,
}

/// Asks `torch` (through a Python interpreter) for CUDA, then MPS.
#[derive(Debug, Clone)]
pub struct TorchProbe {
    python: String,
}

impl TorchProbe {
    #[must_use]
    pub fn new(python: impl Into<String>) -> Self {
        Self { python: python.into() }
    }
}

#[async_trait]
impl AcceleratorProbe for TorchProbe {
    async fn probe(&self) -> Option<Accelerator> {
        let mut command = Command::new(&self.python);
        command.arg("-c").arg(TORCH_PROBE_SCRIPT).stdin(Stdio::null()).kill_on_drop(true);

        let output = match tokio::time::timeout(PROBE_TIMEOUT, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(python = %self.python, error = %e, "accelerator probe could not start");
                return None;
            }
            Err(_) => {
                warn!(python = %self.python, "accelerator probe timed out after {:?}", PROBE_TIMEOUT);
                return None;
            }
        };

        if !output.status.success() {
            debug!(
                python = %self.python,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "accelerator probe failed"
            );
            return None;
        }

        parse_torch_report(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Decode the probe script's JSON line. Anything unexpected means no accelerator.
pub(crate) fn parse_torch_report(stdout: &str) -> Option<Accelerator> {
    let line = stdout.lines().rev().map(str::trim).find(|l| !l.is_empty())?;
    let report: TorchReport = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            debug!(error = %e, "unrecognized accelerator probe output");
            return None;
        }
    };

    if report.cuda {
        return Some(Accelerator {
            device: Device::Cuda { index: 0 },
            name: report.name,
            memory_gb: report.memory.map(|bytes| bytes as f64 / 1e9),
        });
    }
    if report.mps {
        return Some(Accelerator::mps());
    }
    None
}

/// Pick the device for this run. Falls back to CPU; never fails.
pub async fn select_device(probe: &dyn AcceleratorProbe) -> Device {
    match probe.probe().await {
        Some(accel) => {
            match (&accel.name, accel.memory_gb) {
                (Some(name), Some(gb)) => info!("Device: {} - {} ({:.1} GB)", accel.device, name, gb),
                (Some(name), None) => info!("Device: {} - {}", accel.device, name),
                _ => info!("Device: {}", accel.device),
            }
            accel.device
        }
        None => {
            info!("Device: CPU (no accelerator detected, training will be slow)");
            Device::Cpu
        }
    }
}

/// Configured device preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceSetting {
    #[default]
    Auto,
    Cpu,
    Cuda(u32),
    Mps,
}

impl DeviceSetting {
    /// Apply the preference. Only `Auto` consults the probe.
    pub async fn resolve(self, probe: &dyn AcceleratorProbe) -> Device {
        let device = match self {
            Self::Auto => return select_device(probe).await,
            Self::Cpu => Device::Cpu,
            Self::Cuda(index) => Device::Cuda { index },
            Self::Mps => Device::Mps,
        };
        info!("Device: {} (forced by configuration)", device);
        device
    }
}

impl FromStr for DeviceSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "mps" => Ok(Self::Mps),
            "cuda" | "gpu" => Ok(Self::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|idx| idx.parse().ok())
                .map(Self::Cuda)
                .ok_or_else(|| format!("unknown device '{other}' (expected auto, cpu, mps, cuda:<n>)")),
        }
    }
}

impl TryFrom<String> for DeviceSetting {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceSetting> for String {
    fn from(value: DeviceSetting) -> Self {
        match value {
            DeviceSetting::Auto => "auto".to_string(),
            DeviceSetting::Cpu => "cpu".to_string(),
            DeviceSetting::Cuda(index) => format!("cuda:{index}"),
            DeviceSetting::Mps => "mps".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_select_device_accelerated_iff_probe_reports() {
        assert_eq!(select_device(&FixedProbe(Some(Accelerator::cuda(0)))).await, Device::Cuda { index: 0 });
        assert_eq!(select_device(&FixedProbe(Some(Accelerator::mps()))).await, Device::Mps);
        assert_eq!(select_device(&FixedProbe::none()).await, Device::Cpu);
        assert!(!select_device(&FixedProbe::none()).await.is_accelerated());
    }

    #[test]
    fn test_trainer_arg() {
        assert_eq!(Device::Cuda { index: 0 }.trainer_arg(), "0");
        assert_eq!(Device::Mps.trainer_arg(), "mps");
        assert_eq!(Device::Cpu.trainer_arg(), "cpu");
    }

    #[test]
    fn test_parse_torch_report_cuda() {
        let out = "some warning\n{\"cuda\": true, \"mps\": false, \"name\": \"RTX 3060\", \"memory\": 12000000000}\n";
        let accel = parse_torch_report(out).unwrap();
        assert_eq!(accel.device, Device::Cuda { index: 0 });
        assert_eq!(accel.name.as_deref(), Some("RTX 3060"));
        assert!((accel.memory_gb.unwrap() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_torch_report_fallbacks() {
        assert_eq!(parse_torch_report("{\"cuda\": false, \"mps\": true}").unwrap().device, Device::Mps);
        assert!(parse_torch_report("{\"cuda\": false, \"mps\": false}").is_none());
        assert!(parse_torch_report("Traceback: no module named torch").is_none());
        assert!(parse_torch_report("").is_none());
    }

    #[tokio::test]
    async fn test_torch_probe_missing_interpreter_is_cpu() {
        let probe = TorchProbe::new("definitely-not-a-python-xyz123");
        assert_eq!(select_device(&probe).await, Device::Cpu);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_torch_probe_reads_interpreter_report() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let python = temp.path().join("python3");
        std::fs::write(&python, "#!/bin/sh\necho '{\"cuda\": false, \"mps\": true}'\n").unwrap();
        std::fs::set_permissions(&python, std::fs::Permissions::from_mode(0o755)).unwrap();

        let probe = TorchProbe::new(python.display().to_string());
        assert_eq!(select_device(&probe).await, Device::Mps);
    }

    #[test]
    fn test_device_setting_parse() {
        assert_eq!("auto".parse::<DeviceSetting>().unwrap(), DeviceSetting::Auto);
        assert_eq!("CPU".parse::<DeviceSetting>().unwrap(), DeviceSetting::Cpu);
        assert_eq!("cuda:2".parse::<DeviceSetting>().unwrap(), DeviceSetting::Cuda(2));
        assert_eq!("cuda".parse::<DeviceSetting>().unwrap(), DeviceSetting::Cuda(0));
        assert!("tpu".parse::<DeviceSetting>().is_err());
        assert_eq!(String::from(DeviceSetting::Cuda(1)), "cuda:1");
    }

    #[tokio::test]
    async fn test_device_setting_forced_ignores_probe() {
        let probe = FixedProbe(Some(Accelerator::cuda(0)));
        assert_eq!(DeviceSetting::Cpu.resolve(&probe).await, Device::Cpu);
        assert_eq!(DeviceSetting::Auto.resolve(&FixedProbe::none()).await, Device::Cpu);
    }
}
