//! Integration tests for the `p8-train` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write a p8-train.toml that points every path into `root`.
fn write_config(root: &Path, trainer: &Path) -> PathBuf {
    let config = format!(
        r#"
customer_checkpoint = "{root}/customers/troester/models/plc_model_backup.pt"
dataset = "{root}/multi_class_data.yaml"
device = "cpu"

[run]
epochs = 2
project = "{root}/multi_class_training"
name = "terminal_contactor_v1"

[deploy]
dir = "{root}/customers/troester/models"
filename = "plc_model.pt"

[trainer]
command = "{trainer}"
"#,
        root = root.display(),
        trainer = trainer.display()
    );
    let path = root.join("p8-train.toml");
    fs::write(&path, config).unwrap();
    path
}

/// Stand-in for the ultralytics CLI. Writes `best.pt` only when `weights` is given.
#[cfg(unix)]
fn fake_yolo(root: &Path, weights: Option<&str>) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let save_dir = root.join("multi_class_training").join("terminal_contactor_v1");
    let write_best = weights
        .map(|w| format!("printf '{w}' > '{}/weights/best.pt'\n", save_dir.display()))
        .unwrap_or_default();
    let script = format!(
        "#!/bin/sh\n\
         if [ \"$1\" = version ]; then echo 8.3.0; exit 0; fi\n\
         mkdir -p '{dir}/weights'\n\
         {write_best}\
         echo '      1/2         0G      1.2'\n\
         echo '      2/2         0G      1.0'\n\
         echo 'Results saved to {dir}'\n",
        dir = save_dir.display()
    );
    let path = root.join("yolo");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn test_help() {
    let mut cmd = Command::cargo_bin("p8-train").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_missing_config_file_fails() {
    let temp = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("p8-train").unwrap();
    cmd.current_dir(temp.path())
        .arg("--config")
        .arg(temp.path().join("missing.toml"))
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_dataset_writes_descriptor() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("classes.txt"), "PLC\nTerminal\nContactor\n").unwrap();

    let mut cmd = Command::cargo_bin("p8-train").unwrap();
    cmd.arg("dataset").arg(temp.path()).assert().success().stdout(predicate::str::contains("dataset.yaml"));

    let yaml = fs::read_to_string(temp.path().join("dataset.yaml")).unwrap();
    assert!(yaml.contains("Contactor"));
    assert!(yaml.contains("images/train"));
}

#[test]
fn test_dataset_without_classes_fails() {
    let temp = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("p8-train").unwrap();
    cmd.arg("dataset").arg(temp.path()).assert().failure().stderr(predicate::str::contains("classes.txt"));
}

#[test]
fn test_status_without_deployment() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), Path::new("yolo"));

    let mut cmd = Command::cargo_bin("p8-train").unwrap();
    cmd.arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not found"));
}

#[test]
fn test_run_without_trainer_fails() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), &temp.path().join("no-such-yolo"));

    let mut cmd = Command::cargo_bin("p8-train").unwrap();
    cmd.arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("pip install ultralytics"));
    assert!(!temp.path().join("customers").exists());
}

#[cfg(unix)]
#[test]
fn test_run_promotes_best_checkpoint() {
    let temp = TempDir::new().unwrap();
    let yolo = fake_yolo(temp.path(), Some("trained-weights"));
    let config = write_config(temp.path(), &yolo);

    let mut cmd = Command::cargo_bin("p8-train").unwrap();
    cmd.arg("--config")
        .arg(&config)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Training complete"))
        .stderr(predicate::str::contains("starting from yolov8n.pt"))
        .stderr(predicate::str::contains("Model promoted"));

    let deployed = temp.path().join("customers/troester/models/plc_model.pt");
    assert_eq!(fs::read_to_string(&deployed).unwrap(), "trained-weights");

    let mut cmd = Command::cargo_bin("p8-train").unwrap();
    let assert = cmd.arg("--config").arg(&config).arg("status").arg("--json").assert().success();
    let json: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(json["deployed"], true);
    assert_eq!(json["manifest"]["seed"], "yolov8n.pt");
}

#[cfg(unix)]
#[test]
fn test_run_json_stdout_is_only_the_report() {
    let temp = TempDir::new().unwrap();
    let yolo = fake_yolo(temp.path(), Some("trained-weights"));
    let config = write_config(temp.path(), &yolo);

    let mut cmd = Command::cargo_bin("p8-train").unwrap();
    let assert = cmd.arg("--config").arg(&config).arg("run").arg("--json").assert().success();
    let output = assert.get_output();

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["device"]["type"], "cpu");
    assert_eq!(report["seed"]["type"], "pretrained");
    assert_eq!(report["seed"]["id"], "yolov8n.pt");
    assert_eq!(report["promotion"]["status"], "promoted");
    assert!(String::from_utf8_lossy(&output.stderr).contains("Model promoted"));
}

#[cfg(unix)]
#[test]
fn test_run_without_best_checkpoint_fails() {
    let temp = TempDir::new().unwrap();
    let yolo = fake_yolo(temp.path(), None);
    let config = write_config(temp.path(), &yolo);

    let mut cmd = Command::cargo_bin("p8-train").unwrap();
    cmd.arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("best checkpoint does not exist"));

    assert!(!temp.path().join("customers/troester/models/plc_model.pt").exists());
}

#[cfg(unix)]
#[test]
fn test_run_continues_from_customer_checkpoint() {
    let temp = TempDir::new().unwrap();
    let yolo = fake_yolo(temp.path(), Some("continued"));
    let config = write_config(temp.path(), &yolo);
    let models = temp.path().join("customers/troester/models");
    fs::create_dir_all(&models).unwrap();
    fs::write(models.join("plc_model_backup.pt"), "backup").unwrap();

    let mut cmd = Command::cargo_bin("p8-train").unwrap();
    cmd.arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stderr(predicate::str::contains("Previous model found"));

    assert_eq!(fs::read_to_string(models.join("plc_model.pt")).unwrap(), "continued");
    assert_eq!(fs::read_to_string(models.join("plc_model_backup.pt")).unwrap(), "backup");
}
