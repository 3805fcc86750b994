use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn hydrocast(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("hydrocast").unwrap();
    cmd.current_dir(dir.path()).env_remove("HYDROCAST_CONFIG");
    cmd
}

fn write_config(dir: &TempDir, yaml: &str) -> String {
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, yaml).unwrap();
    path.display().to_string()
}

fn minimal_config(dir: &TempDir) -> String {
    let out = dir.path().join("forecasts");
    write_config(
        dir,
        &format!(
            r#"
forecaster:
  name: engine
  with:
    engine_path: /nonexistent/forecaster-binary
    batch_file: batch.xml
    output_dir: {}
"#,
            out.display()
        ),
    )
}

// ---------------------------------------------------------------------------
// hydrocast check
// ---------------------------------------------------------------------------

#[test]
fn check_accepts_a_valid_config() {
    let dir = TempDir::new().unwrap();
    let config = minimal_config(&dir);
    hydrocast(&dir)
        .args(["check", "--config", &config])
        .assert()
        .success()
        .stdout(predicate::str::contains("configuration OK"));
}

#[test]
fn check_reports_unknown_action_kinds() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
forecaster:
  name: engine
  with:
    batch_file: batch.xml
pre_actions:
  - name: bogus
    uses: teleport_data
"#,
    );
    hydrocast(&dir)
        .args(["check", "--config", &config])
        .assert()
        .failure()
        .stdout(predicate::str::contains("unknown kind 'teleport_data'"));
}

#[test]
fn check_json_output() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "pre_actions: []\n");
    let output = hydrocast(&dir)
        .args(["check", "--config", &config, "--json"])
        .output()
        .unwrap();
    let warnings: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(warnings.as_array().unwrap().iter().any(|w| {
        w["message"]
            .as_str()
            .unwrap()
            .contains("no 'forecaster' section")
    }));
}

#[test]
fn missing_config_flag_fails() {
    let dir = TempDir::new().unwrap();
    hydrocast(&dir)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no configuration file"));
}

#[test]
fn missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    hydrocast(&dir)
        .args(["check", "--config", "/nonexistent/config.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load configuration"));
}

// ---------------------------------------------------------------------------
// hydrocast run
// ---------------------------------------------------------------------------

#[test]
fn run_survives_a_missing_engine_binary() {
    // launch failures of the external engine are logged, not fatal
    let dir = TempDir::new().unwrap();
    let config = minimal_config(&dir);
    hydrocast(&dir)
        .args(["run", "--config", &config, "--date", "2022-10-01 06"])
        .assert()
        .success()
        .stdout(predicate::str::contains("forecast production run complete"));
}

#[test]
fn run_rejects_an_invalid_date() {
    let dir = TempDir::new().unwrap();
    let config = minimal_config(&dir);
    hydrocast(&dir)
        .args(["run", "--config", &config, "--date", "soon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid forecast date"));
}

#[test]
fn run_refuses_a_config_with_errors() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "pre_actions: []\n");
    hydrocast(&dir)
        .args(["run", "--config", &config])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn run_exhausts_retries_when_a_feed_never_appears() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("forecasts");
    // the sftp backend is not linked in, so this pre-action fails every
    // pass and the backward search runs to its bound
    let config = write_config(
        &dir,
        &format!(
            r#"
pre_actions:
  - name: unreachable feed
    uses: transfer_sftp_in
    with:
      local_dir: {}
      prefix: gfs
      hostname: nowhere.example.org
      username: u
      password: p
      remote_dir: /outgoing
      max_retry_hours: 12
      retry_step_hours: 6
forecaster:
  name: engine
  with:
    engine_path: /nonexistent/forecaster-binary
    batch_file: batch.xml
    output_dir: {}
"#,
            dir.path().join("staging").display(),
            out.display()
        ),
    );
    hydrocast(&dir)
        .args(["run", "--config", &config, "--date", "2022-10-01 06"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("retries exhausted"));
}

#[test]
fn run_exports_prv_from_engine_output() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("forecasts");
    let prv = dir.path().join("prv");

    // pre-place an artifact where the (failing) engine would have written it
    let day = out.join("2022/10/01");
    std::fs::create_dir_all(&day).unwrap();
    let artifact = serde_json::json!({
        "origin": "hydrocast",
        "creation_date": "2022-10-01 00:00",
        "method_id": "4Z",
        "specific_tag": "Alps",
        "predictand_dataset_id": "stations-v1",
        "station_ids": [42],
        "target_dates": [59853.25, 59853.5],
        "analogs_nb": [3, 3],
        "analog_values_raw": [[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]],
    });
    std::fs::write(
        day.join("2022-10-01_06.method.nc"),
        serde_json::to_string(&artifact).unwrap(),
    )
    .unwrap();

    let config = write_config(
        &dir,
        &format!(
            r#"
forecaster:
  name: engine
  with:
    engine_path: /nonexistent/forecaster-binary
    batch_file: batch.xml
    output_dir: {}
post_actions:
  - name: export prv
    uses: export_prv
    with:
      output_dir: {}
      frequencies: [0.5]
"#,
            out.display(),
            prv.display()
        ),
    );
    hydrocast(&dir)
        .args(["run", "--config", &config, "--date", "2022-10-01 06"])
        .assert()
        .success();

    let exported = prv.join("2022/10/01/2022-10-01_06.method.csv");
    let content = std::fs::read_to_string(&exported).unwrap();
    assert!(content.contains("# freqs;50"));
    assert!(content.contains("IdSeries;4Z.Alps.050"));
    assert!(content.contains("2022-10-01 06:00;2.00"));
    assert!(content.contains("2022-10-01 12:00;5.00"));
    assert!(content.contains("\r\n"));
}
