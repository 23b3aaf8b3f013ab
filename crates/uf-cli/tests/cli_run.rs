use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_uf-cli"))
}

fn repo_root() -> PathBuf {
    // crates/uf-cli -> repo root
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").canonicalize().unwrap()
}

fn fixture_path(name: &str) -> PathBuf {
    repo_root().join("tests/fixtures").join(name)
}

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("unfoldtest_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn stdout_json(out: &Output) -> serde_json::Value {
    assert!(out.status.success(), "command failed, stderr={}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).expect("stdout should be valid JSON")
}

#[test]
fn version_smoke() {
    let out = run(&["version"]);
    assert!(out.status.success(), "version should succeed");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("unfoldtest "), "unexpected stdout: {}", stdout);
}

#[test]
fn run_writes_report_to_stdout() {
    let config = fixture_path("gaussian_bayes.json");
    assert!(config.exists(), "missing fixture: {}", config.display());

    let v = stdout_json(&run(&["run", "--config", config.to_string_lossy().as_ref()]));
    assert_eq!(v["schema_version"], "unfoldtest_report_v1");
    assert_eq!(v["algorithm"], "bayes");
    assert_eq!(v["n_trials_requested"], 50);
    assert_eq!(v["n_trials_completed"], 50);
    assert_eq!(v["ndf"], 10);
    let bins = v["bins"].as_array().expect("bins should be an array");
    assert_eq!(bins.len(), 10);
    for b in bins {
        assert!(b["mean_residual"].as_f64().unwrap().is_finite());
        let cov = b["coverage_fraction"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&cov));
    }
    assert!(v["chi_square_sum"].as_f64().unwrap() >= 0.0);
}

#[test]
fn run_overrides_and_is_deterministic_across_threads() {
    let config = fixture_path("gaussian_bayes.json");
    let c = config.to_string_lossy();
    let seq = stdout_json(&run(&["run", "--config", c.as_ref(), "--trials", "20", "--seed", "5"]));
    let again = stdout_json(&run(&["run", "--config", c.as_ref(), "--trials", "20", "--seed", "5"]));
    assert_eq!(seq, again);
    assert_eq!(seq["n_trials_completed"], 20);
    assert_eq!(seq["config"]["seed"], 5);

    let par = stdout_json(&run(&[
        "run", "--config", c.as_ref(), "--trials", "20", "--seed", "5", "--threads", "3",
    ]));
    assert_eq!(seq["n_successful"], par["n_successful"]);
    assert_eq!(seq["coverage_fraction"], par["coverage_fraction"]);
    let a = seq["chi_square_sum"].as_f64().unwrap();
    let b = par["chi_square_sum"].as_f64().unwrap();
    assert!((a - b).abs() <= 1e-9 * a.abs().max(1.0));
}

#[test]
fn run_writes_report_and_toys_to_files() {
    let config = fixture_path("identity_passthrough.json");
    let report_path = tmp_path("report.json");
    let toys_path = tmp_path("toys.json");

    let out = run(&[
        "run",
        "--config",
        config.to_string_lossy().as_ref(),
        "--output",
        report_path.to_string_lossy().as_ref(),
        "--toys-output",
        toys_path.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let report: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&report_path).unwrap()).unwrap();
    assert_eq!(report["coverage_fraction"], 0.0);
    for b in report["bins"].as_array().unwrap() {
        assert_eq!(b["mean_residual"], 0.0);
        assert_eq!(b["pull_count"], 0);
    }

    let toys: serde_json::Value = serde_json::from_slice(&std::fs::read(&toys_path).unwrap()).unwrap();
    assert_eq!(toys.as_array().unwrap().len(), 100);

    let _ = std::fs::remove_file(&report_path);
    let _ = std::fs::remove_file(&toys_path);
}

#[test]
fn validate_reports_response_summary() {
    let config = fixture_path("gaussian_bayes.json");
    let v = stdout_json(&run(&["validate", "--config", config.to_string_lossy().as_ref()]));
    assert_eq!(v["valid"], true);
    let eff = v["efficiency"].as_array().unwrap();
    assert_eq!(eff.len(), 10);
    for e in eff {
        let e = e.as_f64().unwrap();
        assert!(e > 0.0 && e <= 1.0);
    }
    assert!(v["normalization_deviation"].as_f64().unwrap() < 1e-9);
}

#[test]
fn configuration_error_exits_non_zero() {
    let config = fixture_path("bad_algorithm.json");
    for cmd in ["validate", "run"] {
        let out = run(&[cmd, "--config", config.to_string_lossy().as_ref()]);
        assert!(!out.status.success(), "{cmd} should fail on a non-square invert config");
        let stderr = String::from_utf8_lossy(&out.stderr);
        assert!(stderr.contains("Configuration error"), "unexpected stderr: {}", stderr);
    }
}

#[test]
fn missing_config_file_fails() {
    let out = run(&["run", "--config", "/nonexistent/unfoldtest.json"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("failed to read config"));
}
