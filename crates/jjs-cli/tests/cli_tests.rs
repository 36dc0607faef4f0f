use assert_cmd::Command;
use jjs_core::jast::JProgram;
use jjs_test_helpers::fixtures;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn jjsc_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("jjsc"))
}

/// Serialize `program` into `dir` and return its path
fn write_program(dir: &Path, program: &JProgram) -> PathBuf {
    let path = dir.join("program.json");
    fs::write(&path, serde_json::to_string(program).unwrap()).unwrap();
    path
}

fn files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.to_string_lossy().ends_with(suffix))
        .collect()
}

// ============================================================================
// COMPILATION
// ============================================================================

#[test]
fn test_compiles_program_to_strong_named_file() {
    let temp_dir = TempDir::new().unwrap();
    let program = write_program(temp_dir.path(), &fixtures::hello_program());

    jjsc_cmd()
        .current_dir(&temp_dir)
        .arg(&program)
        .arg("--entry")
        .arg(fixtures::MAIN_CLASS)
        .assert()
        .success()
        .stdout(predicate::str::contains(".cache.js"));

    let out = temp_dir.path().join("out");
    let outputs = files_with_suffix(&out, ".cache.js");
    assert_eq!(outputs.len(), 1);
    let js = fs::read_to_string(&outputs[0]).unwrap();
    assert!(js.contains("Hello, world"));

    let stem = outputs[0].file_name().unwrap().to_string_lossy().replace(".cache.js", "");
    assert_eq!(stem.len(), 64, "strong name should be a blake3 hex digest");
    assert!(out.join("permutations.json").exists());
}

#[test]
fn test_side_artifacts_are_written_on_request() {
    let temp_dir = TempDir::new().unwrap();
    let program = write_program(temp_dir.path(), &fixtures::counter_program());

    jjsc_cmd()
        .current_dir(&temp_dir)
        .arg(&program)
        .args(["--entry", fixtures::MAIN_CLASS])
        .args(["--source-map", "--symbol-map", "--report"])
        .assert()
        .success();

    let out = temp_dir.path().join("out");
    assert_eq!(files_with_suffix(&out, ".cache.js.map").len(), 1);
    assert_eq!(files_with_suffix(&out, ".symbolMap").len(), 1);
    let reports = files_with_suffix(&out, ".report.json");
    assert_eq!(reports.len(), 1);

    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&reports[0]).unwrap()).unwrap();
    let classes = report["classes"].as_array().unwrap();
    assert!(classes.iter().any(|c| c["name"] == "app.Counter"));

    let source_map: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&files_with_suffix(&out, ".cache.js.map")[0]).unwrap()).unwrap();
    assert_eq!(source_map["version"], 3);
}

#[test]
fn test_one_file_per_permutation_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let program = write_program(temp_dir.path(), &fixtures::rebind_program());
    let config = r#"
compilerOptions:
  output: PRETTY
module:
  name: app
  entryPoints:
    - app.Main
permutations:
  - rebinds:
      app.Greeter: app.English
  - rebinds:
      app.Greeter: app.French
"#;
    fs::write(temp_dir.path().join("jjs.yaml"), config).unwrap();

    jjsc_cmd()
        .current_dir(&temp_dir)
        .arg(&program)
        .assert()
        .success()
        .stdout(predicate::str::contains("Permutation 0"))
        .stdout(predicate::str::contains("Permutation 1"));

    let out = temp_dir.path().join("out");
    assert_eq!(files_with_suffix(&out, ".cache.js").len(), 2);
    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("permutations.json")).unwrap()).unwrap();
    assert_eq!(manifest[1]["rebinds"]["app.Greeter"], "app.French");
}

#[test]
fn test_json_config_and_custom_out_dir() {
    let temp_dir = TempDir::new().unwrap();
    let program = write_program(temp_dir.path(), &fixtures::hello_program());
    let config = r#"{ "module": { "name": "app", "entryPoints": ["app.Main"] } }"#;
    fs::write(temp_dir.path().join("build.json"), config).unwrap();

    jjsc_cmd()
        .current_dir(&temp_dir)
        .arg(&program)
        .args(["--config", "build.json", "--out-dir", "dist", "--output", "detailed"])
        .assert()
        .success();

    assert_eq!(files_with_suffix(&temp_dir.path().join("dist"), ".cache.js").len(), 1);
}

#[test]
fn test_validate_only_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let program = write_program(temp_dir.path(), &fixtures::hello_program());

    jjsc_cmd()
        .current_dir(&temp_dir)
        .arg(&program)
        .args(["--entry", fixtures::MAIN_CLASS, "--validate-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation succeeded"));

    assert!(!temp_dir.path().join("out").exists());
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_missing_entry_class_fails() {
    let temp_dir = TempDir::new().unwrap();
    let program = write_program(temp_dir.path(), &fixtures::hello_program());

    jjsc_cmd()
        .current_dir(&temp_dir)
        .arg(&program)
        .args(["--entry", "app.DoesNotExist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("app.DoesNotExist"));
}

#[test]
fn test_no_program_is_an_error() {
    let temp_dir = TempDir::new().unwrap();

    jjsc_cmd()
        .current_dir(&temp_dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No program specified"));
}

#[test]
fn test_malformed_program_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("broken.json"), "{ not json").unwrap();

    jjsc_cmd()
        .current_dir(&temp_dir)
        .arg("broken.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a serialized program"));
}

#[test]
fn test_invalid_config_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let program = write_program(temp_dir.path(), &fixtures::hello_program());
    fs::write(temp_dir.path().join("jjs.yaml"), "compilerOptions: [1, 2").unwrap();

    jjsc_cmd()
        .current_dir(&temp_dir)
        .arg(&program)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load"));
}

// ============================================================================
// PROJECT INITIALIZATION
// ============================================================================

#[test]
fn test_init_creates_config_file() {
    let temp_dir = TempDir::new().unwrap();

    jjsc_cmd()
        .current_dir(&temp_dir)
        .arg("--init")
        .assert()
        .success()
        .stdout(predicate::str::contains("jjs.yaml"));

    let config = fs::read_to_string(temp_dir.path().join("jjs.yaml")).unwrap();
    assert!(config.contains("compilerOptions"));
    assert!(config.contains("entryPoints"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("jjs.yaml"), "module: {}").unwrap();

    jjsc_cmd()
        .current_dir(&temp_dir)
        .arg("--init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}
