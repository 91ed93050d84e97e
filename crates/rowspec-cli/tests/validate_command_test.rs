use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn cargo_bin() -> PathBuf {
    if let Ok(path) = env::var("CARGO_BIN_EXE_rowspec") {
        return PathBuf::from(path);
    }

    let target_dir = env::var("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| repo_root().join("target"));
    let executable_name = format!("rowspec{}", std::env::consts::EXE_SUFFIX);
    let fallback = target_dir.join("debug").join(executable_name);

    if fallback.exists() {
        return fallback;
    }

    panic!(
        "CARGO_BIN_EXE_rowspec is not set and fallback binary was not found at {}",
        fallback.display()
    );
}

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

fn testdata_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

struct TempFile {
    path: PathBuf,
}

impl TempFile {
    fn create(name: &str, extension: &str, content: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after UNIX_EPOCH")
            .as_nanos();
        let path = env::temp_dir().join(format!(
            "rowspec-cli-{name}-{}-{nanos}.{extension}",
            std::process::id()
        ));
        fs::write(&path, content).expect("temporary file should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn run_validate(columns: &Path, schema: &str, extra: &[&str]) -> Output {
    let declarations = testdata_path("shapes.yaml");
    Command::new(cargo_bin())
        .args([
            "validate",
            "-d",
            declarations.to_string_lossy().as_ref(),
            "-s",
            schema,
            "-c",
            columns.to_string_lossy().as_ref(),
        ])
        .args(extra)
        .output()
        .expect("rowspec validate should execute")
}

fn assert_exit_code(output: &Output, expected: i32) {
    let actual = output.status.code().unwrap_or(-1);
    assert_eq!(
        actual,
        expected,
        "unexpected exit code; stdout: {}; stderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn validate_accepts_compliant_columns_with_extras() {
    let output = run_validate(&testdata_path("square_columns.json"), "shapes.square@1", &[]);

    assert_exit_code(&output, 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("shapes.square@1: compliant"));
}

#[test]
fn validate_reports_first_violation_by_default() {
    let output = run_validate(&testdata_path("broken_columns.yaml"), "shapes.square@1", &[]);

    assert_exit_code(&output, 1);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 violation(s)"));
    assert!(stdout.contains("field 'id': expected a subtype of Union{UUID, UInt128}, found Int64"));
    assert!(!stdout.contains("missing field 'side'"));
}

#[test]
fn validate_all_reports_every_violation_in_field_order() {
    let output = run_validate(
        &testdata_path("broken_columns.yaml"),
        "shapes.square@1",
        &["--all"],
    );

    assert_exit_code(&output, 1);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 violation(s)"));
    let id = stdout.find("field 'id'").expect("id violation should be listed");
    let side = stdout
        .find("missing field 'side'")
        .expect("side violation should be listed");
    assert!(id < side);
}

#[test]
fn validate_parent_version_ignores_child_fields() {
    let columns = TempFile::create(
        "base-columns",
        "json",
        r#"{"columns": [{"name": "id", "type": "UUID"}]}"#,
    );
    let output = run_validate(columns.path(), "shapes.base@1", &[]);

    assert_exit_code(&output, 0);
}

#[test]
fn validate_fails_for_undeclared_schema_version() {
    let output = run_validate(&testdata_path("square_columns.json"), "shapes.square@7", &[]);

    assert_exit_code(&output, 2);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("shapes.square@7 is not declared in this process"));
    assert!(stderr.contains("Shapes 0.3.1"));
}

#[test]
fn validate_fails_when_declarations_are_missing() {
    let missing = repo_root().join("does-not-exist.yaml");
    let output = Command::new(cargo_bin())
        .args([
            "validate",
            "-d",
            missing.to_string_lossy().as_ref(),
            "-s",
            "shapes.square@1",
            "-c",
            testdata_path("square_columns.json").to_string_lossy().as_ref(),
        ])
        .output()
        .expect("rowspec validate should execute");

    assert_exit_code(&output, 2);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load declarations"));
}
