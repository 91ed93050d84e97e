use std::env;
use std::path::PathBuf;
use std::process::{Command, Output};

fn cargo_bin() -> PathBuf {
    if let Ok(path) = env::var("CARGO_BIN_EXE_rowspec") {
        return PathBuf::from(path);
    }

    let target_dir = env::var("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                .join("..")
                .join("..")
                .join("target")
        });
    let fallback = target_dir
        .join("debug")
        .join(format!("rowspec{}", std::env::consts::EXE_SUFFIX));

    if fallback.exists() {
        return fallback;
    }

    panic!(
        "CARGO_BIN_EXE_rowspec is not set and fallback binary was not found at {}",
        fallback.display()
    );
}

fn testdata_path(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn run(args: &[&str]) -> Output {
    Command::new(cargo_bin())
        .args(args)
        .output()
        .expect("rowspec should execute")
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
fn parse_id_lists_chain_most_specific_first() {
    let output = run(&["parse-id", "shapes.square@2>shapes.base@1"]);

    assert_exit_code(&output, 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        "0: shapes.square version 2\n1: shapes.base version 1"
    );
}

#[test]
fn parse_id_rejects_malformed_identifier() {
    let output = run(&["parse-id", "shapes.square@two"]);

    assert_exit_code(&output, 2);
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}

#[test]
fn show_prints_merged_fields_and_identifier() {
    let declarations = testdata_path("shapes.yaml");
    let output = run(&["show", "-d", &declarations, "-s", "shapes.square@1"]);

    assert_exit_code(&output, 0);
    let summaries: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("show should print JSON");
    let square = &summaries[0];
    assert_eq!(square["identifier"], "shapes.square@1>shapes.base@1");
    assert_eq!(square["parent"], "shapes.base@1");
    assert_eq!(square["record_name"], "ShapesSquareV1");
    assert_eq!(square["constraints"][0], "side > 0");

    let names: Vec<&str> = square["fields"]
        .as_array()
        .expect("fields should be an array")
        .iter()
        .filter_map(|f| f["name"].as_str())
        .collect();
    assert_eq!(names, vec!["id", "label", "area", "side"]);
    assert_eq!(square["fields"][2]["type"], "Float64");
}

#[test]
fn show_without_schema_lists_every_version() {
    let declarations = testdata_path("shapes.yaml");
    let output = run(&["show", "-d", &declarations]);

    assert_exit_code(&output, 0);
    let summaries: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("show should print JSON");
    assert_eq!(summaries.as_array().map(Vec::len), Some(2));
    assert_eq!(summaries[0]["schema_version"], "shapes.base@1");
}

#[test]
fn construct_prints_record_with_computed_fields() {
    let declarations = testdata_path("shapes.yaml");
    let row = testdata_path("square_row.json");
    let output = run(&["construct", "-d", &declarations, "-s", "shapes.square@1", "-r", &row]);

    assert_exit_code(&output, 0);
    let record: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("construct should print JSON");
    assert_eq!(record["area"], 9.0);
    assert_eq!(record["side"], 3.0);
    assert_eq!(record["label"], "tile");
    assert_eq!(record["id"], "6f1c2a4e-8d3b-4c7a-9e2f-0b5d7a3c1e90");
}

#[test]
fn construct_rejects_row_failing_constraint() {
    let declarations = testdata_path("shapes.yaml");
    let row = testdata_path("negative_row.json");
    let output = run(&["construct", "-d", &declarations, "-s", "shapes.square@1", "-r", &row]);

    assert_exit_code(&output, 1);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Rejected:"));
    assert!(stdout.contains("constraint 'side > 0' is not satisfied"));
}
