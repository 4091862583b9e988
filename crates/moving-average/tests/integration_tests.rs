// Copyright (C) 2025-present The NetGauze Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use rstest::rstest;
use std::io::Write;
use std::process::{Command, Output};
use std::{env, fs};
use tempfile::NamedTempFile;

const SAMPLE_EVENTS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/events.jsonl");
const SAMPLE_EXPECTED: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/events_window_10.jsonl");

fn input_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file.flush().unwrap();
    file
}

fn run(input: &str, window_size: &str, extra_args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_delivery-moving-average"))
        .arg("--input_file")
        .arg(input)
        .arg(format!("--window_size={window_size}"))
        .args(extra_args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to execute command: {e}"))
}

fn stdout_records(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8(output.stdout.clone())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn stderr(output: &Output) -> String {
    String::from_utf8(output.stderr.clone()).unwrap()
}

#[test]
fn test_sample_events_to_json() {
    let overwrite = env::var("OVERWRITE").unwrap_or_else(|_| "false".to_string()) == "true";
    let output_file = NamedTempFile::new().unwrap();
    let output_path = if overwrite {
        SAMPLE_EXPECTED
    } else {
        output_file.path().to_str().unwrap()
    };

    let output = run(SAMPLE_EVENTS, "10", &["--output", output_path]);
    assert!(
        output.status.success(),
        "command failed with status: {}, stderr: {}",
        output.status,
        stderr(&output)
    );
    assert!(output.stdout.is_empty());

    let output_json = fs::read_to_string(output_path)
        .unwrap_or_else(|e| panic!("Failed to read output file: {e}"));
    let expected_json = fs::read_to_string(SAMPLE_EXPECTED)
        .unwrap_or_else(|e| panic!("Failed to read expected JSON file: {e}"));
    assert_eq!(
        output_json.replace("\r\n", "\n"),
        expected_json.replace("\r\n", "\n")
    );
}

#[test]
fn test_rerun_is_byte_identical() {
    let first = run(SAMPLE_EVENTS, "3", &[]);
    let second = run(SAMPLE_EVENTS, "3", &[]);
    assert!(first.status.success());
    assert!(!first.stdout.is_empty());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_boundary_event_to_stdout() {
    let input = input_file(&[
        r#"{"timestamp":"2018-12-26 12:00:00.000000","translation_id":"x","source_language":"en","target_language":"fr","client_name":"c","event_name":"translation_delivered","nr_words":1,"duration":10}"#,
    ]);
    let output = run(input.path().to_str().unwrap(), "10", &[]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        stdout_records(&output),
        vec![serde_json::json!({"date": "2018-12-26 12:00:00", "average_delivery_time": 10.0})]
    );
}

#[test]
fn test_out_of_order_fails_when_enforced() {
    let input = input_file(&[
        r#"{"timestamp":"2018-12-26 12:00:01.000000","duration":1,"event_name":"translation_delivered"}"#,
        r#"{"timestamp":"2018-12-26 12:00:00.000000","duration":1,"event_name":"translation_delivered"}"#,
    ]);
    let path = input.path().to_str().unwrap();

    let output = run(path, "10", &["--enforce_order"]);
    assert!(!output.status.success());
    let diagnostics = stderr(&output);
    assert!(
        diagnostics.contains("OrderViolation: Line 2: timestamp out of order"),
        "{diagnostics}"
    );

    // Disorder is tolerated when not enforced
    let output = run(path, "10", &[]);
    assert!(output.status.success(), "{}", stderr(&output));
}

#[test]
fn test_malformed_line_aborts_by_default() {
    let input = input_file(&[
        r#"{"timestamp":"2018-12-26 12:00:00.000000","duration":1,"event_name":"translation_delivered"}"#,
        "{not-json}",
    ]);
    let output = run(input.path().to_str().unwrap(), "10", &[]);
    assert!(!output.status.success());
    let diagnostics = stderr(&output);
    assert!(
        diagnostics.contains("MalformedInput: Line 2: invalid JSON"),
        "{diagnostics}"
    );
}

#[test]
fn test_skip_invalid_continues() {
    let input = input_file(&[
        r#"{"timestamp":"2018-12-26 12:00:00.000000","duration":10,"event_name":"translation_delivered"}"#,
        "{not-json}",
        r#"{"timestamp":"2018-12-26 12:00:30.000000","duration":20,"event_name":"translation_delivered"}"#,
    ]);
    let output = run(
        input.path().to_str().unwrap(),
        "10",
        &["--skip_invalid", "--enforce_order"],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        stdout_records(&output),
        vec![
            serde_json::json!({"date": "2018-12-26 12:00:00", "average_delivery_time": 10.0}),
            serde_json::json!({"date": "2018-12-26 12:01:00", "average_delivery_time": 15.0}),
        ]
    );
    let diagnostics = stderr(&output);
    assert!(
        diagnostics.contains("MalformedInput: Line 2: invalid JSON"),
        "{diagnostics}"
    );
    assert!(!String::from_utf8(output.stdout).unwrap().contains("invalid JSON"));
}

#[test]
fn test_strict_event_name() {
    let input = input_file(&[
        r#"{"timestamp":"2018-12-26 12:00:00.000000","duration":10,"event_name":"translation_requested"}"#,
    ]);
    let path = input.path().to_str().unwrap();

    let output = run(path, "10", &["--strict-event-name"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("SchemaViolation: Line 1: expected event_name"));

    let output = run(path, "10", &[]);
    assert!(output.status.success());
    assert_eq!(stdout_records(&output).len(), 1);
}

#[rstest]
#[case::zero("0")]
#[case::negative("-3")]
fn test_invalid_window_size(#[case] window_size: &str) {
    let output_dir = tempfile::tempdir().unwrap();
    let output_path = output_dir.path().join("out.jsonl");
    let output = run(
        SAMPLE_EVENTS,
        window_size,
        &["--output", output_path.to_str().unwrap()],
    );
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(!output_path.exists());
    let diagnostics = stderr(&output);
    assert!(
        diagnostics.contains("ConfigurationError: window_size must be >= 1"),
        "{diagnostics}"
    );
}

#[test]
fn test_missing_input_file() {
    let output_dir = tempfile::tempdir().unwrap();
    let missing = output_dir.path().join("missing.jsonl");
    let output = run(missing.to_str().unwrap(), "10", &[]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to open input file"));
}
