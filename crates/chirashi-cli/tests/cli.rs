use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const FLYER_TOKENS: &str = r#"{
    "source": "store_a.jpg",
    "tokens": [
        {"text": "きゅうり3本", "vertices": [[150, 100], [230, 100], [230, 130], [150, 130]], "confidence": 0.95},
        {"text": "198円", "vertices": [[235, 90], [295, 90], [295, 140], [235, 140]], "confidence": 0.97}
    ]
}"#;

fn chirashi() -> Command {
    Command::cargo_bin("chirashi").unwrap()
}

fn write_tokens(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn process_prints_json_entries() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_tokens(dir.path(), "store_a.json", FLYER_TOKENS);

    chirashi()
        .arg("process")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"product\": \"きゅうり3本\""))
        .stdout(predicate::str::contains("\"price_incl_tax\": 198"))
        .stdout(predicate::str::contains("\"category\": \"食品\""));
}

#[test]
fn process_writes_csv_with_japanese_headers() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_tokens(dir.path(), "store_a.json", FLYER_TOKENS);
    let output = dir.path().join("out.csv");

    chirashi()
        .args(["process", "-f", "csv", "-o"])
        .arg(&output)
        .arg(&input)
        .assert()
        .success();

    let csv = fs::read_to_string(&output).unwrap();
    assert!(csv.starts_with("商品名,税込価格,税抜価格,単位,カテゴリ,信頼度"));
    assert!(csv.contains("きゅうり3本,198,,3本,食品,"));
}

#[test]
fn process_min_confidence_filters_records() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_tokens(dir.path(), "store_a.json", FLYER_TOKENS);

    chirashi()
        .args(["process", "-f", "text", "--min-confidence", "0.99"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("No products found."))
        .stdout(predicate::str::contains("1 record(s) below"));
}

#[test]
fn process_empty_input_fails_with_distinct_message() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_tokens(dir.path(), "empty.json", r#"{"tokens": []}"#);

    chirashi()
        .arg("process")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No OCR tokens"));
}

#[test]
fn process_missing_file_fails() {
    chirashi()
        .args(["process", "/nonexistent/tokens.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn batch_writes_prefixed_outputs_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    write_tokens(dir.path(), "store_a.json", FLYER_TOKENS);
    write_tokens(dir.path(), "broken.json", "not json");
    let out_dir = dir.path().join("out");
    let pattern = dir.path().join("*.json");

    chirashi()
        .arg("batch")
        .arg(pattern.to_str().unwrap())
        .arg("-o")
        .arg(&out_dir)
        .args(["-f", "csv", "--summary", "--continue-on-error", "-j", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 successful, 1 failed"));

    let names: Vec<String> = fs::read_dir(&out_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n.starts_with("chirashi_result_store_a_") && n.ends_with(".csv")));

    let summary = fs::read_to_string(out_dir.join("summary.csv")).unwrap();
    assert!(summary.contains("store_a.json,success,1,"));
    assert!(summary.contains("broken.json,error,"));
}

#[test]
fn batch_stops_on_first_error_by_default() {
    let dir = tempfile::tempdir().unwrap();
    write_tokens(dir.path(), "broken.json", "not json");
    let pattern = dir.path().join("*.json");

    chirashi()
        .arg("batch")
        .arg(pattern.to_str().unwrap())
        .arg("-o")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Processing failed"));
}

#[test]
fn config_init_writes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    chirashi()
        .args(["config", "init", "-o"])
        .arg(&path)
        .assert()
        .success();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("\"band_overlap_fraction\": 0.5"));
    assert!(content.contains("\"filename_prefix\": \"chirashi_result\""));

    chirashi()
        .args(["config", "init", "-o"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn process_uses_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_tokens(dir.path(), "store_a.json", FLYER_TOKENS);
    let config = write_tokens(
        dir.path(),
        "config.json",
        r#"{"output": {"min_confidence": 0.99}}"#,
    );

    chirashi()
        .arg("--config")
        .arg(&config)
        .args(["process", "-f", "csv"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("きゅうり3本").not());
}
