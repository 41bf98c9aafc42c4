//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SCHEMA: &str = "../../surveys/good-dog.csv";
const RESPONSES: &str = "../../surveys/good-dog-responses.json";
const MATRIX: &str = "../../surveys/matrix.csv";

fn supasurvey() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("supasurvey").unwrap();
    cmd.env_remove("SUPASURVEY_SCHEMA")
        .env_remove("SUPASURVEY_UNKNOWN_TYPES");
    cmd
}

#[test]
fn validate_sample_schema() {
    supasurvey()
        .arg("validate")
        .arg("--schema")
        .arg(SCHEMA)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 sections, 4 question sets, 9 answers"))
        .stdout(predicate::str::contains("Schema valid"));
}

#[test]
fn validate_reports_unmapped_types() {
    supasurvey()
        .arg("validate")
        .arg("--schema")
        .arg(MATRIX)
        .assert()
        .success()
        .stdout(predicate::str::contains("choose-one-for-each"))
        .stdout(predicate::str::contains("1 warning(s) found"));
}

#[test]
fn validate_nonexistent_file() {
    supasurvey()
        .arg("validate")
        .arg("--schema")
        .arg("nonexistent.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn validate_without_schema_explains_how_to_set_one() {
    let dir = TempDir::new().unwrap();
    supasurvey()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no schema given"));
}

#[test]
fn schema_from_env() {
    let schema = std::fs::canonicalize(SCHEMA).unwrap();
    let dir = TempDir::new().unwrap();
    supasurvey()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .env("SUPASURVEY_SCHEMA", &schema)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("9 answers"));
}

#[test]
fn convert_csv_to_json_and_back() {
    let dir = TempDir::new().unwrap();
    let json = dir.path().join("schema.json");
    let csv = dir.path().join("schema.csv");

    supasurvey()
        .arg("convert")
        .arg("--input")
        .arg(SCHEMA)
        .arg("--output")
        .arg(&json)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 sections, 9 answers"));

    let content = std::fs::read_to_string(&json).unwrap();
    assert!(content.contains("\"questionsets\""));
    assert!(content.contains("\"repeater_label\": \"Add another pet\""));

    supasurvey()
        .arg("convert")
        .arg("--input")
        .arg(&json)
        .arg("--output")
        .arg(&csv)
        .assert()
        .success();

    let original = supasurvey_core::store::read_tree(std::path::Path::new(SCHEMA)).unwrap();
    let back = supasurvey_core::store::read_tree(&csv).unwrap();
    assert_eq!(original, back);
}

#[test]
fn score_text_output() {
    supasurvey()
        .arg("score")
        .arg("--schema")
        .arg(SCHEMA)
        .arg("--responses")
        .arg(RESPONSES)
        .assert()
        .success()
        .stdout(predicate::str::contains("Response rex: 32.3 / 38.6 (94% complete)"))
        .stdout(predicate::str::contains("Response fido"))
        .stdout(predicate::str::contains("N/A"));
}

#[test]
fn score_text_without_scorable_fields() {
    let dir = TempDir::new().unwrap();
    let schema = dir.path().join("uploads.csv");
    let responses = dir.path().join("responses.json");
    std::fs::write(
        &schema,
        "section_id,section_title,questionset_id,questionset_title,answer_label,answer_type\n\
         1,Records,1,Documents,Upload any vet records,file-multiple\n",
    )
    .unwrap();
    std::fs::write(
        &responses,
        r#"[{"response": "doc", "questionset": 1, "instances": [{"questionset_1__answer_1": ["file-1"]}]}]"#,
    )
    .unwrap();

    supasurvey()
        .arg("score")
        .arg("--schema")
        .arg(&schema)
        .arg("--responses")
        .arg(&responses)
        .assert()
        .success()
        .stdout(predicate::str::contains("Response doc: 0 / 0 (N/A complete)"))
        .stdout(predicate::str::contains("N/A%").not());
}

#[test]
fn score_json_output_to_file() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("reports").join("report.json");

    supasurvey()
        .arg("score")
        .arg("--schema")
        .arg(SCHEMA)
        .arg("--responses")
        .arg(RESPONSES)
        .arg("--format")
        .arg("json")
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Report saved to"));

    let report = supasurvey_core::report::ScoreReport::load_json(&out).unwrap();
    assert_eq!(report.responses.len(), 2);
    assert_eq!(report.responses[0].response, "rex");
}

#[test]
fn score_markdown_output() {
    supasurvey()
        .arg("score")
        .arg("--schema")
        .arg(SCHEMA)
        .arg("--responses")
        .arg(RESPONSES)
        .arg("--format")
        .arg("markdown")
        .assert()
        .success()
        .stdout(predicate::str::contains("# Score report"))
        .stdout(predicate::str::contains("| About you | Good dog | 75 | 16 | 19 | - |"));
}

#[test]
fn score_unknown_format() {
    supasurvey()
        .arg("score")
        .arg("--schema")
        .arg(SCHEMA)
        .arg("--responses")
        .arg(RESPONSES)
        .arg("--format")
        .arg("html")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format"));
}

#[test]
fn score_rejects_bad_verified_score() {
    let dir = TempDir::new().unwrap();
    let responses = dir.path().join("responses.json");
    std::fs::write(
        &responses,
        r#"[{"response": "rex", "questionset": 3, "instances": [], "verified_score": 2.5}]"#,
    )
    .unwrap();

    supasurvey()
        .arg("score")
        .arg("--schema")
        .arg(SCHEMA)
        .arg("--responses")
        .arg(&responses)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid verified score for rex/questionset_3"));
}

#[test]
fn verify_accepts_and_rejects() {
    supasurvey()
        .args(["verify", "--schema", SCHEMA, "--questionset", "1", "--score", "18.5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Verified score 18.5 accepted"))
        .stdout(predicate::str::contains("max 19"));

    supasurvey()
        .args(["verify", "--schema", SCHEMA, "--questionset", "1", "--score", "19.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be between 0 and 19"));

    supasurvey()
        .args(["verify", "--schema", SCHEMA, "--questionset", "1", "--score", "1.2345"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("more than 3 decimal places"));

    supasurvey()
        .args(["verify", "--schema", SCHEMA, "--questionset", "1", "--score", "-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be between 0 and 19"));

    supasurvey()
        .args(["verify", "--schema", SCHEMA, "--questionset", "42", "--score", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown question set: 42"));
}

#[test]
fn strict_policy_fails_on_unmapped_types() {
    supasurvey()
        .args(["verify", "--schema", MATRIX, "--questionset", "1", "--score", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max 5"));

    supasurvey()
        .env("SUPASURVEY_UNKNOWN_TYPES", "strict")
        .args(["verify", "--schema", MATRIX, "--questionset", "1", "--score", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no field builder"));
}

#[test]
fn config_file_supplies_schema_and_policy() {
    let dir = TempDir::new().unwrap();
    let matrix = std::fs::canonicalize(MATRIX).unwrap();
    let config = dir.path().join("custom.toml");
    std::fs::write(
        &config,
        format!(
            "schema = {:?}\nunknown_types = \"strict\"\n",
            matrix.display().to_string()
        ),
    )
    .unwrap();

    supasurvey()
        .arg("--config")
        .arg(&config)
        .args(["verify", "--questionset", "1", "--score", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no field builder"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    supasurvey()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created supasurvey.toml"))
        .stdout(predicate::str::contains("Created survey/schema.csv"))
        .stdout(predicate::str::contains("Created survey/responses.json"));

    // The generated config points at the generated schema.
    supasurvey()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .args(["score", "--responses", "survey/responses.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Response rex"));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    supasurvey()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    supasurvey()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn help_output() {
    supasurvey()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Schema-driven survey scoring"));
}

#[test]
fn version_output() {
    supasurvey()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("supasurvey"));
}
