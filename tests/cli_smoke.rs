//! Smoke tests for the `promptrun` binary. None of these reach a model.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

const LIBRARY: &str = r#"
prompts:
  - id: greeter
    system_prompt_template: "You greet ${name}."
    system_variables:
      name: { type: string, required: true }
    status: ACTIVE
  - id: retired
    system_prompt_template: "Old."
    status: ARCHIVED
"#;

const CONFIG: &str = r#"
[defaults]
max_llm_calls = 3

[llm]
api_key_env = "PROMPTRUN_SMOKE_KEY"

[storage]
library = "prompts.yaml"
execution_log = "logs/executions.jsonl"
"#;

fn workspace() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("prompts.yaml"), LIBRARY).unwrap();
    std::fs::write(temp.path().join("config.toml"), CONFIG).unwrap();
    temp
}

fn promptrun(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("promptrun").unwrap();
    cmd.current_dir(temp.path())
        .env_remove("PROMPTRUN_HOME")
        .env_remove("RUST_LOG")
        .env("PROMPTRUN_SMOKE_KEY", "sk-test")
        .arg("--config")
        .arg(temp.path().join("config.toml"));
    cmd
}

#[test]
fn test_config_json_reports_sources() {
    let temp = workspace();
    let output = promptrun(&temp).args(["config", "--json"]).output().unwrap();
    assert!(output.status.success());

    let config: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["max_llm_calls"]["value"], "3");
    assert_eq!(config["max_llm_calls"]["source"], "config");
    assert_eq!(config["max_tool_calls"]["source"], "default");
}

#[test]
fn test_prompts_lists_library() {
    let temp = workspace();
    promptrun(&temp)
        .arg("prompts")
        .assert()
        .success()
        .stdout(predicate::str::contains("greeter"))
        .stdout(predicate::str::contains("retired"));
}

#[test]
fn test_prompts_include_runs_from_execution_log() {
    let temp = workspace();
    std::fs::create_dir_all(temp.path().join("logs")).unwrap();
    std::fs::write(
        temp.path().join("logs/executions.jsonl"),
        concat!(
            r#"{"record":"execution","prompt_id":"greeter","successful":true,"elapsed_ms":100}"#,
            "\n",
            r#"{"record":"tool_call","event":{"kind":"call"}}"#,
            "\n",
            r#"{"record":"execution","prompt_id":"greeter","successful":false,"elapsed_ms":9000}"#,
            "\n",
            r#"{"record":"execution","prompt_id":"greeter","successful":true,"elapsed_ms":300}"#,
            "\n",
        ),
    )
    .unwrap();

    let output = promptrun(&temp).args(["prompts", "--json"]).output().unwrap();
    assert!(output.status.success());

    let rows: Value = serde_json::from_slice(&output.stdout).unwrap();
    let greeter = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["id"] == "greeter")
        .unwrap();
    assert_eq!(greeter["execution_count"], 2);
    assert_eq!(greeter["avg_response_time_ms"], 200.0);
}

#[test]
fn test_unknown_prompt_exits_not_found_with_envelope() {
    let temp = workspace();
    let output = promptrun(&temp)
        .args(["run", "nope", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));

    let envelope: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(envelope["status"], 404);
    assert_eq!(envelope["kind"], "not_found_error");
    assert_eq!(envelope["details"]["prompt_id"], "nope");
}

#[test]
fn test_inactive_prompt_exits_invalid_input() {
    let temp = workspace();
    promptrun(&temp)
        .args(["run", "retired"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("retired"));
}

#[test]
fn test_missing_variable_exits_invalid_input() {
    let temp = workspace();
    promptrun(&temp)
        .args(["run", "greeter", "--user-prompt", "hi"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("name"));
}

#[test]
fn test_malformed_var_is_a_usage_error() {
    let temp = workspace();
    promptrun(&temp)
        .args(["run", "greeter", "--var", "no-equals-sign"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_config_file_is_a_usage_error() {
    let temp = workspace();
    Command::cargo_bin("promptrun")
        .unwrap()
        .current_dir(temp.path())
        .args(["--config", "absent.toml", "config"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_api_key_is_reported() {
    let temp = workspace();
    promptrun(&temp)
        .env_remove("PROMPTRUN_SMOKE_KEY")
        .args(["run", "greeter", "--var", "name=Ada"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("PROMPTRUN_SMOKE_KEY"));
}
