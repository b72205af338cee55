mod support;

use predicates::str::contains;
use support::TestEnv;

#[test]
fn config_show_reports_defaults_when_missing() {
    let env = TestEnv::new();
    let data = env.json(&["config", "show"]);

    assert_eq!(data["config_exists"], false);
    assert_eq!(data["user"], serde_json::Value::Null);
    assert_eq!(data["config"]["sync"]["auto_push"], true);
    assert_eq!(data["config"]["debounce"]["persist_ms"], 150);
    assert_eq!(data["config"]["list"]["sort"], "due_date");
}

#[test]
fn config_file_sets_user_and_default_sort() {
    let env = TestEnv::new();
    env.write_config(
        r#"
[sync]
user = "carol"

[list]
sort = "title"
direction = "desc"
"#,
    );

    let data = env.json(&["config", "show"]);
    assert_eq!(data["config_exists"], true);
    assert_eq!(data["user"], "carol");

    env.json(&["add", "alpha"]);
    env.json(&["add", "beta"]);
    let listed = env.json(&["list"]);
    let titles: Vec<&str> = listed["tasks"]
        .as_array()
        .expect("tasks")
        .iter()
        .filter_map(|task| task["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["beta", "alpha"]);
}

#[test]
fn cli_user_overrides_config_and_env() {
    let env = TestEnv::new();
    env.write_config("[sync]\nuser = \"carol\"\n");

    let output = env
        .gt()
        .env("GLASSTASK_USER", "dave")
        .args(["--json", "--user", "erin", "config", "show"])
        .output()
        .expect("run gt");
    let envelope: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(envelope["data"]["user"], "erin");
}

#[test]
fn invalid_config_is_a_user_error() {
    let env = TestEnv::new();
    env.write_config("[debounce]\npersist_ms = 0\n");

    env.gt()
        .args(["list"])
        .assert()
        .code(2)
        .stderr(contains("persist_ms"));
}

#[test]
fn invalid_user_key_is_rejected() {
    let env = TestEnv::new();
    env.gt()
        .args(["--user", "../escape", "list"])
        .assert()
        .code(2);
}
