mod support;

use std::process::{Child, Stdio};

use predicates::str::contains;
use serde_json::Value;
use support::{gt_process, TestEnv};

fn add(env: &TestEnv, args: &[&str]) -> String {
    let mut full = vec!["add"];
    full.extend_from_slice(args);
    let data = env.json(&full);
    data["id"].as_str().expect("id").to_string()
}

fn listed_titles(data: &Value) -> Vec<String> {
    data["tasks"]
        .as_array()
        .expect("tasks")
        .iter()
        .map(|task| task["title"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn add_persists_a_normalized_task() {
    let env = TestEnv::new();
    let id = add(
        &env,
        &["  Buy milk  ", "--priority", "high", "--due", "2030-01-15", "--tags", "home, errand,,"],
    );

    let stored = env.stored_tasks();
    assert_eq!(stored.len(), 1);
    let task = &stored[0];
    assert_eq!(task["id"], id.as_str());
    assert_eq!(task["title"], "Buy milk");
    assert_eq!(task["priority"], "high");
    assert_eq!(task["status"], "open");
    assert_eq!(task["dueDate"], "2030-01-15");
    assert_eq!(task["tags"], serde_json::json!(["home", "errand"]));
    assert_eq!(task["completedAt"], Value::Null);
    assert_eq!(task["createdAt"], task["updatedAt"]);
}

#[test]
fn blank_title_is_a_validation_error() {
    let env = TestEnv::new();
    env.gt()
        .args(["add", "   "])
        .assert()
        .code(2)
        .stderr(contains("Title is required"));
    assert!(!env.tasks_file().exists());
}

#[test]
fn bad_due_date_is_rejected() {
    let env = TestEnv::new();
    env.gt().args(["add", "x", "--due", "tomorrow"]).assert().code(2);
}

#[test]
fn done_and_reopen_track_completion() {
    let env = TestEnv::new();
    let id = add(&env, &["Write report"]);

    let data = env.json(&["done", &id]);
    assert_eq!(data["changed"], true);
    let task = &env.stored_tasks()[0];
    assert_eq!(task["status"], "done");
    assert!(task["completedAt"].is_string());

    let completed_at = task["completedAt"].clone();
    env.json(&["done", &id]);
    assert_eq!(env.stored_tasks()[0]["completedAt"], completed_at);

    env.json(&["reopen", &id]);
    let task = &env.stored_tasks()[0];
    assert_eq!(task["status"], "open");
    assert_eq!(task["completedAt"], Value::Null);
}

#[test]
fn unknown_id_is_a_warning_not_an_error() {
    let env = TestEnv::new();
    add(&env, &["Only task"]);
    env.gt()
        .args(["done", "does-not-exist"])
        .assert()
        .success()
        .stdout(contains("no task matches 'does-not-exist'"));
    assert_eq!(env.stored_tasks()[0]["status"], "open");
}

#[test]
fn id_prefix_resolves_unique_task() {
    let env = TestEnv::new();
    let id = add(&env, &["Prefix me"]);
    let prefix = &id[..8];
    let data = env.json(&["done", prefix]);
    assert_eq!(data["id"], id.as_str());
    assert_eq!(data["changed"], true);
}

#[test]
fn edit_changes_fields_and_clears_due() {
    let env = TestEnv::new();
    let id = add(&env, &["Draft", "--due", "2030-02-01"]);

    env.json(&["edit", &id, "--title", "Final", "--priority", "low", "--tags", "a,b"]);
    let task = &env.stored_tasks()[0];
    assert_eq!(task["title"], "Final");
    assert_eq!(task["priority"], "low");
    assert_eq!(task["dueDate"], "2030-02-01");

    env.json(&["edit", &id, "--no-due"]);
    assert_eq!(env.stored_tasks()[0]["dueDate"], Value::Null);

    env.gt().args(["edit", &id, "--title", " "]).assert().code(2);
    env.gt().args(["edit", &id]).assert().code(2);
}

#[test]
fn list_filters_sorts_and_counts() {
    let env = TestEnv::new();
    add(&env, &["Low chore", "--priority", "low"]);
    add(&env, &["High fire", "--priority", "high", "--tags", "urgent"]);
    let done_id = add(&env, &["Medium done"]);
    env.json(&["done", &done_id]);

    let data = env.json(&["list", "--sort", "priority", "--desc"]);
    assert_eq!(
        listed_titles(&data),
        vec!["High fire", "Medium done", "Low chore"]
    );
    assert_eq!(data["counts"], serde_json::json!({ "total": 3, "open": 2, "done": 1 }));

    let data = env.json(&["list", "--status", "open", "--sort", "priority"]);
    assert_eq!(listed_titles(&data), vec!["Low chore", "High fire"]);

    let data = env.json(&["list", "--search", "URGENT"]);
    assert_eq!(listed_titles(&data), vec!["High fire"]);

    env.gt()
        .args(["list"])
        .assert()
        .success()
        .stdout(contains("2 open • 1 done • 3 total"));

    env.gt().args(["list", "--status", "maybe"]).assert().code(2);
}

#[test]
fn rm_requires_confirmation_when_not_interactive() {
    let env = TestEnv::new();
    let id = add(&env, &["Keep me"]);

    env.gt()
        .args(["rm", &id])
        .assert()
        .code(2)
        .stderr(contains("--yes"));
    assert_eq!(env.stored_tasks().len(), 1);

    let data = env.json(&["rm", &id, "--yes"]);
    assert_eq!(data["changed"], true);
    assert!(env.stored_tasks().is_empty());
}

#[test]
fn clear_removes_only_completed_tasks() {
    let env = TestEnv::new();
    let a = add(&env, &["A"]);
    add(&env, &["B"]);
    let c = add(&env, &["C"]);
    env.json(&["done", &a]);
    env.json(&["done", &c]);

    env.json(&["clear", "--yes"]);
    let titles: Vec<Value> = env
        .stored_tasks()
        .iter()
        .map(|task| task["title"].clone())
        .collect();
    assert_eq!(titles, vec![Value::from("B")]);

    let data = env.json(&["clear", "--yes"]);
    assert_eq!(data["changed"], false);
}

#[test]
fn show_prints_task_details() {
    let env = TestEnv::new();
    let id = add(&env, &["Plan trip", "--description", "Book flights\nPack bags"]);
    env.gt()
        .args(["show", &id])
        .assert()
        .success()
        .stdout(contains("Plan trip"))
        .stdout(contains("Pack bags"));
}

#[test]
fn corrupt_task_file_starts_empty() {
    let env = TestEnv::new();
    std::fs::create_dir_all(env.data_dir()).expect("data dir");
    std::fs::write(env.tasks_file(), "{ not json").expect("write");

    let data = env.json(&["list"]);
    assert_eq!(data["counts"]["total"], 0);
}

#[test]
fn concurrent_adds_from_separate_processes_are_all_kept() {
    let env = TestEnv::new();
    let children: Vec<Child> = (0..8)
        .map(|i| {
            gt_process(&env.data_dir())
                .args(["add", format!("Parallel {i}").as_str()])
                .stdout(Stdio::null())
                .spawn()
                .expect("spawn gt")
        })
        .collect();
    for mut child in children {
        assert!(child.wait().expect("wait gt").success());
    }

    let mut titles = env.stored_titles();
    titles.sort();
    let expected: Vec<String> = (0..8).map(|i| format!("Parallel {i}")).collect();
    assert_eq!(titles, expected);
}
