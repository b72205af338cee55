mod support;

use serde_json::{json, Value};
use support::TestEnv;

#[test]
fn export_writes_envelope_with_timestamp() {
    let env = TestEnv::new();
    env.json(&["add", "First"]);
    env.json(&["add", "Second"]);

    let out = env.path().join("backup.json");
    let data = env.json(&["export", "--out", out.to_str().expect("utf8 path")]);
    assert_eq!(data["count"], 2);

    let exported: Value =
        serde_json::from_str(&std::fs::read_to_string(&out).expect("read export")).expect("json");
    assert!(exported["exportedAt"].is_string());
    let titles: Vec<&str> = exported["tasks"]
        .as_array()
        .expect("tasks")
        .iter()
        .filter_map(|task| task["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["Second", "First"]);
}

#[test]
fn import_prepends_valid_entries_and_skips_invalid() {
    let env = TestEnv::new();
    env.json(&["add", "Existing"]);

    let file = env.write_file(
        "incoming.json",
        &json!({
            "tasks": [
                { "title": "A", "status": "done" },
                { "title": 42 },
                { "title": "B", "priority": "high" }
            ]
        })
        .to_string(),
    );
    let data = env.json(&["import", file.to_str().expect("utf8 path"), "--yes"]);
    assert_eq!(data["imported"], 2);
    assert_eq!(data["skipped"], 1);

    let stored = env.stored_tasks();
    let titles: Vec<&str> = stored.iter().filter_map(|task| task["title"].as_str()).collect();
    assert_eq!(titles, vec!["A", "B", "Existing"]);
    assert_eq!(stored[0]["status"], "done");
    assert!(stored[0]["completedAt"].is_string());
    assert_eq!(stored[1]["priority"], "high");
}

#[test]
fn import_reassigns_colliding_ids() {
    let env = TestEnv::new();
    let existing = env.json(&["add", "Mine"])["id"]
        .as_str()
        .expect("id")
        .to_string();

    let file = env.write_file(
        "collide.json",
        &json!({ "tasks": [ { "id": existing, "title": "Theirs" } ] }).to_string(),
    );
    env.json(&["import", file.to_str().expect("utf8 path"), "--yes"]);

    let stored = env.stored_tasks();
    assert_eq!(stored.len(), 2);
    assert_ne!(stored[0]["id"], stored[1]["id"]);
    assert_eq!(stored[1]["id"], existing.as_str());
}

#[test]
fn import_rejects_files_without_tasks_array() {
    let env = TestEnv::new();
    let file = env.write_file("bad.json", r#"{"items":[]}"#);
    env.gt()
        .args(["import", file.to_str().expect("utf8 path"), "--yes"])
        .assert()
        .code(2);

    let file = env.write_file("garbage.json", "not json at all");
    env.gt()
        .args(["import", file.to_str().expect("utf8 path"), "--yes"])
        .assert()
        .code(2);
}

#[test]
fn export_then_import_into_fresh_store() {
    let source = TestEnv::new();
    source.json(&["add", "Portable", "--tags", "x,y", "--due", "2031-03-04"]);
    let out = source.path().join("portable.json");
    source.json(&["export", "--out", out.to_str().expect("utf8 path")]);

    let target = TestEnv::new();
    target.json(&["import", out.to_str().expect("utf8 path"), "--yes"]);
    let stored = target.stored_tasks();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["title"], "Portable");
    assert_eq!(stored[0]["tags"], json!(["x", "y"]));
    assert_eq!(stored[0]["dueDate"], "2031-03-04");
}
