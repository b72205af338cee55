mod support;

use std::fs;
use std::path::Path;
use std::process::Stdio;
use std::thread;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use glasstask::error::Error;
use glasstask::remote::DirRemoteStore;
use glasstask::session::UserKey;
use glasstask::sync::{Reconciler, RemoteStore};
use glasstask::task::{self, Task};
use serde_json::{json, Value};
use support::{gt_for, gt_process, wait_for, TestEnv};

fn user(name: &str) -> UserKey {
    UserKey::parse(name).expect("user key")
}

fn task_at(id: &str, title: &str, minute: u32) -> Task {
    let stamp = Utc.with_ymd_and_hms(2024, 6, 10, 9, minute, 0).unwrap();
    task::normalize(&json!({
        "id": id,
        "title": title,
        "createdAt": Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap(),
        "updatedAt": stamp,
    }))
}

#[tokio::test]
async fn replace_all_writes_one_document_per_task() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DirRemoteStore::new(dir.path());
    let alice = user("alice");

    let tasks = vec![task_at("a", "A", 1), task_at("b/c", "Slash", 2)];
    let report = store.replace_all(&alice, &tasks).await.expect("push");
    assert_eq!(report.upserted, 2);
    assert_eq!(report.deleted, 0);

    let docs_dir = store.tasks_dir(&alice);
    assert!(docs_dir.join("a.json").exists());
    assert!(docs_dir.join("b%2Fc.json").exists());

    let read = store.read_all(&alice).await.expect("read");
    assert_eq!(read, tasks);
}

#[tokio::test]
async fn replace_all_deletes_documents_missing_locally() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DirRemoteStore::new(dir.path());
    let alice = user("alice");

    store
        .replace_all(&alice, &[task_at("a", "A", 1), task_at("b", "B", 1)])
        .await
        .expect("first push");
    let report = store
        .replace_all(&alice, &[task_at("a", "A", 1)])
        .await
        .expect("second push");
    assert_eq!(report.deleted, 1);
    assert!(!store.tasks_dir(&alice).join("b.json").exists());
}

#[tokio::test]
async fn collections_are_isolated_per_user() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DirRemoteStore::new(dir.path());

    store
        .replace_all(&user("alice"), &[task_at("a", "A", 1)])
        .await
        .expect("push");
    assert!(store.read_all(&user("bob")).await.expect("read").is_empty());
}

#[tokio::test]
async fn read_all_skips_broken_documents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DirRemoteStore::new(dir.path());
    let alice = user("alice");
    let docs_dir = store.tasks_dir(&alice);
    fs::create_dir_all(&docs_dir).expect("docs dir");
    fs::write(docs_dir.join("good.json"), r#"{"title":"Good","notesByUser":{"alice":"hi"}}"#)
        .expect("write");
    fs::write(docs_dir.join("bad.json"), "{").expect("write");

    let read = store.read_all(&alice).await.expect("read");
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].id, "good");
    assert_eq!(
        read[0].notes_by_user.as_ref().and_then(|notes| notes.get("alice")),
        Some(&json!("hi"))
    );
}

#[tokio::test]
async fn unreachable_remote_is_a_transport_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DirRemoteStore::new(dir.path().join("missing"));
    let err = store.read_all(&user("alice")).await.expect_err("missing root");
    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn reconciler_sync_reaches_a_fixed_point() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DirRemoteStore::new(dir.path());
    let alice = user("alice");
    store
        .replace_all(&alice, &[task_at("shared", "Remote newer", 30), task_at("r", "Remote only", 1)])
        .await
        .expect("seed");

    let reconciler = Reconciler::new(store, alice);
    let local = vec![task_at("shared", "Local older", 10), task_at("l", "Local only", 1)];
    let report = reconciler.sync(&local).await.expect("sync");

    let titles: Vec<&str> = report.tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Remote newer", "Local only", "Remote only"]);
    assert_eq!(report.adopted, 1);
    assert_eq!(report.replaced, 1);

    let again = reconciler.pull(&report.tasks).await.expect("pull");
    assert_eq!(again, report.tasks);
}

#[tokio::test]
async fn subscription_delivers_initial_and_changed_snapshots() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DirRemoteStore::new(dir.path()).with_debounce(Duration::from_millis(20));
    let alice = user("alice");

    let mut subscription = store.subscribe(&alice).await.expect("subscribe");
    let initial = tokio::time::timeout(Duration::from_secs(5), subscription.next())
        .await
        .expect("initial snapshot in time")
        .expect("open subscription");
    assert!(initial.is_empty());

    let writer = DirRemoteStore::new(dir.path());
    writer
        .replace_all(&alice, &[task_at("n", "New elsewhere", 5)])
        .await
        .expect("push");

    let seen = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(snapshot) = subscription.next().await {
            if snapshot.iter().any(|task| task.id == "n") {
                return true;
            }
        }
        false
    })
    .await
    .expect("snapshot in time");
    assert!(seen);
}

#[test]
fn cli_sync_moves_tasks_between_devices() {
    let env = TestEnv::new();
    let remote = env.remote_dir();
    let laptop = env.path().join("laptop");
    let phone = env.path().join("phone");

    gt_for(&laptop)
        .args(["--user", "alice", "--remote-dir"])
        .arg(&remote)
        .args(["add", "From laptop"])
        .assert()
        .success();

    gt_for(&phone)
        .args(["--user", "alice", "--remote-dir"])
        .arg(&remote)
        .arg("sync")
        .assert()
        .success();

    let stored = fs::read_to_string(phone.join("tasks.json")).expect("phone tasks");
    assert!(stored.contains("From laptop"));
}

#[test]
fn cli_auto_push_failure_is_only_a_warning() {
    let env = TestEnv::new();
    let missing_remote = env.path().join("unmounted");

    env.gt()
        .args(["--user", "alice", "--remote-dir"])
        .arg(&missing_remote)
        .args(["add", "Offline task"])
        .assert()
        .success()
        .stdout(predicates::str::contains("push failed"));
    assert_eq!(env.stored_tasks().len(), 1);
}

#[test]
fn cli_sync_requires_a_user() {
    let env = TestEnv::new();
    let remote = env.remote_dir();
    env.gt()
        .arg("--remote-dir")
        .arg(&remote)
        .arg("sync")
        .assert()
        .code(2)
        .stderr(predicates::str::contains("Not signed in"));
}

#[test]
fn cli_watch_once_applies_remote_snapshot() {
    let env = TestEnv::new();
    let remote = env.remote_dir();
    let other = env.path().join("other");

    gt_for(&other)
        .args(["--user", "bob", "--remote-dir"])
        .arg(&remote)
        .args(["add", "Shared with watch"])
        .assert()
        .success();

    env.gt()
        .args(["--user", "bob", "--remote-dir"])
        .arg(&remote)
        .args(["watch", "--once"])
        .assert()
        .success();
    let titles: Vec<String> = env
        .stored_tasks()
        .iter()
        .filter_map(|task| task["title"].as_str().map(str::to_string))
        .collect();
    assert_eq!(titles, vec!["Shared with watch".to_string()]);
}

fn as_bob(mut cmd: assert_cmd::Command, remote: &Path) -> assert_cmd::Command {
    cmd.args(["--user", "bob", "--remote-dir"]).arg(remote);
    cmd
}

#[test]
fn cli_watch_merges_snapshots_into_the_current_local_file() {
    let env = TestEnv::new();
    let remote = env.remote_dir();
    let phone = env.path().join("phone");

    let output = as_bob(env.gt(), &remote)
        .args(["--json", "add", "Doomed"])
        .output()
        .expect("run gt");
    assert!(output.status.success());
    let envelope: Value = serde_json::from_slice(&output.stdout).expect("json envelope");
    let doomed = envelope["data"]["id"].as_str().expect("id").to_string();

    let mut watch = gt_process(&env.data_dir())
        .args(["--user", "bob", "--remote-dir"])
        .arg(&remote)
        .arg("watch")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn watch");
    thread::sleep(Duration::from_millis(500));

    // Edits from other invocations while the watch is running.
    as_bob(env.gt(), &remote)
        .args(["rm", doomed.as_str(), "--yes"])
        .assert()
        .success();
    env.gt().args(["add", "Never pushed"]).assert().success();
    as_bob(gt_for(&phone), &remote)
        .args(["add", "From phone"])
        .assert()
        .success();

    let arrived = wait_for(Duration::from_secs(10), || {
        env.stored_titles().contains(&"From phone".to_string())
    });
    // One more debounce window for any snapshot still in flight.
    thread::sleep(Duration::from_millis(500));
    let _ = watch.kill();
    let _ = watch.wait();

    assert!(arrived, "remote task never reached the local file");
    let titles = env.stored_titles();
    assert!(titles.contains(&"Never pushed".to_string()), "{titles:?}");
    assert!(!titles.contains(&"Doomed".to_string()), "{titles:?}");
}
