//! A JSONL workspace survives restarts and hand edits.

use devtrack_deps::app::App;
use devtrack_deps::commands::init;
use devtrack_deps::config::BackendKind;
use devtrack_deps::domain::{DependencyType, TaskId, TaskStatus};
use devtrack_deps::storage::{JsonlBackedStore, LoadWarning};
use devtrack_deps::tasks::TaskRecord;
use devtrack_jsonl::write_jsonl_atomic;
use std::path::Path;
use tempfile::TempDir;

async fn workspace(ids: &[(&str, TaskStatus)]) -> TempDir {
    let temp = TempDir::new().unwrap();
    init::init(temp.path(), None, BackendKind::Jsonl).await.unwrap();
    let records: Vec<TaskRecord> = ids
        .iter()
        .map(|(id, status)| TaskRecord {
            id: TaskId::new(*id),
            title: format!("Task {id}"),
            status: *status,
        })
        .collect();
    write_jsonl_atomic(temp.path().join(".devtrack/tasks.jsonl"), &records)
        .await
        .unwrap();
    temp
}

fn edge_file(root: &Path) -> std::path::PathBuf {
    root.join(".devtrack/dependencies.jsonl")
}

#[tokio::test]
async fn edges_persist_across_app_instances() {
    let temp = workspace(&[
        ("api", TaskStatus::InProgress),
        ("schema", TaskStatus::Completed),
        ("docs", TaskStatus::NotStarted),
    ])
    .await;

    {
        let app = App::from_directory(temp.path()).await.unwrap();
        app.manager()
            .create("api", "schema", DependencyType::Blocks)
            .await
            .unwrap();
        app.manager()
            .create("docs", "api", DependencyType::Blocks)
            .await
            .unwrap();
    }

    let app = App::from_directory(temp.path()).await.unwrap();
    let m = app.manager();
    assert!(!m.has_blocking_dependencies(&TaskId::new("api")).await.unwrap());
    assert!(m.has_blocking_dependencies(&TaskId::new("docs")).await.unwrap());

    let tree = m.dependency_tree(&TaskId::new("docs"), None).await.unwrap();
    assert_eq!(tree.len(), 2);

    let contents = tokio::fs::read_to_string(edge_file(temp.path())).await.unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.contains("\"dep_type\":\"blocks\""));
}

#[tokio::test]
async fn hand_edited_cycle_is_dropped_on_load() {
    let temp = workspace(&[("a", TaskStatus::NotStarted), ("b", TaskStatus::NotStarted)]).await;
    {
        let app = App::from_directory(temp.path()).await.unwrap();
        app.manager()
            .create("a", "b", DependencyType::Blocks)
            .await
            .unwrap();
    }

    // Append a line closing the cycle, plus garbage.
    let path = edge_file(temp.path());
    let mut contents = tokio::fs::read_to_string(&path).await.unwrap();
    contents.push_str(
        r#"{"id":"dep-manual","task_id":"b","depends_on_task_id":"a","dep_type":"blocks","created_at":"2026-01-01T00:00:00Z"}"#,
    );
    contents.push_str("\nnot json at all\n");
    tokio::fs::write(&path, contents).await.unwrap();

    let (store, warnings) = JsonlBackedStore::open(&path, "dep").await.unwrap();
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().any(|w| matches!(w, LoadWarning::CircularDependency { edge_id, .. } if edge_id.as_str() == "dep-manual")));
    assert!(warnings.iter().any(|w| matches!(w, LoadWarning::MalformedJson { line_number: 3, .. })));
    drop(store);

    let app = App::from_directory(temp.path()).await.unwrap();
    let report = app.manager().verify().await.unwrap();
    assert!(report.is_healthy());
    assert_eq!(report.edges, 1);
}
