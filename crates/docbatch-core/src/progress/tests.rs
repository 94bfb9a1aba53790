//! Tests for the progress store (in-memory DB helper from db).

use chrono::NaiveDate;

use crate::progress::db::open_memory;
use crate::progress::{ProgressRecord, ProgressStore};
use crate::retry::ErrorKind;
use crate::task::{Task, TaskStatus};

fn task(url: &str) -> Task {
    Task::new(url, "tax", NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
}

#[tokio::test]
async fn seed_creates_pending_records_once() {
    let store = open_memory().await.unwrap();
    let tasks = vec![task("https://a.example/1.pdf"), task("https://a.example/2.pdf")];
    assert_eq!(store.seed_pending("b", &tasks).await.unwrap(), 2);
    assert_eq!(store.seed_pending("b", &tasks).await.unwrap(), 0);

    let map = store.load_batch("b").await.unwrap();
    assert_eq!(map.len(), 2);
    let rec = &map[&tasks[0].id];
    assert_eq!(rec.status, TaskStatus::Pending);
    assert_eq!(rec.attempts, 0);
    assert_eq!(rec.url, "https://a.example/1.pdf");
    assert!(rec.last_error.is_none());
}

#[tokio::test]
async fn put_supersedes_prior_record() {
    let store = open_memory().await.unwrap();
    let mut t = task("https://a.example/x.pdf");
    store.seed_pending("b", std::slice::from_ref(&t)).await.unwrap();

    t.status = TaskStatus::Pending;
    t.attempts = 1;
    t.last_error = Some(ErrorKind::Timeout);
    store.put(&ProgressRecord::for_task("b", &t)).await.unwrap();

    t.status = TaskStatus::Succeeded;
    t.attempts = 2;
    t.last_error = None;
    store.put(&ProgressRecord::for_task("b", &t)).await.unwrap();

    let rec = store.get("b", &t.id).await.unwrap().unwrap();
    assert_eq!(rec.status, TaskStatus::Succeeded);
    assert_eq!(rec.attempts, 2);
    assert!(rec.last_error.is_none());
    assert!(rec.completed_at.is_some());
}

#[tokio::test]
async fn seed_does_not_reset_existing_outcomes() {
    let store = open_memory().await.unwrap();
    let mut t = task("https://a.example/done.pdf");
    t.status = TaskStatus::Succeeded;
    t.attempts = 1;
    store.put(&ProgressRecord::for_task("b", &t)).await.unwrap();

    store.seed_pending("b", std::slice::from_ref(&t)).await.unwrap();
    let rec = store.get("b", &t.id).await.unwrap().unwrap();
    assert_eq!(rec.status, TaskStatus::Succeeded);
}

#[tokio::test]
async fn batches_are_isolated_and_clearable() {
    let store = open_memory().await.unwrap();
    let tasks = vec![task("https://a.example/1.pdf")];
    store.seed_pending("one", &tasks).await.unwrap();
    store.seed_pending("two", &tasks).await.unwrap();
    assert_eq!(store.batch_ids().await.unwrap(), vec!["one", "two"]);

    assert_eq!(store.clear_batch("one").await.unwrap(), 1);
    assert!(store.load_batch("one").await.unwrap().is_empty());
    assert_eq!(store.load_batch("two").await.unwrap().len(), 1);
}

#[tokio::test]
async fn counts_and_status_listing() {
    let store = open_memory().await.unwrap();
    let mut a = task("https://a.example/a.pdf");
    let mut b = task("https://a.example/b.pdf");
    let c = task("https://a.example/c.pdf");
    let d = task("https://a.example/d.pdf");
    store
        .seed_pending("b", &[a.clone(), b.clone(), c, d])
        .await
        .unwrap();
    a.status = TaskStatus::Succeeded;
    b.status = TaskStatus::PermanentlyFailed;
    b.last_error = Some(ErrorKind::NotFound);
    store.put(&ProgressRecord::for_task("b", &a)).await.unwrap();
    store.put(&ProgressRecord::for_task("b", &b)).await.unwrap();

    let counts = store.counts("b").await.unwrap();
    assert_eq!(counts.succeeded, 1);
    assert_eq!(counts.permanently_failed, 1);
    assert_eq!(counts.pending, 2);
    assert_eq!(counts.total(), 4);

    let perm = store
        .list_with_status("b", TaskStatus::PermanentlyFailed)
        .await
        .unwrap();
    assert_eq!(perm.len(), 1);
    assert_eq!(perm[0].last_error, Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn records_survive_reopen_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("batch.csv.progress.db");
    let t = task("https://a.example/keep.pdf");
    {
        let store = ProgressStore::open_at(&path).await.unwrap();
        let mut done = t.clone();
        done.status = TaskStatus::Succeeded;
        done.attempts = 1;
        store.put(&ProgressRecord::for_task("batch", &done)).await.unwrap();
        store.close().await;
    }
    let store = ProgressStore::open_at(&path).await.unwrap();
    let rec = store.get("batch", &t.id).await.unwrap().unwrap();
    assert_eq!(rec.status, TaskStatus::Succeeded);
}

#[tokio::test]
async fn closed_store_rejects_writes() {
    let store = open_memory().await.unwrap();
    store.close().await;
    let t = task("https://a.example/late.pdf");
    assert!(store.put(&ProgressRecord::for_task("b", &t)).await.is_err());
}

#[tokio::test]
async fn succeeded_record_keeps_output_path_and_hash() {
    let store = open_memory().await.unwrap();
    let mut t = task("https://a.example/out.pdf");
    t.status = TaskStatus::Succeeded;
    t.attempts = 1;
    let mut rec = ProgressRecord::for_task("b", &t);
    rec.output_path = Some(std::path::PathBuf::from("/data/out/tax_out_20240102_abcd1234.pdf"));
    rec.content_hash = Some("ab".repeat(32));
    store.put(&rec).await.unwrap();

    let back = store.get("b", &t.id).await.unwrap().unwrap();
    assert_eq!(back.output_path, rec.output_path);
    assert_eq!(back.content_hash, rec.content_hash);

    // A later failed attempt drops the stale output.
    t.status = TaskStatus::Failed;
    store.put(&ProgressRecord::for_task("b", &t)).await.unwrap();
    let back = store.get("b", &t.id).await.unwrap().unwrap();
    assert!(back.output_path.is_none());
    assert!(back.content_hash.is_none());
}

#[tokio::test]
async fn store_without_output_columns_is_upgraded_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.csv.progress.db");
    {
        let opts = sqlx::sqlite::SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = sqlx::SqlitePool::connect_with(opts).await.unwrap();
        sqlx::query(
            r#"
            CREATE TABLE progress (
                batch_id TEXT NOT NULL,
                task_id TEXT NOT NULL,
                url TEXT NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                completed_at INTEGER,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (batch_id, task_id)
            );
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
    }

    let store = ProgressStore::open_at(&path).await.unwrap();
    let t = task("https://a.example/legacy.pdf");
    store.seed_pending("old", std::slice::from_ref(&t)).await.unwrap();
    let rec = store.get("old", &t.id).await.unwrap().unwrap();
    assert_eq!(rec.status, TaskStatus::Pending);
    assert!(rec.output_path.is_none());

    // Reopening must not try to add the columns twice.
    store.close().await;
    ProgressStore::open_at(&path).await.unwrap();
}
