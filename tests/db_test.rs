use serde_json::json;
use taskq::db::Db;
use taskq::queue::TaskQueue;
use taskq::setup::{Manifest, provision};

async fn test_db() -> (tempfile::TempDir, Db) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("pool.db").display());
    let db = Db::connect(&url).await.unwrap();
    db.migrate().await.unwrap();
    (dir, db)
}

#[tokio::test]
async fn connects_and_migrates() {
    let (_dir, db) = test_db().await;
    assert!(db.health_check().await.is_ok());
    // Migrations are idempotent.
    db.migrate().await.unwrap();
}

#[tokio::test]
async fn provisioned_records_start_unlocked_and_empty() {
    let (_dir, db) = test_db().await;
    let lock_id = db.create_task_lock("nightly gc").await.unwrap();
    let queue_id = db.create_queue(Some(lock_id), "gc jobs").await.unwrap();

    let queue = db.queue_record(queue_id).await.unwrap();
    assert_eq!(queue.lock_id, Some(lock_id));
    assert!(queue.items.is_empty());
    assert!(!queue.queue_locked);
    assert_eq!(queue.description, "gc jobs");

    let lock = db.task_lock_record(lock_id).await.unwrap();
    assert!(!lock.locked);
    assert_eq!(lock.current_holder_task_id, None);
    assert_eq!(lock.description, "nightly gc");
}

#[tokio::test]
async fn manifest_provisions_locks_queues_and_items() {
    let (_dir, db) = test_db().await;
    let manifest: Manifest = r#"
        [[lock]]
        name = "gc"
        description = "one collector at a time"

        [[queue]]
        name = "gc-jobs"
        lock = "gc"
        items = ["GC-A0001", "GC-A0002", "GC-A0003"]

        [[queue]]
        name = "adhoc"
    "#
    .parse()
    .unwrap();

    let provisioned = provision(&db, &manifest).await.unwrap();
    assert_eq!(provisioned.locks.len(), 1);
    assert_eq!(provisioned.queues.len(), 2);

    let (_, lock_id) = provisioned.locks[0];
    let (_, gc_jobs) = provisioned.queues[0];
    let (_, adhoc) = provisioned.queues[1];

    let queue = TaskQueue::open(db.clone(), gc_jobs).await.unwrap();
    assert_eq!(queue.lock_id(), Some(lock_id));
    assert_eq!(
        queue.get(Some(1)).await.unwrap(),
        vec![json!("GC-A0001")]
    );
    assert_eq!(db.queue_record(adhoc).await.unwrap().lock_id, None);
}

#[tokio::test]
async fn inconsistent_manifest_writes_nothing() {
    let (_dir, db) = test_db().await;
    let manifest: Manifest = r#"
        [[queue]]
        name = "orphan"
        lock = "nope"
    "#
    .parse()
    .unwrap();

    assert!(provision(&db, &manifest).await.is_err());
    assert!(db.queue_record(taskq::model::QueueId(1)).await.is_err());
}
