//! Integration tests for per-batch tracing logs.

use serde_json::json;
use taskq::db::Db;
use taskq::error::Error;
use taskq::model::QueueId;
use taskq::trace_log::TaskTracing;
use tempfile::TempDir;

async fn test_db() -> (TempDir, Db, QueueId) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("pool.db").display());
    let db = Db::connect(&url).await.unwrap();
    db.migrate().await.unwrap();
    let queue = db.create_queue(None, "traced").await.unwrap();
    (dir, db, queue)
}

#[tokio::test]
async fn outcomes_are_joined_in_call_order() {
    let (_dir, db, queue) = test_db().await;
    let mut tracer = TaskTracing::start(
        db.clone(),
        queue,
        vec![json!("x"), json!("y"), json!("z")],
    )
    .await
    .unwrap();

    tracer.ok(0).await.unwrap();
    tracer.fail(1).await.unwrap();
    tracer.ok(2).await.unwrap();

    let record = db.tracing_record(tracer.id()).await.unwrap();
    assert_eq!(record.outcome_log, "0:ok,1:fail,2:ok");
    assert_eq!(tracer.log(), "0:ok,1:fail,2:ok");
}

#[tokio::test]
async fn log_is_persisted_after_every_call() {
    let (_dir, db, queue) = test_db().await;
    let mut tracer = TaskTracing::start(db.clone(), queue, vec![json!(1), json!(2)])
        .await
        .unwrap();

    assert_eq!(db.tracing_record(tracer.id()).await.unwrap().outcome_log, "");

    tracer.fail(0).await.unwrap();
    assert_eq!(
        db.tracing_record(tracer.id()).await.unwrap().outcome_log,
        "0:fail"
    );

    tracer.ok(1).await.unwrap();
    assert_eq!(
        db.tracing_record(tracer.id()).await.unwrap().outcome_log,
        "0:fail,1:ok"
    );
}

#[tokio::test]
async fn out_of_order_marks_are_not_reordered() {
    let (_dir, db, queue) = test_db().await;
    let mut tracer = TaskTracing::start(db.clone(), queue, vec![json!("a"), json!("b"), json!("c")])
        .await
        .unwrap();

    tracer.ok(2).await.unwrap();
    tracer.ok(0).await.unwrap();
    tracer.fail(1).await.unwrap();

    let record = db.tracing_record(tracer.id()).await.unwrap();
    assert_eq!(record.entries(), vec!["2:ok", "0:ok", "1:fail"]);
}

#[tokio::test]
async fn marks_with_commas_stay_whole_entries() {
    let (_dir, db, queue) = test_db().await;
    let mut tracer = TaskTracing::start(db.clone(), queue, vec![json!("a"), json!("b")])
        .await
        .unwrap();

    tracer.ok("a,b").await.unwrap();
    tracer.fail(1).await.unwrap();

    let record = db.tracing_record(tracer.id()).await.unwrap();
    assert_eq!(record.outcome_log, "a,b:ok,1:fail");
    assert_eq!(record.entries(), vec!["a,b:ok", "1:fail"]);
}

#[tokio::test]
async fn marks_may_be_item_values() {
    let (_dir, db, queue) = test_db().await;
    let mut tracer = TaskTracing::start(db.clone(), queue, vec![json!("GC-A1"), json!("GC-B2")])
        .await
        .unwrap();

    tracer.ok("GC-A1").await.unwrap();
    tracer.fail("GC-B2").await.unwrap();
    tracer.ok("GC-B2").await.unwrap();

    assert_eq!(
        db.tracing_record(tracer.id()).await.unwrap().outcome_log,
        "GC-A1:ok,GC-B2:fail,GC-B2:ok"
    );
}

#[tokio::test]
async fn snapshot_and_start_time_are_stored() {
    let (_dir, db, queue) = test_db().await;
    let batch = vec![json!("x"), json!({"id": 7})];
    let before = chrono::Utc::now();

    let tracer = TaskTracing::start(db.clone(), queue, batch.clone())
        .await
        .unwrap();

    let record = db.tracing_record(tracer.id()).await.unwrap();
    assert_eq!(record.task_id, queue);
    assert_eq!(record.items_snapshot, batch);
    assert_eq!(tracer.items(), batch.as_slice());
    assert!(record.start_time >= before - chrono::Duration::seconds(1));
}

#[tokio::test]
async fn empty_batch_is_rejected_and_nothing_written() {
    let (_dir, db, queue) = test_db().await;

    let err = TaskTracing::start(db.clone(), queue, Vec::new())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::InvalidArgument(_)), "got {err:?}");
    assert!(db.recent_tracing(queue, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn each_batch_gets_its_own_record() {
    let (_dir, db, queue) = test_db().await;

    let mut first = TaskTracing::start(db.clone(), queue, vec![json!(1)]).await.unwrap();
    let mut second = TaskTracing::start(db.clone(), queue, vec![json!(2)]).await.unwrap();
    assert_ne!(first.id(), second.id());

    first.ok(0).await.unwrap();
    second.fail(0).await.unwrap();

    let recent = db.recent_tracing(queue, 10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, second.id());
    assert_eq!(recent[0].outcome_log, "0:fail");
    assert_eq!(recent[1].outcome_log, "0:ok");
}
