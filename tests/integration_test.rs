//! Producer/consumer lifecycle across separate store handles.

use serde_json::json;
use taskq::db::Db;
use taskq::engine::{BatchOptions, BatchOutcome, run_batch};
use taskq::queue::TaskQueue;

#[tokio::test]
async fn producer_and_consumer_share_a_queue() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("pool.db").display());

    let setup = Db::connect(&url).await.unwrap();
    setup.migrate().await.unwrap();
    let lock_id = setup.create_task_lock("single consumer").await.unwrap();
    let queue_id = setup.create_queue(Some(lock_id), "jobs").await.unwrap();
    setup.close().await;

    // Producer
    let producer = TaskQueue::open(Db::connect(&url).await.unwrap(), queue_id)
        .await
        .unwrap();
    producer
        .put(["A", "B", "C", "D", "E"].map(|s| json!(s)))
        .await
        .unwrap();

    // Consumer takes a partial batch first.
    let consumer_db = Db::connect(&url).await.unwrap();
    let consumer = TaskQueue::open(consumer_db.clone(), queue_id).await.unwrap();
    assert_eq!(consumer.get(Some(2)).await.unwrap(), vec![json!("A"), json!("B")]);
    assert_eq!(
        consumer_db.queue_items(queue_id).await.unwrap(),
        vec![json!("C"), json!("D"), json!("E")]
    );

    // Then runs the rest as a traced, locked batch.
    let outcome = run_batch(&consumer, BatchOptions::default(), |item| async move {
        item != json!("D")
    })
    .await
    .unwrap();
    assert_eq!(outcome, BatchOutcome::Processed(3));
    assert!(consumer.empty().await.unwrap());

    let trace = &consumer_db.recent_tracing(queue_id, 1).await.unwrap()[0];
    assert_eq!(trace.items_snapshot, vec![json!("C"), json!("D"), json!("E")]);
    assert_eq!(trace.outcome_log, "0:ok,1:fail,2:ok");
}
