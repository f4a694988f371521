//! taskq CLI: operator and scripting interface to a shared task pool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use taskq::config::Config;
use taskq::config::secrets::ExposeSecret;
use taskq::db::Db;
use taskq::engine::{BatchOptions, BatchOutcome, run_batch};
use taskq::model::QueueId;
use taskq::queue::TaskQueue;
use taskq::setup::{Manifest, provision};
use taskq::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "taskq", about = "Persisted work queue shared between processes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create tables, then provision locks and queues from a manifest
    Setup {
        /// TOML manifest of locks and queues
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    /// Append items to a queue
    Put {
        /// Queue id
        queue: i64,
        /// JSON array of items
        items: String,
    },
    /// Take items off the front of a queue and print them as JSON
    Get {
        /// Queue id
        queue: i64,
        /// Number of items (default: all)
        #[arg(short = 'n', long)]
        count: Option<i64>,
    },
    /// Show a queue, its task lock and recent tracing logs
    Show {
        /// Queue id
        queue: i64,
        /// Tracing records to list
        #[arg(long, default_value_t = 5)]
        tracing: i64,
    },
    /// Process one batch, printing each item
    Run {
        /// Queue id
        queue: i64,
        /// Do not take the queue's task lock
        #[arg(long)]
        no_lock: bool,
        /// Do not write a tracing log
        #[arg(long)]
        no_trace: bool,
    },
    /// Clear a queue lock left behind by a crashed process
    UnlockQueue {
        /// Queue id
        queue: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "taskq".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    let db = Db::connect(config.database_url.expose_secret()).await?;
    let result = dispatch(&db, &config, cli.command).await;
    db.close().await;
    result
}

async fn dispatch(db: &Db, config: &Config, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Setup { manifest } => cmd_setup(db, manifest).await,
        Command::Put { queue, items } => {
            let items: Vec<serde_json::Value> = serde_json::from_str(&items)
                .map_err(|e| anyhow::anyhow!("items must be a JSON array: {e}"))?;
            let count = items.len();
            open_queue(db, config, queue).await?.put(items).await?;
            println!("Put {count} item(s) into queue {queue}");
            Ok(())
        }
        Command::Get { queue, count } => {
            let items = open_queue(db, config, queue).await?.get(count).await?;
            println!("{}", serde_json::to_string(&items)?);
            Ok(())
        }
        Command::Show { queue, tracing } => cmd_show(db, QueueId(queue), tracing).await,
        Command::Run {
            queue,
            no_lock,
            no_trace,
        } => {
            let queue = open_queue(db, config, queue).await?;
            let options = BatchOptions {
                task_lock: !no_lock,
                tracing: !no_trace,
            };
            let outcome = run_batch(&queue, options, |item| async move {
                println!("{item}");
                true
            })
            .await?;
            match outcome {
                BatchOutcome::Empty => println!("Queue is empty."),
                BatchOutcome::LockBusy => println!("Task lock is held elsewhere; nothing done."),
                BatchOutcome::Processed(n) => println!("Processed {n} item(s)."),
            }
            Ok(())
        }
        Command::UnlockQueue { queue } => {
            db.force_unlock_queue(QueueId(queue)).await?;
            println!("Queue lock on {} cleared.", QueueId(queue));
            Ok(())
        }
    }
}

async fn open_queue(db: &Db, config: &Config, id: i64) -> anyhow::Result<TaskQueue> {
    Ok(TaskQueue::open_with_policy(db.clone(), QueueId(id), config.queue_lock_policy()).await?)
}

async fn cmd_setup(db: &Db, manifest: Option<PathBuf>) -> anyhow::Result<()> {
    db.migrate().await?;
    println!("Schema ready.");

    let Some(path) = manifest else {
        return Ok(());
    };
    let manifest = Manifest::load(&path)?;
    let provisioned = provision(db, &manifest).await?;

    for (name, id) in &provisioned.locks {
        println!("lock   {name:<20} {id}");
    }
    for (name, id) in &provisioned.queues {
        println!("queue  {name:<20} {id}");
    }
    Ok(())
}

async fn cmd_show(db: &Db, id: QueueId, tracing_limit: i64) -> anyhow::Result<()> {
    let queue = db.queue_record(id).await?;

    println!("ID:          {}", queue.id);
    println!("Description: {}", queue.description);
    println!("Items:       {}", queue.items.len());
    println!("Queue Lock:  {}", if queue.queue_locked { "held" } else { "free" });
    println!("Updated:     {}", queue.updated_at);

    if let Some(lock_id) = queue.lock_id {
        let lock = db.task_lock_record(lock_id).await?;
        println!("---");
        println!("Task Lock:   {}", lock.id);
        println!("State:       {}", if lock.locked { "held" } else { "free" });
        println!("Last Holder: {}", holder_label(lock.current_holder_task_id));
        println!("Updated:     {}", lock.updated_at);
    }

    let records = db.recent_tracing(id, tracing_limit).await?;
    if records.is_empty() {
        return Ok(());
    }
    println!("---");
    println!("{:<12}  {:<20}  {:<6}  TRACING", "ID", "STARTED", "ITEMS");
    for record in &records {
        println!(
            "{:<12}  {:<20}  {:<6}  {}",
            record.id,
            record.start_time.format("%Y-%m-%d %H:%M:%S"),
            record.items_snapshot.len(),
            record.outcome_log
        );
    }
    Ok(())
}

fn holder_label(holder: Option<i64>) -> String {
    holder.map_or_else(|| "-".to_string(), |n| n.to_string())
}
