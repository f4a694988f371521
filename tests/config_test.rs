use std::time::Duration;

use taskq::config::Config;
use taskq::config::secrets::ExposeSecret;

// Environment is process-global, so every case runs in one test.
#[test]
fn config_from_env() {
    unsafe {
        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("TASKQ_QUEUE_LOCK_ATTEMPTS");
        std::env::remove_var("TASKQ_QUEUE_LOCK_DELAY_MS");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::set_var("DATABASE_URL", "sqlite:///tmp/taskq-test.db");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.database_url.expose_secret(), "sqlite:///tmp/taskq-test.db");
    assert!(!config.log_level.is_empty());
    let policy = config.queue_lock_policy();
    assert_eq!(policy.max_attempts, 10);
    assert_eq!(policy.retry_delay, Duration::from_secs(1));

    unsafe {
        std::env::set_var("TASKQ_QUEUE_LOCK_ATTEMPTS", "3");
        std::env::set_var("TASKQ_QUEUE_LOCK_DELAY_MS", "250");
    }
    let policy = Config::from_env().unwrap().queue_lock_policy();
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.retry_delay, Duration::from_millis(250));

    unsafe {
        std::env::set_var("TASKQ_QUEUE_LOCK_ATTEMPTS", "many");
    }
    assert!(matches!(
        Config::from_env(),
        Err(taskq::Error::Config(_))
    ));

    unsafe {
        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("TASKQ_QUEUE_LOCK_ATTEMPTS");
        std::env::remove_var("TASKQ_QUEUE_LOCK_DELAY_MS");
    }
}
