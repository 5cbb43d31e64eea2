mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeDriver, FakeError, Line, RecordingLogger};
use mssql_connector::factory::SESSION_WARNING_HEADER;
use mssql_connector::prelude::*;
use tokio::time::Instant;

fn config() -> ConnectionConfig {
    ConnectionConfig::new("etl".into(), "pw".into(), "db.local".into(), "sales".into())
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new().base_delay(Duration::from_millis(1))
}

#[tokio::test]
async fn opens_on_first_attempt_with_default_port() {
    let driver = FakeDriver::new();
    let probe = Arc::clone(&driver.probe);
    let factory = ConnectionFactory::new(driver);

    let conn = factory.open(&config()).await.unwrap();
    assert_eq!(probe.attempt_count(), 1);

    let args = probe.args.lock().unwrap()[0].clone();
    assert_eq!(args.port, "1433");
    assert_eq!(args.server, "db.local");
    assert_eq!(args.charset, "UTF-8");

    conn.close().await.unwrap();
    assert_eq!(probe.closed(), 1);
}

#[tokio::test]
async fn configured_port_reaches_driver() {
    let driver = FakeDriver::new();
    let probe = Arc::clone(&driver.probe);
    let factory = ConnectionFactory::new(driver);

    let _conn = factory
        .open(&config().with_port(Some(14330)))
        .await
        .unwrap();
    assert_eq!(probe.args.lock().unwrap()[0].port, "14330");
}

#[tokio::test(start_paused = true)]
async fn retries_failed_connects_with_doubling_backoff() {
    let driver = FakeDriver::new().failing_connects(3);
    let probe = Arc::clone(&driver.probe);
    let factory = ConnectionFactory::new(driver);

    let conn = factory.open(&config()).await;
    assert!(conn.is_ok());
    assert_eq!(probe.attempt_count(), 4);

    let stamps: Vec<Instant> = probe.attempts.lock().unwrap().clone();
    let gaps: Vec<Duration> = stamps.windows(2).map(|w| w[1] - w[0]).collect();
    for pair in gaps.windows(2) {
        let ratio = pair[1].as_secs_f64() / pair[0].as_secs_f64();
        assert!((ratio - 2.0).abs() < 0.01, "ratio was {ratio}");
    }
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_returns_last_driver_error() {
    let driver = FakeDriver::new().failing_connects(usize::MAX);
    let probe = Arc::clone(&driver.probe);
    let factory = ConnectionFactory::new(driver);

    let err = factory.open(&config()).await.unwrap_err();
    assert_eq!(probe.attempt_count(), 5);
    assert_eq!(
        err,
        FakeError {
            attempt: 5,
            reason: "login failed"
        }
    );
}

#[tokio::test]
async fn failed_handshake_closes_session_and_retries() {
    let driver = FakeDriver::new().failing_handshakes(2);
    let probe = Arc::clone(&driver.probe);
    let factory = ConnectionFactory::new(driver)
        .with_policy(fast_policy())
        .with_session_statement("SET ANSI_WARNINGS ON");

    let conn = factory.open(&config()).await.unwrap();
    assert_eq!(probe.attempt_count(), 3);
    // the two sessions whose handshake failed were closed before retrying
    assert_eq!(probe.closed(), 2);
    assert_eq!(
        *probe.statements.lock().unwrap(),
        vec!["SET ANSI_WARNINGS ON".to_string()]
    );

    conn.close().await.unwrap();
    assert_eq!(probe.closed(), 3);
}

#[tokio::test]
async fn handshake_failure_on_every_attempt_leaks_nothing() {
    let driver = FakeDriver::new().failing_handshakes(usize::MAX / 2);
    let probe = Arc::clone(&driver.probe);
    let factory = ConnectionFactory::new(driver)
        .with_policy(fast_policy())
        .with_session_statement("SET NOCOUNT ON");

    let err = factory.open(&config()).await.unwrap_err();
    assert_eq!(err.reason, "server busy");
    assert_eq!(err.attempt, 5);
    assert_eq!(probe.attempt_count(), 5);
    assert_eq!(probe.closed(), 5);
}

#[tokio::test]
async fn session_warnings_are_logged_not_raised() {
    let logger = Arc::new(RecordingLogger::default());
    let driver = FakeDriver::new().with_warnings(&["ANSI_PADDING is off", "ARITHABORT is off"]);
    let factory = ConnectionFactory::new(driver).with_logger(Arc::clone(&logger));

    let conn = factory.open(&config()).await;
    assert!(conn.is_ok());
    assert_eq!(
        logger.lines(),
        vec![
            Line::Info(SESSION_WARNING_HEADER.to_string()),
            Line::Warning("ANSI_PADDING is off".to_string()),
            Line::Warning("ARITHABORT is off".to_string()),
        ]
    );
}

#[tokio::test]
async fn failed_attempts_go_to_injected_logger() {
    let logger = Arc::new(RecordingLogger::default());
    let factory = ConnectionFactory::new(FakeDriver::new().failing_connects(2))
        .with_policy(fast_policy())
        .with_logger(Arc::clone(&logger));

    let _conn = factory.open(&config()).await.unwrap();
    let lines = logger.lines();
    assert_eq!(lines.len(), 2);
    match (&lines[0], &lines[1]) {
        (Line::Warning(first), Line::Warning(second)) => {
            assert!(first.starts_with("attempt 1/5 failed: fake failure on attempt 1"));
            assert!(second.starts_with("attempt 2/5 failed: fake failure on attempt 2"));
        }
        other => panic!("unexpected log lines: {other:?}"),
    }
}

#[tokio::test]
async fn exhausted_budget_logs_final_warning() {
    let logger = Arc::new(RecordingLogger::default());
    let factory = ConnectionFactory::new(FakeDriver::new().failing_connects(usize::MAX))
        .with_policy(fast_policy().max_attempts(2))
        .with_logger(Arc::clone(&logger));

    assert!(factory.open(&config()).await.is_err());
    assert_eq!(
        logger.lines().last(),
        Some(&Line::Warning(
            "giving up after 2 attempts: fake failure on attempt 2: login failed".to_string()
        ))
    );
}

#[tokio::test]
async fn no_warnings_means_no_log_lines() {
    let logger = Arc::new(RecordingLogger::default());
    let factory = ConnectionFactory::new(FakeDriver::new()).with_logger(Arc::clone(&logger));

    let _conn = factory.open(&config()).await.unwrap();
    assert!(logger.lines().is_empty());
}

#[tokio::test]
async fn scoped_closes_on_success() {
    let driver = FakeDriver::new();
    let probe = Arc::clone(&driver.probe);
    let conn = ConnectionFactory::new(driver).open(&config()).await.unwrap();

    let value = conn
        .scoped(|conn| {
            Box::pin(async move {
                conn.cursor().execute_batch("SELECT 1").await?;
                Ok::<_, FakeError>(42)
            })
        })
        .await
        .unwrap();

    assert_eq!(value, 42);
    assert_eq!(probe.closed(), 1);
}

#[tokio::test]
async fn scoped_closes_on_failure() {
    let driver = FakeDriver::new();
    let probe = Arc::clone(&driver.probe);
    let conn = ConnectionFactory::new(driver).open(&config()).await.unwrap();

    let result: Result<(), FakeError> = conn
        .scoped(|_conn| {
            Box::pin(async move {
                Err(FakeError {
                    attempt: 0,
                    reason: "extract failed",
                })
            })
        })
        .await;

    assert_eq!(result.unwrap_err().reason, "extract failed");
    assert_eq!(probe.closed(), 1);
}

#[tokio::test]
async fn no_retry_policy_makes_one_attempt() {
    let driver = FakeDriver::new().failing_connects(1);
    let probe = Arc::clone(&driver.probe);
    let factory = ConnectionFactory::new(driver).with_policy(RetryPolicy::no_retry());

    assert!(factory.open(&config()).await.is_err());
    assert_eq!(probe.attempt_count(), 1);
    assert_eq!(factory.policy().attempts(), 1);
}
