#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mssql_connector::{ConnectionLogger, Driver, DriverArgs, Session};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fake failure on attempt {attempt}: {reason}")]
pub struct FakeError {
    pub attempt: usize,
    pub reason: &'static str,
}

/// Shared counters a test can inspect after handing the driver to a factory.
#[derive(Debug, Default)]
pub struct Probe {
    pub attempts: Mutex<Vec<Instant>>,
    pub args: Mutex<Vec<DriverArgs>>,
    pub statements: Mutex<Vec<String>>,
    pub closed: AtomicUsize,
}

impl Probe {
    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Driver that fails `connect` for the first `connect_failures` attempts, and can make the
/// handshake statements fail for the first `handshake_failures` sessions.
#[derive(Debug, Clone)]
pub struct FakeDriver {
    pub connect_failures: usize,
    pub handshake_failures: usize,
    pub warnings: Vec<String>,
    pub probe: Arc<Probe>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            connect_failures: 0,
            handshake_failures: 0,
            warnings: Vec::new(),
            probe: Arc::new(Probe::default()),
        }
    }

    pub fn failing_connects(mut self, n: usize) -> Self {
        self.connect_failures = n;
        self
    }

    pub fn failing_handshakes(mut self, n: usize) -> Self {
        self.handshake_failures = n;
        self
    }

    pub fn with_warnings(mut self, warnings: &[&str]) -> Self {
        self.warnings = warnings.iter().map(|w| (*w).to_string()).collect();
        self
    }
}

#[async_trait]
impl Driver for FakeDriver {
    type Error = FakeError;
    type Session = FakeSession;

    async fn connect(&self, args: &DriverArgs) -> Result<FakeSession, FakeError> {
        let attempt = {
            let mut attempts = self.probe.attempts.lock().unwrap();
            attempts.push(Instant::now());
            attempts.len()
        };
        self.probe.args.lock().unwrap().push(args.clone());

        if attempt <= self.connect_failures {
            return Err(FakeError {
                attempt,
                reason: "login failed",
            });
        }
        Ok(FakeSession {
            attempt,
            fail_statements: attempt <= self.connect_failures + self.handshake_failures,
            warnings: self.warnings.clone(),
            probe: Arc::clone(&self.probe),
        })
    }
}

#[derive(Debug)]
pub struct FakeSession {
    attempt: usize,
    fail_statements: bool,
    warnings: Vec<String>,
    probe: Arc<Probe>,
}

#[async_trait]
impl Session for FakeSession {
    type Error = FakeError;

    async fn execute_batch(&mut self, sql: &str) -> Result<(), FakeError> {
        if self.fail_statements {
            return Err(FakeError {
                attempt: self.attempt,
                reason: "server busy",
            });
        }
        self.probe.statements.lock().unwrap().push(sql.to_string());
        Ok(())
    }

    fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    async fn close(self) -> Result<(), FakeError> {
        self.probe.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Info(String),
    Warning(String),
}

#[derive(Debug, Default)]
pub struct RecordingLogger {
    pub lines: Mutex<Vec<Line>>,
}

impl RecordingLogger {
    pub fn lines(&self) -> Vec<Line> {
        self.lines.lock().unwrap().clone()
    }
}

impl ConnectionLogger for RecordingLogger {
    fn info(&self, message: &str) {
        self.lines.lock().unwrap().push(Line::Info(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.lines
            .lock()
            .unwrap()
            .push(Line::Warning(message.to_string()));
    }
}
