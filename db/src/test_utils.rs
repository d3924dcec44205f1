//! Shared test utilities for unit and integration tests.
//!
//! [`MockEngine`] is a scriptable engine: it can fail opens or connects,
//! delay every query, answer through a responder closure, and records what
//! it was asked to run. Clones share the same recorded state, so a test can
//! keep one handle while the client owns another.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backend::{
    ColumnMetadata, Engine, EngineConnection, EngineError, EngineInstance, EngineOptions,
    RawResult, Value,
};

type Responder = dyn Fn(&str, &[Value]) -> Result<RawResult, EngineError> + Send + Sync;

#[derive(Default)]
struct MockShared {
    failing_opens: AtomicU32,
    failing_connects: AtomicU32,
    open_attempts: AtomicU32,
    opened: AtomicU32,
    closed: AtomicU32,
    terminated: AtomicU32,
    delay: Mutex<Duration>,
    responder: Mutex<Option<Arc<Responder>>>,
    executed: Mutex<Vec<(String, Vec<Value>)>>,
    last_options: Mutex<Option<EngineOptions>>,
}

#[derive(Clone, Default)]
pub struct MockEngine {
    shared: Arc<MockShared>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` calls to `open`.
    pub fn failing_opens(self, n: u32) -> Self {
        self.shared.failing_opens.store(n, Ordering::SeqCst);
        self
    }

    /// Fail the next `n` calls to `connect`.
    pub fn failing_connects(self, n: u32) -> Self {
        self.shared.failing_connects.store(n, Ordering::SeqCst);
        self
    }

    /// Sleep this long inside every query.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.shared.delay.lock().unwrap() = delay;
        self
    }

    pub fn with_responder<F>(self, f: F) -> Self
    where
        F: Fn(&str, &[Value]) -> Result<RawResult, EngineError> + Send + Sync + 'static,
    {
        *self.shared.responder.lock().unwrap() = Some(Arc::new(f));
        self
    }

    /// Every query fails with this engine message.
    pub fn failing_with(self, message: &str) -> Self {
        let message = message.to_string();
        self.with_responder(move |_, _| Err(EngineError::new(message.clone())))
    }

    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.shared.executed.lock().unwrap().clone()
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.executed().into_iter().map(|(sql, _)| sql).collect()
    }

    pub fn open_attempts(&self) -> u32 {
        self.shared.open_attempts.load(Ordering::SeqCst)
    }

    pub fn connections_opened(&self) -> u32 {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn connections_closed(&self) -> u32 {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> u32 {
        self.shared.terminated.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<EngineOptions> {
        self.shared.last_options.lock().unwrap().clone()
    }

    /// Wait until at least `n` connections were closed. Closes may happen on
    /// a background blocking task.
    pub async fn wait_for_closes(&self, n: u32) {
        for _ in 0..500 {
            if self.connections_closed() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!(
            "expected {n} closed connections, got {}",
            self.connections_closed()
        );
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl Engine for MockEngine {
    fn open(&self, options: &EngineOptions) -> Result<Box<dyn EngineInstance>, EngineError> {
        self.shared.open_attempts.fetch_add(1, Ordering::SeqCst);
        *self.shared.last_options.lock().unwrap() = Some(options.clone());
        if take_failure(&self.shared.failing_opens) {
            return Err(EngineError::new("IO Error: could not open database"));
        }
        Ok(Box::new(MockInstance {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockInstance {
    shared: Arc<MockShared>,
}

impl EngineInstance for MockInstance {
    fn connect(&self) -> Result<Box<dyn EngineConnection>, EngineError> {
        if take_failure(&self.shared.failing_connects) {
            return Err(EngineError::new("Connection Error: too many sessions"));
        }
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn terminate(&self) -> Result<(), EngineError> {
        self.shared.terminated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockConnection {
    shared: Arc<MockShared>,
}

impl EngineConnection for MockConnection {
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<RawResult, EngineError> {
        self.shared
            .executed
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));

        let delay = *self.shared.delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let responder = self.shared.responder.lock().unwrap().clone();
        match responder {
            Some(f) => f(sql, params),
            None => Ok(RawResult::default()),
        }
    }

    fn close(self: Box<Self>) -> Result<(), EngineError> {
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Build a raw result from column names and rows.
pub fn raw_result(columns: &[&str], rows: Vec<Vec<Value>>) -> RawResult {
    RawResult {
        columns: columns
            .iter()
            .map(|name| ColumnMetadata::new(*name, "UNKNOWN"))
            .collect(),
        rows,
        rows_affected: None,
    }
}
