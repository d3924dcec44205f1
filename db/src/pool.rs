//! Bounded connection pool with FIFO waiters.
//!
//! The pool owns up to `max_connections` engine connections. A connection is
//! either idle inside the pool or lent to exactly one [`PooledConnection`]
//! guard; dropping the guard returns it. When capacity is exhausted callers
//! queue on a oneshot channel and are served strictly in arrival order.
//!
//! The state mutex guards state transitions only. Engine calls (connect,
//! query, close) always run on the blocking thread pool with the lock
//! released.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::backend::{EngineConnection, EngineError, EngineInstance, RawResult, Value};
use crate::error::DbError;

/// Opaque connection identity, rendered as `conn_<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}

impl Serialize for ConnectionId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Busy,
    Closed,
}

/// Point-in-time snapshot of one pooled connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub state: ConnectionState,
    pub created_at: Instant,
    pub last_used_at: Instant,
    pub query_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub total_connections: usize,
    pub active_connections: usize,
    pub idle_connections: usize,
    pub waiting_requests: usize,
    pub closed_connections: u64,
    pub total_queries: u64,
    /// Mean duration of successful `with_connection` calls, in milliseconds.
    pub avg_query_time: f64,
    pub peak_memory_usage: u64,
    pub current_memory_usage: u64,
}

#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_connections: usize,
    pub idle_timeout: Option<Duration>,
}

/// Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    instance: Arc<dyn EngineInstance>,
    max_connections: usize,
    idle_timeout: Option<Duration>,
    next_id: AtomicU64,
    state: Mutex<PoolState>,
}

struct Slot {
    info: ConnectionInfo,
    // Some iff the connection is idle.
    conn: Option<Box<dyn EngineConnection>>,
}

#[derive(Default)]
struct PoolState {
    connections: BTreeMap<ConnectionId, Slot>,
    // Slots handed out for connections still being opened.
    reserved: usize,
    waiters: VecDeque<oneshot::Sender<Grant>>,
    disposed: bool,
    closed_total: u64,
    total_queries: u64,
    total_query_time: Duration,
    current_memory: u64,
    peak_memory: u64,
}

/// What a queued waiter receives: a released connection, or the right to
/// open a new one after a failed creation freed capacity.
enum Grant {
    Connection(PooledConnection),
    Slot(SlotReservation),
}

enum Step {
    Ready(PooledConnection),
    Create(SlotReservation),
    Wait(oneshot::Receiver<Grant>),
}

impl ConnectionPool {
    pub fn new(instance: Arc<dyn EngineInstance>, options: PoolOptions) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                instance,
                max_connections: options.max_connections.max(1),
                idle_timeout: options.idle_timeout,
                next_id: AtomicU64::new(1),
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    pub fn max_connections(&self) -> usize {
        self.inner.max_connections
    }

    /// Borrow a connection, opening one or queueing if none is idle.
    ///
    /// Fails with [`DbError::PoolDisposed`] once the pool is disposed,
    /// including for callers already queued when disposal happens.
    pub async fn acquire(&self) -> Result<PooledConnection, DbError> {
        let inner = &self.inner;
        let (evicted, step) = {
            let mut state = inner.lock();
            if state.disposed {
                return Err(DbError::PoolDisposed);
            }
            let evicted = inner.evict_idle_locked(&mut state);

            let step = if let Some((id, conn)) = take_idle(&mut state) {
                Step::Ready(PooledConnection::new(id, conn, Arc::clone(inner)))
            } else if state.connections.len() + state.reserved < inner.max_connections {
                state.reserved += 1;
                Step::Create(SlotReservation::new(Arc::clone(inner)))
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                debug!(waiting = state.waiters.len(), "pool exhausted, queueing");
                Step::Wait(rx)
            };
            (evicted, step)
        };
        close_detached(evicted);

        match step {
            Step::Ready(conn) => Ok(conn),
            Step::Create(reservation) => inner.create(reservation).await,
            Step::Wait(rx) => match rx.await {
                Ok(Grant::Connection(conn)) => Ok(conn),
                Ok(Grant::Slot(reservation)) => inner.create(reservation).await,
                Err(_) => Err(DbError::PoolDisposed),
            },
        }
    }

    /// Return a connection early. Equivalent to dropping the guard.
    pub fn release(&self, conn: PooledConnection) {
        drop(conn);
    }

    /// Run `f` on a borrowed connection on the blocking thread pool.
    ///
    /// The connection is released on every path. Successful calls count
    /// toward the query statistics.
    pub async fn with_connection<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn EngineConnection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<DbError> + Send + 'static,
    {
        let guard = self.acquire().await?;
        let started = Instant::now();

        let (mut guard, result) = tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            let result = match guard.conn.as_deref_mut() {
                Some(conn) => f(conn),
                None => Err(E::from(DbError::PoolDisposed)),
            };
            (guard, result)
        })
        .await
        .map_err(|e| {
            E::from(DbError::Unknown {
                message: format!("connection task failed: {e}"),
                cause: None,
            })
        })?;

        if result.is_ok() {
            guard.queries += 1;
            self.inner.record_query(started.elapsed());
        }
        result
    }

    /// Fail every waiter, close every idle connection, and forget lent ones
    /// (they are closed when their guards are dropped). Idempotent.
    pub async fn dispose(&self) {
        let idle = {
            let mut state = self.inner.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            // Dropping the senders wakes every waiter with an error.
            state.waiters.clear();

            let mut idle = Vec::new();
            let connections = std::mem::take(&mut state.connections);
            state.closed_total += connections.len() as u64;
            for (_, slot) in connections {
                if let Some(conn) = slot.conn {
                    idle.push(conn);
                }
            }
            idle
        };

        debug!(count = idle.len(), "closing idle connections");
        let mut closing = JoinSet::new();
        for conn in idle {
            closing.spawn_blocking(move || conn.close());
        }
        while let Some(joined) = closing.join_next().await {
            match joined {
                Ok(Err(e)) => warn!(error = %e, "failed to close connection"),
                Err(e) => warn!(error = %e, "close task failed"),
                Ok(Ok(())) => {}
            }
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.lock();
        let active = state
            .connections
            .values()
            .filter(|s| s.info.state == ConnectionState::Busy)
            .count();
        let avg_query_time = if state.total_queries > 0 {
            state.total_query_time.as_secs_f64() * 1000.0 / state.total_queries as f64
        } else {
            0.0
        };
        PoolStats {
            total_connections: state.connections.len(),
            active_connections: active,
            idle_connections: state.connections.len() - active,
            waiting_requests: state.waiters.len(),
            closed_connections: state.closed_total,
            total_queries: state.total_queries,
            avg_query_time,
            peak_memory_usage: state.peak_memory,
            current_memory_usage: state.current_memory,
        }
    }

    pub fn connection_info(&self) -> Vec<ConnectionInfo> {
        self.inner
            .lock()
            .connections
            .values()
            .map(|s| s.info.clone())
            .collect()
    }

    pub fn update_memory_usage(&self, bytes: u64) {
        let mut state = self.inner.lock();
        state.current_memory = bytes;
        state.peak_memory = state.peak_memory.max(bytes);
    }

    pub fn current_memory_usage(&self) -> u64 {
        self.inner.lock().current_memory
    }
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn create(
        self: &Arc<Self>,
        reservation: SlotReservation,
    ) -> Result<PooledConnection, DbError> {
        // Registration happens inside the task so a cancelled acquire still
        // leaves the pool consistent: the guard is dropped and released.
        let inner = Arc::clone(self);
        tokio::task::spawn_blocking(move || inner.open_connection(reservation))
            .await
            .map_err(|e| DbError::Connection {
                message: format!("connection task failed: {e}"),
                retry_count: None,
                cause: None,
            })?
    }

    fn open_connection(
        self: &Arc<Self>,
        reservation: SlotReservation,
    ) -> Result<PooledConnection, DbError> {
        let conn = match self.instance.connect() {
            Ok(conn) => conn,
            Err(e) => {
                // Frees the slot and passes it to the oldest waiter, if any.
                drop(reservation);
                return Err(DbError::Connection {
                    message: format!("failed to create connection: {e}"),
                    retry_count: None,
                    cause: Some(e),
                });
            }
        };

        let mut state = self.lock();
        reservation.disarm();
        state.reserved -= 1;
        if state.disposed {
            drop(state);
            close_detached(vec![conn]);
            return Err(DbError::PoolDisposed);
        }

        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let now = Instant::now();
        state.connections.insert(
            id,
            Slot {
                info: ConnectionInfo {
                    id,
                    state: ConnectionState::Busy,
                    created_at: now,
                    last_used_at: now,
                    query_count: 0,
                },
                conn: None,
            },
        );
        debug!(%id, total = state.connections.len(), "connection created");
        Ok(PooledConnection::new(id, conn, Arc::clone(self)))
    }

    fn release(self: &Arc<Self>, id: ConnectionId, conn: Box<dyn EngineConnection>, queries: u64) {
        let to_close = {
            let mut state = self.lock();
            if state.disposed {
                Some(conn)
            } else if let Some(slot) = state.connections.get_mut(&id) {
                slot.info.last_used_at = Instant::now();
                slot.info.query_count += queries;

                let grant = Grant::Connection(PooledConnection::new(id, conn, Arc::clone(self)));
                match hand_off(&mut state, grant) {
                    None => None,
                    Some(grant) => {
                        // No live waiter: park it as idle.
                        if let Some(slot) = state.connections.get_mut(&id) {
                            slot.info.state = ConnectionState::Idle;
                            slot.conn = grant.into_connection();
                        }
                        None
                    }
                }
            } else {
                Some(conn)
            }
        };

        if let Some(conn) = to_close {
            close_detached(vec![conn]);
        }
    }

    fn release_slot(self: &Arc<Self>) {
        let mut state = self.lock();
        if state.disposed || state.waiters.is_empty() {
            state.reserved -= 1;
            return;
        }
        let grant = Grant::Slot(SlotReservation::new(Arc::clone(self)));
        if let Some(grant) = hand_off(&mut state, grant) {
            grant.disarm();
            state.reserved -= 1;
        }
    }

    fn record_query(&self, elapsed: Duration) {
        let mut state = self.lock();
        state.total_queries += 1;
        state.total_query_time += elapsed;
    }

    fn evict_idle_locked(&self, state: &mut PoolState) -> Vec<Box<dyn EngineConnection>> {
        let Some(ttl) = self.idle_timeout else {
            return Vec::new();
        };
        let expired: Vec<ConnectionId> = state
            .connections
            .values()
            .filter(|s| {
                s.info.state == ConnectionState::Idle && s.info.last_used_at.elapsed() >= ttl
            })
            .map(|s| s.info.id)
            .collect();

        let mut evicted = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(conn) = state.connections.remove(&id).and_then(|s| s.conn) {
                evicted.push(conn);
            }
        }
        state.closed_total += evicted.len() as u64;
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "evicted idle connections");
        }
        evicted
    }
}

/// Some idle connection, marked busy. Any one will do.
fn take_idle(state: &mut PoolState) -> Option<(ConnectionId, Box<dyn EngineConnection>)> {
    let slot = state
        .connections
        .values_mut()
        .find(|s| s.info.state == ConnectionState::Idle)?;
    let conn = slot.conn.take()?;
    slot.info.state = ConnectionState::Busy;
    slot.info.last_used_at = Instant::now();
    Some((slot.info.id, conn))
}

/// Give `grant` to the oldest waiter still listening. Returns it when no
/// waiter takes it. Must never drop a grant, since the caller holds the lock.
fn hand_off(state: &mut PoolState, mut grant: Grant) -> Option<Grant> {
    while let Some(tx) = state.waiters.pop_front() {
        match tx.send(grant) {
            Ok(()) => return None,
            Err(returned) => grant = returned,
        }
    }
    Some(grant)
}

fn close_detached(conns: Vec<Box<dyn EngineConnection>>) {
    if conns.is_empty() {
        return;
    }
    let close_all = move || {
        for conn in conns {
            if let Err(e) = conn.close() {
                warn!(error = %e, "failed to close connection");
            }
        }
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(close_all);
        }
        Err(_) => close_all(),
    }
}

impl Grant {
    fn into_connection(self) -> Option<Box<dyn EngineConnection>> {
        match self {
            Grant::Connection(mut conn) => conn.conn.take(),
            Grant::Slot(reservation) => {
                reservation.disarm();
                None
            }
        }
    }

    fn disarm(self) {
        match self {
            Grant::Connection(mut conn) => {
                conn.conn.take();
            }
            Grant::Slot(reservation) => reservation.disarm(),
        }
    }
}

/// Capacity set aside for a connection being opened. Dropping it frees the
/// capacity.
struct SlotReservation {
    pool: Option<Arc<PoolInner>>,
}

impl SlotReservation {
    fn new(pool: Arc<PoolInner>) -> Self {
        Self { pool: Some(pool) }
    }

    /// Forget the reservation without touching pool state.
    fn disarm(mut self) {
        self.pool = None;
    }
}

impl Drop for SlotReservation {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.release_slot();
        }
    }
}

/// A connection lent out of the pool. Dropping it returns the connection.
pub struct PooledConnection {
    id: ConnectionId,
    conn: Option<Box<dyn EngineConnection>>,
    queries: u64,
    pool: Arc<PoolInner>,
}

impl PooledConnection {
    fn new(id: ConnectionId, conn: Box<dyn EngineConnection>, pool: Arc<PoolInner>) -> Self {
        Self {
            id,
            conn: Some(conn),
            queries: 0,
            pool,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Run a statement on this connection. Blocks the current thread.
    pub fn query(&mut self, sql: &str, params: &[Value]) -> Result<RawResult, EngineError> {
        let conn = self
            .conn
            .as_deref_mut()
            .ok_or_else(|| EngineError::new("connection already released"))?;
        let result = conn.query(sql, params)?;
        self.queries += 1;
        Ok(result)
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("queries", &self.queries)
            .finish()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(self.id, conn, self.queries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DatabaseMode, Engine, EngineOptions};
    use crate::test_utils::MockEngine;
    use rstest::rstest;
    use std::sync::atomic::AtomicUsize;

    fn pool_with(engine: &MockEngine, max: usize, idle_timeout: Option<Duration>) -> ConnectionPool {
        let instance = engine
            .open(&EngineOptions {
                mode: DatabaseMode::Memory,
                memory_limit: 1024,
            })
            .unwrap();
        ConnectionPool::new(
            Arc::from(instance),
            PoolOptions {
                max_connections: max,
                idle_timeout,
            },
        )
    }

    async fn wait_for_waiters(pool: &ConnectionPool, n: usize) {
        for _ in 0..200 {
            if pool.stats().waiting_requests == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("expected {n} waiters, got {}", pool.stats().waiting_requests);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_capacity_never_exceeded() {
        let engine = MockEngine::new().with_delay(Duration::from_millis(15));
        let pool = pool_with(&engine, 2, None);
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let live = Arc::clone(&live);
            let peak = Arc::clone(&peak);
            tasks.spawn(async move {
                pool.with_connection(move |conn| {
                    let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    let result = conn.query("SELECT 1", &[]);
                    live.fetch_sub(1, Ordering::SeqCst);
                    result.map_err(|e| DbError::Unknown {
                        message: e.message.clone(),
                        cause: Some(e),
                    })
                })
                .await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(engine.connections_opened(), 2);
        let stats = pool.stats();
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.idle_connections, 2);
        assert_eq!(stats.total_queries, 8);
    }

    #[rstest]
    #[tokio::test]
    async fn test_concurrent_acquires_get_distinct_ids() {
        let engine = MockEngine::new();
        let pool = pool_with(&engine, 3, None);

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(b.id(), c.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(pool.stats().active_connections, 3);

        let reused = b.id();
        pool.release(b);
        let d = pool.acquire().await.unwrap();
        assert_eq!(d.id(), reused);
        assert_eq!(engine.connections_opened(), 3);
    }

    #[rstest]
    #[tokio::test]
    async fn test_connection_ids_are_sequential() {
        let engine = MockEngine::new();
        let pool = pool_with(&engine, 2, None);
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_eq!(a.id().to_string(), "conn_1");
        assert_eq!(b.id().to_string(), "conn_2");
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_waiters_served_in_arrival_order() {
        let engine = MockEngine::new();
        let pool = pool_with(&engine, 1, None);
        let held = pool.acquire().await.unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..3 {
            let waiter_pool = pool.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let conn = waiter_pool.acquire().await.unwrap();
                order.lock().unwrap().push(i);
                drop(conn);
            }));
            wait_for_waiters(&pool, i + 1).await;
        }

        drop(held);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(engine.connections_opened(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_cancelled_waiter_is_skipped() {
        let engine = MockEngine::new();
        let pool = pool_with(&engine, 1, None);
        let held = pool.acquire().await.unwrap();

        let cancelled = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|c| c.id()) })
        };
        wait_for_waiters(&pool, 1).await;
        let patient = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|c| c.id()) })
        };
        wait_for_waiters(&pool, 2).await;

        cancelled.abort();
        let _ = cancelled.await;
        drop(held);

        let id = patient.await.unwrap().unwrap();
        assert_eq!(id.to_string(), "conn_1");
        assert_eq!(pool.stats().idle_connections, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_dispose_fails_waiters_and_closes_once() {
        let engine = MockEngine::new();
        let pool = pool_with(&engine, 1, None);
        let held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|c| c.id()) })
        };
        wait_for_waiters(&pool, 1).await;

        pool.dispose().await;
        assert!(matches!(waiter.await.unwrap(), Err(DbError::PoolDisposed)));
        assert!(matches!(pool.acquire().await, Err(DbError::PoolDisposed)));
        assert_eq!(pool.stats().total_connections, 0);

        // The busy connection is closed when its borrower lets go.
        drop(held);
        engine.wait_for_closes(1).await;
        pool.dispose().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(engine.connections_closed(), 1);
        assert_eq!(pool.stats().closed_connections, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_dispose_closes_idle_connections() {
        let engine = MockEngine::new();
        let pool = pool_with(&engine, 3, None);
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        drop(a);
        drop(b);

        pool.dispose().await;
        assert_eq!(engine.connections_closed(), 2);
        assert!(pool.is_disposed());
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_slots_serialize_only_the_third_caller() {
        let engine = MockEngine::new().with_delay(Duration::from_millis(50));
        let pool = pool_with(&engine, 2, None);

        let run = |pool: ConnectionPool| async move {
            pool.with_connection(|conn| {
                conn.query("SELECT 1", &[]).map_err(|e| DbError::Unknown {
                    message: e.message.clone(),
                    cause: Some(e),
                })
            })
            .await
        };

        let started = Instant::now();
        let (a, b, c) = tokio::join!(run(pool.clone()), run(pool.clone()), run(pool.clone()));
        let elapsed = started.elapsed();
        a.unwrap();
        b.unwrap();
        c.unwrap();

        assert!(elapsed >= Duration::from_millis(100), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(150), "elapsed {elapsed:?}");
    }

    #[rstest]
    #[tokio::test]
    async fn test_with_connection_releases_on_failure() {
        let engine = MockEngine::new();
        let pool = pool_with(&engine, 1, None);

        let result: Result<(), DbError> = pool
            .with_connection(|_| Err(DbError::invalid_config("nope")))
            .await;
        assert!(result.is_err());

        let stats = pool.stats();
        assert_eq!(stats.idle_connections, 1);
        assert_eq!(stats.total_queries, 0);
        // Pool is still usable.
        pool.acquire().await.unwrap();
    }

    #[rstest]
    #[tokio::test]
    async fn test_idle_connections_are_evicted() {
        let engine = MockEngine::new();
        let pool = pool_with(&engine, 2, Some(Duration::from_millis(10)));

        let first = pool.acquire().await.unwrap().id();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let second = pool.acquire().await.unwrap();

        assert_ne!(second.id(), first);
        engine.wait_for_closes(1).await;
        assert_eq!(pool.stats().closed_connections, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_failed_creation_frees_capacity() {
        let engine = MockEngine::new().failing_connects(1);
        let pool = pool_with(&engine, 1, None);

        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
        assert_eq!(pool.stats().total_connections, 0);

        let conn = pool.acquire().await.unwrap();
        assert_eq!(conn.id().to_string(), "conn_1");
    }

    #[rstest]
    #[tokio::test]
    async fn test_query_counts_and_memory_gauge() {
        let engine = MockEngine::new();
        let pool = pool_with(&engine, 1, None);

        let mut conn = pool.acquire().await.unwrap();
        conn.query("SELECT 1", &[]).unwrap();
        conn.query("SELECT 2", &[]).unwrap();
        drop(conn);

        let info = pool.connection_info();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].query_count, 2);
        assert_eq!(info[0].state, ConnectionState::Idle);

        pool.update_memory_usage(300);
        pool.update_memory_usage(100);
        let stats = pool.stats();
        assert_eq!(stats.current_memory_usage, 100);
        assert_eq!(stats.peak_memory_usage, 300);
    }
}
