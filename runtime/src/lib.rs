//! # Classbook Runtime
//!
//! Runtime for the Classbook reducer architecture.
//!
//! The central type is [`KeyedStore`]: a map from aggregate key to aggregate
//! state, where every key carries its own async lock. Sending an action to a
//! key runs one *transaction*:
//!
//! 1. The key's lock is acquired (other keys are unaffected)
//! 2. The reducer runs
//! 3. Transactional effects (`Dispatch`, `Future`, `Parallel`, `Sequential`)
//!    are awaited while the lock is held, and the actions they produce are fed
//!    back into the reducer until the queue is empty
//! 4. The lock is released
//! 5. `Detached` effects are spawned and tracked by an [`EffectHandle`]
//!
//! A transaction that fails leaves the key's state as it found it, and none of
//! its `Detached` effects are spawned.
//!
//! Everything a caller needs to know about what happened comes back in the
//! [`Transaction`] transcript.
//!
//! ## Example
//!
//! ```ignore
//! use classbook_runtime::KeyedStore;
//!
//! let store = KeyedStore::new(CourseBookReducer, environment);
//! store.insert(session_id, CourseBook::new(session)).await?;
//!
//! let tx = store.send(&session_id, CourseAction::RequestClaim { .. }).await?;
//! for action in tx.actions() {
//!     println!("{action:?}");
//! }
//! ```

use classbook_core::{effect::Effect, reducer::Reducer};
use futures::future::join_all;
use metrics::StoreMetrics;
use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock, watch};

/// Retry logic with exponential backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

/// Error types for the store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// No aggregate is registered under this key
        #[error("Unknown key: {0}")]
        UnknownKey(String),

        /// An aggregate is already registered under this key
        #[error("Key already exists: {0}")]
        DuplicateKey(String),

        /// A single transaction produced more feedback actions than allowed
        ///
        /// Usually a reducer that keeps dispatching to itself.
        #[error("Transaction on {key} exceeded {limit} feedback actions")]
        FeedbackOverflow {
            /// Key of the runaway transaction
            key: String,
            /// Configured limit
            limit: usize,
        },

        /// Store is shutting down and not accepting new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for detached effects
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Waiting on an [`EffectHandle`](crate::EffectHandle) timed out
        #[error("Timed out with {0} effects still running")]
        EffectsTimeout(usize),
    }
}

pub use error::StoreError;

/// A post-commit future.
type DetachedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Upper bound on actions reduced in one transaction (including the first)
    pub max_feedback_actions: usize,
    /// How long [`KeyedStore::shutdown`] waits for detached effects
    pub shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Create a configuration.
    #[must_use]
    pub const fn new(max_feedback_actions: usize, shutdown_timeout: Duration) -> Self {
        Self {
            max_feedback_actions,
            shutdown_timeout,
        }
    }

    /// Override the shutdown timeout.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_feedback_actions: 1024,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle for tracking completion of a transaction's detached effects
///
/// # Example
///
/// ```ignore
/// let mut tx = store.send(&key, Action::Cancel).await?;
/// tx.effects.wait_with_timeout(Duration::from_secs(5)).await?;
/// // Every notification spawned by the cancellation has finished
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };
        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// A handle with nothing to wait for
    #[must_use]
    pub fn completed() -> Self {
        let (handle, _tracking) = Self::new();
        handle
    }

    /// Number of effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait until every tracked effect has finished
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait with an upper bound
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EffectsTimeout`] if effects are still running after `timeout`.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::EffectsTimeout(self.pending()))
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.pending())
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notifier.send(());
        }
    }
}

/// Decrements the tracking counter even if the effect panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Store-wide pending counter used by shutdown.
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Result of one [`KeyedStore::send`].
///
/// `actions` lists every action reduced in the transaction, in reduction
/// order, starting with the one that was sent.
pub struct Transaction<A> {
    /// Reduced actions in order
    pub actions: Vec<A>,
    /// Tracks detached effects spawned after commit
    pub effects: EffectHandle,
}

impl<A> Transaction<A> {
    /// Reduced actions in order.
    #[must_use]
    pub fn actions(&self) -> &[A] {
        &self.actions
    }

    /// Last action for which `f` returns `Some`.
    pub fn find_last<T>(&self, f: impl FnMut(&A) -> Option<T>) -> Option<T> {
        self.actions.iter().rev().find_map(f)
    }
}

impl<A: std::fmt::Debug> std::fmt::Debug for Transaction<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("actions", &self.actions)
            .field("effects", &self.effects)
            .finish()
    }
}

/// Keyed aggregate store with per-key serialization.
///
/// # Type Parameters
///
/// - `K`: Aggregate key (e.g. a session id)
/// - `R`: Reducer implementation
///
/// # Concurrency
///
/// Sends to the same key run one at a time, in lock acquisition order.
/// Sends to different keys proceed in parallel. Readers go through the same
/// per-key lock, so they never observe a transaction half-way.
pub struct KeyedStore<K, R>
where
    R: Reducer,
{
    reducer: R,
    environment: R::Environment,
    cells: RwLock<HashMap<K, Arc<Mutex<R::State>>>>,
    config: StoreConfig,
    shutdown: AtomicBool,
    pending_detached: Arc<AtomicUsize>,
}

impl<K, R> KeyedStore<K, R>
where
    K: Eq + Hash + Clone + Display + Send + Sync,
    R: Reducer + Send + Sync,
    R::State: Clone + Send,
    R::Action: Clone + Send + 'static,
    R::Environment: Send + Sync,
{
    /// Create an empty store.
    #[must_use]
    pub fn new(reducer: R, environment: R::Environment) -> Self {
        Self::with_config(reducer, environment, StoreConfig::default())
    }

    /// Create an empty store with custom configuration.
    #[must_use]
    pub fn with_config(reducer: R, environment: R::Environment, config: StoreConfig) -> Self {
        Self {
            reducer,
            environment,
            cells: RwLock::new(HashMap::new()),
            config,
            shutdown: AtomicBool::new(false),
            pending_detached: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The injected environment.
    pub const fn environment(&self) -> &R::Environment {
        &self.environment
    }

    /// Register a new aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] if `key` is already registered.
    pub async fn insert(&self, key: K, state: R::State) -> Result<(), StoreError> {
        let mut cells = self.cells.write().await;
        if cells.contains_key(&key) {
            return Err(StoreError::DuplicateKey(key.to_string()));
        }
        tracing::debug!(key = %key, "Registered aggregate");
        cells.insert(key, Arc::new(Mutex::new(state)));
        Ok(())
    }

    /// Whether `key` is registered.
    pub async fn contains(&self, key: &K) -> bool {
        self.cells.read().await.contains_key(key)
    }

    /// All registered keys, in no particular order.
    pub async fn keys(&self) -> Vec<K> {
        self.cells.read().await.keys().cloned().collect()
    }

    /// Number of registered aggregates.
    pub async fn len(&self) -> usize {
        self.cells.read().await.len()
    }

    /// Whether no aggregates are registered.
    pub async fn is_empty(&self) -> bool {
        self.cells.read().await.is_empty()
    }

    /// Read one aggregate's state through a closure.
    ///
    /// Returns `None` for an unknown key.
    pub async fn state<F, T>(&self, key: &K, f: F) -> Option<T>
    where
        F: FnOnce(&R::State) -> T,
    {
        let cell = self.cell(key).await?;
        let state = cell.lock().await;
        Some(f(&state))
    }

    /// Number of detached effects still running across all keys.
    #[must_use]
    pub fn pending_effects(&self) -> usize {
        self.pending_detached.load(Ordering::Acquire)
    }

    /// Run one transaction against `key`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ShutdownInProgress`] once [`shutdown`](Self::shutdown) started
    /// - [`StoreError::UnknownKey`] if `key` is not registered
    /// - [`StoreError::FeedbackOverflow`] if the reducer keeps feeding itself;
    ///   the state is rolled back and detached effects are dropped
    #[tracing::instrument(skip(self, key, action), fields(key = %key), name = "store_send")]
    pub async fn send(&self, key: &K, action: R::Action) -> Result<Transaction<R::Action>, StoreError> {
        if self.shutdown.load(Ordering::Acquire) {
            tracing::warn!("Rejected action: store is shutting down");
            return Err(StoreError::ShutdownInProgress);
        }

        StoreMetrics::record_command();

        let cell = self
            .cell(key)
            .await
            .ok_or_else(|| StoreError::UnknownKey(key.to_string()))?;

        let started = Instant::now();
        let (actions, detached) = {
            let mut state = cell.lock().await;
            tracing::trace!("Acquired key lock");
            let snapshot = state.clone();
            match self.run_transaction(key, &mut state, action).await {
                Ok(committed) => committed,
                Err(error) => {
                    *state = snapshot;
                    tracing::warn!(%error, "Transaction rolled back");
                    return Err(error);
                },
            }
        };
        StoreMetrics::record_transaction(started.elapsed());

        tracing::debug!(
            reduced = actions.len(),
            detached = detached.len(),
            "Transaction committed"
        );

        let effects = self.spawn_detached(detached);
        Ok(Transaction { actions, effects })
    }

    /// Stop accepting actions and wait for detached effects to drain.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects are still running after
    /// the configured timeout.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        tracing::info!("Initiating graceful shutdown");
        self.shutdown.store(true, Ordering::Release);

        let start = Instant::now();
        let poll_interval = Duration::from_millis(50);

        loop {
            let pending = self.pending_effects();
            if pending == 0 {
                tracing::info!("All effects completed, shutdown successful");
                return Ok(());
            }
            if start.elapsed() >= self.config.shutdown_timeout {
                tracing::error!(pending_effects = pending, "Shutdown timeout");
                return Err(StoreError::ShutdownTimeout(pending));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn cell(&self, key: &K) -> Option<Arc<Mutex<R::State>>> {
        self.cells.read().await.get(key).map(Arc::clone)
    }

    async fn run_transaction(
        &self,
        key: &K,
        state: &mut R::State,
        action: R::Action,
    ) -> Result<(Vec<R::Action>, Vec<DetachedFuture>), StoreError> {
        let mut queue = VecDeque::from([action]);
        let mut transcript = Vec::new();
        let mut detached = Vec::new();

        while let Some(action) = queue.pop_front() {
            if transcript.len() >= self.config.max_feedback_actions {
                tracing::error!(
                    limit = self.config.max_feedback_actions,
                    "Feedback loop did not settle"
                );
                return Err(StoreError::FeedbackOverflow {
                    key: key.to_string(),
                    limit: self.config.max_feedback_actions,
                });
            }
            transcript.push(action.clone());

            let reduce_started = Instant::now();
            let effects = self.reducer.reduce(state, action, &self.environment);
            StoreMetrics::record_reduction(reduce_started.elapsed());

            for effect in effects {
                let mut produced = Vec::new();
                execute_inline(effect, &mut produced, &mut detached).await;
                queue.extend(produced);
            }
        }

        Ok((transcript, detached))
    }

    fn spawn_detached(&self, detached: Vec<DetachedFuture>) -> EffectHandle {
        let (handle, tracking) = EffectHandle::new();

        for future in detached {
            tracking.increment();
            self.pending_detached.fetch_add(1, Ordering::SeqCst);
            StoreMetrics::record_effect("detached");

            let guard = DecrementGuard(tracking.clone());
            let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_detached));
            tokio::spawn(async move {
                let _guard = guard;
                let _pending_guard = pending_guard;
                future.await;
            });
        }

        StoreMetrics::record_detached_pending(self.pending_effects());
        handle
    }
}

/// Execute a transactional effect while the key is held.
///
/// Actions are appended to `produced` in declaration order. `Parallel`
/// branches run concurrently but contribute their actions in branch order.
fn execute_inline<'a, A>(
    effect: Effect<A>,
    produced: &'a mut Vec<A>,
    detached: &'a mut Vec<DetachedFuture>,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>
where
    A: Send + 'static,
{
    Box::pin(async move {
        match effect {
            Effect::None => {},
            Effect::Dispatch(action) => {
                StoreMetrics::record_effect("dispatch");
                produced.push(*action);
            },
            Effect::Future(future) => {
                StoreMetrics::record_effect("future");
                if let Some(action) = future.await {
                    produced.push(action);
                }
            },
            Effect::Sequential(effects) => {
                for effect in effects {
                    execute_inline(effect, &mut *produced, &mut *detached).await;
                }
            },
            Effect::Parallel(effects) => {
                let branches = effects.into_iter().map(|effect| async move {
                    let mut branch_produced = Vec::new();
                    let mut branch_detached = Vec::new();
                    execute_inline(effect, &mut branch_produced, &mut branch_detached).await;
                    (branch_produced, branch_detached)
                });
                for (branch_produced, branch_detached) in join_all(branches).await {
                    produced.extend(branch_produced);
                    detached.extend(branch_detached);
                }
            },
            Effect::Detached(future) => detached.push(future),
        }
    })
}
