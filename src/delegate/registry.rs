use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use super::traits::Handler;
use super::types::{ContextKey, ContextStatus, HandlerDisplay};
use crate::events::EventBus;
use crate::observability::{Metrics, MetricsSnapshot};

struct Entry<S> {
    handler: Arc<dyn Handler<S>>,
    /// Registration order, used as the tie-breaker for equal priorities.
    seq: u64,
}

#[derive(Debug, Clone, Copy)]
struct PassProgress {
    /// Sequence number of the latest pass required for this context.
    required: u64,
    /// Sequence number of the latest pass whose results were applied.
    completed: u64,
}

struct ContextState<S> {
    subject: S,
    status: ContextStatus,
    /// Latest pass started (or required) for this context. A finishing pass
    /// with a smaller number is stale and its results are discarded.
    current_pass: u64,
    output_tx: watch::Sender<Vec<HandlerDisplay>>,
    progress_tx: watch::Sender<PassProgress>,
}

struct Inner<S> {
    /// Delegate name, the prefix matched against disabled-feature entries.
    name: String,
    handlers: RwLock<BTreeMap<String, Entry<S>>>,
    next_seq: AtomicU64,
    contexts: Mutex<HashMap<ContextKey, ContextState<S>>>,
    disabled: RwLock<HashSet<String>>,
    metrics: Metrics,
    listeners: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl<S> Drop for Inner<S> {
    fn drop(&mut self) {
        if let Ok(mut listeners) = self.listeners.lock() {
            for handle in listeners.drain(..) {
                handle.abort();
            }
        }
    }
}

/// Registry of pluggable handlers with per-context enablement.
///
/// The registry owns the name-to-handler mapping, asynchronously evaluates
/// which handlers are enabled for each requested context, and republishes the
/// filtered, priority-sorted list through a replay-one [`watch`] stream. A new
/// evaluation pass runs on login, logout, config change and handler
/// registration; subscribers of the same context share one pass.
///
/// The emitted stream starts with an empty list; callers that need the first
/// full result gate on [`DelegateRegistry::wait_for_ready`].
pub struct DelegateRegistry<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for DelegateRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> DelegateRegistry<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Create an empty registry. `name` is the delegate identity used as the
    /// prefix of disabled-feature entries (`<name>_<handler>`).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                handlers: RwLock::new(BTreeMap::new()),
                next_seq: AtomicU64::new(0),
                contexts: Mutex::new(HashMap::new()),
                disabled: RwLock::new(HashSet::new()),
                metrics: Metrics::new(),
                listeners: std::sync::Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a handler. A handler with the same name replaces the previous
    /// registration (logged as a warning; legitimate during hot reload).
    /// Registration invalidates all contexts; subscribed ones re-evaluate.
    pub async fn register(&self, handler: Arc<dyn Handler<S>>) {
        let name = handler.name().to_string();
        let priority = handler.priority();
        {
            let mut handlers = self.inner.handlers.write().await;
            let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
            if handlers.insert(name.clone(), Entry { handler, seq }).is_some() {
                warn!(handler = %name, "Duplicate registration, replacing previous handler");
            } else {
                debug!(handler = %name, priority, "Handler registered");
            }
        }

        self.invalidate_all("handler registered").await;
    }

    pub async fn has_handler(&self, name: &str) -> bool {
        self.inner.handlers.read().await.contains_key(name)
    }

    pub async fn handler_count(&self) -> usize {
        self.inner.handlers.read().await.len()
    }

    /// Subscribe to the enabled-handler list for `context`.
    ///
    /// The returned receiver replays the last computed list immediately (or an
    /// empty list if no pass has completed yet) and receives every subsequent
    /// change. `subject` is passed through to [`Handler::display_data`]; the
    /// last caller's subject is used for future passes.
    pub async fn handlers_for(
        &self,
        subject: S,
        context: &ContextKey,
    ) -> watch::Receiver<Vec<HandlerDisplay>> {
        let mut contexts = self.inner.contexts.lock().await;
        match contexts.get_mut(context) {
            Some(state) => {
                state.subject = subject;
                let rx = state.output_tx.subscribe();
                if state.status == ContextStatus::Uninitialized {
                    // Invalidated while nobody was subscribed; evaluate now.
                    state.status = ContextStatus::Evaluating;
                    self.spawn_pass(context, state);
                }
                rx
            }
            None => {
                let (output_tx, rx) = watch::channel(Vec::new());
                let (progress_tx, _) = watch::channel(PassProgress {
                    required: 1,
                    completed: 0,
                });
                let state = ContextState {
                    subject,
                    status: ContextStatus::Evaluating,
                    current_pass: 1,
                    output_tx,
                    progress_tx,
                };
                self.spawn_pass(context, &state);
                contexts.insert(context.clone(), state);
                rx
            }
        }
    }

    /// Wait until a full evaluation pass has completed for `context` since the
    /// most recent invalidation. If the context is invalidated again before
    /// resolving, keeps waiting for the newer pass. A context never requested
    /// through [`DelegateRegistry::handlers_for`] is trivially ready.
    pub async fn wait_for_ready(&self, context: &ContextKey) {
        let mut progress_rx = {
            let mut contexts = self.inner.contexts.lock().await;
            let Some(state) = contexts.get_mut(context) else {
                return;
            };
            if state.status == ContextStatus::Uninitialized {
                state.status = ContextStatus::Evaluating;
                self.spawn_pass(context, state);
            }
            state.progress_tx.subscribe()
        };

        loop {
            {
                let progress = *progress_rx.borrow_and_update();
                if progress.completed >= progress.required {
                    return;
                }
            }
            if progress_rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Replace the disabled-feature set and re-evaluate.
    ///
    /// Entries follow the `<delegate>_<handler>` format, with an optional
    /// `:<context>` suffix restricting the disable to one context. A disabled
    /// handler is excluded without its `is_enabled` being called.
    pub async fn update_features(&self, disabled: impl IntoIterator<Item = String>) {
        {
            *self.inner.disabled.write().await = disabled.into_iter().collect();
        }
        self.invalidate_all("feature flags changed").await;
    }

    /// Subscribe to a session event bus; login, logout and config-changed
    /// events invalidate all contexts. The listener runs until
    /// [`DelegateRegistry::shutdown`] or the bus is dropped.
    pub fn attach_events(&self, bus: &EventBus) {
        let mut rx = bus.subscribe();
        // Weak reference so the listener does not keep the registry alive.
        let inner = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                let reason = match rx.recv().await {
                    Ok(event) => {
                        debug!(?event, "Session event received");
                        event.kind()
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Invalidation is idempotent, one pass covers the
                        // missed events.
                        warn!(skipped, "Event listener lagged");
                        "event listener lagged"
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                DelegateRegistry { inner }.invalidate_all(reason).await;
            }
        });
        self.track_listener(handle);
    }

    /// Stop all event listeners. Safe to call more than once.
    pub fn shutdown(&self) {
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            for handle in listeners.drain(..) {
                handle.abort();
            }
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    fn track_listener(&self, handle: JoinHandle<()>) {
        if let Ok(mut listeners) = self.inner.listeners.lock() {
            listeners.push(handle);
        }
    }

    /// Bump every context to a new pass. Contexts with a live subscriber
    /// re-evaluate immediately; the rest fall back to `Uninitialized` and
    /// re-evaluate lazily on the next subscription.
    async fn invalidate_all(&self, reason: &'static str) {
        let mut contexts = self.inner.contexts.lock().await;
        for (key, state) in contexts.iter_mut() {
            state.current_pass += 1;
            let pass = state.current_pass;
            state.progress_tx.send_modify(|p| p.required = pass);
            if state.output_tx.is_closed() {
                state.status = ContextStatus::Uninitialized;
                debug!(context = %key, reason, "Context invalidated, evaluation deferred");
            } else {
                state.status = ContextStatus::Evaluating;
                debug!(context = %key, reason, pass, "Context invalidated, re-evaluating");
                self.spawn_pass(key, state);
            }
        }
    }

    fn spawn_pass(&self, context: &ContextKey, state: &ContextState<S>) {
        let inner = self.inner.clone();
        let context = context.clone();
        let subject = state.subject.clone();
        let pass = state.current_pass;
        tokio::spawn(async move {
            run_pass(inner, context, subject, pass).await;
        });
    }
}

/// One full evaluation round: check every registered handler for `context`,
/// fetch display data for the enabled ones, and apply the sorted result if
/// this is still the latest pass.
async fn run_pass<S>(inner: Arc<Inner<S>>, context: ContextKey, subject: S, pass: u64)
where
    S: Clone + Send + Sync + 'static,
{
    inner.metrics.pass_started();
    debug!(context = %context, pass, "Evaluation pass started");

    let mut snapshot: Vec<(i32, u64, Arc<dyn Handler<S>>)> = {
        let handlers = inner.handlers.read().await;
        handlers
            .values()
            .map(|entry| (entry.handler.priority(), entry.seq, entry.handler.clone()))
            .collect()
    };
    // Deterministic output order regardless of completion order.
    snapshot.sort_by_key(|(priority, seq, _)| (*priority, *seq));

    let disabled = inner.disabled.read().await.clone();

    let mut results: Vec<Option<HandlerDisplay>> = vec![None; snapshot.len()];
    let mut set = JoinSet::new();
    for (idx, (priority, _, handler)) in snapshot.iter().enumerate() {
        let name = handler.name().to_string();
        if is_disabled(&disabled, &inner.name, &name, &context) {
            debug!(context = %context, handler = %name, "Handler disabled by feature flag");
            continue;
        }

        let handler = handler.clone();
        let ctx = context.clone();
        let subject = subject.clone();
        let priority = *priority;
        let metrics_inner = inner.clone();
        set.spawn(async move {
            let enabled = match handler.is_enabled(&ctx).await {
                Ok(enabled) => enabled,
                Err(err) => {
                    metrics_inner.metrics.handler_failed();
                    warn!(
                        context = %ctx,
                        handler = %name,
                        error = %err,
                        "Enablement check failed, handler excluded from pass"
                    );
                    false
                }
            };
            if !enabled {
                return (idx, None);
            }
            match handler.display_data(&subject, &ctx).await {
                Ok(data) => (
                    idx,
                    Some(HandlerDisplay {
                        name,
                        priority,
                        data,
                    }),
                ),
                Err(err) => {
                    metrics_inner.metrics.display_failed();
                    warn!(
                        context = %ctx,
                        handler = %name,
                        error = %err,
                        "Display data retrieval failed, handler excluded from pass"
                    );
                    (idx, None)
                }
            }
        });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, result)) => results[idx] = result,
            Err(err) => {
                // A panicking handler counts as disabled for this pass.
                inner.metrics.handler_failed();
                warn!(context = %context, error = %err, "Handler evaluation task failed");
            }
        }
    }

    let list: Vec<HandlerDisplay> = results.into_iter().flatten().collect();

    let mut contexts = inner.contexts.lock().await;
    let Some(state) = contexts.get_mut(&context) else {
        return;
    };
    if state.current_pass != pass {
        // A newer pass started mid-flight; last pass wins.
        inner.metrics.pass_discarded();
        debug!(
            context = %context,
            pass,
            latest = state.current_pass,
            "Stale pass discarded"
        );
        return;
    }

    state.status = ContextStatus::Ready;
    state.output_tx.send_replace(list);
    state.progress_tx.send_modify(|p| p.completed = pass);
    inner.metrics.pass_completed();
    debug!(context = %context, pass, "Evaluation pass completed");
}

fn is_disabled(
    disabled: &HashSet<String>,
    delegate: &str,
    handler: &str,
    context: &ContextKey,
) -> bool {
    let global = format!("{delegate}_{handler}");
    if disabled.contains(&global) {
        return true;
    }
    disabled.contains(&format!("{global}:{context}"))
}
