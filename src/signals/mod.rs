//! Typed publish/subscribe bus.
//!
//! The concrete Rust type of a signal is its routing key. Every call to
//! [`SignalBus::publish`] snapshots the listener list for that type and
//! enqueues one dispatch job per listener into a shared worker pool, so
//! delivery is ordered at enqueue but unordered at completion whenever
//! more than one worker runs.
//!
//! Listener lists are copy-on-write: subscribing or unsubscribing while a
//! publish is in flight only affects jobs enqueued afterwards.

mod dispatch;
mod listener;

pub use listener::{Signal, SignalCallback, SignalListener, Subscriber, SubscriptionId, signal_name};

use dashmap::DashMap;
use futures_util::FutureExt;
use std::any::{Any, TypeId};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::error::HandlerResult;
use dispatch::{DispatchJob, DispatchPool};

/// Default number of dispatch workers.
pub const DEFAULT_DISPATCH_TASKS: usize = 4;

struct Registration<E: Signal> {
    id: SubscriptionId,
    subscriber: Subscriber<E>,
}

impl<E: Signal> Clone for Registration<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            subscriber: self.subscriber.clone(),
        }
    }
}

/// Listener list for one signal type.
struct Slot<E: Signal>(Arc<Vec<Registration<E>>>);

/// Type-erased view of a [`Slot`], so one map can hold every signal type.
trait ListenerSlot: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn remove_id(&mut self, id: SubscriptionId) -> bool;
    fn len(&self) -> usize;
}

impl<E: Signal> ListenerSlot for Slot<E> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn remove_id(&mut self, id: SubscriptionId) -> bool {
        let Some(pos) = self.0.iter().position(|r| r.id == id) else {
            return false;
        };
        Arc::make_mut(&mut self.0).remove(pos);
        true
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

impl<E: Signal> Slot<E> {
    /// Drop every registration whose subscriber lives at `addr`.
    fn remove_addr(&mut self, addr: *const ()) -> Vec<SubscriptionId> {
        if !self.0.iter().any(|r| r.subscriber.addr() == addr) {
            return Vec::new();
        }
        let list = Arc::make_mut(&mut self.0);
        let removed = list
            .iter()
            .filter(|r| r.subscriber.addr() == addr)
            .map(|r| r.id)
            .collect();
        list.retain(|r| r.subscriber.addr() != addr);
        removed
    }
}

/// The signal bus.
///
/// Must be constructed inside a Tokio runtime: the dispatch workers are
/// spawned immediately.
pub struct SignalBus {
    slots: DashMap<TypeId, Box<dyn ListenerSlot>>,
    subscriptions: DashMap<SubscriptionId, TypeId>,
    next_id: AtomicU64,
    pool: DispatchPool,
}

impl SignalBus {
    /// Create a bus with `dispatch_tasks` parallel workers.
    ///
    /// With `queue_capacity` set, `publish` suspends while that many jobs
    /// are waiting; without it the queue is unbounded.
    pub fn new(dispatch_tasks: usize, queue_capacity: Option<usize>) -> Self {
        debug!(dispatch_tasks, ?queue_capacity, "Starting signal bus");
        Self {
            slots: DashMap::new(),
            subscriptions: DashMap::new(),
            next_id: AtomicU64::new(1),
            pool: DispatchPool::new(dispatch_tasks, queue_capacity),
        }
    }

    /// Register a typed listener object.
    ///
    /// Subscribing the same object twice delivers every signal to it twice.
    pub fn subscribe<E, L>(&self, listener: Arc<L>) -> SubscriptionId
    where
        E: Signal,
        L: SignalListener<E> + 'static,
    {
        let listener: Arc<dyn SignalListener<E>> = listener;
        self.register(Subscriber::Listener(listener))
    }

    /// Register an already type-erased listener object.
    pub fn subscribe_listener<E: Signal>(
        &self,
        listener: Arc<dyn SignalListener<E>>,
    ) -> SubscriptionId {
        self.register(Subscriber::Listener(listener))
    }

    /// Register a closure.
    pub fn subscribe_fn<E, F, Fut>(&self, f: F) -> SubscriptionId
    where
        E: Signal,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let callback: SignalCallback<E> = Arc::new(move |signal: Arc<E>| f(signal).boxed());
        self.register(Subscriber::Callback(callback))
    }

    fn register<E: Signal>(&self, subscriber: Subscriber<E>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let key = TypeId::of::<E>();
        {
            let mut entry = self
                .slots
                .entry(key)
                .or_insert_with(|| Box::new(Slot::<E>(Arc::new(Vec::new()))));
            if let Some(slot) = entry.value_mut().as_any_mut().downcast_mut::<Slot<E>>() {
                Arc::make_mut(&mut slot.0).push(Registration { id, subscriber });
            }
        }
        self.subscriptions.insert(id, key);
        debug!(signal = signal_name::<E>(), subscription = id.0, "Listener subscribed");
        id
    }

    /// Remove every registration of `listener` for signal type `E`.
    ///
    /// Returns how many entries were removed. Jobs that were already
    /// enqueued still run.
    pub fn unsubscribe<E: Signal, L: ?Sized>(&self, listener: &Arc<L>) -> usize {
        let addr = Arc::as_ptr(listener).cast::<()>();
        let removed = match self.slots.get_mut(&TypeId::of::<E>()) {
            Some(mut entry) => entry
                .value_mut()
                .as_any_mut()
                .downcast_mut::<Slot<E>>()
                .map(|slot| slot.remove_addr(addr))
                .unwrap_or_default(),
            None => Vec::new(),
        };
        for id in &removed {
            self.subscriptions.remove(id);
        }
        if !removed.is_empty() {
            debug!(signal = signal_name::<E>(), count = removed.len(), "Listener unsubscribed");
        }
        removed.len()
    }

    /// Remove a single registration by the id `subscribe*` returned.
    pub fn unsubscribe_id(&self, id: SubscriptionId) -> bool {
        let Some((_, key)) = self.subscriptions.remove(&id) else {
            return false;
        };
        self.slots
            .get_mut(&key)
            .is_some_and(|mut entry| entry.value_mut().remove_id(id))
    }

    /// Number of registrations for signal type `E`.
    pub fn listener_count<E: Signal>(&self) -> usize {
        self.slots
            .get(&TypeId::of::<E>())
            .map_or(0, |entry| entry.value().len())
    }

    /// Deliver `signal` to every listener registered for its type.
    ///
    /// Never fails. Listener errors are logged by the dispatch pool; a
    /// signal with no listeners, or one published after shutdown, is
    /// dropped.
    pub async fn publish<E: Signal>(&self, signal: E) {
        let name = signal_name::<E>();
        let snapshot = self.slots.get(&TypeId::of::<E>()).and_then(|entry| {
            entry
                .value()
                .as_any()
                .downcast_ref::<Slot<E>>()
                .map(|slot| Arc::clone(&slot.0))
        });

        let Some(registrations) = snapshot.filter(|list| !list.is_empty()) else {
            debug!(signal = name, "No listeners, signal dropped");
            return;
        };

        if !self.pool.is_accepting() {
            debug!(signal = name, "Signal bus is closed, signal dropped");
            return;
        }

        crate::metrics::record_signal_published(name);
        let signal = Arc::new(signal);
        for registration in registrations.iter() {
            let subscriber = registration.subscriber.clone();
            let signal = Arc::clone(&signal);
            let job = DispatchJob::new(name, Box::pin(async move { subscriber.invoke(signal).await }));
            if !self.pool.enqueue(job).await {
                warn!(signal = name, "Signal bus closed during publish");
                break;
            }
        }
    }

    /// Stop accepting signals and wait for every queued dispatch job.
    pub async fn wait_for_completion(&self) {
        self.pool.wait_for_completion().await;
        debug!("Signal bus drained");
    }

    /// Drop queued jobs and cancel running ones at their next await point.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

impl std::fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBus")
            .field("signal_types", &self.slots.len())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
