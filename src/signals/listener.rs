//! Listener side of the signal bus.
//!
//! A subscriber is either a typed listener object or a closure. Both are
//! invoked through [`Subscriber::invoke`], so the dispatch path does not
//! care which one it holds.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

use crate::error::HandlerResult;

/// Marker for values that can travel over the bus.
///
/// The concrete type is the routing key.
pub trait Signal: Send + Sync + 'static {}

/// Short type name of a signal, used in logs and metric labels.
pub fn signal_name<E: ?Sized>() -> &'static str {
    let full = std::any::type_name::<E>();
    full.rsplit("::").next().unwrap_or(full)
}

/// A typed listener object.
#[async_trait]
pub trait SignalListener<E: Signal>: Send + Sync {
    async fn on_signal(&self, signal: &E) -> HandlerResult;
}

/// Closure form of a listener.
pub type SignalCallback<E> = Arc<dyn Fn(Arc<E>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// One registered recipient of signals of type `E`.
pub enum Subscriber<E: Signal> {
    Listener(Arc<dyn SignalListener<E>>),
    Callback(SignalCallback<E>),
}

impl<E: Signal> Subscriber<E> {
    pub async fn invoke(&self, signal: Arc<E>) -> HandlerResult {
        match self {
            Self::Listener(listener) => listener.on_signal(&signal).await,
            Self::Callback(callback) => callback(signal).await,
        }
    }

    /// Identity of the underlying object, independent of the vtable.
    pub(crate) fn addr(&self) -> *const () {
        match self {
            Self::Listener(listener) => Arc::as_ptr(listener) as *const (),
            Self::Callback(callback) => Arc::as_ptr(callback) as *const (),
        }
    }
}

impl<E: Signal> Clone for Subscriber<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Listener(listener) => Self::Listener(Arc::clone(listener)),
            Self::Callback(callback) => Self::Callback(Arc::clone(callback)),
        }
    }
}

impl<E: Signal> fmt::Debug for Subscriber<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Listener(_) => "Listener",
            Self::Callback(_) => "Callback",
        };
        f.debug_struct("Subscriber")
            .field("kind", &kind)
            .field("signal", &signal_name::<E>())
            .finish()
    }
}

/// Handle returned by every `subscribe*` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);
