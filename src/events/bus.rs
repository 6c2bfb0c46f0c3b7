//! # Typed in-process event bus.
//!
//! [`EventBus`] routes messages by their Rust type: handlers subscribe to a
//! message type `T` and receive every `T` published afterwards.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                       Registry:
//!   HubClient listener ──┐
//!   Runner sink       ───┼──► publish::<T>() ──► TypeId(T) ──► { id₁ → h₁, id₂ → h₂, … }
//!   application code  ───┘                                        │     │
//!                                                                 ▼     ▼
//!                                                               h₁(&m) h₂(&m)
//! ```
//!
//! ## Rules
//! - **Concurrent registry**: subscribe/publish/unsubscribe may run from any thread.
//! - **Snapshot delivery**: `publish` delivers to the handlers registered when it started;
//!   handlers may subscribe or unsubscribe from inside a delivery.
//! - **No ordering** across handlers of one type.
//! - **No containment** in `publish`: a panicking handler unwinds into the publisher
//!   and the remaining handlers of that delivery are skipped. Emitters that must not
//!   fail (runner loops) separate envelope generation from bus delivery.
//! - **Pruning**: a type entry is removed when its last handler is removed.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::envelope::EventMessage;

/// Handle identifying one subscription within its message type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErasedHandler = Arc<dyn Any + Send + Sync>;
type Registry = DashMap<TypeId, DashMap<SubscriptionId, ErasedHandler>>;

/// Typed publish/subscribe registry.
///
/// ### Properties
/// - **Cloneable**: cheap to clone (internally holds an `Arc`-backed registry);
///   clones share subscribers.
/// - **Synchronous** [`publish`](Self::publish) and **spawned** [`publish_async`](Self::publish_async).
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for messages of type `T` and returns its id.
    pub fn subscribe<T, F>(&self, handler: F) -> SubscriptionId
    where
        T: EventMessage,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId::fresh();
        let handler: Handler<T> = Arc::new(handler);
        // Insert while holding the outer entry so a concurrent prune cannot
        // detach the inner map between lookup and insert.
        self.registry
            .entry(TypeId::of::<T>())
            .or_default()
            .insert(id, Arc::new(handler) as ErasedHandler);
        id
    }

    /// Delivers `message` to every handler of `T`, in registry order, on the caller's thread.
    ///
    /// Publishing a type with no subscribers does nothing.
    pub fn publish<T: EventMessage>(&self, message: &T) {
        for handler in self.handlers::<T>() {
            handler(message);
        }
    }

    /// Delivers `message` to every handler of `T`, each on its own tokio task.
    ///
    /// Returns immediately. Await [`Delivery::join`] to wait for all handlers.
    /// Must be called from within a tokio runtime.
    pub fn publish_async<T: EventMessage>(&self, message: T) -> Delivery {
        let message = Arc::new(message);
        let tasks = self
            .handlers::<T>()
            .into_iter()
            .map(|handler| {
                let message = Arc::clone(&message);
                tokio::spawn(async move { handler(&message) })
            })
            .collect();
        Delivery { tasks }
    }

    /// Removes every handler of `T`.
    pub fn unsubscribe_all<T: EventMessage>(&self) {
        self.registry.remove(&TypeId::of::<T>());
    }

    /// Removes one handler of `T`. Returns `true` if it was registered.
    pub fn unsubscribe<T: EventMessage>(&self, id: SubscriptionId) -> bool {
        let key = TypeId::of::<T>();
        let removed = match self.registry.get(&key) {
            Some(subscribers) => subscribers.remove(&id).is_some(),
            None => return false,
        };
        self.registry.remove_if(&key, |_, subscribers| subscribers.is_empty());
        removed
    }

    /// Number of handlers currently registered for `T`.
    pub fn subscriber_count<T: EventMessage>(&self) -> usize {
        self.registry
            .get(&TypeId::of::<T>())
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    /// Returns `true` if no type has a registered handler.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Adapter that publishes every value it is called with.
    ///
    /// Useful to wire a [`HubClient`](crate::HubClient) listener or a runner sink
    /// straight into the bus.
    pub fn publisher<T: EventMessage>(&self) -> impl Fn(T) + Send + Sync + use<T> {
        let bus = self.clone();
        move |message: T| bus.publish(&message)
    }

    /// Snapshot of the handlers of `T`; no registry lock is held afterwards.
    fn handlers<T: EventMessage>(&self) -> Vec<Handler<T>> {
        let Some(subscribers) = self.registry.get(&TypeId::of::<T>()) else {
            return Vec::new();
        };
        subscribers
            .iter()
            .filter_map(|entry| entry.value().downcast_ref::<Handler<T>>().cloned())
            .collect()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("types", &self.registry.len())
            .finish()
    }
}

/// In-flight asynchronous delivery returned by [`EventBus::publish_async`].
///
/// Dropping it detaches the handler tasks; they still run to completion.
#[must_use = "dropping a Delivery detaches the handler tasks"]
pub struct Delivery {
    tasks: Vec<JoinHandle<()>>,
}

impl Delivery {
    /// Number of handler tasks spawned.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every handler task; returns how many completed without panicking.
    pub async fn join(self) -> usize {
        let mut completed = 0;
        for task in self.tasks {
            if task.await.is_ok() {
                completed += 1;
            }
        }
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Envelope, Severity};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::SystemTime;

    struct Ping(u32);

    impl EventMessage for Ping {
        fn timestamp(&self) -> SystemTime {
            SystemTime::UNIX_EPOCH
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Envelope) + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        (hits, move |_: &Envelope| {
            h.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn publish_delivers_exactly_once() {
        let bus = EventBus::new();
        let (hits, handler) = counter();
        bus.subscribe(handler);

        bus.publish(&Envelope::info("hello"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.publish(&Envelope::info("nobody listens"));
        bus.publish(&Ping(1));
        assert!(bus.is_empty());
    }

    #[test]
    fn delivery_is_keyed_by_type() {
        let bus = EventBus::new();
        let (hits, handler) = counter();
        bus.subscribe(handler);
        let pings = Arc::new(AtomicUsize::new(0));
        let p = Arc::clone(&pings);
        bus.subscribe(move |ping: &Ping| {
            p.fetch_add(ping.0 as usize, Ordering::SeqCst);
        });

        bus.publish(&Ping(5));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(pings.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn unsubscribe_stops_delivery_and_prunes() {
        let bus = EventBus::new();
        let (hits, handler) = counter();
        let id = bus.subscribe(handler);

        assert!(bus.unsubscribe::<Envelope>(id));
        bus.publish(&Envelope::info("after"));

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count::<Envelope>(), 0);
        assert!(bus.is_empty());
        assert!(!bus.unsubscribe::<Envelope>(id));
    }

    #[test]
    fn unsubscribe_one_keeps_others() {
        let bus = EventBus::new();
        let (first, h1) = counter();
        let (second, h2) = counter();
        let id = bus.subscribe(h1);
        bus.subscribe(h2);

        bus.unsubscribe::<Envelope>(id);
        bus.publish(&Envelope::info("x"));

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count::<Envelope>(), 1);
    }

    #[test]
    fn unsubscribe_all_removes_type() {
        let bus = EventBus::new();
        let (hits, handler) = counter();
        bus.subscribe(handler);
        bus.subscribe(|_: &Envelope| {});

        bus.unsubscribe_all::<Envelope>();
        bus.publish(&Envelope::info("x"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(bus.is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let bus = EventBus::new();
        let a = bus.subscribe(|_: &Envelope| {});
        let b = bus.subscribe(|_: &Envelope| {});
        assert_ne!(a, b);
        assert_eq!(bus.subscriber_count::<Envelope>(), 2);
    }

    #[test]
    fn handler_may_subscribe_during_delivery() {
        let bus = EventBus::new();
        let inner = bus.clone();
        bus.subscribe(move |_: &Ping| {
            inner.subscribe(|_: &Ping| {});
        });

        bus.publish(&Ping(0));
        assert_eq!(bus.subscriber_count::<Ping>(), 2);
    }

    #[test]
    fn handler_panic_reaches_publisher() {
        let bus = EventBus::new();
        bus.subscribe(|_: &Ping| panic!("handler failed"));

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            bus.publish(&Ping(0));
        }));
        assert!(outcome.is_err());
    }

    #[test]
    fn publisher_adapter_forwards() {
        let bus = EventBus::new();
        let (hits, handler) = counter();
        bus.subscribe(handler);

        let forward = bus.publisher::<Envelope>();
        forward(Envelope::new(Severity::Ok, "done"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn publish_async_runs_every_handler() {
        let bus = EventBus::new();
        let (hits, h1) = counter();
        let h = Arc::clone(&hits);
        bus.subscribe(h1);
        bus.subscribe(move |_: &Envelope| {
            h.fetch_add(10, Ordering::SeqCst);
        });

        let delivery = bus.publish_async(Envelope::info("async"));
        assert_eq!(delivery.len(), 2);
        assert_eq!(delivery.join().await, 2);
        assert_eq!(hits.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn publish_async_isolates_panics() {
        let bus = EventBus::new();
        let (hits, handler) = counter();
        bus.subscribe(handler);
        bus.subscribe(|_: &Envelope| panic!("boom"));

        let completed = bus.publish_async(Envelope::info("x")).join().await;
        assert_eq!(completed, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
