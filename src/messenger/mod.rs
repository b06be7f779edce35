//! Type-keyed publish/subscribe on top of execution contexts.
//!
//! The messenger maps each message type to a registry of subscriptions.
//! Subscribing captures whichever execution context is bound to the calling
//! thread; publishing posts one delivery per active subscription onto its
//! captured context, so a subscriber's handler always runs on the thread the
//! subscriber lives on.
//!
//! Delivery is asynchronous and fire-and-forget. Each subscriber observes
//! messages in the order they were published to it; no ordering holds
//! across different subscribers' contexts.

mod registry;
mod subscription;

use crate::error::Error;
use crate::runtime::context;
use self::registry::Registry;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

/// The future a subscriber returns from its handler.
///
/// The handler may suspend; every poll runs on the subscriber's captured
/// context, so code after an await stays on that context's thread.
pub type MessageFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A receiver of published messages of type `M`.
///
/// Handlers run on the execution context that was current when the
/// subscriber was registered. Synchronous subscribers return an immediately
/// ready future:
///
/// ```rust,ignore
/// impl Subscriber<Tick> for Clock {
///     fn on_message_received(&self, tick: Tick) -> MessageFuture {
///         self.record(tick);
///         Box::pin(async {})
///     }
/// }
/// ```
pub trait Subscriber<M>: Send + Sync {
    fn on_message_received(&self, message: M) -> MessageFuture;
}

/// Type-keyed publish/subscribe hub.
///
/// One registry exists per message type, created lazily on first use; the
/// messenger itself is created once and lives for its owner's lifetime.
/// Subscriptions stop being delivered once their captured context stops
/// running; there is no explicit teardown.
pub struct Messenger {
    registries: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Messenger {
    pub fn new() -> Self {
        Self {
            registries: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes `subscriber` to messages of type `M`.
    ///
    /// Captures the execution context bound to the calling thread;
    /// deliveries for this subscription are posted there. Fails with
    /// [`Error::NotBound`] when the calling thread has no bound context.
    pub fn subscribe<M>(&self, subscriber: Arc<dyn Subscriber<M>>) -> Result<(), Error>
    where
        M: Clone + Send + 'static,
    {
        let context = context::current().ok_or(Error::NotBound)?;

        self.registry::<M>().subscribe(context, subscriber);
        Ok(())
    }

    /// Removes `subscriber`'s first active subscription for type `M`.
    ///
    /// Safe to call concurrently with a publish in flight: a delivery that
    /// publish already posted may still arrive, later ones will not.
    pub fn unsubscribe<M>(&self, subscriber: &Arc<dyn Subscriber<M>>)
    where
        M: Clone + Send + 'static,
    {
        if let Some(registry) = self.lookup::<M>() {
            registry.unsubscribe(subscriber);
        }
    }

    /// Publishes `message` to every active subscriber of type `M`.
    ///
    /// Callable from any thread, bound or not. With no subscribers for `M`
    /// this is a no-op.
    pub fn publish<M>(&self, message: M)
    where
        M: Clone + Send + 'static,
    {
        if let Some(registry) = self.lookup::<M>() {
            registry.publish(message);
        }
    }

    /// Returns the registry for `M`, creating it on first use.
    ///
    /// Threads racing on first use serialize on the write lock and re-check
    /// the map there, so exactly one registry per type ever becomes visible.
    fn registry<M>(&self) -> Arc<Registry<M>>
    where
        M: Clone + Send + 'static,
    {
        if let Some(registry) = self.lookup::<M>() {
            return registry;
        }

        let mut registries = self.registries.write().unwrap();
        let entry = registries
            .entry(TypeId::of::<M>())
            .or_insert_with(|| Arc::new(Registry::<M>::new()));

        entry
            .clone()
            .downcast::<Registry<M>>()
            .expect("registry type mismatch")
    }

    fn lookup<M>(&self) -> Option<Arc<Registry<M>>>
    where
        M: Clone + Send + 'static,
    {
        let registries = self.registries.read().unwrap();

        registries.get(&TypeId::of::<M>()).map(|registry| {
            registry
                .clone()
                .downcast::<Registry<M>>()
                .expect("registry type mismatch")
        })
    }
}

impl Default for Messenger {
    fn default() -> Self {
        Self::new()
    }
}
