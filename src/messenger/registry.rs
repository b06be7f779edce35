use crate::messenger::Subscriber;
use crate::messenger::subscription::Subscription;
use crate::runtime::context::ExecutionContext;
use crate::runtime::task;

use std::sync::{Arc, Mutex};

/// The subscription registry for one message type.
///
/// Subscriptions are kept as a tombstone list: unsubscribing marks the entry
/// inactive and the next subscribe compacts the tombstones away. Publishing
/// snapshots the active entries under the lock and posts deliveries outside
/// it, so a publish never skips a subscription that was active for its whole
/// duration, and a concurrent unsubscribe can at most let one already
/// posted delivery through.
pub(crate) struct Registry<M> {
    subscriptions: Mutex<Vec<Subscription<M>>>,
}

impl<M> Registry<M>
where
    M: Clone + Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Appends a subscription for `subscriber`, delivered on `context`.
    pub(crate) fn subscribe(
        &self,
        context: Arc<ExecutionContext>,
        subscriber: Arc<dyn Subscriber<M>>,
    ) {
        let mut subscriptions = self.subscriptions.lock().unwrap();

        subscriptions.retain(|subscription| subscription.active);
        subscriptions.push(Subscription::new(context, subscriber));
    }

    /// Tombstones the first active subscription for `subscriber`.
    ///
    /// A delivery already posted by an in-flight publish is not retracted;
    /// no later publish will reach the subscriber.
    pub(crate) fn unsubscribe(&self, subscriber: &Arc<dyn Subscriber<M>>) {
        let mut subscriptions = self.subscriptions.lock().unwrap();

        if let Some(subscription) = subscriptions
            .iter_mut()
            .find(|subscription| subscription.active && subscription.matches(subscriber))
        {
            subscription.active = false;
        }
    }

    /// Fans `message` out to every active subscription.
    ///
    /// Each delivery is posted onto the subscriber's captured context, where
    /// the handler is invoked and its future driven. Deliveries to different
    /// contexts proceed independently; within one context they arrive in
    /// publish order.
    pub(crate) fn publish(&self, message: M) {
        let deliveries: Vec<_> = {
            let subscriptions = self.subscriptions.lock().unwrap();
            subscriptions
                .iter()
                .filter(|subscription| subscription.active)
                .map(|subscription| subscription.capture())
                .collect()
        };

        tracing::trace!("publishing to {} subscribers", deliveries.len());

        for (context, subscriber) in deliveries {
            let message = message.clone();
            let resume = context.clone();

            context.post(move || {
                let future = subscriber.on_message_received(message);
                task::run_detached(resume, future);
            });
        }
    }
}
