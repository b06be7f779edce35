use crate::messenger::Subscriber;
use crate::runtime::context::ExecutionContext;

use std::sync::Arc;

/// One registered (context, subscriber) pair.
///
/// The context is captured at subscription time, from whichever execution
/// context was current on the subscribing thread; deliveries for this
/// subscriber are always posted there. The registry owns the subscription
/// slot but never the subscriber itself.
pub(crate) struct Subscription<M> {
    context: Arc<ExecutionContext>,
    subscriber: Arc<dyn Subscriber<M>>,

    /// Cleared by unsubscribe; inactive entries are tombstones awaiting
    /// compaction.
    pub(crate) active: bool,
}

impl<M> Subscription<M> {
    pub(crate) fn new(context: Arc<ExecutionContext>, subscriber: Arc<dyn Subscriber<M>>) -> Self {
        Self {
            context,
            subscriber,
            active: true,
        }
    }

    /// Identity check: same subscriber allocation, not same value.
    pub(crate) fn matches(&self, subscriber: &Arc<dyn Subscriber<M>>) -> bool {
        Arc::ptr_eq(&self.subscriber, subscriber)
    }

    pub(crate) fn capture(&self) -> (Arc<ExecutionContext>, Arc<dyn Subscriber<M>>) {
        (self.context.clone(), self.subscriber.clone())
    }
}
