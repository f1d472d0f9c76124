//! Scoped subscription bundle for one mirrored resource.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::oneshot;

use crate::documents::{DocumentSubscription, ModelChangedEvent};

type Teardown = Box<dyn FnOnce() + Send>;

/// Something that happened to a subscribed document.
#[derive(Debug)]
pub(crate) enum SubscriptionEvent {
    Changed(ModelChangedEvent),
    Disposed,
}

/// Content-change subscription, dispose subscription and backend teardown,
/// owned as one value.
///
/// [`release`](Self::release) drops both subscriptions and runs the teardown
/// exactly once; further calls are no-ops. Dropping an unreleased group
/// releases it.
pub(crate) struct SubscriptionGroup {
    subscription: Option<DocumentSubscription>,
    teardown: Option<Teardown>,
}

impl SubscriptionGroup {
    pub(crate) fn new(subscription: DocumentSubscription, teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            subscription: Some(subscription),
            teardown: Some(Box::new(teardown)),
        }
    }

    pub(crate) fn is_released(&self) -> bool {
        self.teardown.is_none()
    }

    pub(crate) fn release(&mut self) {
        // Unsubscribe before tearing down so no event can follow the removal
        self.subscription = None;
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }

    /// Polls for the next event. Disposal wins over queued changes: once the
    /// document is gone its pending edits are irrelevant.
    pub(crate) fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<SubscriptionEvent> {
        let Some(subscription) = self.subscription.as_mut() else {
            return Poll::Pending;
        };
        let disposed = Pin::new(&mut subscription.disposed).poll(cx).is_ready();
        if !disposed {
            match subscription.changes.poll_recv(cx) {
                Poll::Ready(Some(event)) => return Poll::Ready(SubscriptionEvent::Changed(event)),
                Poll::Pending => return Poll::Pending,
                // The source dropped its sender without signalling
                Poll::Ready(None) => {}
            }
        }
        // A completed oneshot must not be polled again
        self.subscription = None;
        Poll::Ready(SubscriptionEvent::Disposed)
    }

    /// Takes every event already queued, without waiting.
    pub(crate) fn drain(&mut self) -> Vec<SubscriptionEvent> {
        let mut events = Vec::new();
        let Some(subscription) = self.subscription.as_mut() else {
            return events;
        };
        let mut disposed = !matches!(
            subscription.disposed.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        );
        while !disposed {
            match subscription.changes.try_recv() {
                Ok(event) => events.push(SubscriptionEvent::Changed(event)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => disposed = true,
            }
        }
        if disposed {
            events.clear();
            events.push(SubscriptionEvent::Disposed);
            self.subscription = None;
        }
        events
    }
}

impl Drop for SubscriptionGroup {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for SubscriptionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionGroup")
            .field("released", &self.is_released())
            .finish()
    }
}
