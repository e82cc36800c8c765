//! In-process pub/sub for property change events.

use super::PropertyChangeEvent;
use crate::error::BoxError;
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{error, warn};

/// Result returned by change handlers.
pub type HandlerResult = std::result::Result<(), BoxError>;

type Handler = Arc<dyn Fn(&PropertyChangeEvent) -> HandlerResult + Send + Sync>;

/// Handle for a subscription that can be dropped to unsubscribe.
///
/// When the handle is dropped, the subscription is removed immediately.
/// Call [`detach`](SubscriptionHandle::detach) to keep the handler registered
/// for the lifetime of the notifier instead.
pub struct SubscriptionHandle {
    id: usize,
    registry: Weak<NotifierInner>,
}

impl SubscriptionHandle {
    /// The subscription id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Keep the handler registered after this handle is dropped.
    pub fn detach(mut self) {
        self.registry = Weak::new();
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            inner.subscribers.write().retain(|(id, _)| *id != self.id);
        }
    }
}

/// Internal notifier state.
struct NotifierInner {
    subscribers: RwLock<Vec<(usize, Handler)>>,
    next_id: AtomicUsize,
}

/// Delivers [`PropertyChangeEvent`]s to registered handlers.
///
/// Delivery is synchronous on the posting thread. A handler that returns an
/// error or panics is logged and skipped; the remaining handlers still
/// receive the event and the poster never sees the failure. Handlers
/// registered after an event was posted never see it.
///
/// # Examples
///
/// ```rust
/// use reloadable_properties::notify::{ChangeNotifier, PropertyChangeEvent};
///
/// let notifier = ChangeNotifier::new();
///
/// let handle = notifier.subscribe(|event| {
///     println!("{} changed to {}", event.key, event.new_value);
///     Ok(())
/// });
///
/// notifier.post(&PropertyChangeEvent::new("server.port", Some("80".into()), "8080"));
///
/// // Unsubscribe by dropping the handle
/// drop(handle);
/// ```
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl ChangeNotifier {
    /// Create a new notifier with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                subscribers: RwLock::new(Vec::new()),
                next_id: AtomicUsize::new(0),
            }),
        }
    }

    /// Register a handler invoked once per posted event.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionHandle
    where
        F: Fn(&PropertyChangeEvent) -> HandlerResult + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.write().push((id, Arc::new(handler)));

        SubscriptionHandle {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Register a handler that only sees events for `key`.
    pub fn subscribe_to<F>(&self, key: impl Into<String>, handler: F) -> SubscriptionHandle
    where
        F: Fn(&PropertyChangeEvent) -> HandlerResult + Send + Sync + 'static,
    {
        let key = key.into();
        self.subscribe(move |event| {
            if event.key == key {
                handler(event)
            } else {
                Ok(())
            }
        })
    }

    /// Deliver `event` to every currently registered handler.
    ///
    /// Returns the number of handlers that accepted the event without error.
    pub fn post(&self, event: &PropertyChangeEvent) -> usize {
        // Handlers may subscribe or unsubscribe while being called.
        let handlers: Vec<Handler> = self
            .inner
            .subscribers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        let mut delivered = 0;
        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(key = %event.key, error = %e, "Property change handler failed");
                }
                Err(_) => {
                    error!(key = %event.key, "Property change handler panicked");
                }
            }
        }
        delivered
    }

    /// Deliver each event in order.
    pub fn post_all(&self, events: &[PropertyChangeEvent]) {
        for event in events {
            self.post(event);
        }
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
