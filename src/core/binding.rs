//! Live bindings of properties to consumer-owned targets.

use super::PropertyStore;
use crate::error::Result;
use crate::notify::{ChangeNotifier, SubscriptionHandle};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use tracing::warn;

/// A setter fed from the store's current value of one key.
struct Binding<F> {
    store: Arc<PropertyStore>,
    key: String,
    setter: F,
    // Serializes refreshes, so the last one to run applies the latest value.
    refresh: Mutex<()>,
}

impl<F> Binding<F> {
    fn refresh<T>(&self) -> Result<()>
    where
        T: Any + Send,
        F: Fn(T),
    {
        let _guard = self.refresh.lock();
        let raw = self.store.get(&self.key)?;
        match self.store.converter().convert::<T>(&raw)? {
            Some(value) => (self.setter)(value),
            None => warn!(key = %self.key, value = %raw, "Bound property does not convert, target unchanged"),
        }
        Ok(())
    }
}

/// Feed the converted value of `key` into `setter`, now and after every change.
///
/// Each change re-reads the store, so the target ends on the store's value even
/// when concurrent writers post their events out of order. A value that does
/// not convert to `T` leaves the target as it was. The setter must not write
/// the bound key.
pub(crate) fn bind<T, F>(
    store: &Arc<PropertyStore>,
    notifier: &ChangeNotifier,
    key: &str,
    setter: F,
) -> Result<SubscriptionHandle>
where
    T: Any + Send,
    F: Fn(T) + Send + Sync + 'static,
{
    let binding = Arc::new(Binding {
        store: Arc::clone(store),
        key: key.to_string(),
        setter,
        refresh: Mutex::new(()),
    });

    // Subscribe before the first read so no change slips in between.
    let subscriber = Arc::clone(&binding);
    let handle = notifier.subscribe_to(key, move |_| {
        subscriber.refresh::<T>()?;
        Ok(())
    });

    binding.refresh::<T>()?;
    Ok(handle)
}

/// The latest converted value of one property.
///
/// Created by [`ReloadableProperties::bind_value`](super::ReloadableProperties::bind_value).
/// Reads are lock-free. The binding stops following changes when dropped.
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_properties::prelude::*;
///
/// # fn example(properties: &ReloadableProperties) -> Result<()> {
/// let port = properties.bind_value::<u16>("server.port")?;
/// if let Some(port) = port.get() {
///     println!("listening on {}", port);
/// }
/// # Ok(())
/// # }
/// ```
pub struct BoundProperty<T> {
    key: String,
    value: Arc<ArcSwapOption<T>>,
    _subscription: SubscriptionHandle,
}

impl<T> BoundProperty<T>
where
    T: Any + Send + Sync,
{
    pub(crate) fn new(store: &Arc<PropertyStore>, notifier: &ChangeNotifier, key: &str) -> Result<Self> {
        let value = Arc::new(ArcSwapOption::empty());
        let target = Arc::clone(&value);
        let subscription = bind(store, notifier, key, move |v: T| {
            target.store(Some(Arc::new(v)));
        })?;

        Ok(Self {
            key: key.to_string(),
            value,
            _subscription: subscription,
        })
    }

    /// The current value, `None` if no value has converted yet.
    pub fn get(&self) -> Option<Arc<T>> {
        self.value.load_full()
    }

    /// The bound key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<T> std::fmt::Debug for BoundProperty<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundProperty")
            .field("key", &self.key)
            .field("value", &self.value.load_full())
            .finish()
    }
}
