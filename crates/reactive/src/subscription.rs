//! Listener management for views.
//!
//! Listeners are called in registration order.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback invoked with the current data of a view.
pub type Listener<T> = Rc<dyn Fn(&T)>;

/// Registered listeners of one view.
pub struct SubscriptionManager<T: ?Sized> {
    listeners: BTreeMap<SubscriptionId, Listener<T>>,
    next_id: SubscriptionId,
}

impl<T: ?Sized> Default for SubscriptionManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> SubscriptionManager<T> {
    pub fn new() -> Self {
        Self {
            listeners: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Registers `callback` and returns its id.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.insert(id, Rc::new(callback));
        id
    }

    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn get(&self, id: SubscriptionId) -> Option<Listener<T>> {
        self.listeners.get(&id).cloned()
    }

    /// Snapshot of the current listeners, so callers can notify without
    /// holding a borrow of the manager.
    pub fn listeners(&self) -> Vec<Listener<T>> {
        self.listeners.values().cloned().collect()
    }

    /// Notifies every listener.
    pub fn notify_all(&self, value: &T) {
        for listener in self.listeners.values() {
            listener(value);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use core::cell::RefCell;

    #[test]
    fn test_subscribe_assigns_increasing_ids() {
        let mut manager: SubscriptionManager<i32> = SubscriptionManager::new();
        assert_eq!(manager.subscribe(|_| {}), 1);
        assert_eq!(manager.subscribe(|_| {}), 2);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let mut manager: SubscriptionManager<i32> = SubscriptionManager::new();
        let id = manager.subscribe(|_| {});
        assert!(manager.unsubscribe(id));
        assert!(manager.is_empty());
        assert!(!manager.unsubscribe(id));
    }

    #[test]
    fn test_notify_in_registration_order() {
        let mut manager: SubscriptionManager<i32> = SubscriptionManager::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in [1, 2, 3] {
            let seen = seen.clone();
            manager.subscribe(move |v| seen.borrow_mut().push((tag, *v)));
        }
        manager.notify_all(&7);
        assert_eq!(*seen.borrow(), vec![(1, 7), (2, 7), (3, 7)]);
    }

    #[test]
    fn test_clear() {
        let mut manager: SubscriptionManager<i32> = SubscriptionManager::new();
        manager.subscribe(|_| {});
        manager.clear();
        assert!(manager.is_empty());
        assert!(manager.get(1).is_none());
    }
}
