//! Fan-out of completed-request outcomes to registered observers.

use std::sync::Arc;

use bitflags::bitflags;

use crate::controls::ControlId;
use crate::event::{EventId, StandaloneFileId};
use crate::object::ObjectId;
use crate::request::RequestResult;

bitflags! {
    /// System-event tags attached to notifications, also usable as an
    /// observer subscription mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SystemEvents: u32 {
        const IMPL_SET = 1 << 0;
        const TRIGGER_EXECUTED = 1 << 1;
        const TRIGGER_FINISHED = 1 << 2;
        const FILE_PLAY = 1 << 3;
        const FILE_STARTED = 1 << 4;
        const FILE_STOPPED = 1 << 5;
    }
}

/// Outcome of one dispatched request, delivered synchronously to observers.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Coarse result; the full status taxonomy collapses to two outcomes.
    pub result: RequestResult,
    pub owner: Option<u64>,
    pub user_data: Option<u64>,
    pub user_data_owner: Option<u64>,
    /// Tag from the fixed subtype table; empty for untagged outcomes.
    pub event: SystemEvents,
    pub control_id: Option<ControlId>,
    pub object: Option<ObjectId>,
    pub audio_event: Option<EventId>,
    pub standalone_file: Option<StandaloneFileId>,
}

pub type NotificationCallback = Arc<dyn Fn(&Notification) + Send + Sync>;

struct Observer {
    callback: NotificationCallback,
    owner_filter: Option<u64>,
    event_mask: SystemEvents,
}

/// Registered observers, notified before `process_request` returns.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<Observer>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer. Re-registering the same callback with the same
    /// owner filter fails.
    pub fn add(
        &mut self,
        callback: NotificationCallback,
        owner_filter: Option<u64>,
        event_mask: SystemEvents,
    ) -> bool {
        let duplicate = self
            .observers
            .iter()
            .any(|o| Arc::ptr_eq(&o.callback, &callback) && o.owner_filter == owner_filter);

        if duplicate {
            log::warn!("request observer already registered");
            return false;
        }

        self.observers.push(Observer {
            callback,
            owner_filter,
            event_mask,
        });
        true
    }

    /// Removes the observer registered with this (callback, owner filter)
    /// pair. Returns false when no such observer exists.
    pub fn remove(&mut self, callback: &NotificationCallback, owner_filter: Option<u64>) -> bool {
        let before = self.observers.len();
        self.observers
            .retain(|o| !(Arc::ptr_eq(&o.callback, callback) && o.owner_filter == owner_filter));
        before != self.observers.len()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Delivers `notification` to every observer whose owner filter and event
    /// mask accept it. Untagged notifications bypass the mask so callers
    /// still learn about failed requests.
    pub fn notify(&self, notification: &Notification) {
        for observer in &self.observers {
            if let Some(filter) = observer.owner_filter {
                if notification.owner != Some(filter) {
                    continue;
                }
            }

            if !notification.event.is_empty()
                && !observer.event_mask.intersects(notification.event)
            {
                continue;
            }

            (observer.callback)(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn notification(owner: Option<u64>, event: SystemEvents) -> Notification {
        Notification {
            result: RequestResult::Success,
            owner,
            user_data: None,
            user_data_owner: None,
            event,
            control_id: None,
            object: None,
            audio_event: None,
            standalone_file: None,
        }
    }

    #[test]
    fn owner_filter_restricts_delivery() {
        let mut registry = ObserverRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = hits.clone();
        let callback: NotificationCallback = Arc::new(move |_| {
            hits_clone.fetch_add(1, Ordering::Relaxed);
        });
        assert!(registry.add(callback, Some(7), SystemEvents::all()));

        registry.notify(&notification(Some(7), SystemEvents::TRIGGER_EXECUTED));
        registry.notify(&notification(Some(8), SystemEvents::TRIGGER_EXECUTED));
        registry.notify(&notification(None, SystemEvents::TRIGGER_EXECUTED));

        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn untagged_notifications_bypass_the_mask() {
        let mut registry = ObserverRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let callback: NotificationCallback = Arc::new(move |n: &Notification| {
            seen_clone.lock().unwrap().push(n.event);
        });
        assert!(registry.add(callback, None, SystemEvents::TRIGGER_FINISHED));

        registry.notify(&notification(None, SystemEvents::TRIGGER_EXECUTED));
        registry.notify(&notification(None, SystemEvents::TRIGGER_FINISHED));
        registry.notify(&notification(None, SystemEvents::empty()));

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![SystemEvents::TRIGGER_FINISHED, SystemEvents::empty()]
        );
    }

    #[test]
    fn remove_requires_matching_pair() {
        let mut registry = ObserverRegistry::new();
        let callback: NotificationCallback = Arc::new(|_| {});

        assert!(registry.add(callback.clone(), Some(1), SystemEvents::all()));
        assert!(!registry.add(callback.clone(), Some(1), SystemEvents::all()));

        assert!(!registry.remove(&callback, Some(2)));
        assert!(registry.remove(&callback, Some(1)));
        assert!(registry.is_empty());
    }
}
