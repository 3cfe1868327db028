//! Visibility Gate - One-shot deferred start on viewport entry.
//!
//! Wraps the platform's visibility reporting in an observer registry.
//! The host render loop calls [`notify_visibility`] for elements as layout
//! decides they have entered or left the viewport; observers registered
//! with [`observe_visible_once`] fire on the first report of visibility
//! and never again - neither a later scroll-out/scroll-in nor a second
//! notification re-triggers them.
//!
//! Disconnection is idempotent and must also happen on teardown for gates
//! that never fired, so no registration outlives its component. Dispatch
//! tolerates callbacks that disconnect handles (their own included) and
//! callbacks that register new observers.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::types::ElementId;

// =============================================================================
// Observer Registry
// =============================================================================

/// One registered observation.
struct ObserverEntry {
    id: u64,
    alive: Rc<Cell<bool>>,
    callback: Rc<dyn Fn()>,
}

thread_local! {
    /// Observers keyed by the element they watch.
    static OBSERVERS: RefCell<HashMap<ElementId, Vec<ObserverEntry>>> = RefCell::new(HashMap::new());

    /// Counter for observer handles.
    static OBSERVER_COUNTER: Cell<u64> = const { Cell::new(0) };
}

// =============================================================================
// Observer Handle
// =============================================================================

/// Handle to a registered one-shot visibility observation.
///
/// Dropping the handle does NOT disconnect; call [`ObserverHandle::disconnect`].
/// The observer also disconnects itself permanently after firing.
pub struct ObserverHandle {
    element: ElementId,
    id: u64,
    alive: Rc<Cell<bool>>,
}

impl ObserverHandle {
    /// Disconnect the observation. Safe to call more than once, and safe
    /// to call after the observer has already fired.
    pub fn disconnect(&self) {
        self.alive.set(false);
        OBSERVERS.with(|observers| {
            let mut observers = observers.borrow_mut();
            if let Some(entries) = observers.get_mut(&self.element) {
                entries.retain(|e| e.id != self.id);
                if entries.is_empty() {
                    observers.remove(&self.element);
                }
            }
        });
    }

    /// Whether the observation is still armed (not fired, not disconnected).
    pub fn is_connected(&self) -> bool {
        self.alive.get()
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Observe an element; run `callback` on the first visibility report.
///
/// The observation is one-shot: it disarms itself before the callback runs,
/// so re-entrant notifications or later viewport entries cannot fire it a
/// second time.
pub fn observe_visible_once(element: ElementId, callback: impl Fn() + 'static) -> ObserverHandle {
    let id = OBSERVER_COUNTER.with(|counter| {
        let id = counter.get();
        counter.set(id + 1);
        id
    });
    let alive = Rc::new(Cell::new(true));

    OBSERVERS.with(|observers| {
        observers
            .borrow_mut()
            .entry(element)
            .or_default()
            .push(ObserverEntry {
                id,
                alive: alive.clone(),
                callback: Rc::new(callback),
            });
    });

    ObserverHandle { element, id, alive }
}

/// Report a visibility change for an element.
///
/// `visible = false` reports are accepted and ignored; one-shot observers
/// only care about entry into view.
pub fn notify_visibility(element: ElementId, visible: bool) {
    if !visible {
        return;
    }

    // Snapshot armed observers first: callbacks may disconnect handles or
    // register new observers, so the registry must not stay borrowed.
    let armed: Vec<(Rc<Cell<bool>>, Rc<dyn Fn()>)> = OBSERVERS.with(|observers| {
        observers
            .borrow()
            .get(&element)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| (e.alive.clone(), e.callback.clone()))
                    .collect()
            })
            .unwrap_or_default()
    });

    for (alive, callback) in armed {
        if alive.get() {
            // Disarm before firing: one-shot even under re-entrancy
            alive.set(false);
            callback();
        }
    }

    // Prune fired entries
    OBSERVERS.with(|observers| {
        let mut observers = observers.borrow_mut();
        if let Some(entries) = observers.get_mut(&element) {
            entries.retain(|e| e.alive.get());
            if entries.is_empty() {
                observers.remove(&element);
            }
        }
    });
}

/// Number of live observations across all elements (for testing).
pub fn observer_count() -> usize {
    OBSERVERS.with(|observers| observers.borrow().values().map(|v| v.len()).sum())
}

/// Reset all observer state (for testing).
pub fn reset_observers() {
    OBSERVERS.with(|observers| observers.borrow_mut().clear());
    OBSERVER_COUNTER.with(|counter| counter.set(0));
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() {
        reset_observers();
    }

    #[test]
    fn test_fires_on_first_visibility() {
        setup();

        let fired = Rc::new(Cell::new(0));
        let fired_clone = fired.clone();
        let handle = observe_visible_once(3, move || {
            fired_clone.set(fired_clone.get() + 1);
        });

        // Not-visible reports are ignored
        notify_visibility(3, false);
        assert_eq!(fired.get(), 0);
        assert!(handle.is_connected());

        notify_visibility(3, true);
        assert_eq!(fired.get(), 1);
        assert!(!handle.is_connected());
    }

    #[test]
    fn test_one_shot_never_refires() {
        setup();

        let fired = Rc::new(Cell::new(0));
        let fired_clone = fired.clone();
        let _handle = observe_visible_once(0, move || {
            fired_clone.set(fired_clone.get() + 1);
        });

        notify_visibility(0, true);
        // Scroll out and back in
        notify_visibility(0, false);
        notify_visibility(0, true);
        assert_eq!(fired.get(), 1, "one-shot observer fired more than once");
        assert_eq!(observer_count(), 0, "fired observer should be pruned");
    }

    #[test]
    fn test_disconnect_before_firing() {
        setup();

        let fired = Rc::new(Cell::new(false));
        let fired_clone = fired.clone();
        let handle = observe_visible_once(1, move || fired_clone.set(true));

        handle.disconnect();
        assert_eq!(observer_count(), 0);

        notify_visibility(1, true);
        assert!(!fired.get(), "disconnected observer must not fire");

        // Idempotent
        handle.disconnect();
    }

    #[test]
    fn test_only_watched_element_triggers() {
        setup();

        let fired = Rc::new(Cell::new(false));
        let fired_clone = fired.clone();
        let _handle = observe_visible_once(7, move || fired_clone.set(true));

        notify_visibility(8, true);
        assert!(!fired.get());
    }

    #[test]
    fn test_callback_may_register_new_observer() {
        setup();

        let second_fired = Rc::new(Cell::new(false));
        let second_fired_clone = second_fired.clone();
        let _handle = observe_visible_once(2, move || {
            let inner = second_fired_clone.clone();
            let _inner_handle = observe_visible_once(2, move || inner.set(true));
        });

        // First dispatch fires the outer observer only; the newly registered
        // one was not part of the snapshot.
        notify_visibility(2, true);
        assert!(!second_fired.get());
        assert_eq!(observer_count(), 1);

        notify_visibility(2, true);
        assert!(second_fired.get());
    }
}
