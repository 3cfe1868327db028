//! Focus State - Input focus tracking and focus/blur hooks.
//!
//! A minimal focus system for the typed component's input wiring:
//! - `focused_element` signal (currently focused element, reactive)
//! - Focus/blur hook registration per element, with cleanup
//!
//! The typed component uses this when `bind_input_focus_events` is set and
//! its target is an input element: focus pauses the animation so the user
//! can type, blur resumes it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use spark_signals::{signal, Signal};

use crate::types::ElementId;

// =============================================================================
// Focused Element Signal
// =============================================================================

thread_local! {
    /// Currently focused element (-1 = none).
    static FOCUSED_ELEMENT: Signal<i32> = signal(-1);

    /// Multiple hook sets per element supported (component wiring + user hooks).
    static FOCUS_HOOK_REGISTRY: RefCell<HashMap<ElementId, Vec<(u64, Rc<FocusHooks>)>>> =
        RefCell::new(HashMap::new());

    /// Counter for hook registration handles.
    static HOOK_COUNTER: RefCell<u64> = const { RefCell::new(0) };
}

/// Get the currently focused element, if any.
///
/// Reading creates a reactive dependency when called from a derived/effect.
pub fn focused_element() -> Option<ElementId> {
    let raw = FOCUSED_ELEMENT.with(|s| s.get());
    (raw >= 0).then_some(raw as ElementId)
}

/// Check if a specific element is focused.
pub fn is_focused(index: ElementId) -> bool {
    focused_element() == Some(index)
}

// =============================================================================
// Focus Hooks
// =============================================================================

/// Hooks fired when focus changes for one element.
#[derive(Default)]
pub struct FocusHooks {
    pub on_focus: Option<Box<dyn Fn()>>,
    pub on_blur: Option<Box<dyn Fn()>>,
}

/// Register focus/blur hooks for an element.
///
/// Returns a cleanup function that unregisters the hooks.
pub fn register_focus_hooks(index: ElementId, hooks: FocusHooks) -> impl FnOnce() {
    let id = HOOK_COUNTER.with(|counter| {
        let mut counter = counter.borrow_mut();
        let id = *counter;
        *counter += 1;
        id
    });

    FOCUS_HOOK_REGISTRY.with(|registry| {
        registry
            .borrow_mut()
            .entry(index)
            .or_default()
            .push((id, Rc::new(hooks)));
    });

    move || {
        FOCUS_HOOK_REGISTRY.with(|registry| {
            let mut registry = registry.borrow_mut();
            if let Some(entries) = registry.get_mut(&index) {
                entries.retain(|(entry_id, _)| *entry_id != id);
                if entries.is_empty() {
                    registry.remove(&index);
                }
            }
        });
    }
}

/// Move focus to an element (or clear it with `None`).
///
/// Fires blur hooks for the previously focused element, then focus hooks
/// for the new one. Setting the same element twice is a no-op.
pub fn set_focus(index: Option<ElementId>) {
    let previous = focused_element();
    if previous == index {
        return;
    }

    FOCUSED_ELEMENT.with(|s| s.set(index.map(|i| i as i32).unwrap_or(-1)));

    if let Some(prev) = previous {
        dispatch(prev, |hooks| hooks.on_blur.as_deref());
    }
    if let Some(next) = index {
        dispatch(next, |hooks| hooks.on_focus.as_deref());
    }
}

/// Run the selected hook of every registration for an element.
///
/// Hooks run on a snapshot taken outside the registry borrow, so they may
/// register or unregister hooks themselves.
fn dispatch(index: ElementId, select: impl Fn(&FocusHooks) -> Option<&dyn Fn()>) {
    let snapshot: Vec<Rc<FocusHooks>> = FOCUS_HOOK_REGISTRY.with(|registry| {
        registry
            .borrow()
            .get(&index)
            .map(|entries| entries.iter().map(|(_, hooks)| hooks.clone()).collect())
            .unwrap_or_default()
    });

    for hooks in snapshot {
        if let Some(hook) = select(&hooks) {
            hook();
        }
    }
}

/// Reset all focus state (for testing).
pub fn reset_focus_state() {
    FOCUSED_ELEMENT.with(|s| s.set(-1));
    FOCUS_HOOK_REGISTRY.with(|registry| registry.borrow_mut().clear());
    HOOK_COUNTER.with(|counter| *counter.borrow_mut() = 0);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn setup() {
        reset_focus_state();
    }

    #[test]
    fn test_focus_and_blur_hooks_fire() {
        setup();

        let focused = Rc::new(Cell::new(0));
        let blurred = Rc::new(Cell::new(0));
        let focused_clone = focused.clone();
        let blurred_clone = blurred.clone();

        let _cleanup = register_focus_hooks(
            4,
            FocusHooks {
                on_focus: Some(Box::new(move || focused_clone.set(focused_clone.get() + 1))),
                on_blur: Some(Box::new(move || blurred_clone.set(blurred_clone.get() + 1))),
            },
        );

        set_focus(Some(4));
        assert_eq!(focused.get(), 1);
        assert_eq!(blurred.get(), 0);
        assert!(is_focused(4));

        // Refocusing the same element is a no-op
        set_focus(Some(4));
        assert_eq!(focused.get(), 1);

        set_focus(None);
        assert_eq!(blurred.get(), 1);
        assert_eq!(focused_element(), None);
    }

    #[test]
    fn test_focus_moves_between_elements() {
        setup();

        let blurred = Rc::new(Cell::new(false));
        let blurred_clone = blurred.clone();
        let _cleanup = register_focus_hooks(
            1,
            FocusHooks {
                on_blur: Some(Box::new(move || blurred_clone.set(true))),
                ..Default::default()
            },
        );

        set_focus(Some(1));
        set_focus(Some(2));
        assert!(blurred.get(), "moving focus should blur the old element");
        assert!(is_focused(2));
    }

    #[test]
    fn test_unregistered_hooks_stop_firing() {
        setup();

        let focused = Rc::new(Cell::new(0));
        let focused_clone = focused.clone();
        let cleanup = register_focus_hooks(
            3,
            FocusHooks {
                on_focus: Some(Box::new(move || focused_clone.set(focused_clone.get() + 1))),
                ..Default::default()
            },
        );

        cleanup();
        set_focus(Some(3));
        assert_eq!(focused.get(), 0);
    }
}
