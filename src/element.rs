//! Element Registry - The host nodes the typing engine writes into.
//!
//! Manages the lifecycle of element indices:
//! - ID ↔ Index bidirectional mapping
//! - Free index pool for O(1) reuse
//! - Reactive content (`Signal<String>`) so display layers react to the
//!   engine's writes
//! - Attribute map for engines that target an attribute instead of content
//!
//! Elements here play the role the host document plays for a browser typing
//! engine: the registry is the platform service, the engine mutates it
//! imperatively, and the rest of the UI reads it reactively.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use spark_signals::{signal, Signal};

use crate::types::{Attr, ElementId, ElementKind};

// =============================================================================
// Registry State
// =============================================================================

/// Per-element storage.
struct ElementRecord {
    /// What kind of element this is.
    kind: ElementKind,
    /// Reactive text content.
    content: Signal<String>,
    /// Text attributes (bold, dim, etc.) applied to the whole element.
    attrs: Cell<Attr>,
    /// Named attributes (e.g. "placeholder") for attribute-targeted writes.
    attributes: RefCell<HashMap<String, String>>,
}

thread_local! {
    /// Map element ID string to index.
    static ID_TO_INDEX: RefCell<HashMap<String, ElementId>> = RefCell::new(HashMap::new());

    /// Map index to element ID string.
    static INDEX_TO_ID: RefCell<HashMap<ElementId, String>> = RefCell::new(HashMap::new());

    /// Allocated element records.
    static ELEMENTS: RefCell<HashMap<ElementId, ElementRecord>> = RefCell::new(HashMap::new());

    /// Pool of freed indices for reuse.
    static FREE_INDICES: RefCell<Vec<ElementId>> = RefCell::new(Vec::new());

    /// Next index to allocate if pool is empty.
    static NEXT_INDEX: RefCell<usize> = const { RefCell::new(0) };

    /// Counter for generating unique IDs.
    static ID_COUNTER: RefCell<usize> = const { RefCell::new(0) };
}

// =============================================================================
// Allocation
// =============================================================================

/// Create an element of the given kind.
///
/// # Arguments
/// * `kind` - Text or Input.
/// * `id` - Optional element ID. If not provided, one is generated.
///
/// # Returns
/// The allocated element index.
pub fn create_element(kind: ElementKind, id: Option<&str>) -> ElementId {
    let element_id = match id {
        Some(id) => id.to_string(),
        None => ID_COUNTER.with(|counter| {
            let mut counter = counter.borrow_mut();
            let id = format!("e{}", *counter);
            *counter += 1;
            id
        }),
    };

    // Check if already allocated
    let existing = ID_TO_INDEX.with(|map| map.borrow().get(&element_id).copied());
    if let Some(index) = existing {
        return index;
    }

    // Reuse free index or allocate new
    let index = FREE_INDICES.with(|free| {
        let mut free = free.borrow_mut();
        if let Some(index) = free.pop() {
            index
        } else {
            NEXT_INDEX.with(|next| {
                let mut next = next.borrow_mut();
                let index = *next;
                *next += 1;
                index
            })
        }
    });

    ID_TO_INDEX.with(|map| {
        map.borrow_mut().insert(element_id.clone(), index);
    });
    INDEX_TO_ID.with(|map| {
        map.borrow_mut().insert(index, element_id);
    });
    ELEMENTS.with(|elements| {
        elements.borrow_mut().insert(
            index,
            ElementRecord {
                kind,
                content: signal(String::new()),
                attrs: Cell::new(Attr::NONE),
                attributes: RefCell::new(HashMap::new()),
            },
        );
    });

    index
}

/// Release an element back to the pool.
///
/// Safe to call for an index that was never allocated.
pub fn release_element(index: ElementId) {
    let id = INDEX_TO_ID.with(|map| map.borrow().get(&index).cloned());
    let Some(id) = id else { return };

    ID_TO_INDEX.with(|map| {
        map.borrow_mut().remove(&id);
    });
    INDEX_TO_ID.with(|map| {
        map.borrow_mut().remove(&index);
    });
    ELEMENTS.with(|elements| {
        elements.borrow_mut().remove(&index);
    });
    FREE_INDICES.with(|free| {
        free.borrow_mut().push(index);
    });
}

// =============================================================================
// Lookups
// =============================================================================

/// Get index for an element ID.
pub fn get_index(id: &str) -> Option<ElementId> {
    ID_TO_INDEX.with(|map| map.borrow().get(id).copied())
}

/// Get ID for an index.
pub fn get_id(index: ElementId) -> Option<String> {
    INDEX_TO_ID.with(|map| map.borrow().get(&index).cloned())
}

/// Check if an index is currently allocated.
pub fn is_allocated(index: ElementId) -> bool {
    ELEMENTS.with(|elements| elements.borrow().contains_key(&index))
}

/// Get the count of currently allocated elements.
pub fn element_count() -> usize {
    ELEMENTS.with(|elements| elements.borrow().len())
}

/// Get the kind of an element.
pub fn element_kind(index: ElementId) -> Option<ElementKind> {
    ELEMENTS.with(|elements| elements.borrow().get(&index).map(|e| e.kind))
}

// =============================================================================
// Content
// =============================================================================

/// Set the text content of an element. No-op for unallocated indices.
pub fn set_content(index: ElementId, content: &str) {
    let sig = ELEMENTS.with(|elements| elements.borrow().get(&index).map(|e| e.content.clone()));
    if let Some(sig) = sig {
        if sig.get() != content {
            sig.set(content.to_string());
        }
    }
}

/// Get the current text content of an element.
///
/// Reading through the signal creates a reactive dependency when called
/// from a derived/effect.
pub fn get_content(index: ElementId) -> String {
    let sig = ELEMENTS.with(|elements| elements.borrow().get(&index).map(|e| e.content.clone()));
    sig.map(|s| s.get()).unwrap_or_default()
}

/// Get the content signal of an element, for direct reactive binding.
pub fn content_signal(index: ElementId) -> Option<Signal<String>> {
    ELEMENTS.with(|elements| elements.borrow().get(&index).map(|e| e.content.clone()))
}

// =============================================================================
// Attrs and Attributes
// =============================================================================

/// Set the text attributes of an element.
pub fn set_attrs(index: ElementId, attrs: Attr) {
    ELEMENTS.with(|elements| {
        if let Some(e) = elements.borrow().get(&index) {
            e.attrs.set(attrs);
        }
    });
}

/// Get the text attributes of an element.
pub fn get_attrs(index: ElementId) -> Attr {
    ELEMENTS.with(|elements| {
        elements
            .borrow()
            .get(&index)
            .map(|e| e.attrs.get())
            .unwrap_or_default()
    })
}

/// Set a named attribute on an element.
pub fn set_attribute(index: ElementId, name: &str, value: &str) {
    ELEMENTS.with(|elements| {
        if let Some(e) = elements.borrow().get(&index) {
            e.attributes
                .borrow_mut()
                .insert(name.to_string(), value.to_string());
        }
    });
}

/// Get a named attribute from an element.
pub fn get_attribute(index: ElementId, name: &str) -> Option<String> {
    ELEMENTS.with(|elements| {
        elements
            .borrow()
            .get(&index)
            .and_then(|e| e.attributes.borrow().get(name).cloned())
    })
}

/// Remove a named attribute from an element.
pub fn remove_attribute(index: ElementId, name: &str) {
    ELEMENTS.with(|elements| {
        if let Some(e) = elements.borrow().get(&index) {
            e.attributes.borrow_mut().remove(name);
        }
    });
}

// =============================================================================
// Held References
// =============================================================================

/// A reference to an element that survives across render cycles.
///
/// This is how a pass-through subtree hands its root element to the typed
/// component: the caller creates a `NodeRef`, attaches it when rendering,
/// and resolution reads whatever element is current at synchronization time.
/// An unattached ref simply resolves to nothing.
#[derive(Clone, Default)]
pub struct NodeRef {
    current: Rc<Cell<Option<ElementId>>>,
}

impl NodeRef {
    /// Create a new, unattached reference.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the reference to an element.
    pub fn set(&self, index: ElementId) {
        self.current.set(Some(index));
    }

    /// Detach the reference.
    pub fn clear(&self) {
        self.current.set(None);
    }

    /// Get the currently referenced element, if any.
    pub fn get(&self) -> Option<ElementId> {
        self.current.get()
    }

    /// Stable identity of the underlying cell, for change detection.
    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.current) as usize
    }
}

// =============================================================================
// Reset (for testing)
// =============================================================================

/// Reset all element registry state (for testing).
pub fn reset_elements() {
    ID_TO_INDEX.with(|map| map.borrow_mut().clear());
    INDEX_TO_ID.with(|map| map.borrow_mut().clear());
    ELEMENTS.with(|elements| elements.borrow_mut().clear());
    FREE_INDICES.with(|free| free.borrow_mut().clear());
    NEXT_INDEX.with(|next| *next.borrow_mut() = 0);
    ID_COUNTER.with(|counter| *counter.borrow_mut() = 0);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() {
        reset_elements();
    }

    #[test]
    fn test_create_and_release() {
        setup();

        let idx1 = create_element(ElementKind::Text, None);
        let idx2 = create_element(ElementKind::Input, None);

        assert_eq!(idx1, 0);
        assert_eq!(idx2, 1);
        assert!(is_allocated(idx1));
        assert_eq!(element_kind(idx2), Some(ElementKind::Input));
        assert_eq!(element_count(), 2);

        release_element(idx1);
        assert!(!is_allocated(idx1));

        // Should reuse the freed index
        let idx3 = create_element(ElementKind::Text, None);
        assert_eq!(idx3, idx1);
    }

    #[test]
    fn test_id_mapping() {
        setup();

        let idx = create_element(ElementKind::Text, Some("banner"));
        assert_eq!(get_index("banner"), Some(idx));
        assert_eq!(get_id(idx), Some("banner".to_string()));

        // Same ID returns the same index
        assert_eq!(create_element(ElementKind::Text, Some("banner")), idx);
    }

    #[test]
    fn test_content_roundtrip() {
        setup();

        let idx = create_element(ElementKind::Text, None);
        assert_eq!(get_content(idx), "");

        set_content(idx, "hello");
        assert_eq!(get_content(idx), "hello");

        // Unallocated index is a silent no-op
        set_content(99, "nothing");
        assert_eq!(get_content(99), "");
    }

    #[test]
    fn test_content_signal_reactive() {
        use spark_signals::effect;
        use std::cell::RefCell;
        use std::rc::Rc;

        setup();

        let idx = create_element(ElementKind::Text, None);
        let seen = Rc::new(RefCell::new(String::new()));
        let seen_clone = seen.clone();

        let _stop = effect(move || {
            *seen_clone.borrow_mut() = get_content(idx);
        });

        set_content(idx, "typed");
        assert_eq!(*seen.borrow(), "typed");
    }

    #[test]
    fn test_attributes() {
        setup();

        let idx = create_element(ElementKind::Input, None);
        assert_eq!(get_attribute(idx, "placeholder"), None);

        set_attribute(idx, "placeholder", "type here");
        assert_eq!(
            get_attribute(idx, "placeholder"),
            Some("type here".to_string())
        );

        remove_attribute(idx, "placeholder");
        assert_eq!(get_attribute(idx, "placeholder"), None);
    }

    #[test]
    fn test_node_ref() {
        setup();

        let node_ref = NodeRef::new();
        assert_eq!(node_ref.get(), None);

        let idx = create_element(ElementKind::Text, None);
        node_ref.set(idx);
        assert_eq!(node_ref.get(), Some(idx));

        // Clones share identity
        let clone = node_ref.clone();
        assert_eq!(clone.identity(), node_ref.identity());

        node_ref.clear();
        assert_eq!(clone.get(), None);
    }
}
