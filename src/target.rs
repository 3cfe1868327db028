//! Target Resolver - Which element the engine attaches to.
//!
//! Two wiring shapes, modeled as an explicit tagged variant rather than
//! implicit branching on option presence:
//!
//! - [`TargetMode::Owned`]: the typed component renders and owns a single
//!   element (created once at mount, stable across re-renders), and the
//!   engine writes into it directly.
//! - [`TargetMode::External`]: the caller renders its own subtree and hands
//!   over a [`NodeRef`] to its root. An optional parse override maps the
//!   referenced element to the real editable node, for wrapper components
//!   whose writable element is nested inside the referenced one.
//!
//! Resolution failure is not an error: an unattached ref or an override
//! returning nothing silently skips instance creation for that cycle. The
//! next render retries implicitly.

use std::rc::Rc;

use crate::element::{self, NodeRef};
use crate::types::{Attr, ElementId, ElementKind};

// =============================================================================
// Parse Override
// =============================================================================

/// Maps the held reference's current element to the element the engine
/// should actually write into. Returning `None` aborts the cycle.
pub type ParseRef = Rc<dyn Fn(Option<ElementId>) -> Option<ElementId>>;

// =============================================================================
// Target Mode
// =============================================================================

/// Where the typed component attaches its engine.
#[derive(Clone, Default)]
pub enum TargetMode {
    /// The component owns and renders the target element itself.
    #[default]
    Owned,
    /// Like `Owned`, with an explicit registry ID and text attributes
    /// carried onto the rendered element.
    OwnedStyled {
        /// Registry ID for the owned element.
        id: Option<String>,
        /// Text attributes passed through to the owned element.
        attrs: Attr,
    },
    /// The caller renders the subtree; the engine attaches to the element
    /// the held reference (optionally mapped by `parse`) points at.
    External {
        /// Held reference to the rendered subtree's root element.
        node: NodeRef,
        /// Optional override locating the real writable element.
        parse: Option<ParseRef>,
    },
}

impl TargetMode {
    /// Identity of the parse override, if any, for change detection.
    pub(crate) fn parse_identity(&self) -> Option<usize> {
        match self {
            TargetMode::External {
                parse: Some(parse), ..
            } => Some(Rc::as_ptr(parse) as *const () as usize),
            _ => None,
        }
    }

    /// Identity of the held reference, if any, for change detection.
    pub(crate) fn node_identity(&self) -> Option<usize> {
        match self {
            TargetMode::External { node, .. } => Some(node.identity()),
            _ => None,
        }
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolve the element the engine should attach to.
///
/// `owned` is the element the component allocated for the `Owned` modes
/// (allocated lazily on the first synchronization that needs it).
///
/// Returns `None` when nothing can be resolved this cycle: an external ref
/// with no current element, or a parse override that declined. The caller
/// skips instance creation silently.
pub fn resolve_target(mode: &TargetMode, owned: Option<ElementId>) -> Option<ElementId> {
    match mode {
        TargetMode::Owned | TargetMode::OwnedStyled { .. } => owned,
        TargetMode::External { node, parse } => match parse {
            Some(parse) => parse(node.get()),
            None => node.get(),
        },
    }
}

/// Allocate the element for an owned target mode.
///
/// External modes own nothing; they return `None`.
pub fn create_owned_element(mode: &TargetMode) -> Option<ElementId> {
    match mode {
        TargetMode::Owned => Some(element::create_element(ElementKind::Text, None)),
        TargetMode::OwnedStyled { id, attrs } => {
            let index = element::create_element(ElementKind::Text, id.as_deref());
            element::set_attrs(index, *attrs);
            Some(index)
        }
        TargetMode::External { .. } => None,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{create_element, reset_elements};

    fn setup() {
        reset_elements();
    }

    #[test]
    fn test_owned_resolves_to_owned_element() {
        setup();

        let mode = TargetMode::Owned;
        let owned = create_owned_element(&mode);
        assert!(owned.is_some());
        assert_eq!(resolve_target(&mode, owned), owned);
    }

    #[test]
    fn test_owned_styled_carries_attrs() {
        setup();

        let mode = TargetMode::OwnedStyled {
            id: Some("headline".to_string()),
            attrs: Attr::BOLD,
        };
        let owned = create_owned_element(&mode).unwrap();
        assert_eq!(element::get_id(owned), Some("headline".to_string()));
        assert_eq!(element::get_attrs(owned), Attr::BOLD);
    }

    #[test]
    fn test_external_unattached_ref_fails_silently() {
        setup();

        let mode = TargetMode::External {
            node: NodeRef::new(),
            parse: None,
        };
        assert!(create_owned_element(&mode).is_none());
        assert_eq!(resolve_target(&mode, None), None);
    }

    #[test]
    fn test_external_resolves_current_node() {
        setup();

        let node = NodeRef::new();
        let idx = create_element(ElementKind::Text, None);
        node.set(idx);

        let mode = TargetMode::External { node, parse: None };
        assert_eq!(resolve_target(&mode, None), Some(idx));
    }

    #[test]
    fn test_parse_override_maps_to_nested_element() {
        setup();

        let wrapper = create_element(ElementKind::Text, None);
        let nested = create_element(ElementKind::Input, None);

        let node = NodeRef::new();
        node.set(wrapper);

        let mode = TargetMode::External {
            node,
            parse: Some(Rc::new(move |root| {
                // Wrapper's writable element is the nested input
                root.map(|_| nested)
            })),
        };
        assert_eq!(resolve_target(&mode, None), Some(nested));
    }

    #[test]
    fn test_parse_override_declining_aborts() {
        setup();

        let node = NodeRef::new();
        node.set(create_element(ElementKind::Text, None));

        let mode = TargetMode::External {
            node,
            parse: Some(Rc::new(|_| None)),
        };
        assert_eq!(resolve_target(&mode, None), None);
    }

    #[test]
    fn test_parse_identity_tracks_rc_pointer() {
        setup();

        let parse: ParseRef = Rc::new(|root| root);
        let mode_a = TargetMode::External {
            node: NodeRef::new(),
            parse: Some(parse.clone()),
        };
        let mode_b = TargetMode::External {
            node: NodeRef::new(),
            parse: Some(parse),
        };
        assert_eq!(mode_a.parse_identity(), mode_b.parse_identity());
        assert_eq!(TargetMode::Owned.parse_identity(), None);
    }
}
