//! Core types for typed-tui.
//!
//! These types flow through the whole crate: element identity, text
//! attributes, content interpretation, and the callback aliases shared by
//! the configuration surface and the engine.

use std::rc::Rc;

// =============================================================================
// Element Identity
// =============================================================================

/// Index of an element in the element registry.
pub type ElementId = usize;

// =============================================================================
// Cleanup Function
// =============================================================================

/// Cleanup function returned by components.
///
/// Call this to unmount the component and release resources.
pub type Cleanup = Box<dyn FnOnce()>;

// =============================================================================
// Element Kind
// =============================================================================

/// What kind of element an entry in the registry is.
///
/// The typing engine writes into any kind; `Input` additionally participates
/// in focus wiring when `bind_input_focus_events` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementKind {
    /// Plain text display element.
    #[default]
    Text,
    /// Editable input element (focusable).
    Input,
}

// =============================================================================
// Content Type
// =============================================================================

/// How the engine interprets the strings it types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    /// Markup content: tag spans like `<b>` are inserted and removed
    /// atomically, never typed character by character.
    #[default]
    Markup,
    /// Plain content: every grapheme is typed and backspaced individually,
    /// including angle brackets.
    Plain,
}

// =============================================================================
// Text Attributes (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Text attributes as a bitfield for efficient storage and comparison.
    ///
    /// Combine with bitwise OR: `Attr::BOLD | Attr::ITALIC`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Attr: u8 {
        const NONE = 0;
        const BOLD = 1 << 0;
        const DIM = 1 << 1;
        const ITALIC = 1 << 2;
        const UNDERLINE = 1 << 3;
        const BLINK = 1 << 4;
        const INVERSE = 1 << 5;
        const HIDDEN = 1 << 6;
        const STRIKETHROUGH = 1 << 7;
    }
}

// =============================================================================
// Callback Types
// =============================================================================

/// Plain lifecycle callback (Rc for shared ownership in closures).
///
/// Using Rc<dyn Fn> instead of Box<dyn Fn> allows cloning callbacks
/// into closures without ownership issues.
pub type HookCallback = Rc<dyn Fn()>;

/// Callback receiving the position of the current string in the list.
pub type StringHookCallback = Rc<dyn Fn(usize)>;
