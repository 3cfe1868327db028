//! Change Fingerprint - The memoization key for engine recreation.
//!
//! A pure reduction of [`TypedConfig`] to a structurally comparable value.
//! Only fields with boolean, numeric, or string values participate, in
//! their natural declaration order, plus a joined representation of the
//! strings list. Callback fields are excluded on purpose: inline closures
//! get a fresh identity on every render, and keying recreation on them
//! would tear the engine down every cycle.
//!
//! The flip side is accepted staleness: changing only a callback leaves
//! the engine running with the closures captured at the last creation.
//! Callers who need a fresh closure must also bump a primitive field.

use crate::config::TypedConfig;
use crate::types::ContentType;

// =============================================================================
// Fingerprint
// =============================================================================

/// One comparable configuration field value.
#[derive(Debug, Clone, PartialEq)]
enum Primitive {
    Bool(bool),
    Num(u64),
    Str(String),
    /// An optional field left unset.
    Unset,
}

/// Structural equality key over the comparable parts of a configuration.
///
/// Two configs with equal fingerprints are lifecycle-equivalent even if
/// every callback reference differs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fingerprint {
    parts: Vec<Primitive>,
    strings_joined: String,
}

/// Compute the fingerprint of a configuration.
pub fn fingerprint(config: &TypedConfig) -> Fingerprint {
    let content_type = match config.content_type {
        ContentType::Markup => "markup",
        ContentType::Plain => "plain",
    };

    let parts = vec![
        Primitive::Bool(config.stopped),
        Primitive::Bool(config.start_when_visible),
        config
            .strings_element
            .map(|e| Primitive::Num(e as u64))
            .unwrap_or(Primitive::Unset),
        Primitive::Num(config.type_speed),
        Primitive::Num(config.back_speed),
        Primitive::Num(config.start_delay),
        Primitive::Num(config.back_delay),
        Primitive::Bool(config.smart_backspace),
        Primitive::Bool(config.shuffle),
        Primitive::Bool(config.fade_out),
        Primitive::Num(config.fade_out_delay),
        Primitive::Bool(config.loop_),
        config
            .loop_count
            .map(|n| Primitive::Num(n as u64))
            .unwrap_or(Primitive::Unset),
        Primitive::Bool(config.show_cursor),
        Primitive::Str(config.cursor_char.clone()),
        Primitive::Bool(config.auto_style_cursor),
        Primitive::Str(config.fade_out_attr.clone()),
        config
            .attr
            .clone()
            .map(Primitive::Str)
            .unwrap_or(Primitive::Unset),
        Primitive::Str(content_type.to_string()),
        Primitive::Bool(config.bind_input_focus_events),
    ];

    Fingerprint {
        parts,
        strings_joined: config.strings.join(","),
    }
}

// =============================================================================
// Tests
// =============================================================================
