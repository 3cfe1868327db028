//! Typed Configuration - The full option surface of the typed component.
//!
//! A `TypedConfig` is re-derived on every render by the caller's config
//! getter; nothing in it is cached by the component except through the
//! change fingerprint. Two groups of fields are special:
//!
//! - Lifecycle flags (`stopped`, `start_when_visible`) gate when the engine
//!   runs but are not engine options themselves.
//! - Wiring hooks (`target`'s parse override, `typed_ref`) connect the
//!   component to the surrounding tree and are excluded from the engine's
//!   option set entirely.
//!
//! Callback fields are excluded from change detection: swapping a closure
//! without touching a primitive field does not recreate the engine, and the
//! engine keeps whichever closures were captured at the last creation.

use std::rc::Rc;

use crate::engine::EngineHandle;
use crate::target::TargetMode;
use crate::types::{ContentType, ElementId, HookCallback, StringHookCallback};

// =============================================================================
// Wiring Hook Types
// =============================================================================

/// Hook that receives the freshly created engine handle, once per
/// successful synchronization cycle. Confers no ownership.
pub type TypedRefHook = Rc<dyn Fn(EngineHandle)>;

// =============================================================================
// Typed Config
// =============================================================================

/// Configuration for the typed component.
///
/// All fields are optional in spirit: `Default` gives the stock behavior
/// (sample strings, instant typing, visible `|` cursor). Construct with
/// struct update syntax:
///
/// ```ignore
/// use typed_tui::{typed, TypedConfig};
///
/// let cleanup = typed(move || TypedConfig {
///     strings: vec!["Hello.".into(), "World.".into()],
///     type_speed: 40,
///     loop_: true,
///     ..Default::default()
/// });
/// ```
#[derive(Clone)]
pub struct TypedConfig {
    // =========================================================================
    // Lifecycle Flags
    // =========================================================================
    /// Stop the instance immediately after creation.
    pub stopped: bool,

    /// Defer start until the target element becomes visible (one-shot).
    pub start_when_visible: bool,

    // =========================================================================
    // Content
    // =========================================================================
    /// Strings to type, in order.
    pub strings: Vec<String>,

    /// Element whose content (one string per line) replaces `strings`.
    pub strings_element: Option<ElementId>,

    // =========================================================================
    // Timing (milliseconds)
    // =========================================================================
    /// Delay per typed segment.
    pub type_speed: u64,

    /// Delay per backspaced segment.
    pub back_speed: u64,

    /// Delay before typing begins.
    pub start_delay: u64,

    /// Hold time after a string is fully typed, before backspacing.
    pub back_delay: u64,

    // =========================================================================
    // Behavior
    // =========================================================================
    /// Only backspace to the common prefix with the next string.
    pub smart_backspace: bool,

    /// Type the strings in a shuffled order (fixed per instance).
    pub shuffle: bool,

    /// Fade out instead of backspacing.
    pub fade_out: bool,

    /// Hold time before the fade clears the content.
    pub fade_out_delay: u64,

    /// Restart from the first string after the last one.
    pub loop_: bool,

    /// Maximum number of full loops (None = unbounded).
    pub loop_count: Option<u32>,

    // =========================================================================
    // Cursor / Cosmetics
    // =========================================================================
    /// Show a trailing cursor character while the instance lives.
    pub show_cursor: bool,

    /// The cursor character.
    pub cursor_char: String,

    /// Render the cursor dimmed via markup (markup content only).
    pub auto_style_cursor: bool,

    /// Attribute set on the element while a fade-out is in progress.
    pub fade_out_attr: String,

    /// Write into this named attribute instead of the element content.
    pub attr: Option<String>,

    /// How string content is interpreted.
    pub content_type: ContentType,

    /// Stop on focus / start on blur when the target is an input element.
    pub bind_input_focus_events: bool,

    // =========================================================================
    // Wiring
    // =========================================================================
    /// Where the engine attaches: a self-owned element, or an external
    /// subtree supplied through a held reference.
    pub target: TargetMode,

    /// Receives the created engine handle once per successful cycle.
    pub typed_ref: Option<TypedRefHook>,

    // =========================================================================
    // Engine Callbacks
    // =========================================================================
    /// Fired once when typing begins (after the start delay).
    pub on_begin: Option<HookCallback>,

    /// Fired when all typing is complete.
    pub on_complete: Option<HookCallback>,

    /// Fired before each string begins typing.
    pub pre_string_typed: Option<StringHookCallback>,

    /// Fired after each string is fully typed.
    pub on_string_typed: Option<StringHookCallback>,

    /// Fired during looping after the last string is backspaced.
    pub on_last_string_backspaced: Option<HookCallback>,

    /// Fired when typing is paused mid-string.
    pub on_typing_paused: Option<HookCallback>,

    /// Fired when typing resumes mid-string.
    pub on_typing_resumed: Option<HookCallback>,

    /// Fired after a reset.
    pub on_reset: Option<HookCallback>,

    /// Fired on stop.
    pub on_stop: Option<HookCallback>,

    /// Fired on start.
    pub on_start: Option<HookCallback>,

    /// Fired on destroy.
    pub on_destroy: Option<HookCallback>,
}

impl Default for TypedConfig {
    fn default() -> Self {
        Self {
            stopped: false,
            start_when_visible: false,
            strings: vec![
                "These are the default values...".to_string(),
                "You know what you should do?".to_string(),
                "Use your own!".to_string(),
                "Have a great day!".to_string(),
            ],
            strings_element: None,
            type_speed: 0,
            back_speed: 0,
            start_delay: 0,
            back_delay: 700,
            smart_backspace: true,
            shuffle: true,
            fade_out: false,
            fade_out_delay: 500,
            loop_: false,
            loop_count: None,
            show_cursor: true,
            cursor_char: "|".to_string(),
            auto_style_cursor: true,
            fade_out_attr: "typed-fade-out".to_string(),
            attr: None,
            content_type: ContentType::Markup,
            bind_input_focus_events: false,
            target: TargetMode::default(),
            typed_ref: None,
            on_begin: None,
            on_complete: None,
            pre_string_typed: None,
            on_string_typed: None,
            on_last_string_backspaced: None,
            on_typing_paused: None,
            on_typing_resumed: None,
            on_reset: None,
            on_stop: None,
            on_start: None,
            on_destroy: None,
        }
    }
}
