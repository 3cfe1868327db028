//! # typed-tui
//!
//! Reactive typed-text animation component for signal-driven terminal UIs.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for
//! fine-grained reactivity.
//!
//! ## Architecture
//!
//! The crate bridges two worlds: a declarative configuration that is
//! re-derived on every render, and an imperative typing engine with explicit
//! create/start/stop/destroy lifecycle. The bridge is [`typed`], a
//! synchronization effect memoized on a structural fingerprint of the
//! config:
//!
//! ```text
//! config getter → fingerprint → (changed?) → destroy old → create engine
//!                                           ↘ unchanged: no-op
//! ```
//!
//! Closure-valued fields are excluded from the fingerprint on purpose, so
//! renders that only produce fresh callback identities never recreate the
//! engine.
//!
//! ## Modules
//!
//! - [`types`] - Core types (ElementId, Attr, ContentType, callbacks)
//! - [`element`] - Element registry with reactive content signals
//! - [`config`] - The full configuration surface ([`TypedConfig`])
//! - [`fingerprint`] - Structural change detection over configs
//! - [`target`] - Owned vs external target resolution
//! - [`visibility`] - One-shot visibility gate for deferred starts
//! - [`focus`] - Focus tracking for input-bound instances
//! - [`engine`] - The tick-driven typing engine ([`engine::Typed`])
//! - [`lifecycle`] - The [`typed`] component itself

pub mod config;
pub mod element;
pub mod engine;
pub mod fingerprint;
pub mod focus;
pub mod lifecycle;
pub mod target;
pub mod types;
pub mod visibility;

// Re-export commonly used items
pub use types::*;

pub use config::{TypedConfig, TypedRefHook};

pub use element::{
    content_signal, create_element, element_count, element_kind, get_attribute, get_content,
    get_id, get_index, is_allocated, release_element, reset_elements, set_attribute, set_content,
    NodeRef,
};

pub use engine::{
    engine_count, reset_engines, tick_engines, EngineHandle, EngineOptions, Typed, TypingEngine,
};

pub use fingerprint::{fingerprint, Fingerprint};

pub use target::{resolve_target, ParseRef, TargetMode};

pub use visibility::{
    notify_visibility, observe_visible_once, observer_count, reset_observers, ObserverHandle,
};

pub use focus::{
    focused_element, is_focused, register_focus_hooks, reset_focus_state, set_focus, FocusHooks,
};

pub use lifecycle::{typed, typed_with_engine, EngineFactory};
