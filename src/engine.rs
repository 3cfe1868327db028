//! Typing Engine - Imperative typewriter animation over registry elements.
//!
//! The engine is the stateful, imperative half of the crate: it owns a
//! typing/backspacing state machine and mutates its target element's
//! content (or a named attribute) as time passes. Time is supplied by the
//! host: the event loop calls [`tick_engines`] each frame, and every live
//! engine advances by that much. Engines at rest cost nothing.
//!
//! # Pattern
//!
//! - Engines register themselves (weakly) in a thread-local registry at
//!   construction and drop out when destroyed or released
//! - `start`/`stop`/`destroy` are idempotent; `destroy` is terminal
//! - All user callbacks fire after internal state borrows are released,
//!   so a callback may call back into the engine
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use typed_tui::engine::{EngineOptions, Typed, tick_engines};
//!
//! let engine = Typed::new(EngineOptions::from_config(&config), target);
//! engine.start();
//!
//! // In the host loop:
//! tick_engines(Duration::from_millis(16));
//! ```

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use rand::seq::SliceRandom;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::TypedConfig;
use crate::element;
use crate::types::{ContentType, ElementId, HookCallback, StringHookCallback};

// =============================================================================
// Engine Contract
// =============================================================================

/// The construction-independent operations of a typing engine instance.
///
/// The lifecycle controller drives engines exclusively through this trait,
/// so tests can substitute a recording implementation for [`Typed`].
pub trait TypingEngine {
    /// Begin or resume the animation.
    fn start(&self);
    /// Pause the animation. Safe on an instance that never started.
    fn stop(&self);
    /// Tear the instance down. Terminal and idempotent.
    fn destroy(&self);
}

/// Shared handle to an engine instance.
///
/// Handing this out (e.g. through `typed_ref`) confers no ownership; the
/// lifecycle controller alone decides when `destroy` happens.
pub type EngineHandle = Rc<dyn TypingEngine>;

// =============================================================================
// Engine Options
// =============================================================================

/// The engine's own option set: everything from [`TypedConfig`] except the
/// lifecycle flags and wiring hooks, which belong to the controller.
#[derive(Clone)]
pub struct EngineOptions {
    pub strings: Vec<String>,
    pub strings_element: Option<ElementId>,
    pub type_speed: u64,
    pub back_speed: u64,
    pub start_delay: u64,
    pub back_delay: u64,
    pub smart_backspace: bool,
    pub shuffle: bool,
    pub fade_out: bool,
    pub fade_out_delay: u64,
    pub loop_: bool,
    pub loop_count: Option<u32>,
    pub show_cursor: bool,
    pub cursor_char: String,
    pub auto_style_cursor: bool,
    pub fade_out_attr: String,
    pub attr: Option<String>,
    pub content_type: ContentType,
    pub on_begin: Option<HookCallback>,
    pub on_complete: Option<HookCallback>,
    pub pre_string_typed: Option<StringHookCallback>,
    pub on_string_typed: Option<StringHookCallback>,
    pub on_last_string_backspaced: Option<HookCallback>,
    pub on_typing_paused: Option<HookCallback>,
    pub on_typing_resumed: Option<HookCallback>,
    pub on_reset: Option<HookCallback>,
    pub on_stop: Option<HookCallback>,
    pub on_start: Option<HookCallback>,
    pub on_destroy: Option<HookCallback>,
}

impl EngineOptions {
    /// Extract the engine option subset from a full configuration,
    /// capturing the callback closures by reference as they are right now.
    pub fn from_config(config: &TypedConfig) -> Self {
        Self {
            strings: config.strings.clone(),
            strings_element: config.strings_element,
            type_speed: config.type_speed,
            back_speed: config.back_speed,
            start_delay: config.start_delay,
            back_delay: config.back_delay,
            smart_backspace: config.smart_backspace,
            shuffle: config.shuffle,
            fade_out: config.fade_out,
            fade_out_delay: config.fade_out_delay,
            loop_: config.loop_,
            loop_count: config.loop_count,
            show_cursor: config.show_cursor,
            cursor_char: config.cursor_char.clone(),
            auto_style_cursor: config.auto_style_cursor,
            fade_out_attr: config.fade_out_attr.clone(),
            attr: config.attr.clone(),
            content_type: config.content_type,
            on_begin: config.on_begin.clone(),
            on_complete: config.on_complete.clone(),
            pre_string_typed: config.pre_string_typed.clone(),
            on_string_typed: config.on_string_typed.clone(),
            on_last_string_backspaced: config.on_last_string_backspaced.clone(),
            on_typing_paused: config.on_typing_paused.clone(),
            on_typing_resumed: config.on_typing_resumed.clone(),
            on_reset: config.on_reset.clone(),
            on_stop: config.on_stop.clone(),
            on_start: config.on_start.clone(),
            on_destroy: config.on_destroy.clone(),
        }
    }
}

// =============================================================================
// Segmentation
// =============================================================================

/// Split a string into the units typed/backspaced one step at a time.
///
/// Plain content: one segment per grapheme. Markup content: `<...>` tag
/// spans become single atomic segments so tags are never half-typed.
fn segment(s: &str, content_type: ContentType) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = s;
    while !rest.is_empty() {
        if content_type == ContentType::Markup && rest.starts_with('<') {
            if let Some(end) = rest.find('>') {
                out.push(rest[..=end].to_string());
                rest = &rest[end + 1..];
                continue;
            }
        }
        // First grapheme of the remainder
        let g = rest.graphemes(true).next().unwrap();
        out.push(g.to_string());
        rest = &rest[g.len()..];
    }
    out
}

/// Number of leading segments two strings share.
fn common_prefix_len(a: &[String], b: &[String]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

// =============================================================================
// Engine State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Stopped,
    Running,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting out the start delay before the first string.
    Delay,
    Typing,
    /// Holding a fully typed string before backspacing.
    Hold,
    Backspacing,
    /// Holding before a fade-out clears the content.
    Fading,
    Complete,
}

/// Events collected during a state transition and fired after the borrow
/// on the engine's internals is released.
enum EngineEvent {
    Begin,
    PreString(usize),
    StringTyped(usize),
    LastStringBackspaced,
    Complete,
    Start,
    Stop,
    TypingPaused,
    TypingResumed,
    Reset,
    Destroy,
}

struct Inner {
    state: RunState,
    phase: Phase,
    /// Remaining milliseconds of the current wait phase.
    wait: u64,
    /// Accumulated milliseconds not yet consumed by steps.
    budget: u64,
    /// Whether on_begin has fired.
    begun: bool,
    /// String visit order (shuffled once at creation if requested).
    order: Vec<usize>,
    /// Position within `order`.
    order_pos: usize,
    /// Segments of the current string.
    segments: Vec<String>,
    /// How many segments are currently typed.
    seg_pos: usize,
    /// Backspacing stops here (smart backspace common prefix).
    backspace_floor: usize,
    /// Completed full loops over the string list.
    loops_done: u32,
}

// =============================================================================
// Typed - the default engine
// =============================================================================

/// The default typing engine. One instance per target element, owned by
/// the lifecycle controller that created it.
pub struct Typed {
    target: ElementId,
    opts: EngineOptions,
    strings: Vec<String>,
    inner: RefCell<Inner>,
}

impl Typed {
    /// Construct an engine bound to a target element.
    ///
    /// The instance starts in the stopped state; nothing animates until
    /// [`TypingEngine::start`] is called. The cursor (if enabled) is
    /// rendered immediately. The new engine registers itself for
    /// [`tick_engines`] driving.
    pub fn new(opts: EngineOptions, target: ElementId) -> Rc<Self> {
        // strings_element replaces the literal list entirely: one string
        // per line, and an empty source element means nothing to type.
        // Only an unallocated source falls back to `strings`.
        let strings = match opts.strings_element {
            Some(source) if element::is_allocated(source) => element::get_content(source)
                .lines()
                .map(str::to_string)
                .collect(),
            _ => opts.strings.clone(),
        };

        let mut order: Vec<usize> = (0..strings.len()).collect();
        if opts.shuffle {
            order.shuffle(&mut rand::thread_rng());
        }

        let first_segments = order
            .first()
            .map(|&i| segment(&strings[i], opts.content_type))
            .unwrap_or_default();
        let phase = if strings.is_empty() {
            Phase::Complete
        } else {
            Phase::Delay
        };

        let engine = Rc::new(Self {
            target,
            strings,
            inner: RefCell::new(Inner {
                state: RunState::Stopped,
                phase,
                wait: opts.start_delay,
                budget: 0,
                begun: false,
                order,
                order_pos: 0,
                segments: first_segments,
                seg_pos: 0,
                backspace_floor: 0,
                loops_done: 0,
            }),
            opts,
        });

        engine.write();
        ENGINES.with(|engines| {
            engines.borrow_mut().push(Rc::downgrade(&engine));
        });
        engine
    }

    /// Advance the animation by `dt`. No-op unless running.
    pub fn tick(&self, dt: Duration) {
        let events = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != RunState::Running {
                return;
            }
            let dt_ms = u64::try_from(dt.as_millis()).unwrap_or(u64::MAX);
            inner.budget = inner.budget.saturating_add(dt_ms);

            let mut events = Vec::new();
            // Process at most one loop-wrap per tick so zero-cost
            // configurations with loop_ cannot spin forever.
            let mut wrapped = false;
            while !wrapped {
                match inner.phase {
                    Phase::Complete => break,
                    Phase::Delay | Phase::Hold | Phase::Fading => {
                        if inner.budget < inner.wait {
                            inner.wait -= inner.budget;
                            inner.budget = 0;
                            break;
                        }
                        inner.budget -= inner.wait;
                        inner.wait = 0;
                        self.leave_wait(&mut inner, &mut events, &mut wrapped);
                    }
                    Phase::Typing => {
                        if inner.seg_pos < inner.segments.len() {
                            let cost = self.opts.type_speed;
                            if inner.budget < cost {
                                break;
                            }
                            inner.budget -= cost;
                            inner.seg_pos += 1;
                            self.write_inner(&inner);
                        }
                        if inner.seg_pos >= inner.segments.len() {
                            self.string_typed(&mut inner, &mut events);
                        }
                    }
                    Phase::Backspacing => {
                        if inner.seg_pos > inner.backspace_floor {
                            let cost = self.opts.back_speed;
                            if inner.budget < cost {
                                break;
                            }
                            inner.budget -= cost;
                            inner.seg_pos -= 1;
                            self.write_inner(&inner);
                        }
                        if inner.seg_pos <= inner.backspace_floor {
                            self.advance_string(&mut inner, &mut events, &mut wrapped);
                        }
                    }
                }
            }
            events
        };
        self.fire(events);
    }

    /// A wait phase has elapsed; move to the phase it was guarding.
    fn leave_wait(&self, inner: &mut Inner, events: &mut Vec<EngineEvent>, wrapped: &mut bool) {
        match inner.phase {
            Phase::Delay => {
                if !inner.begun {
                    inner.begun = true;
                    events.push(EngineEvent::Begin);
                }
                events.push(EngineEvent::PreString(self.current_index(inner)));
                inner.phase = Phase::Typing;
            }
            Phase::Hold => {
                if self.opts.fade_out {
                    element::set_attribute(self.target, &self.opts.fade_out_attr, "");
                    inner.phase = Phase::Fading;
                    inner.wait = self.opts.fade_out_delay;
                } else {
                    inner.backspace_floor = self.smart_floor(inner);
                    inner.phase = Phase::Backspacing;
                }
            }
            Phase::Fading => {
                element::remove_attribute(self.target, &self.opts.fade_out_attr);
                inner.seg_pos = 0;
                inner.backspace_floor = 0;
                self.write_inner(inner);
                self.advance_string(inner, events, wrapped);
            }
            _ => {}
        }
    }

    /// The current string has been fully typed.
    fn string_typed(&self, inner: &mut Inner, events: &mut Vec<EngineEvent>) {
        events.push(EngineEvent::StringTyped(self.current_index(inner)));
        let is_last = inner.order_pos + 1 >= inner.order.len();
        if is_last && !self.opts.loop_ {
            inner.phase = Phase::Complete;
            events.push(EngineEvent::Complete);
        } else {
            inner.phase = Phase::Hold;
            inner.wait = self.opts.back_delay;
        }
    }

    /// Backspacing (or fading) finished; move on to the next string.
    fn advance_string(&self, inner: &mut Inner, events: &mut Vec<EngineEvent>, wrapped: &mut bool) {
        let is_last = inner.order_pos + 1 >= inner.order.len();
        if is_last {
            events.push(EngineEvent::LastStringBackspaced);
            inner.loops_done += 1;
            *wrapped = true;
            if let Some(max) = self.opts.loop_count {
                if inner.loops_done >= max {
                    inner.phase = Phase::Complete;
                    events.push(EngineEvent::Complete);
                    return;
                }
            }
        }

        inner.order_pos = (inner.order_pos + 1) % inner.order.len();
        let next_index = self.current_index(inner);
        inner.segments = segment(&self.strings[next_index], self.opts.content_type);
        // Smart backspace left the shared prefix in place
        inner.seg_pos = inner.backspace_floor.min(inner.segments.len());
        inner.backspace_floor = 0;
        events.push(EngineEvent::PreString(next_index));
        inner.phase = Phase::Typing;
    }

    /// How far backspacing should go: with smart backspace, only down to
    /// the common prefix with the next string to type.
    fn smart_floor(&self, inner: &Inner) -> usize {
        if !self.opts.smart_backspace {
            return 0;
        }
        let next_pos = (inner.order_pos + 1) % inner.order.len();
        let next_index = inner.order[next_pos];
        let next_segments = segment(&self.strings[next_index], self.opts.content_type);
        common_prefix_len(&inner.segments, &next_segments)
    }

    fn current_index(&self, inner: &Inner) -> usize {
        inner.order[inner.order_pos]
    }

    /// Write the current typed text (plus cursor) to the target.
    fn write(&self) {
        let inner = self.inner.borrow();
        self.write_inner(&inner);
    }

    fn write_inner(&self, inner: &Inner) {
        let typed: String = inner.segments[..inner.seg_pos].concat();
        match &self.opts.attr {
            // Attribute targeting never renders a cursor
            Some(attr) => element::set_attribute(self.target, attr, &typed),
            None => {
                let mut displayed = typed;
                if self.opts.show_cursor && inner.state != RunState::Destroyed {
                    if self.opts.auto_style_cursor
                        && self.opts.content_type == ContentType::Markup
                    {
                        displayed.push_str("<dim>");
                        displayed.push_str(&self.opts.cursor_char);
                        displayed.push_str("</dim>");
                    } else {
                        displayed.push_str(&self.opts.cursor_char);
                    }
                }
                element::set_content(self.target, &displayed);
            }
        }
    }

    /// Restart the animation from the first string. Fires `on_reset`.
    pub fn reset(&self) {
        let events = {
            let mut inner = self.inner.borrow_mut();
            if inner.state == RunState::Destroyed {
                return;
            }
            inner.phase = if self.strings.is_empty() {
                Phase::Complete
            } else {
                Phase::Delay
            };
            inner.wait = self.opts.start_delay;
            inner.budget = 0;
            inner.begun = false;
            inner.order_pos = 0;
            inner.segments = inner
                .order
                .first()
                .map(|&i| segment(&self.strings[i], self.opts.content_type))
                .unwrap_or_default();
            inner.seg_pos = 0;
            inner.backspace_floor = 0;
            inner.loops_done = 0;
            self.write_inner(&inner);
            vec![EngineEvent::Reset]
        };
        self.fire(events);
    }

    /// Whether the engine is currently running.
    pub fn is_running(&self) -> bool {
        self.inner.borrow().state == RunState::Running
    }

    /// Whether the engine has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.inner.borrow().state == RunState::Destroyed
    }

    /// Whether the animation has typed everything it will type.
    pub fn is_complete(&self) -> bool {
        self.inner.borrow().phase == Phase::Complete
    }

    fn fire(&self, events: Vec<EngineEvent>) {
        for event in events {
            match event {
                EngineEvent::Begin => call(&self.opts.on_begin),
                EngineEvent::PreString(i) => call_indexed(&self.opts.pre_string_typed, i),
                EngineEvent::StringTyped(i) => call_indexed(&self.opts.on_string_typed, i),
                EngineEvent::LastStringBackspaced => call(&self.opts.on_last_string_backspaced),
                EngineEvent::Complete => call(&self.opts.on_complete),
                EngineEvent::Start => call(&self.opts.on_start),
                EngineEvent::Stop => call(&self.opts.on_stop),
                EngineEvent::TypingPaused => call(&self.opts.on_typing_paused),
                EngineEvent::TypingResumed => call(&self.opts.on_typing_resumed),
                EngineEvent::Reset => call(&self.opts.on_reset),
                EngineEvent::Destroy => call(&self.opts.on_destroy),
            }
        }
    }
}

fn call(hook: &Option<HookCallback>) {
    if let Some(hook) = hook {
        hook();
    }
}

fn call_indexed(hook: &Option<StringHookCallback>, index: usize) {
    if let Some(hook) = hook {
        hook(index);
    }
}

impl TypingEngine for Typed {
    fn start(&self) {
        let events = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != RunState::Stopped {
                return;
            }
            inner.state = RunState::Running;
            let mut events = vec![EngineEvent::Start];
            if inner.begun && matches!(inner.phase, Phase::Typing | Phase::Backspacing) {
                events.push(EngineEvent::TypingResumed);
            }
            events
        };
        self.fire(events);
    }

    fn stop(&self) {
        let events = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != RunState::Running {
                return;
            }
            inner.state = RunState::Stopped;
            let mut events = vec![EngineEvent::Stop];
            if inner.begun && matches!(inner.phase, Phase::Typing | Phase::Backspacing) {
                events.push(EngineEvent::TypingPaused);
            }
            events
        };
        self.fire(events);
    }

    fn destroy(&self) {
        let events = {
            let mut inner = self.inner.borrow_mut();
            if inner.state == RunState::Destroyed {
                return;
            }
            inner.state = RunState::Destroyed;
            // Leave the typed text in place, drop the cursor
            element::remove_attribute(self.target, &self.opts.fade_out_attr);
            self.write_inner(&inner);
            vec![EngineEvent::Destroy]
        };
        self.fire(events);
    }
}

// =============================================================================
// Engine Registry
// =============================================================================

thread_local! {
    /// Weak handles to every constructed engine, for host-driven ticking.
    static ENGINES: RefCell<Vec<Weak<Typed>>> = RefCell::new(Vec::new());
}

/// Advance every live engine by `dt`. Call this from the host event loop.
///
/// Dropped and destroyed engines are pruned as a side effect.
pub fn tick_engines(dt: Duration) {
    // Snapshot strong handles first: ticks fire user callbacks which may
    // construct or destroy engines.
    let live: Vec<Rc<Typed>> = ENGINES.with(|engines| {
        engines
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    });
    for engine in &live {
        engine.tick(dt);
    }
    ENGINES.with(|engines| {
        engines
            .borrow_mut()
            .retain(|weak| weak.upgrade().is_some_and(|e| !e.is_destroyed()));
    });
}

/// Number of registered, not-yet-destroyed engines (for testing).
pub fn engine_count() -> usize {
    ENGINES.with(|engines| {
        engines
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|e| !e.is_destroyed())
            .count()
    })
}

/// Reset the engine registry (for testing).
pub fn reset_engines() {
    ENGINES.with(|engines| engines.borrow_mut().clear());
}

// =============================================================================
// Tests
// =============================================================================
