//! Lifecycle Controller - Declarative configuration, imperative engine.
//!
//! [`typed`] bridges the reactive world (a config getter re-read whenever
//! its dependencies change) and the imperative typing engine (create, start,
//! stop, destroy). The bridge is memoized: each run of the synchronization
//! effect reduces the config to a structural key, and only a changed key
//! tears the old instance down and builds a new one. Re-renders that merely
//! produce fresh closure identities are free.
//!
//! # Pattern: EffectScope-based Cleanup
//!
//! Same shape as a control-flow primitive:
//! 1. Create an EffectScope owning the synchronization effect
//! 2. Run the effect inside `scope.run()`
//! 3. Register full teardown with `on_scope_dispose()`
//! 4. Return `Box::new(move || scope.stop())` as the Cleanup
//!
//! # Teardown and the visibility race
//!
//! A visibility gate registered for instance N must never start instance
//! N+1 (or a destroyed instance). Every teardown bumps a generation
//! counter; the gate's callback captures the generation it was armed
//! under and refuses to fire across a bump. Combined with one-shot
//! observer disarming this closes the race completely: disconnect the
//! gate, bump the generation, destroy the engine, in that order.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_signals::{effect, effect_scope, on_scope_dispose, untrack};

use crate::config::TypedConfig;
use crate::element;
use crate::engine::{EngineHandle, EngineOptions, Typed};
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::focus::{register_focus_hooks, FocusHooks};
use crate::target::{create_owned_element, resolve_target};
use crate::types::{Cleanup, ElementId, ElementKind};
use crate::visibility::{observe_visible_once, ObserverHandle};

// =============================================================================
// Engine Factory
// =============================================================================

/// Builds an engine for a resolved target. The default factory constructs
/// [`Typed`]; tests substitute a recording engine.
pub type EngineFactory = Rc<dyn Fn(EngineOptions, ElementId) -> EngineHandle>;

fn default_factory() -> EngineFactory {
    Rc::new(|opts, target| -> EngineHandle { Typed::new(opts, target) })
}

// =============================================================================
// Synchronization Key
// =============================================================================

/// Everything a synchronization cycle is keyed on: the config fingerprint
/// plus the identities of the wiring hooks the fingerprint excludes. A new
/// parse override, held reference, or ref hook must resynchronize even
/// when every primitive field is unchanged.
#[derive(PartialEq)]
struct SyncKey {
    fingerprint: Fingerprint,
    parse_identity: Option<usize>,
    node_identity: Option<usize>,
    typed_ref_identity: Option<usize>,
}

impl SyncKey {
    fn of(config: &TypedConfig) -> Self {
        Self {
            fingerprint: fingerprint(config),
            parse_identity: config.target.parse_identity(),
            node_identity: config.target.node_identity(),
            typed_ref_identity: config
                .typed_ref
                .as_ref()
                .map(|hook| Rc::as_ptr(hook) as *const () as usize),
        }
    }
}

// =============================================================================
// Controller State
// =============================================================================

/// Per-component mutable state, shared between the synchronization effect
/// and scope disposal.
#[derive(Default)]
struct SyncState {
    key: Option<SyncKey>,
    engine: Option<EngineHandle>,
    observer: Option<ObserverHandle>,
    focus_cleanup: Option<Box<dyn FnOnce()>>,
    owned: Option<ElementId>,
}

/// Tear down the current instance. Disconnect first, bump second, destroy
/// third, so no gate callback can reach a dying engine.
fn teardown(state: &Rc<RefCell<SyncState>>, generation: &Rc<Cell<u64>>) {
    let (engine, observer, focus_cleanup) = {
        let mut state = state.borrow_mut();
        (
            state.engine.take(),
            state.observer.take(),
            state.focus_cleanup.take(),
        )
    };
    if let Some(observer) = observer {
        observer.disconnect();
    }
    generation.set(generation.get() + 1);
    if let Some(engine) = engine {
        engine.destroy();
    }
    if let Some(cleanup) = focus_cleanup {
        cleanup();
    }
}

// =============================================================================
// typed()
// =============================================================================

/// Mount a typed component driven by a reactive config getter.
///
/// The getter runs inside an effect: any signal it reads becomes a
/// dependency, and every change re-derives the config. A re-derivation
/// whose structural key is unchanged does nothing; a changed key destroys
/// the current engine and builds a fresh one from the new config.
///
/// # Returns
///
/// A cleanup function. Calling it destroys the engine, disconnects any
/// pending visibility gate, unregisters focus hooks, and releases the
/// owned element. Idempotent.
///
/// # Example
///
/// ```ignore
/// use spark_signals::signal;
/// use typed_tui::{typed, TypedConfig};
///
/// let speed = signal(40u64);
/// let speed_clone = speed.clone();
///
/// let cleanup = typed(move || TypedConfig {
///     strings: vec!["Hello!".into()],
///     type_speed: speed_clone.get(),
///     ..Default::default()
/// });
///
/// speed.set(80); // engine recreated with the new speed
/// cleanup();
/// ```
pub fn typed(config: impl Fn() -> TypedConfig + 'static) -> Cleanup {
    typed_with_engine(config, default_factory())
}

/// [`typed`] with an explicit engine factory.
pub fn typed_with_engine(
    config: impl Fn() -> TypedConfig + 'static,
    factory: EngineFactory,
) -> Cleanup {
    let state: Rc<RefCell<SyncState>> = Rc::new(RefCell::new(SyncState::default()));
    let generation: Rc<Cell<u64>> = Rc::new(Cell::new(0));

    let scope = effect_scope(false);

    let state_for_update = state.clone();
    let generation_for_update = generation.clone();
    let state_for_dispose = state.clone();
    let generation_for_dispose = generation.clone();

    let update = move || {
        let cfg = config();
        let key = SyncKey::of(&cfg);

        // Re-render with an unchanged key: nothing to do
        if state_for_update.borrow().key.as_ref() == Some(&key) {
            return;
        }

        // Only the config getter is tracked. The cycle below reads and
        // writes element content signals (engine construction renders the
        // cursor); letting those register as dependencies would re-enter
        // this effect from inside a later engine tick.
        untrack(|| {
            teardown(&state_for_update, &generation_for_update);

            // The owned element is allocated once and survives
            // resynchronization
            let owned = {
                let mut state = state_for_update.borrow_mut();
                if state.owned.is_none() {
                    state.owned = create_owned_element(&cfg.target);
                }
                state.owned
            };

            // Nothing to attach to this cycle: remember the key and wait
            // for the next re-render to retry
            let Some(target) = resolve_target(&cfg.target, owned) else {
                state_for_update.borrow_mut().key = Some(key);
                return;
            };

            let engine = factory(EngineOptions::from_config(&cfg), target);

            // Either flag holds the instance back initially; a visibility
            // gate firing later starts it even over an explicit stop
            if cfg.stopped || cfg.start_when_visible {
                engine.stop();
            } else {
                engine.start();
            }

            let observer = cfg.start_when_visible.then(|| {
                let engine = engine.clone();
                let generation = generation_for_update.clone();
                let armed_at = generation.get();
                observe_visible_once(target, move || {
                    // A teardown since arming means this gate belongs to a
                    // dead instance
                    if generation.get() == armed_at {
                        engine.start();
                    }
                })
            });

            let focus_cleanup = if cfg.bind_input_focus_events
                && element::element_kind(target) == Some(ElementKind::Input)
            {
                let pause = engine.clone();
                let resume = engine.clone();
                Some(Box::new(register_focus_hooks(
                    target,
                    FocusHooks {
                        on_focus: Some(Box::new(move || pause.stop())),
                        on_blur: Some(Box::new(move || resume.start())),
                    },
                )) as Box<dyn FnOnce()>)
            } else {
                None
            };

            if let Some(hook) = &cfg.typed_ref {
                hook(engine.clone());
            }

            let mut state = state_for_update.borrow_mut();
            state.engine = Some(engine);
            state.observer = observer;
            state.focus_cleanup = focus_cleanup;
            state.key = Some(key);
        });
    };

    scope.run(move || {
        // Effect reads the config getter to establish dependencies; the
        // initial synchronization happens on the first run. Registered
        // with the scope, stopped by scope.stop().
        let _effect_cleanup = effect(update);

        on_scope_dispose(move || {
            teardown(&state_for_dispose, &generation_for_dispose);
            if let Some(owned) = state_for_dispose.borrow_mut().owned.take() {
                element::release_element(owned);
            }
        });
    });

    Box::new(move || {
        scope.stop();
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{create_element, reset_elements, NodeRef};
    use crate::engine::{reset_engines, TypingEngine};
    use crate::focus::{reset_focus_state, set_focus};
    use crate::target::TargetMode;
    use crate::visibility::{notify_visibility, observer_count, reset_observers};
    use spark_signals::signal;

    fn setup() {
        reset_elements();
        reset_engines();
        reset_observers();
        reset_focus_state();
    }

    // A factory-injected engine that records every call it receives.
    struct RecordingEngine {
        target: ElementId,
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl TypingEngine for RecordingEngine {
        fn start(&self) {
            self.calls.borrow_mut().push(format!("start:{}", self.target));
        }
        fn stop(&self) {
            self.calls.borrow_mut().push(format!("stop:{}", self.target));
        }
        fn destroy(&self) {
            self.calls
                .borrow_mut()
                .push(format!("destroy:{}", self.target));
        }
    }

    fn recording_factory() -> (EngineFactory, Rc<RefCell<Vec<String>>>) {
        let calls: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let calls_clone = calls.clone();
        let factory: EngineFactory = Rc::new(move |_opts, target| {
            calls_clone.borrow_mut().push(format!("create:{}", target));
            Rc::new(RecordingEngine {
                target,
                calls: calls_clone.clone(),
            })
        });
        (factory, calls)
    }

    #[test]
    fn test_mount_creates_and_starts() {
        setup();
        let (factory, calls) = recording_factory();

        let cleanup = typed_with_engine(TypedConfig::default, factory);
        assert_eq!(*calls.borrow(), vec!["create:0", "start:0"]);

        cleanup();
        assert_eq!(*calls.borrow(), vec!["create:0", "start:0", "destroy:0"]);
    }

    #[test]
    fn test_rerender_with_same_key_is_free() {
        setup();
        let (factory, calls) = recording_factory();

        // Each run builds a fresh config with fresh closures, the way a
        // render function would
        let trigger = signal(0);
        let trigger_clone = trigger.clone();
        let _cleanup = typed_with_engine(
            move || {
                trigger_clone.get();
                TypedConfig {
                    on_begin: Some(Rc::new(|| {})),
                    ..Default::default()
                }
            },
            factory,
        );
        assert_eq!(calls.borrow().len(), 2);

        trigger.set(1);
        trigger.set(2);
        assert_eq!(
            calls.borrow().len(),
            2,
            "fresh closure identities must not recreate the engine"
        );
    }

    #[test]
    fn test_primitive_change_recreates() {
        setup();
        let (factory, calls) = recording_factory();

        let speed = signal(0u64);
        let speed_clone = speed.clone();
        let _cleanup = typed_with_engine(
            move || TypedConfig {
                type_speed: speed_clone.get(),
                ..Default::default()
            },
            factory,
        );
        assert_eq!(*calls.borrow(), vec!["create:0", "start:0"]);

        speed.set(40);
        assert_eq!(
            *calls.borrow(),
            vec!["create:0", "start:0", "destroy:0", "create:0", "start:0"],
            "old instance destroyed before the new one exists"
        );
    }

    #[test]
    fn test_stopped_with_gate_still_starts_on_visibility() {
        setup();
        let (factory, calls) = recording_factory();

        let _cleanup = typed_with_engine(
            || TypedConfig {
                stopped: true,
                start_when_visible: true,
                ..Default::default()
            },
            factory,
        );
        // Stopped immediately after creation, gate armed anyway
        assert_eq!(*calls.borrow(), vec!["create:0", "stop:0"]);
        assert_eq!(observer_count(), 1);

        // Visibility overrides the earlier stop
        notify_visibility(0, true);
        assert_eq!(*calls.borrow(), vec!["create:0", "stop:0", "start:0"]);
    }

    #[test]
    fn test_visibility_gate_starts_once() {
        setup();
        let (factory, calls) = recording_factory();

        let _cleanup = typed_with_engine(
            || TypedConfig {
                start_when_visible: true,
                ..Default::default()
            },
            factory,
        );
        assert_eq!(*calls.borrow(), vec!["create:0", "stop:0"]);
        assert_eq!(observer_count(), 1);

        notify_visibility(0, true);
        assert_eq!(*calls.borrow(), vec!["create:0", "stop:0", "start:0"]);

        // Scroll out and back in: one-shot
        notify_visibility(0, false);
        notify_visibility(0, true);
        assert_eq!(*calls.borrow(), vec!["create:0", "stop:0", "start:0"]);
    }

    #[test]
    fn test_stale_gate_cannot_start_new_instance() {
        setup();
        let (factory, calls) = recording_factory();

        let gated = signal(true);
        let gated_clone = gated.clone();
        let _cleanup = typed_with_engine(
            move || TypedConfig {
                start_when_visible: gated_clone.get(),
                ..Default::default()
            },
            factory,
        );
        assert_eq!(observer_count(), 1);

        // Resynchronize: the gate is disconnected, the instance replaced
        gated.set(false);
        assert_eq!(observer_count(), 0, "teardown must disconnect the gate");
        assert_eq!(
            *calls.borrow(),
            vec!["create:0", "stop:0", "destroy:0", "create:0", "start:0"]
        );

        // Even a late report reaches nothing
        notify_visibility(0, true);
        assert_eq!(calls.borrow().len(), 5);
    }

    #[test]
    fn test_teardown_after_cleanup_is_total() {
        setup();
        let (factory, calls) = recording_factory();

        let cleanup = typed_with_engine(
            || TypedConfig {
                start_when_visible: true,
                ..Default::default()
            },
            factory,
        );
        assert_eq!(observer_count(), 1);
        assert_eq!(element::element_count(), 1);

        cleanup();
        assert_eq!(observer_count(), 0);
        assert_eq!(element::element_count(), 0, "owned element released");
        assert!(calls.borrow().contains(&"destroy:0".to_string()));

        // A report after death is inert
        notify_visibility(0, true);
        assert!(!calls.borrow().contains(&"start:0".to_string()));
    }

    #[test]
    fn test_typed_ref_delivered_once_per_cycle() {
        setup();
        let (factory, _calls) = recording_factory();

        let deliveries = Rc::new(RefCell::new(0));
        let deliveries_clone = deliveries.clone();
        let hook: crate::config::TypedRefHook = Rc::new(move |_handle| {
            *deliveries_clone.borrow_mut() += 1;
        });

        let trigger = signal(0);
        let trigger_clone = trigger.clone();
        let hook_clone = hook.clone();
        let _cleanup = typed_with_engine(
            move || {
                trigger_clone.get();
                TypedConfig {
                    typed_ref: Some(hook_clone.clone()),
                    ..Default::default()
                }
            },
            factory,
        );
        assert_eq!(*deliveries.borrow(), 1);

        // Same hook identity: re-render delivers nothing new
        trigger.set(1);
        assert_eq!(*deliveries.borrow(), 1);
    }

    #[test]
    fn test_mount_rerender_recreate_scenario() {
        setup();
        let (factory, calls) = recording_factory();

        let deliveries = Rc::new(RefCell::new(0));
        let deliveries_clone = deliveries.clone();
        let hook: crate::config::TypedRefHook = Rc::new(move |_handle| {
            *deliveries_clone.borrow_mut() += 1;
        });

        let speed = signal(10u64);
        let speed_clone = speed.clone();
        let hook_clone = hook.clone();
        let _cleanup = typed_with_engine(
            move || TypedConfig {
                strings: vec!["a".to_string(), "b".to_string()],
                type_speed: speed_clone.get(),
                typed_ref: Some(hook_clone.clone()),
                // Fresh closure every render
                on_begin: Some(Rc::new(|| {})),
                ..Default::default()
            },
            factory,
        );
        assert_eq!(*calls.borrow(), vec!["create:0", "start:0"]);
        assert_eq!(*deliveries.borrow(), 1);

        // Same fingerprint, new closures: nothing happens
        speed.set(10);
        assert_eq!(calls.borrow().len(), 2);
        assert_eq!(*deliveries.borrow(), 1);

        // Primitive change: one teardown, one synchronize, one redelivery
        speed.set(20);
        assert_eq!(
            *calls.borrow(),
            vec!["create:0", "start:0", "destroy:0", "create:0", "start:0"]
        );
        assert_eq!(*deliveries.borrow(), 2);
    }

    #[test]
    fn test_external_target_resolution() {
        setup();
        let (factory, calls) = recording_factory();

        let node = NodeRef::new();
        let trigger = signal(0);
        let trigger_clone = trigger.clone();
        let node_clone = node.clone();
        let _cleanup = typed_with_engine(
            move || {
                trigger_clone.get();
                TypedConfig {
                    // A changing primitive so re-renders produce new keys
                    type_speed: trigger_clone.get() as u64,
                    target: TargetMode::External {
                        node: node_clone.clone(),
                        parse: None,
                    },
                    ..Default::default()
                }
            },
            factory,
        );

        // Unattached ref: creation silently skipped
        assert!(calls.borrow().is_empty());
        assert_eq!(element::element_count(), 0, "external mode owns no element");

        // Ref attaches, next render picks it up
        let external = create_element(ElementKind::Text, None);
        node.set(external);
        trigger.set(1);
        assert_eq!(
            *calls.borrow(),
            vec![format!("create:{external}"), format!("start:{external}")]
        );
    }

    #[test]
    fn test_input_focus_pauses_and_resumes() {
        setup();
        let (factory, calls) = recording_factory();

        let input = create_element(ElementKind::Input, None);
        let node = NodeRef::new();
        node.set(input);

        let _cleanup = typed_with_engine(
            move || TypedConfig {
                bind_input_focus_events: true,
                target: TargetMode::External {
                    node: node.clone(),
                    parse: None,
                },
                ..Default::default()
            },
            factory,
        );
        assert_eq!(
            *calls.borrow(),
            vec![format!("create:{input}"), format!("start:{input}")]
        );

        set_focus(Some(input));
        assert_eq!(calls.borrow().last().unwrap(), &format!("stop:{input}"));

        set_focus(None);
        assert_eq!(calls.borrow().last().unwrap(), &format!("start:{input}"));
    }

    #[test]
    fn test_engine_writes_do_not_retrigger_synchronization() {
        setup();

        // A fresh typed_ref closure every render, the normal inline style:
        // any effect re-run resynchronizes. Engine writes during ticking
        // must therefore never become dependencies of the effect, or a
        // tick would tear the engine down mid-borrow.
        let speed = signal(5u64);
        let speed_clone = speed.clone();
        let _cleanup = typed(move || TypedConfig {
            strings: vec!["abc".to_string()],
            type_speed: speed_clone.get(),
            show_cursor: false,
            shuffle: false,
            typed_ref: Some(Rc::new(|_handle| {})),
            ..Default::default()
        });

        speed.set(10);

        crate::engine::tick_engines(std::time::Duration::from_millis(20));
        crate::engine::tick_engines(std::time::Duration::from_millis(20));
        assert_eq!(element::get_content(0), "abc");
        assert_eq!(crate::engine::engine_count(), 1, "ticking must not resynchronize");
    }

    #[test]
    fn test_full_stack_types_into_owned_element() {
        setup();

        let cleanup = typed(|| TypedConfig {
            strings: vec!["hello".to_string()],
            show_cursor: false,
            shuffle: false,
            ..Default::default()
        });

        crate::engine::tick_engines(std::time::Duration::ZERO);
        assert_eq!(element::get_content(0), "hello");

        cleanup();
        assert_eq!(element::element_count(), 0);
    }
}
