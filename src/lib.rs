// ============================================================================
// spark-store - Fine-Grained Mutable Reactive Stores for Rust
// ============================================================================
//
// Plain object graphs read and written in place, with per-property
// dependency tracking. Built on a small single-threaded reactive runtime
// (cells, effects, batches, scopes).
// ============================================================================

#[macro_use]
mod macros;

pub mod core;
pub mod error;
pub mod primitives;
pub mod reactivity;
pub mod store;

// Re-export core items at crate root
pub use core::constants;
pub use core::context::{RuntimeContext, is_batching, is_tracking, is_untracking, with_context};
pub use core::types::{AnyReaction, AnySource, CellInner, EqualsFn, default_equals};

// Runtime primitives
pub use primitives::cell::{ReactiveCell, cell, cell_with_equals, never_equals};
pub use primitives::effect::{
    CleanupFn, Effect, EffectInner, effect, effect_tracking, effect_with_cleanup,
};
pub use primitives::scope::{Scope, current_scope, on_scope_dispose, scope};

// Reactivity functions
pub use reactivity::batching::{batch, peek, untrack};
pub use reactivity::scheduling::flush_sync;
pub use reactivity::tracking::{is_dirty, mark_reactions, notify_write, remove_reactions, track_read};

// Stores
pub use store::dev::{
    UpdateHook, clear_update_hook, register_graph, registered_graphs, set_update_hook,
};
pub use store::{
    Accessor, Class, ClassBuilder, Descriptor, Function, Getter, Key, Property, Proto, Setter,
    Store, StoreOptions, Target, Value, create_mutable, create_mutable_with, is_wrappable,
    modify_mutable, set_property, track_self, unwrap, wrap,
};

// Errors
pub use error::{Result, StoreError};

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn counter() -> Rc<Cell<u32>> {
        Rc::new(Cell::new(0))
    }

    // =========================================================================
    // Runtime
    // =========================================================================

    #[test]
    fn runtime_flags_are_distinct() {
        assert_eq!(constants::CELL & constants::EFFECT, 0);
        assert_eq!(constants::CLEAN & constants::DIRTY, 0);
        assert_eq!(constants::STATUS_MASK & constants::DIRTY, 0);
        assert_ne!(constants::INERT & constants::STATUS_MASK, 0);
    }

    #[test]
    fn runtime_context_starts_idle() {
        assert!(!is_tracking());
        assert!(!is_batching());
        with_context(|ctx| {
            assert!(!ctx.has_active_reaction());
        });
    }

    #[test]
    fn cells_drive_effects_through_batches() {
        let a = cell(1);
        let b = cell(2);
        let sums = Rc::new(RefCell::new(Vec::new()));

        let _e = effect(cloned!(a, b, sums => move || {
            sums.borrow_mut().push(a.read() + b.read());
        }));

        batch(|| {
            a.write(10);
            b.write(20);
        });

        assert_eq!(*sums.borrow(), vec![3, 30]);
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let a = cell(1);
        let runs = counter();

        let _e = effect(cloned!(a, runs => move || {
            let _ = untrack(|| a.read());
            runs.set(runs.get() + 1);
        }));

        a.write(2);
        assert_eq!(runs.get(), 1);
    }

    // =========================================================================
    // Stores
    // =========================================================================

    #[test]
    fn store_list_scenario() {
        let state = create_mutable(object! { "list" => array![1, 2, 3] }).unwrap();
        let lengths = Rc::new(RefCell::new(Vec::new()));

        let _e = effect!(state, lengths => {
            let list = state.get("list");
            lengths.borrow_mut().push(list.get("length").as_number().unwrap_or(-1.0));
        });

        state.get("list").as_store().unwrap().push([4]);
        state.get("list").set("length", 2);

        assert_eq!(*lengths.borrow(), vec![3.0, 4.0, 2.0]);
        assert!(!state.get("list").as_store().unwrap().has(2));
    }

    #[test]
    fn invalid_roots_report_their_type() {
        let err = create_mutable("nope").unwrap_err();
        assert_eq!(err, StoreError::InvalidRootType { found: "string" });
        assert!(err.to_string().contains("string"));
    }

    #[test]
    fn scopes_own_store_effects() {
        let state = create_mutable(object! { "n" => 0 }).unwrap();
        let runs = counter();
        let s = scope(false);

        s.run(|| {
            let _e = effect!(state, runs => {
                let _ = state.get("n");
                runs.set(runs.get() + 1);
            });
        });

        state.set("n", 1);
        assert_eq!(runs.get(), 2);

        s.stop();
        state.set("n", 2);
        assert_eq!(runs.get(), 2);
    }
}
