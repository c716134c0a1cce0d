// ============================================================================
// spark-store - Dev Instrumentation
// Store registration and write hooks for tooling
// ============================================================================
//
// Compiled in with the `dev-hooks` feature (on by default). Without it every
// function here is a no-op and `registered_graphs` is always empty.
// ============================================================================

use std::rc::Rc;

use crate::store::target::Target;
use crate::store::value::{Key, Value};

/// Write hook: `(target, key, new value, previous value)`, called before the
/// target is mutated.
pub type UpdateHook = Rc<dyn Fn(&Target, &Key, &Value, &Value)>;

#[cfg(feature = "dev-hooks")]
mod state {
    use std::cell::RefCell;

    use super::UpdateHook;
    use crate::store::target::WeakTarget;

    thread_local! {
        pub(super) static GRAPHS: RefCell<Vec<(Option<String>, WeakTarget)>> =
            const { RefCell::new(Vec::new()) };
        pub(super) static UPDATE_HOOK: RefCell<Option<UpdateHook>> = const { RefCell::new(None) };
    }
}

/// Record a created store. Entries are weak and vanish with their target.
pub fn register_graph(target: &Target, name: Option<&str>) {
    #[cfg(feature = "dev-hooks")]
    state::GRAPHS.with(|graphs| {
        let mut graphs = graphs.borrow_mut();
        graphs.retain(|(_, weak)| weak.upgrade().is_some());
        graphs.push((name.map(str::to_owned), target.downgrade()));
    });

    #[cfg(not(feature = "dev-hooks"))]
    let _ = (target, name);
}

/// Stores created on this thread that are still alive, oldest first
pub fn registered_graphs() -> Vec<(Option<String>, Target)> {
    #[cfg(feature = "dev-hooks")]
    {
        state::GRAPHS.with(|graphs| {
            graphs
                .borrow()
                .iter()
                .filter_map(|(name, weak)| weak.upgrade().map(|t| (name.clone(), t)))
                .collect()
        })
    }

    #[cfg(not(feature = "dev-hooks"))]
    {
        Vec::new()
    }
}

/// Install the write hook, replacing any previous one
pub fn set_update_hook(hook: impl Fn(&Target, &Key, &Value, &Value) + 'static) {
    #[cfg(feature = "dev-hooks")]
    state::UPDATE_HOOK.with(|slot| *slot.borrow_mut() = Some(Rc::new(hook)));

    #[cfg(not(feature = "dev-hooks"))]
    let _ = hook;
}

pub fn clear_update_hook() {
    #[cfg(feature = "dev-hooks")]
    state::UPDATE_HOOK.with(|slot| *slot.borrow_mut() = None);
}

pub(crate) fn notify_update(target: &Target, key: &Key, value: &Value, prev: &Value) {
    #[cfg(feature = "dev-hooks")]
    {
        let hook = state::UPDATE_HOOK.with(|slot| slot.borrow().clone());
        if let Some(hook) = hook {
            hook(target, key, value, prev);
        }
    }

    #[cfg(not(feature = "dev-hooks"))]
    let _ = (target, key, value, prev);
}

#[cfg(all(test, feature = "dev-hooks"))]
mod tests {
    use super::*;
    use crate::store::mutable::{StoreOptions, create_mutable, create_mutable_with};
    use std::cell::RefCell;
    use tracing_test::traced_test;

    #[test]
    fn created_stores_are_registered_weakly() {
        let named = create_mutable_with(Target::object(), StoreOptions::named("settings"))
            .expect("store");
        let graphs = registered_graphs();
        assert!(graphs
            .iter()
            .any(|(name, t)| name.as_deref() == Some("settings") && t.ptr_eq(&named.raw())));

        let raw = named.raw();
        drop(named);
        drop(graphs);
        drop(raw);
        assert!(!registered_graphs()
            .iter()
            .any(|(name, _)| name.as_deref() == Some("settings")));
    }

    #[test]
    fn update_hook_sees_every_write() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        set_update_hook({
            let seen = seen.clone();
            move |_, key, new, prev| {
                seen.borrow_mut().push((key.to_string(), new.clone(), prev.clone()));
            }
        });

        let store = create_mutable(Target::from_entries([("a", 1)])).expect("store");
        store.set("a", 2);
        store.set("a", 2);
        store.delete("a");
        clear_update_hook();
        store.set("b", 1);

        let seen = seen.borrow();
        assert_eq!(
            *seen,
            vec![
                ("a".to_string(), Value::from(2), Value::from(1)),
                ("a".to_string(), Value::Undefined, Value::from(2)),
            ]
        );
    }

    #[traced_test]
    #[test]
    fn creation_is_logged() {
        let _store = create_mutable_with(Target::object(), StoreOptions::named("logged"))
            .expect("store");
        assert!(logs_contain("store.create"));
        assert!(logs_contain("logged"));
    }
}
