// ============================================================================
// spark-store - Mutable Stores
// Entry points: create a store, edit one in a single batch, unwrap views
// ============================================================================

use ahash::AHashSet;

use crate::error::{Result, StoreError};
use crate::reactivity::batching::batch;
use crate::store::dev;
use crate::store::target::{Property, Target};
use crate::store::value::Value;
use crate::store::view::Store;
use crate::store::wrap::{is_wrappable, wrap};

// =============================================================================
// OPTIONS
// =============================================================================

/// Options for [`create_mutable_with`].
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Shown in logs and in the dev graph registry
    pub name: Option<String>,
}

impl StoreOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

// =============================================================================
// CREATE
// =============================================================================

/// Turn `initial` into a mutable store.
///
/// A falsy value (`Undefined`, `Null`, `false`, `0`, `NaN`, `""`) starts an
/// empty object. Views nested anywhere inside `initial` are replaced by
/// their raw targets first. Primitives and functions are rejected.
///
/// # Example
///
/// ```
/// use spark_store::{array, create_mutable, object, StoreError, Value};
///
/// let state = create_mutable(object! { "list" => array![1, 2, 3] }).unwrap();
/// assert_eq!(state.get("list").as_store().map(|l| l.len()), Some(3));
///
/// let empty = create_mutable(Value::Null).unwrap();
/// assert!(empty.own_keys().is_empty());
///
/// assert_eq!(
///     create_mutable(5).unwrap_err(),
///     StoreError::InvalidRootType { found: "number" }
/// );
/// ```
pub fn create_mutable(initial: impl Into<Value>) -> Result<Store> {
    create_mutable_with(initial, StoreOptions::default())
}

/// [`create_mutable`] with options.
pub fn create_mutable_with(initial: impl Into<Value>, options: StoreOptions) -> Result<Store> {
    let initial = initial.into();
    let root = if initial.is_truthy() {
        unwrap(initial)
    } else {
        Value::Object(Target::object())
    };

    let found = root.type_name();
    let Value::Object(target) = root else {
        return Err(StoreError::InvalidRootType { found });
    };

    let store = wrap(&target);
    dev::register_graph(&target, options.name.as_deref());

    tracing::debug!(
        message = "store.create",
        name = options.name.as_deref().unwrap_or("<anonymous>"),
        kind = target.kind_name(),
        keys = target.len()
    );

    Ok(store)
}

// =============================================================================
// MODIFY
// =============================================================================

/// Run `modifier` against the raw target of `state` as one batched update.
///
/// The raw target does not notify by itself: make edits with
/// [`set_property`](crate::set_property) so every dependent runs once when
/// the modifier returns.
///
/// # Example
///
/// ```
/// use spark_store::{create_mutable, effect, modify_mutable, object, set_property};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let state = create_mutable(object! { "a" => 1, "b" => 2 }).unwrap();
/// let runs = Rc::new(Cell::new(0));
/// let _e = effect({
///     let (state, runs) = (state.clone(), runs.clone());
///     move || {
///         let _ = (state.get("a"), state.get("b"));
///         runs.set(runs.get() + 1);
///     }
/// });
///
/// modify_mutable(&state, |raw| {
///     set_property(raw, "a", 10, false);
///     set_property(raw, "b", 20, false);
/// })
/// .unwrap();
/// assert_eq!(runs.get(), 2);
/// ```
pub fn modify_mutable<R>(
    state: impl Into<Value>,
    modifier: impl FnOnce(&Target) -> R,
) -> Result<R> {
    let state = unwrap(state.into());
    let found = state.type_name();
    let Value::Object(target) = state else {
        return Err(StoreError::InvalidRootType { found });
    };
    Ok(batch(|| modifier(&target)))
}

// =============================================================================
// UNWRAP
// =============================================================================

/// Replace views with raw targets.
///
/// A view unwraps to its target as is. A raw wrappable target is walked in
/// place: any view stored in one of its data properties, at any depth, is
/// replaced by its target. Cycles are visited once; accessors are skipped.
pub fn unwrap(value: impl Into<Value>) -> Value {
    let mut seen = AHashSet::default();
    unwrap_value(value.into(), &mut seen)
}

fn unwrap_value(value: Value, seen: &mut AHashSet<*const ()>) -> Value {
    match value {
        Value::Store(store) => Value::Object(store.raw()),
        Value::Object(target) => {
            if is_wrappable(&Value::Object(target.clone())) && seen.insert(target.as_ptr()) {
                unwrap_children(&target, seen);
            }
            Value::Object(target)
        }
        other => other,
    }
}

fn unwrap_children(target: &Target, seen: &mut AHashSet<*const ()>) {
    for key in target.own_keys() {
        if key.is_length() && target.is_array() {
            continue;
        }
        let Some(Property::Data(value)) = target.property(&key) else {
            continue;
        };
        let unwrapped = unwrap_value(value.clone(), seen);
        if !unwrapped.same(&value) {
            target.set_data(key, unwrapped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::target::Class;
    use crate::store::value::Key;

    #[test]
    fn falsy_roots_become_empty_objects() {
        let falsy_roots = [
            Value::Undefined,
            Value::Null,
            Value::from(false),
            Value::from(0),
            Value::from(""),
        ];
        for falsy in falsy_roots {
            let store = create_mutable(falsy).expect("falsy root");
            assert!(store.raw().is_empty());
            assert!(!store.is_array());
        }
    }

    #[test]
    fn primitive_and_function_roots_are_rejected() {
        assert_eq!(
            create_mutable("text").unwrap_err(),
            StoreError::InvalidRootType { found: "string" }
        );
        assert_eq!(
            create_mutable(true).unwrap_err(),
            StoreError::InvalidRootType { found: "boolean" }
        );
        let f = crate::store::value::Function::new(|_, _| Value::Undefined);
        assert_eq!(
            create_mutable(f).unwrap_err(),
            StoreError::InvalidRootType { found: "function" }
        );
    }

    #[test]
    fn store_root_reuses_the_same_view() {
        let first = create_mutable(Target::object()).expect("store");
        let second = create_mutable(&first).expect("store");
        assert!(first.ptr_eq(&second));
    }

    #[test]
    fn class_instance_root_is_wrapped() {
        let class = Class::builder("Model").build();
        let instance = Target::instance(&class);
        let store = create_mutable(&instance).expect("instance root");
        assert!(store.raw().ptr_eq(&instance));
    }

    #[test]
    fn nested_views_are_unwrapped_on_create() {
        let child = create_mutable(Target::from_entries([("x", 1)])).expect("child");
        let root = Target::object();
        root.set_data(Key::from("child"), Value::Store(child.clone()));

        let store = create_mutable(&root).expect("root");
        assert!(matches!(store.raw().get("child"), Value::Object(ref t) if t.ptr_eq(&child.raw())));
    }

    #[test]
    fn unwrap_tolerates_cycles() {
        let a = Target::object();
        let b = Target::object();
        a.set("b", &b);
        b.set("a", &a);
        let view = wrap(&a);
        b.set_data(Key::from("view"), Value::Store(view));

        let unwrapped = unwrap(&a);
        assert!(matches!(unwrapped, Value::Object(ref t) if t.ptr_eq(&a)));
        assert!(matches!(b.get("view"), Value::Object(ref t) if t.ptr_eq(&a)));
    }

    #[test]
    fn modify_rejects_primitives() {
        assert_eq!(
            modify_mutable(3, |_| ()).unwrap_err(),
            StoreError::InvalidRootType { found: "number" }
        );
    }
}
