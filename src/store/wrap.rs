// ============================================================================
// spark-store - Wrapping
// One view per target, accessors bound to it
// ============================================================================

use crate::store::target::{Proto, Target};
use crate::store::value::Value;
use crate::store::view::Store;

/// The view for `target`.
///
/// A view is a typed handle over the target, so wrapping twice yields the
/// same view even after every earlier handle was dropped. The first call
/// marks the target wrapped: from then on every accessor on it, including
/// ones defined later, sees the view as `this` and its setter runs as one
/// batched update. Class instances also get every accessor on their class
/// chain copied onto the instance, non-enumerable. Data properties are
/// untouched.
pub fn wrap(target: &Target) -> Store {
    if target.mark_wrapped() {
        tracing::trace!(message = "store.wrap", kind = target.kind_name());
        copy_class_accessors(target);
    }
    Store::new(target.clone())
}

fn copy_class_accessors(target: &Target) {
    let Some(class) = target.class() else {
        return;
    };
    for (key, accessor) in class.accessors() {
        if target.has_own(&key) {
            continue;
        }
        target.define_accessor(key, accessor.hidden());
    }
}

/// Values that get a view: plain objects, null-prototype objects, arrays,
/// and class instances that already have one.
pub fn is_wrappable(value: &Value) -> bool {
    match value {
        Value::Store(_) => true,
        Value::Object(target) => match target.proto() {
            Proto::Object | Proto::Null | Proto::Array => true,
            Proto::Class(_) => target.is_wrapped(),
        },
        _ => false,
    }
}

/// Replace a wrappable raw target with its view
pub(crate) fn wrap_value(value: Value) -> Value {
    match value {
        Value::Object(target) if is_wrappable(&Value::Object(target.clone())) => {
            Value::Store(wrap(&target))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::target::{Accessor, Class};

    #[test]
    fn wrap_is_stable() {
        let t = Target::object();
        let a = wrap(&t);
        let b = wrap(&t);
        assert!(a.ptr_eq(&b));
        assert!(wrap(&a.raw()).ptr_eq(&a));
    }

    #[test]
    fn identity_survives_dropped_handles() {
        let t = Target::object();
        let first = wrap(&t);
        let copy = first.clone();
        drop(first);
        drop(copy);
        assert!(t.is_wrapped());
        assert!(wrap(&t).raw().ptr_eq(&t));
    }

    #[test]
    fn wrappability() {
        let class = Class::builder("Point").build();
        let instance = Target::instance(&class);

        assert!(is_wrappable(&Value::from(Target::object())));
        assert!(is_wrappable(&Value::from(Target::null_object())));
        assert!(is_wrappable(&Value::from(Target::array())));
        assert!(!is_wrappable(&Value::from(&instance)));
        assert!(!is_wrappable(&Value::from(1)));
        assert!(!is_wrappable(&Value::Null));

        let view = wrap(&instance);
        assert!(is_wrappable(&Value::from(&instance)));
        assert!(is_wrappable(&Value::from(view)));
        assert!(is_wrappable(&Value::from(&instance)), "still wrappable after the view drops");
    }

    #[test]
    fn accessors_are_bound_to_the_view() {
        let class = Class::builder("Counter")
            .accessor("doubled", Accessor::getter(|this| {
                assert!(this.as_store().is_some());
                Value::from(this.get("n").as_number().unwrap_or(0.0) * 2.0)
            }))
            .build();
        let t = Target::instance(&class);
        t.set("n", 4);
        t.define_accessor("own", Accessor::getter(|this| Value::from(this.as_store().is_some())));

        let view = wrap(&t);
        assert!(t.has_own("doubled"));
        assert_eq!(t.get("doubled"), Value::from(8));
        assert_eq!(t.get("own"), Value::from(true));
        assert_eq!(view.get("doubled"), Value::from(8));
    }

    #[test]
    fn accessors_defined_after_wrapping_see_the_view() {
        let t = Target::object();
        drop(wrap(&t));
        t.define_accessor(
            "late",
            Accessor::getter(|this| Value::from(this.as_store().is_some()))
                .with_setter(|this, value| {
                    assert!(this.as_store().is_some());
                    this.set("stored", value);
                }),
        );

        assert_eq!(t.get("late"), Value::from(true));
        t.set("late", 3);
        assert_eq!(t.get("stored"), Value::from(3));
    }
}
