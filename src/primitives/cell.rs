// ============================================================================
// spark-store - Reactive Cell
// The minimal subscribable value slot
// ============================================================================

use std::fmt;
use std::rc::Rc;

use crate::core::types::{AnySource, CellInner, EqualsFn};
use crate::reactivity::tracking::{notify_write, track_read};

// =============================================================================
// REACTIVE CELL
// =============================================================================

/// A value slot that tracked computations can subscribe to.
///
/// Reading inside an effect registers the effect as a dependent; writing a
/// value the cell's equality function considers different re-runs every
/// dependent (deferred to the end of the enclosing batch, if any).
///
/// # Example
///
/// ```
/// use spark_store::cell;
///
/// let count = cell(0);
/// assert!(count.write(5));
/// assert!(!count.write(5));
/// assert_eq!(count.read(), 5);
/// ```
pub struct ReactiveCell<T> {
    inner: Rc<CellInner<T>>,
}

impl<T> Clone for ReactiveCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> ReactiveCell<T> {
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self {
            inner: Rc::new(CellInner::new(value)),
        }
    }

    pub fn new_with_equals(value: T, equals: EqualsFn<T>) -> Self {
        Self {
            inner: Rc::new(CellInner::new_with_equals(value, equals)),
        }
    }

    /// Tracked read (cloning).
    pub fn read(&self) -> T
    where
        T: Clone,
    {
        track_read(self.inner.clone());
        self.inner.get()
    }

    /// Untracked read.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        self.inner.get()
    }

    /// Subscribe the running computation without reading the value.
    pub fn track(&self) {
        track_read(self.inner.clone());
    }

    /// Write a literal value. Returns true if the value changed, in which
    /// case dependents are notified.
    pub fn write(&self, next: T) -> bool {
        let changed = self.inner.set(next);
        if changed {
            notify_write(self.inner.clone());
        }
        changed
    }

    /// Write the value produced by `producer`, evaluated immediately.
    pub fn write_with(&self, producer: impl FnOnce() -> T) -> bool {
        self.write(producer())
    }

    /// Number of computations currently subscribed.
    pub fn subscriber_count(&self) -> usize {
        self.inner.cleanup_dead_reactions();
        self.inner.reaction_count()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: fmt::Debug> fmt::Debug for ReactiveCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner
            .with(|v| f.debug_struct("ReactiveCell").field("value", v).finish())
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// Create a cell compared with `PartialEq`.
pub fn cell<T: PartialEq + 'static>(value: T) -> ReactiveCell<T> {
    ReactiveCell::new(value)
}

/// Create a cell with a custom equality function.
pub fn cell_with_equals<T: 'static>(value: T, equals: EqualsFn<T>) -> ReactiveCell<T> {
    ReactiveCell::new_with_equals(value, equals)
}

/// Equality that never matches: every write notifies.
pub fn never_equals<T>(_: &T, _: &T) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::effect::effect;
    use std::cell::Cell;

    #[test]
    fn write_reports_change() {
        let c = cell(1);
        assert!(c.write(2));
        assert!(!c.write(2));
        assert_eq!(c.peek(), 2);
    }

    #[test]
    fn producer_is_evaluated_immediately() {
        let c = cell(String::from("a"));
        let evaluated = Cell::new(false);
        c.write_with(|| {
            evaluated.set(true);
            String::from("b")
        });
        assert!(evaluated.get());
        assert_eq!(c.peek(), "b");
    }

    #[test]
    fn equal_write_does_not_notify() {
        let c = cell(1);
        let runs = Rc::new(Cell::new(0));
        let _e = effect({
            let (c, runs) = (c.clone(), runs.clone());
            move || {
                c.track();
                runs.set(runs.get() + 1);
            }
        });

        c.write(1);
        assert_eq!(runs.get(), 1);
        c.write(2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn never_equals_always_notifies() {
        let c = cell_with_equals((), never_equals);
        let runs = Rc::new(Cell::new(0));
        let _e = effect({
            let (c, runs) = (c.clone(), runs.clone());
            move || {
                c.track();
                runs.set(runs.get() + 1);
            }
        });

        assert!(c.write(()));
        assert!(c.write(()));
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn peek_does_not_subscribe() {
        let c = cell(1);
        let _e = effect({
            let c = c.clone();
            move || {
                let _ = c.peek();
            }
        });
        assert_eq!(c.subscriber_count(), 0);
    }
}
