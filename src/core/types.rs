// ============================================================================
// spark-store - Type Definitions
// Type-erased traits and the cell storage behind every subscription point
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::constants::*;

// =============================================================================
// TYPE-ERASED TRAITS
// =============================================================================
//
// Graph operations (mark dirty, dedupe reads, link and unlink dependencies)
// never need the value type T, so the graph stores:
// - Vec<Rc<dyn AnySource>> on each computation (what it read)
// - Vec<Weak<dyn AnyReaction>> on each cell (who to notify)
// =============================================================================

/// Type-erased source side of the graph: something that can be read and
/// subscribed to.
pub trait AnySource: Any {
    /// Get the flags bitmask
    fn flags(&self) -> u32;

    /// Set the flags bitmask
    fn set_flags(&self, flags: u32);

    /// Read version stamp used to dedupe reads within one run
    fn read_version(&self) -> u32;

    /// Stamp the read version
    fn set_read_version(&self, version: u32);

    /// Number of reactions currently subscribed (dead ones included until
    /// the next cleanup)
    fn reaction_count(&self) -> usize;

    /// Subscribe a reaction
    fn add_reaction(&self, reaction: Weak<dyn AnyReaction>);

    /// Drop subscriptions whose reaction has been freed
    fn cleanup_dead_reactions(&self);

    /// Visit every live reaction. Returning false stops the walk.
    fn for_each_reaction(&self, f: &mut dyn FnMut(Rc<dyn AnyReaction>) -> bool);

    /// Unsubscribe one reaction (pointer identity)
    fn remove_reaction(&self, reaction: &Rc<dyn AnyReaction>);

    /// Upcast to Any for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Type-erased tracked computation: something that reads sources and re-runs
/// when they change.
pub trait AnyReaction: Any {
    /// Get the flags bitmask
    fn flags(&self) -> u32;

    /// Set the flags bitmask
    fn set_flags(&self, flags: u32);

    /// Number of sources this reaction depends on
    fn dep_count(&self) -> usize;

    /// Record a dependency
    fn add_dep(&self, source: Rc<dyn AnySource>);

    /// Forget dependencies from `start` onwards
    fn remove_deps_from(&self, start: usize);

    /// Visit dependencies. Returning false stops the walk.
    fn for_each_dep(&self, f: &mut dyn FnMut(&Rc<dyn AnySource>) -> bool);

    /// Re-run the computation
    fn update(&self);

    /// Upcast to Any for downcasting
    fn as_any(&self) -> &dyn Any;

    fn is_dirty(&self) -> bool {
        self.flags() & DIRTY != 0
    }

    fn is_clean(&self) -> bool {
        self.flags() & CLEAN != 0
    }

    fn is_destroyed(&self) -> bool {
        self.flags() & DESTROYED != 0
    }

    fn mark_dirty(&self) {
        self.set_flags((self.flags() & STATUS_MASK) | DIRTY);
    }

    fn mark_clean(&self) {
        self.set_flags((self.flags() & STATUS_MASK) | CLEAN);
    }
}

// =============================================================================
// CELL INNER (the data behind ReactiveCell<T>)
// =============================================================================

/// Equality function deciding whether a write changed a cell
pub type EqualsFn<T> = fn(&T, &T) -> bool;

/// Default equality using PartialEq
pub fn default_equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Storage for one subscribable value slot.
///
/// Kept separate from `ReactiveCell<T>` so it can be stored as
/// `Rc<dyn AnySource>` in dependency lists.
pub struct CellInner<T> {
    flags: Cell<u32>,
    value: RefCell<T>,
    read_version: Cell<u32>,
    /// Weak so a cell never keeps a disposed computation alive
    reactions: RefCell<Vec<Weak<dyn AnyReaction>>>,
    equals: EqualsFn<T>,
}

impl<T> CellInner<T> {
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::new_with_equals(value, default_equals)
    }

    pub fn new_with_equals(value: T, equals: EqualsFn<T>) -> Self {
        Self {
            flags: Cell::new(CELL | CLEAN),
            value: RefCell::new(value),
            read_version: Cell::new(0),
            reactions: RefCell::new(Vec::new()),
            equals,
        }
    }

    /// Current value (cloning), no tracking
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.borrow().clone()
    }

    /// Borrow the current value, no tracking
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// Replace the value. Returns false (and keeps the old value) when the
    /// equality function reports no change.
    pub fn set(&self, value: T) -> bool {
        let changed = {
            let current = self.value.borrow();
            !(self.equals)(&current, &value)
        };

        if changed {
            *self.value.borrow_mut() = value;
        }

        changed
    }
}

impl<T: 'static> AnySource for CellInner<T> {
    fn flags(&self) -> u32 {
        self.flags.get()
    }

    fn set_flags(&self, flags: u32) {
        self.flags.set(flags);
    }

    fn read_version(&self) -> u32 {
        self.read_version.get()
    }

    fn set_read_version(&self, version: u32) {
        self.read_version.set(version);
    }

    fn reaction_count(&self) -> usize {
        self.reactions.borrow().len()
    }

    fn add_reaction(&self, reaction: Weak<dyn AnyReaction>) {
        self.reactions.borrow_mut().push(reaction);
    }

    fn cleanup_dead_reactions(&self) {
        self.reactions.borrow_mut().retain(|w| w.strong_count() > 0);
    }

    fn for_each_reaction(&self, f: &mut dyn FnMut(Rc<dyn AnyReaction>) -> bool) {
        let reactions = self.reactions.borrow();
        for weak in reactions.iter() {
            if let Some(rc) = weak.upgrade() {
                if !f(rc) {
                    break;
                }
            }
        }
    }

    fn remove_reaction(&self, reaction: &Rc<dyn AnyReaction>) {
        let target = Rc::as_ptr(reaction) as *const ();
        self.reactions.borrow_mut().retain(|weak| match weak.upgrade() {
            Some(rc) => Rc::as_ptr(&rc) as *const () != target,
            None => false,
        });
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_inner_starts_clean() {
        let cell = CellInner::new(42);
        assert_eq!(cell.get(), 42);
        assert_ne!(cell.flags() & CELL, 0);
        assert_ne!(cell.flags() & CLEAN, 0);
    }

    #[test]
    fn set_reports_change() {
        let cell = CellInner::new(1);
        assert!(cell.set(2));
        assert_eq!(cell.get(), 2);
        assert!(!cell.set(2));
    }

    #[test]
    fn custom_equality_always_changes() {
        fn never(_: &i32, _: &i32) -> bool {
            false
        }

        let cell = CellInner::new_with_equals(7, never);
        assert!(cell.set(7));
    }

    #[test]
    fn heterogeneous_sources_share_a_vec() {
        let sources: Vec<Rc<dyn AnySource>> = vec![
            Rc::new(CellInner::new(1i32)),
            Rc::new(CellInner::new(String::from("a"))),
            Rc::new(CellInner::new(true)),
        ];

        for source in &sources {
            assert_ne!(source.flags() & CELL, 0);
            assert_eq!(source.reaction_count(), 0);
        }

        let inner = sources[0].as_any().downcast_ref::<CellInner<i32>>().unwrap();
        assert_eq!(inner.get(), 1);
    }
}
