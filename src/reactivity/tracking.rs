// ============================================================================
// spark-store - Dependency Tracking
// Registering reads and propagating writes through the graph
// ============================================================================
//
// Borrow scoping is the whole game here: never hold a RefCell borrow on a
// cell's reaction list (or a reaction's dep list) while mutating the other
// side. Every walk below collects first, then mutates.
// ============================================================================

use std::rc::Rc;

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::{AnyReaction, AnySource};
use crate::reactivity::scheduling::schedule_effect;

// =============================================================================
// TRACK READ
// =============================================================================

/// Register `source` as a dependency of the running computation.
///
/// Outside a tracked computation (or inside `untrack`) this does nothing.
/// Links are made eagerly, so a computation that writes a cell it already
/// read during the same run marks itself dirty. Each source is linked at
/// most once per run, deduped by the run's read stamp.
pub fn track_read(source: Rc<dyn AnySource>) {
    let linked = with_context(|ctx| {
        if !ctx.is_tracking() {
            return None;
        }

        let reaction = ctx.active_reaction()?;
        let read_version = ctx.get_read_version();
        if source.read_version() == read_version {
            return None;
        }
        source.set_read_version(read_version);
        Some(reaction)
    });

    if let Some(reaction) = linked {
        reaction.add_dep(source.clone());
        source.add_reaction(Rc::downgrade(&reaction));
    }
}

// =============================================================================
// NOTIFY WRITE
// =============================================================================

/// Tell the graph that `source` changed: every live subscriber becomes
/// DIRTY and dirty effects are scheduled.
pub fn notify_write(source: Rc<dyn AnySource>) {
    mark_reactions(source);
}

/// Mark every live reaction of `source` DIRTY.
///
/// Reactions that are already dirty are skipped, which is what collapses
/// many writes inside one batch into a single scheduled run.
pub fn mark_reactions(source: Rc<dyn AnySource>) {
    source.cleanup_dead_reactions();

    let reactions: Vec<Rc<dyn AnyReaction>> = {
        let mut collected = Vec::new();
        source.for_each_reaction(&mut |reaction| {
            collected.push(reaction);
            true
        });
        collected
    };

    let mut to_schedule = Vec::new();
    for reaction in reactions {
        let flags = reaction.flags();
        if (flags & (DIRTY | DESTROYED)) != 0 {
            continue;
        }

        set_status(&*reaction, DIRTY);

        if (flags & EFFECT) != 0 {
            to_schedule.push(reaction);
        }
    }

    for effect in to_schedule {
        schedule_effect(effect);
    }
}

// =============================================================================
// STATUS HELPERS
// =============================================================================

/// Replace the status bits (CLEAN/DIRTY) of a reaction
pub fn set_status(target: &dyn AnyReaction, status: u32) {
    target.set_flags((target.flags() & STATUS_MASK) | status);
}

/// A reaction needs to re-run
pub fn is_dirty(reaction: &dyn AnyReaction) -> bool {
    (reaction.flags() & DIRTY) != 0
}

// =============================================================================
// REMOVE REACTIONS
// =============================================================================

/// Unsubscribe `reaction` from its dependencies starting at index `start`,
/// then truncate its dependency list.
pub fn remove_reactions(reaction: Rc<dyn AnyReaction>, start: usize) {
    let stale: Vec<Rc<dyn AnySource>> = {
        let mut collected = Vec::new();
        let mut idx = 0;
        reaction.for_each_dep(&mut |dep| {
            if idx >= start {
                collected.push(dep.clone());
            }
            idx += 1;
            true
        });
        collected
    };

    for dep in stale {
        dep.remove_reaction(&reaction);
    }

    reaction.remove_deps_from(start);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CellInner;
    use std::any::Any;
    use std::cell::{Cell, RefCell};

    /// Bare reaction used to observe flag changes without running anything
    struct StubReaction {
        flags: Cell<u32>,
        deps: RefCell<Vec<Rc<dyn AnySource>>>,
    }

    impl StubReaction {
        fn new(kind: u32) -> Rc<Self> {
            Rc::new(Self {
                flags: Cell::new(kind | CLEAN),
                deps: RefCell::new(Vec::new()),
            })
        }
    }

    impl AnyReaction for StubReaction {
        fn flags(&self) -> u32 {
            self.flags.get()
        }

        fn set_flags(&self, flags: u32) {
            self.flags.set(flags);
        }

        fn dep_count(&self) -> usize {
            self.deps.borrow().len()
        }

        fn add_dep(&self, source: Rc<dyn AnySource>) {
            self.deps.borrow_mut().push(source);
        }

        fn remove_deps_from(&self, start: usize) {
            self.deps.borrow_mut().truncate(start);
        }

        fn for_each_dep(&self, f: &mut dyn FnMut(&Rc<dyn AnySource>) -> bool) {
            for dep in self.deps.borrow().iter() {
                if !f(dep) {
                    break;
                }
            }
        }

        fn update(&self) {}

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn read_outside_computation_is_not_tracked() {
        let source: Rc<CellInner<i32>> = Rc::new(CellInner::new(1));
        track_read(source.clone());
        assert_eq!(source.reaction_count(), 0);
    }

    #[test]
    fn read_inside_computation_links_both_sides() {
        let source: Rc<CellInner<i32>> = Rc::new(CellInner::new(1));
        let stub = StubReaction::new(0);
        let as_reaction: Rc<dyn AnyReaction> = stub.clone();

        let (prev, prev_stamp) = with_context(|ctx| {
            (
                ctx.set_active_reaction(Some(Rc::downgrade(&as_reaction))),
                ctx.begin_read_cycle(),
            )
        });
        track_read(source.clone());
        track_read(source.clone());
        with_context(|ctx| {
            ctx.set_active_reaction(prev);
            ctx.end_read_cycle(prev_stamp);
        });

        assert_eq!(stub.dep_count(), 1);
        assert_eq!(source.reaction_count(), 1);
    }

    #[test]
    fn write_marks_dirty_once() {
        let source: Rc<CellInner<i32>> = Rc::new(CellInner::new(0));
        let stub = StubReaction::new(0);
        let as_reaction: Rc<dyn AnyReaction> = stub.clone();
        source.add_reaction(Rc::downgrade(&as_reaction));

        notify_write(source.clone());
        assert!(stub.is_dirty());

        set_status(&*stub, CLEAN);
        notify_write(source);
        assert!(stub.is_dirty());
    }

    #[test]
    fn remove_reactions_unlinks_tail() {
        let a: Rc<CellInner<i32>> = Rc::new(CellInner::new(1));
        let b: Rc<CellInner<i32>> = Rc::new(CellInner::new(2));
        let stub = StubReaction::new(0);
        let as_reaction: Rc<dyn AnyReaction> = stub.clone();

        for dep in [a.clone() as Rc<dyn AnySource>, b.clone() as Rc<dyn AnySource>] {
            as_reaction.add_dep(dep.clone());
            dep.add_reaction(Rc::downgrade(&as_reaction));
        }
        assert_eq!(a.reaction_count(), 1);
        assert_eq!(b.reaction_count(), 1);

        remove_reactions(as_reaction, 1);
        assert_eq!(stub.dep_count(), 1);
        assert_eq!(a.reaction_count(), 1);
        assert_eq!(b.reaction_count(), 0);
    }

    #[test]
    fn dropped_reaction_is_pruned_on_write() {
        let source: Rc<CellInner<i32>> = Rc::new(CellInner::new(0));
        {
            let stub: Rc<dyn AnyReaction> = StubReaction::new(0);
            source.add_reaction(Rc::downgrade(&stub));
        }
        assert_eq!(source.reaction_count(), 1);
        notify_write(source.clone());
        assert_eq!(source.reaction_count(), 0);
    }
}
