// ============================================================================
// spark-store - Effect System
// Side effects that re-run when the cells they read change
// ============================================================================
//
// An effect runs once when created, then again every time a cell it read
// during its previous run is written with a new value. Effects created while
// another effect runs become its children and are torn down before each
// re-run of the parent.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::{AnyReaction, AnySource};
use crate::primitives::scope::register_effect_with_scope;
use crate::reactivity::scheduling::flush_sync;
use crate::reactivity::tracking::{remove_reactions, set_status};

// =============================================================================
// TYPE ALIASES
// =============================================================================

/// Cleanup returned by an effect body, run before the next run and on dispose
pub type CleanupFn = Box<dyn FnOnce()>;

type EffectFn = Box<dyn FnMut() -> Option<CleanupFn>>;

// =============================================================================
// EFFECT INNER
// =============================================================================

pub struct EffectInner {
    flags: Cell<u32>,

    func: RefCell<Option<EffectFn>>,

    /// Cells read during the latest run
    deps: RefCell<Vec<Rc<dyn AnySource>>>,

    /// Cleanup from the latest run
    teardown: RefCell<Option<CleanupFn>>,

    parent: RefCell<Option<Weak<EffectInner>>>,

    /// Effects created during the latest run
    children: RefCell<Vec<Rc<EffectInner>>>,

    self_weak: RefCell<Weak<EffectInner>>,
}

impl EffectInner {
    fn new(func: EffectFn) -> Rc<Self> {
        let effect = Rc::new(Self {
            flags: Cell::new(EFFECT | DIRTY),
            func: RefCell::new(Some(func)),
            deps: RefCell::new(Vec::new()),
            teardown: RefCell::new(None),
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
            self_weak: RefCell::new(Weak::new()),
        });

        *effect.self_weak.borrow_mut() = Rc::downgrade(&effect);
        effect
    }

    fn as_weak_reaction(self: &Rc<Self>) -> Weak<dyn AnyReaction> {
        let as_reaction: Rc<dyn AnyReaction> = self.clone();
        Rc::downgrade(&as_reaction)
    }

    fn parent(&self) -> Option<Rc<EffectInner>> {
        self.parent.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        (self.flags.get() & DESTROYED) != 0
    }
}

impl AnyReaction for EffectInner {
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

    fn update(&self) {
        if self.is_destroyed() {
            return;
        }

        let rc_self = self.self_weak.borrow().upgrade();
        if let Some(rc_self) = rc_self {
            update_effect(&rc_self);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// EFFECT HANDLE
// =============================================================================

/// Owning handle to a running effect.
///
/// Dropping the last owner disposes the effect. Effects created inside a
/// [`Scope`](crate::Scope) or inside another effect are also owned by that
/// scope or parent, so dropping the handle leaves them running.
#[must_use = "dropping the only handle to an effect disposes it"]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }

    /// Stop the effect: children are destroyed, the last cleanup runs, and
    /// every subscription is released.
    pub fn dispose(&self) {
        destroy_effect(self.inner.clone(), true);
    }

    /// Number of cells the effect read during its latest run
    pub fn dependency_count(&self) -> usize {
        self.inner.dep_count()
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        if Rc::strong_count(&self.inner) == 1 {
            self.dispose();
        }
    }
}

// =============================================================================
// TEARDOWN
// =============================================================================

fn execute_teardown(effect: &EffectInner) {
    let teardown = effect.teardown.borrow_mut().take();
    if let Some(cleanup) = teardown {
        cleanup();
    }
}

fn destroy_effect_children(effect: &EffectInner) {
    let children = std::mem::take(&mut *effect.children.borrow_mut());
    for child in children {
        destroy_effect(child, false);
    }
}

/// Destroy an effect and everything it owns.
pub(crate) fn destroy_effect(effect: Rc<EffectInner>, remove_from_parent: bool) {
    if effect.is_destroyed() {
        return;
    }

    destroy_effect_children(&effect);
    remove_reactions(effect.clone() as Rc<dyn AnyReaction>, 0);
    set_status(&*effect, DESTROYED);
    execute_teardown(&effect);

    if remove_from_parent {
        if let Some(parent) = effect.parent() {
            parent
                .children
                .borrow_mut()
                .retain(|child| !Rc::ptr_eq(child, &effect));
        }
    }

    *effect.parent.borrow_mut() = None;

    // Still borrowed when the body disposes its own effect
    if let Ok(mut func) = effect.func.try_borrow_mut() {
        *func = None;
    }
}

// =============================================================================
// UPDATE EFFECT
// =============================================================================

/// Run an effect body with dependency tracking.
///
/// Writes made by the body are batched: effects they dirty run after the
/// body returns, and a body that dirties its own dependencies is picked up
/// by the flush loop instead of recursing.
pub(crate) fn update_effect(effect: &Rc<EffectInner>) {
    if effect.is_destroyed() {
        return;
    }

    set_status(&**effect, CLEAN);
    destroy_effect_children(effect);
    execute_teardown(effect);
    remove_reactions(effect.clone() as Rc<dyn AnyReaction>, 0);

    let (prev_reaction, prev_stamp) = with_context(|ctx| {
        ctx.enter_batch();
        (
            ctx.set_active_reaction(Some(effect.as_weak_reaction())),
            ctx.begin_read_cycle(),
        )
    });
    effect.set_flags(effect.flags() | REACTION_IS_UPDATING);

    struct RunGuard<'a> {
        effect: &'a EffectInner,
        prev_reaction: Option<Option<Weak<dyn AnyReaction>>>,
        prev_stamp: u32,
    }

    impl Drop for RunGuard<'_> {
        fn drop(&mut self) {
            self.effect
                .set_flags(self.effect.flags() & !REACTION_IS_UPDATING);
            let prev_reaction = self.prev_reaction.take().flatten();
            with_context(|ctx| {
                ctx.set_active_reaction(prev_reaction);
                ctx.end_read_cycle(self.prev_stamp);
                ctx.exit_batch();
            });
        }
    }

    let teardown = {
        let _guard = RunGuard {
            effect,
            prev_reaction: Some(prev_reaction),
            prev_stamp,
        };

        let mut func = effect.func.borrow_mut();
        match func.as_mut() {
            Some(func) => func(),
            None => None,
        }
    };

    if effect.is_destroyed() {
        // Disposed from inside its own body
        if let Some(cleanup) = teardown {
            cleanup();
        }
    } else {
        *effect.teardown.borrow_mut() = teardown;
        effect.set_flags(effect.flags() | EFFECT_RAN);
    }

    let should_flush = with_context(|ctx| !ctx.is_batching() && !ctx.is_flushing());
    if should_flush {
        flush_sync();
    }
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Create an effect. The body runs immediately, then again whenever a cell
/// it read changes.
///
/// # Example
///
/// ```
/// use spark_store::{cell, effect};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = cell(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let handle = effect({
///     let (count, seen) = (count.clone(), seen.clone());
///     move || seen.set(count.read())
/// });
/// assert_eq!(seen.get(), 0);
///
/// count.write(4);
/// assert_eq!(seen.get(), 4);
///
/// handle.dispose();
/// count.write(5);
/// assert_eq!(seen.get(), 4);
/// ```
pub fn effect<F>(mut f: F) -> Effect
where
    F: FnMut() + 'static,
{
    effect_with_cleanup(move || {
        f();
        None
    })
}

/// Create an effect whose body may return a cleanup. The cleanup runs before
/// the next run and when the effect is disposed.
pub fn effect_with_cleanup<F>(f: F) -> Effect
where
    F: FnMut() -> Option<CleanupFn> + 'static,
{
    let effect = EffectInner::new(Box::new(f));

    register_effect_with_scope(&effect);

    let parent = with_context(|ctx| ctx.active_reaction());
    if let Some(parent) = parent {
        if let Some(parent) = parent.as_any().downcast_ref::<EffectInner>() {
            let parent_rc = parent.self_weak.borrow().upgrade();
            if let Some(parent_rc) = parent_rc {
                *effect.parent.borrow_mut() = Some(Rc::downgrade(&parent_rc));
                parent_rc.children.borrow_mut().push(effect.clone());
            }
        }
    }

    update_effect(&effect);

    Effect { inner: effect }
}

/// True while an effect body is running and reads are being tracked.
pub fn effect_tracking() -> bool {
    with_context(|ctx| ctx.is_tracking())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::cell::cell;
    use crate::reactivity::batching::untrack;

    #[test]
    fn runs_on_creation_and_on_change() {
        let runs = Rc::new(Cell::new(0));
        let count = cell(0);

        let _e = effect({
            let (count, runs) = (count.clone(), runs.clone());
            move || {
                let _ = count.read();
                runs.set(runs.get() + 1);
            }
        });
        assert_eq!(runs.get(), 1);

        count.write(1);
        assert_eq!(runs.get(), 2);
        count.write(1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn cleanup_runs_before_rerun_and_on_dispose() {
        let cleanups = Rc::new(Cell::new(0));
        let count = cell(0);

        let e = effect_with_cleanup({
            let (count, cleanups) = (count.clone(), cleanups.clone());
            move || {
                let _ = count.read();
                let cleanups = cleanups.clone();
                Some(Box::new(move || cleanups.set(cleanups.get() + 1)) as CleanupFn)
            }
        });
        assert_eq!(cleanups.get(), 0);

        count.write(1);
        assert_eq!(cleanups.get(), 1);

        e.dispose();
        assert_eq!(cleanups.get(), 2);
        assert!(e.is_destroyed());
    }

    #[test]
    fn dispose_releases_subscriptions() {
        let count = cell(0);
        let e = effect({
            let count = count.clone();
            move || {
                let _ = count.read();
            }
        });
        assert_eq!(count.subscriber_count(), 1);
        assert_eq!(e.dependency_count(), 1);

        e.dispose();
        assert_eq!(count.subscriber_count(), 0);
    }

    #[test]
    fn dropping_last_handle_disposes() {
        let runs = Rc::new(Cell::new(0));
        let count = cell(0);

        {
            let _e = effect({
                let (count, runs) = (count.clone(), runs.clone());
                move || {
                    let _ = count.read();
                    runs.set(runs.get() + 1);
                }
            });
        }

        count.write(1);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn dependencies_follow_the_latest_run() {
        let flag = cell(true);
        let a = cell(0);
        let b = cell(0);
        let runs = Rc::new(Cell::new(0));

        let _e = effect({
            let (flag, a, b, runs) = (flag.clone(), a.clone(), b.clone(), runs.clone());
            move || {
                runs.set(runs.get() + 1);
                if flag.read() {
                    let _ = a.read();
                } else {
                    let _ = b.read();
                }
            }
        });

        b.write(1);
        assert_eq!(runs.get(), 1);

        flag.write(false);
        assert_eq!(runs.get(), 2);

        a.write(1);
        assert_eq!(runs.get(), 2);
        b.write(2);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn child_effects_are_replaced_on_parent_rerun() {
        let outer = cell(0);
        let inner = cell(0);
        let inner_runs = Rc::new(Cell::new(0));

        let _e = effect({
            let (outer, inner, inner_runs) = (outer.clone(), inner.clone(), inner_runs.clone());
            move || {
                let _ = outer.read();
                let _child = effect({
                    let (inner, inner_runs) = (inner.clone(), inner_runs.clone());
                    move || {
                        let _ = inner.read();
                        inner_runs.set(inner_runs.get() + 1);
                    }
                });
            }
        });
        assert_eq!(inner_runs.get(), 1);

        inner.write(1);
        assert_eq!(inner_runs.get(), 2);

        outer.write(1);
        assert_eq!(inner_runs.get(), 3);

        // Only the child from the latest parent run is alive
        inner.write(2);
        assert_eq!(inner_runs.get(), 4);
        assert_eq!(inner.subscriber_count(), 1);
    }

    #[test]
    fn self_write_settles_after_the_body() {
        let count = cell(0);
        let _e = effect({
            let count = count.clone();
            move || {
                let v = count.read();
                if v < 3 {
                    count.write(v + 1);
                }
            }
        });
        assert_eq!(count.peek(), 3);
    }

    #[test]
    fn tracking_flag_inside_body() {
        assert!(!effect_tracking());
        let seen = Rc::new(Cell::new((false, true)));
        let _e = effect({
            let seen = seen.clone();
            move || seen.set((effect_tracking(), untrack(effect_tracking)))
        });
        assert_eq!(seen.get(), (true, false));
    }
}
