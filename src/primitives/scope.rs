// ============================================================================
// spark-store - Scopes
// Group effects so they can be stopped, paused and resumed together
// ============================================================================
//
// A store holds no effects of its own; whoever observes it decides how long
// the observation lives. A scope is the unit for that: effects created while
// the scope runs are owned by it and released when it stops.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::core::constants::*;
use crate::core::types::AnyReaction;
use crate::primitives::effect::{EffectInner, destroy_effect};
use crate::reactivity::scheduling::{flush_sync, schedule_effect};

thread_local! {
    static ACTIVE_SCOPE: RefCell<Option<Rc<ScopeInner>>> = const { RefCell::new(None) };
}

fn active_scope() -> Option<Rc<ScopeInner>> {
    ACTIVE_SCOPE.with(|s| s.borrow().clone())
}

fn set_active_scope(scope: Option<Rc<ScopeInner>>) -> Option<Rc<ScopeInner>> {
    ACTIVE_SCOPE.with(|s| s.replace(scope))
}

type ScopeCleanupFn = Box<dyn FnOnce()>;

// =============================================================================
// SCOPE INNER
// =============================================================================

struct ScopeInner {
    active: Cell<bool>,
    paused: Cell<bool>,
    effects: RefCell<Vec<Rc<EffectInner>>>,
    cleanups: RefCell<Vec<ScopeCleanupFn>>,
    parent: RefCell<Option<Weak<ScopeInner>>>,
    children: RefCell<Vec<Rc<ScopeInner>>>,
    self_weak: RefCell<Weak<ScopeInner>>,
}

impl ScopeInner {
    fn new(detached: bool) -> Rc<Self> {
        let parent = if detached { None } else { active_scope() };

        let scope = Rc::new(Self {
            active: Cell::new(true),
            paused: Cell::new(false),
            effects: RefCell::new(Vec::new()),
            cleanups: RefCell::new(Vec::new()),
            parent: RefCell::new(parent.as_ref().map(Rc::downgrade)),
            children: RefCell::new(Vec::new()),
            self_weak: RefCell::new(Weak::new()),
        });
        *scope.self_weak.borrow_mut() = Rc::downgrade(&scope);

        if let Some(parent) = parent {
            parent.children.borrow_mut().push(scope.clone());
        }

        scope
    }

    fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.active.get() {
            return None;
        }

        let self_rc = self.self_weak.borrow().upgrade()?;

        struct RestoreScope(Option<Option<Rc<ScopeInner>>>);

        impl Drop for RestoreScope {
            fn drop(&mut self) {
                if let Some(prev) = self.0.take() {
                    set_active_scope(prev);
                }
            }
        }

        let _restore = RestoreScope(Some(set_active_scope(Some(self_rc))));
        Some(f())
    }

    fn stop(&self) {
        if !self.active.get() {
            return;
        }
        self.active.set(false);

        flush_sync();

        let effects = std::mem::take(&mut *self.effects.borrow_mut());
        let effect_count = effects.len();
        for effect in effects {
            destroy_effect(effect, true);
        }

        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }

        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children {
            child.stop();
        }

        let parent = self.parent.borrow().as_ref().and_then(Weak::upgrade);
        let self_rc = self.self_weak.borrow().upgrade();
        if let (Some(parent), Some(self_rc)) = (parent, self_rc) {
            parent
                .children
                .borrow_mut()
                .retain(|s| !Rc::ptr_eq(s, &self_rc));
        }

        tracing::debug!(message = "scope.stop", effects = effect_count);
    }

    fn pause(&self) {
        if !self.active.get() || self.paused.get() {
            return;
        }
        self.paused.set(true);

        for effect in self.effects.borrow().iter() {
            effect.set_flags(effect.flags() | INERT);
        }
        for child in self.children.borrow().iter() {
            child.pause();
        }
    }

    fn resume(&self) {
        if !self.active.get() || !self.paused.get() {
            return;
        }
        self.paused.set(false);

        let dirty: Vec<Rc<EffectInner>> = self
            .effects
            .borrow()
            .iter()
            .filter_map(|effect| {
                let flags = effect.flags();
                effect.set_flags(flags & !INERT);
                ((flags & DIRTY) != 0).then(|| effect.clone())
            })
            .collect();

        let children: Vec<Rc<ScopeInner>> = self.children.borrow().clone();
        for child in children {
            child.resume();
        }

        for effect in dirty {
            schedule_effect(effect);
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if self.active.get() {
            self.stop();
        }
    }
}

// =============================================================================
// SCOPE HANDLE
// =============================================================================

/// A group of effects with a shared lifetime.
///
/// # Example
///
/// ```
/// use spark_store::{cell, effect, scope};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = cell(0);
/// let runs = Rc::new(Cell::new(0));
///
/// let s = scope(false);
/// s.run(|| {
///     let _ = effect({
///         let (count, runs) = (count.clone(), runs.clone());
///         move || {
///             let _ = count.read();
///             runs.set(runs.get() + 1);
///         }
///     });
/// });
///
/// count.write(1);
/// assert_eq!(runs.get(), 2);
///
/// s.stop();
/// count.write(2);
/// assert_eq!(runs.get(), 2);
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl Scope {
    /// Not yet stopped
    pub fn active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn paused(&self) -> bool {
        self.inner.paused.get()
    }

    /// Run `f` with this scope collecting the effects it creates. Returns
    /// `None` once the scope is stopped.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        self.inner.run(f)
    }

    /// Dispose every owned effect, run the dispose callbacks in reverse
    /// registration order, then stop child scopes.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Owned effects stop reacting; writes made meanwhile are remembered.
    pub fn pause(&self) {
        self.inner.pause();
    }

    /// Effects dirtied while paused run now.
    pub fn resume(&self) {
        self.inner.resume();
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if Rc::strong_count(&self.inner) == 1 {
            self.inner.stop();
        }
    }
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Create a scope. A non-detached scope created inside another scope's
/// `run` is stopped along with it.
pub fn scope(detached: bool) -> Scope {
    Scope {
        inner: ScopeInner::new(detached),
    }
}

/// The scope whose `run` is currently executing, if any.
pub fn current_scope() -> Option<Scope> {
    active_scope().map(|inner| Scope { inner })
}

/// Register `f` to run when the current scope stops. Outside a scope this
/// does nothing.
pub fn on_scope_dispose(f: impl FnOnce() + 'static) {
    match active_scope() {
        Some(scope) => scope.cleanups.borrow_mut().push(Box::new(f)),
        None => tracing::warn!("on_scope_dispose called outside of a scope"),
    }
}

pub(crate) fn register_effect_with_scope(effect: &Rc<EffectInner>) {
    if let Some(scope) = active_scope() {
        if scope.paused.get() {
            effect.set_flags(effect.flags() | INERT);
        }
        scope.effects.borrow_mut().push(effect.clone());
    }
}
