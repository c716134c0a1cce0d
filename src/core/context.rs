// ============================================================================
// spark-store - Runtime Context
// Thread-local state for the running computation, batching and scheduling
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::types::AnyReaction;

// =============================================================================
// RUNTIME CONTEXT
// =============================================================================

/// All global reactive state for the current thread.
pub struct RuntimeContext {
    /// Computation currently executing its body
    pub active_reaction: RefCell<Option<Weak<dyn AnyReaction>>>,

    /// Reads inside `untrack` do not subscribe
    pub untracking: Cell<bool>,

    /// Stamp of the running computation's current run; a cell carrying the
    /// same stamp was already linked during this run
    pub read_version: Cell<u32>,

    /// Monotonic allocator for run stamps
    pub next_read_version: Cell<u32>,

    /// Depth of nested batched update scopes
    pub batch_depth: Cell<u32>,

    /// Effects waiting for the current batch or flush to finish
    pub pending_effects: RefCell<Vec<Weak<dyn AnyReaction>>>,

    /// A flush loop is running on this thread
    pub is_flushing: Cell<bool>,
}

impl RuntimeContext {
    pub fn new() -> Self {
        Self {
            active_reaction: RefCell::new(None),
            untracking: Cell::new(false),
            read_version: Cell::new(0),
            next_read_version: Cell::new(0),
            batch_depth: Cell::new(0),
            pending_effects: RefCell::new(Vec::new()),
            is_flushing: Cell::new(false),
        }
    }

    // =========================================================================
    // ACTIVE COMPUTATION
    // =========================================================================

    /// Set the active reaction, returning the previous one
    pub fn set_active_reaction(
        &self,
        reaction: Option<Weak<dyn AnyReaction>>,
    ) -> Option<Weak<dyn AnyReaction>> {
        self.active_reaction.replace(reaction)
    }

    pub fn active_reaction(&self) -> Option<Rc<dyn AnyReaction>> {
        self.active_reaction.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn has_active_reaction(&self) -> bool {
        self.active_reaction.borrow().is_some()
    }

    /// Set untracking mode, returning the previous value
    pub fn set_untracking(&self, value: bool) -> bool {
        self.untracking.replace(value)
    }

    pub fn is_untracking(&self) -> bool {
        self.untracking.get()
    }

    /// Tracked reads register dependencies right now
    pub fn is_tracking(&self) -> bool {
        self.has_active_reaction() && !self.is_untracking()
    }

    // =========================================================================
    // DEPENDENCY COLLECTION
    // =========================================================================

    /// Start a run with a fresh stamp, returning the stamp it replaces.
    ///
    /// Stamps are never reused, so a nested run cannot make the outer run
    /// skip a cell it has not linked yet.
    pub fn begin_read_cycle(&self) -> u32 {
        let next = self.next_read_version.get().wrapping_add(1);
        self.next_read_version.set(next);
        self.read_version.replace(next)
    }

    /// Restore the stamp returned by `begin_read_cycle`
    pub fn end_read_cycle(&self, prev: u32) {
        self.read_version.set(prev);
    }

    pub fn get_read_version(&self) -> u32 {
        self.read_version.get()
    }

    // =========================================================================
    // BATCHING
    // =========================================================================

    /// Enter a batched scope, returns the new depth
    pub fn enter_batch(&self) -> u32 {
        let depth = self.batch_depth.get() + 1;
        self.batch_depth.set(depth);
        depth
    }

    /// Leave a batched scope, returns the new depth
    pub fn exit_batch(&self) -> u32 {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        depth
    }

    pub fn get_batch_depth(&self) -> u32 {
        self.batch_depth.get()
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth.get() > 0
    }

    // =========================================================================
    // SCHEDULING
    // =========================================================================

    pub fn add_pending_effect(&self, effect: Weak<dyn AnyReaction>) {
        self.pending_effects.borrow_mut().push(effect);
    }

    pub fn take_pending_effects(&self) -> Vec<Weak<dyn AnyReaction>> {
        self.pending_effects.replace(Vec::new())
    }

    pub fn has_pending_effects(&self) -> bool {
        !self.pending_effects.borrow().is_empty()
    }

    /// Set the flushing flag, returning the previous value
    pub fn set_flushing(&self, value: bool) -> bool {
        self.is_flushing.replace(value)
    }

    pub fn is_flushing(&self) -> bool {
        self.is_flushing.get()
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// THREAD-LOCAL ACCESS
// =============================================================================

thread_local! {
    static CONTEXT: RuntimeContext = RuntimeContext::new();
}

/// Access the thread-local runtime context.
///
/// Never call back into the reactive system from inside `f`; take what you
/// need, return, then act on it.
pub fn with_context<R>(f: impl FnOnce(&RuntimeContext) -> R) -> R {
    CONTEXT.with(f)
}

/// True inside a tracked computation that is not untracking
pub fn is_tracking() -> bool {
    with_context(|ctx| ctx.is_tracking())
}

/// True inside `untrack`
pub fn is_untracking() -> bool {
    with_context(|ctx| ctx.is_untracking())
}

/// True inside a batched update scope
pub fn is_batching() -> bool {
    with_context(|ctx| ctx.is_batching())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context() {
        with_context(|ctx| {
            assert!(!ctx.has_active_reaction());
            assert!(!ctx.is_untracking());
            assert!(!ctx.is_flushing());
            assert_eq!(ctx.get_batch_depth(), 0);
        });
        assert!(!is_tracking());
        assert!(!is_batching());
    }

    #[test]
    fn batch_depth_nests() {
        with_context(|ctx| {
            assert_eq!(ctx.enter_batch(), 1);
            assert_eq!(ctx.enter_batch(), 2);
            assert!(ctx.is_batching());
            assert_eq!(ctx.exit_batch(), 1);
            assert_eq!(ctx.exit_batch(), 0);
            assert!(!ctx.is_batching());
            assert_eq!(ctx.exit_batch(), 0);
        });
    }

    #[test]
    fn untracking_flag_round_trips() {
        with_context(|ctx| {
            assert!(!ctx.set_untracking(true));
            assert!(ctx.is_untracking());
            assert!(ctx.set_untracking(false));
        });
    }

    #[test]
    fn read_cycles_never_reuse_stamps() {
        with_context(|ctx| {
            let outer_prev = ctx.begin_read_cycle();
            let outer = ctx.get_read_version();

            let inner_prev = ctx.begin_read_cycle();
            let inner = ctx.get_read_version();
            assert_eq!(inner_prev, outer);
            ctx.end_read_cycle(inner_prev);
            assert_eq!(ctx.get_read_version(), outer);
            ctx.end_read_cycle(outer_prev);

            ctx.begin_read_cycle();
            let later = ctx.get_read_version();
            assert_ne!(later, outer);
            assert_ne!(later, inner);
        });
    }
}
