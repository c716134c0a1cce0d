// ============================================================================
// spark-store - Batching
// Batched update scopes and untracked reads
// ============================================================================

use crate::core::context::with_context;
use crate::reactivity::scheduling::flush_sync;

// =============================================================================
// BATCH
// =============================================================================

/// Run `f` as one batched update scope.
///
/// Writes inside the scope apply immediately, but dependents are only run
/// once the outermost scope exits, after every write is visible. Nested
/// scopes coalesce into the outermost one.
///
/// # Example
///
/// ```
/// use spark_store::{batch, cell, effect};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let a = cell(1);
/// let b = cell(2);
/// let runs = Rc::new(Cell::new(0));
///
/// let _e = effect({
///     let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
///     move || {
///         let _ = a.read() + b.read();
///         runs.set(runs.get() + 1);
///     }
/// });
/// assert_eq!(runs.get(), 1);
///
/// batch(|| {
///     a.write(10);
///     b.write(20);
/// });
/// assert_eq!(runs.get(), 2);
/// ```
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    with_context(|ctx| ctx.enter_batch());

    // Closes the scope even if `f` panics; targets may then be partially
    // mutated, which is not recovered.
    struct BatchGuard;

    impl Drop for BatchGuard {
        fn drop(&mut self) {
            let should_flush = with_context(|ctx| ctx.exit_batch() == 0 && !ctx.is_flushing());
            if should_flush && !std::thread::panicking() {
                flush_sync();
            }
        }
    }

    let _guard = BatchGuard;
    f()
}

// =============================================================================
// UNTRACK
// =============================================================================

/// Run `f` without subscribing the current computation to anything it reads.
///
/// # Example
///
/// ```
/// use spark_store::{cell, effect, untrack};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let a = cell(1);
/// let runs = Rc::new(Cell::new(0));
///
/// let _e = effect({
///     let (a, runs) = (a.clone(), runs.clone());
///     move || {
///         let _ = untrack(|| a.read());
///         runs.set(runs.get() + 1);
///     }
/// });
///
/// a.write(2);
/// assert_eq!(runs.get(), 1);
/// ```
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let prev = with_context(|ctx| ctx.set_untracking(true));

    struct UntrackGuard {
        prev: bool,
    }

    impl Drop for UntrackGuard {
        fn drop(&mut self) {
            with_context(|ctx| ctx.set_untracking(self.prev));
        }
    }

    let _guard = UntrackGuard { prev };
    f()
}

/// Alias for [`untrack`].
pub fn peek<T>(f: impl FnOnce() -> T) -> T {
    untrack(f)
}
