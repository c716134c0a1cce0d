// ============================================================================
// spark-store - Effect Scheduling
// Queueing dirty effects and draining the queue
// ============================================================================
//
// There are no microtasks in Rust, so scheduling is synchronous: a dirty
// effect runs as soon as the outermost batch closes, or immediately when no
// batch is open. A flush already in progress picks up anything queued while
// it runs.
// ============================================================================

use std::rc::Rc;

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::AnyReaction;
use crate::reactivity::tracking::is_dirty;

/// Rounds of the flush loop before a self-triggering effect is assumed
pub const MAX_FLUSH_COUNT: u32 = 1000;

/// Queue a dirty effect, flushing right away unless a batch or a flush is
/// already active.
pub fn schedule_effect(effect: Rc<dyn AnyReaction>) {
    let should_flush = with_context(|ctx| {
        ctx.add_pending_effect(Rc::downgrade(&effect));
        !ctx.is_batching() && !ctx.is_flushing()
    });

    if should_flush {
        flush_sync();
    }
}

/// Run every pending effect until the queue is empty.
///
/// Called while a flush is already running, this returns at once and the
/// running loop drains whatever was queued.
///
/// # Panics
/// Panics after [`MAX_FLUSH_COUNT`] rounds, which only happens when effects
/// keep re-dirtying each other.
pub fn flush_sync() {
    if with_context(|ctx| ctx.set_flushing(true)) {
        return;
    }

    struct FlushGuard;

    impl Drop for FlushGuard {
        fn drop(&mut self) {
            with_context(|ctx| {
                ctx.set_flushing(false);
                if std::thread::panicking() {
                    ctx.take_pending_effects();
                }
            });
        }
    }

    let _guard = FlushGuard;
    let mut rounds = 0u32;

    loop {
        let pending = with_context(|ctx| ctx.take_pending_effects());
        if pending.is_empty() {
            break;
        }

        rounds += 1;
        if rounds > MAX_FLUSH_COUNT {
            tracing::error!(
                message = "scheduler.runaway",
                rounds,
                pending = pending.len()
            );
            panic!(
                "Maximum update depth exceeded. An effect keeps writing to a \
                 cell it depends on."
            );
        }

        for weak in pending {
            let Some(effect) = weak.upgrade() else {
                continue;
            };

            let flags = effect.flags();
            if (flags & (INERT | DESTROYED)) != 0 {
                continue;
            }

            if is_dirty(&*effect) {
                effect.update();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::cell::cell;
    use crate::primitives::effect::effect;
    use crate::reactivity::batching::batch;
    use std::cell::Cell;

    #[test]
    fn flush_with_empty_queue_is_noop() {
        flush_sync();
        assert!(!with_context(|ctx| ctx.is_flushing()));
    }

    #[test]
    fn effect_written_inside_batch_runs_after_flush() {
        let count = cell(0);
        let seen = Rc::new(Cell::new(0));

        let _e = effect({
            let count = count.clone();
            let seen = seen.clone();
            move || seen.set(count.read())
        });

        batch(|| {
            count.write(3);
            assert_eq!(seen.get(), 0);
        });
        assert_eq!(seen.get(), 3);
    }

    #[test]
    #[should_panic(expected = "Maximum update depth exceeded")]
    fn runaway_effect_panics() {
        let count = cell(0);
        let _e = effect({
            let count = count.clone();
            move || {
                let v = count.read();
                if v > 0 {
                    count.write(v + 1);
                }
            }
        });

        count.write(1);
    }
}
