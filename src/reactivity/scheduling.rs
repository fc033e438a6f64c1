// ============================================================================
// spark-fiber - Scheduling
// The microtask queue and deferred watch execution
// ============================================================================
//
// Watches never run inside the write that dirtied them. A dirty watch joins
// the pending list and a single flush is queued as a microtask; hosts drain
// the queue with `flush_microtasks()` (or `tick()`) between event-loop turns.
// Passive effects of a commit ride on the same queue. Work that yielded to
// the host parks on a second queue, so a drain never chases a continuation
// it just produced; the next drain promotes it.
// ============================================================================

use std::rc::Weak;

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::AnyReaction;
use crate::reactivity::tracking::is_dirty;

// =============================================================================
// MICROTASK QUEUE
// =============================================================================

/// Queue a task to run on the next `flush_microtasks()`.
pub fn queue_microtask(task: impl FnOnce() + 'static) {
    with_context(|ctx| ctx.push_microtask(Box::new(task)));
}

/// Queue a task for the next drain. A drain already in progress does not
/// run it.
pub fn queue_next_flush(task: impl FnOnce() + 'static) {
    with_context(|ctx| ctx.push_next_flush(Box::new(task)));
}

/// Whether any microtask is waiting, parked ones included.
pub fn has_pending_microtasks() -> bool {
    with_context(|ctx| ctx.microtask_count() > 0)
}

/// Clears the flushing flag even if a task panics.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        with_context(|ctx| ctx.is_flushing.set(false));
    }
}

/// Drain the microtask queue, including tasks queued while draining.
///
/// Returns the number of tasks run. A nested call made from inside a task
/// returns 0 immediately; the outer drain picks up whatever was queued.
pub fn flush_microtasks() -> usize {
    flush_microtasks_with_limit(MAX_FLUSH_COUNT)
}

/// Like [`flush_microtasks`], but gives up after `limit` tasks. The remaining
/// queue is dropped and an error is logged. Tasks parked with
/// [`queue_next_flush`] before the call run in it; tasks parked during it
/// wait for the next one.
pub fn flush_microtasks_with_limit(limit: u32) -> usize {
    if with_context(|ctx| ctx.is_flushing.replace(true)) {
        return 0;
    }
    let _guard = FlushGuard;
    with_context(|ctx| ctx.promote_next_flush());

    let mut ran: usize = 0;
    while let Some(task) = with_context(|ctx| ctx.pop_microtask()) {
        if ran >= limit as usize {
            // Dropped outside the queue borrow: a task's destructor may queue
            let abandoned = with_context(|ctx| std::mem::take(&mut *ctx.microtasks.borrow_mut()));
            tracing::error!(
                limit,
                dropped = abandoned.len() + 1,
                "microtask queue kept refilling; dropping remaining tasks"
            );
            drop(task);
            drop(abandoned);
            // A dropped watch flush would leave `flush_scheduled` stuck
            with_context(|ctx| {
                if ctx.flush_scheduled.get() {
                    ctx.push_next_flush(Box::new(flush_pending_reactions));
                }
            });
            break;
        }
        task();
        ran += 1;
    }
    ran
}

// =============================================================================
// WATCH SCHEDULING
// =============================================================================

/// Add a dirty watch to the pending list and make sure a flush is queued.
///
/// Inside `batch()` no flush is queued; the batch flushes on exit.
pub(crate) fn schedule_watch(reaction: Weak<dyn AnyReaction>) {
    with_context(|ctx| ctx.defer_watch(reaction));

    let queue = with_context(|ctx| !ctx.is_batching() && !ctx.flush_scheduled.replace(true));
    if queue {
        queue_microtask(flush_pending_reactions);
    }
}

/// Run every pending watch that is still dirty.
///
/// Watches dirtied by other watches are picked up in the same call.
pub fn flush_pending_reactions() {
    let mut iterations = 0;

    loop {
        let pending = with_context(|ctx| {
            ctx.flush_scheduled.set(false);
            ctx.take_deferred_watches()
        });
        if pending.is_empty() {
            break;
        }

        iterations += 1;
        if iterations > MAX_FLUSH_COUNT {
            tracing::error!(
                iterations,
                "watches kept re-triggering each other; abandoning the flush"
            );
            break;
        }

        for weak in pending {
            let Some(reaction) = weak.upgrade() else {
                continue;
            };
            reaction.set_flags(reaction.flags() & !QUEUED);

            if reaction.is_destroyed() {
                continue;
            }
            if is_dirty(&*reaction) {
                reaction.update();
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::signal::signal;
    use crate::primitives::watch::watch;
    use crate::reactivity::batching::tick;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn tasks_queued_while_draining_run_in_same_flush() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let outer = log.clone();
        queue_microtask(move || {
            outer.borrow_mut().push("first");
            let inner = outer.clone();
            queue_microtask(move || inner.borrow_mut().push("nested"));
        });
        let second = log.clone();
        queue_microtask(move || second.borrow_mut().push("second"));

        assert!(has_pending_microtasks());
        assert_eq!(flush_microtasks(), 3);
        assert_eq!(*log.borrow(), vec!["first", "second", "nested"]);
        assert!(!has_pending_microtasks());
    }

    #[test]
    fn nested_flush_defers_to_outer() {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        queue_microtask(move || {
            let c2 = c.clone();
            queue_microtask(move || c2.set(c2.get() + 1));
            assert_eq!(flush_microtasks(), 0);
            c.set(c.get() + 1);
        });

        assert_eq!(flush_microtasks(), 2);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn parked_tasks_wait_for_the_next_drain() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let outer = log.clone();
        queue_microtask(move || {
            outer.borrow_mut().push("now");
            let later = outer.clone();
            queue_next_flush(move || later.borrow_mut().push("later"));
        });

        assert_eq!(flush_microtasks(), 1);
        assert_eq!(*log.borrow(), vec!["now"]);
        assert!(has_pending_microtasks());

        assert_eq!(flush_microtasks(), 1);
        assert_eq!(*log.borrow(), vec!["now", "later"]);
        assert!(!has_pending_microtasks());
    }

    #[test]
    fn dropped_tasks_may_queue_from_their_destructor() {
        struct Requeue(Rc<Cell<bool>>);
        impl Drop for Requeue {
            fn drop(&mut self) {
                let ran = self.0.clone();
                queue_next_flush(move || ran.set(true));
            }
        }

        let ran = Rc::new(Cell::new(false));
        for _ in 0..3 {
            queue_microtask(|| {});
        }
        let requeue = Requeue(ran.clone());
        queue_microtask(move || drop(requeue));

        assert_eq!(flush_microtasks_with_limit(2), 2);
        assert!(!ran.get());
        assert_eq!(flush_microtasks(), 1);
        assert!(ran.get());
    }

    #[test]
    fn watch_flush_survives_a_cut_off_drain() {
        let count = signal(0);
        let seen = Rc::new(Cell::new(-1));
        let _watch = watch({
            let (count, seen) = (count.clone(), seen.clone());
            move || seen.set(count.get())
        });
        assert_eq!(seen.get(), 0);

        for _ in 0..3 {
            queue_microtask(|| {});
        }
        count.set(7);
        assert_eq!(flush_microtasks_with_limit(3), 3);
        assert_eq!(seen.get(), 0);

        tick();
        assert_eq!(seen.get(), 7);

        count.set(8);
        tick();
        assert_eq!(seen.get(), 8);
    }

    #[test]
    fn runaway_queue_is_cut_off() {
        fn requeue(counter: Rc<Cell<u32>>) {
            counter.set(counter.get() + 1);
            queue_microtask(move || requeue(counter));
        }

        let counter = Rc::new(Cell::new(0));
        let c = counter.clone();
        queue_microtask(move || requeue(c));

        assert_eq!(flush_microtasks_with_limit(10), 10);
        assert_eq!(counter.get(), 10);
        assert!(!has_pending_microtasks());
    }
}
