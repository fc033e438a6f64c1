// ============================================================================
// spark-fiber - Batching & Untracking
// batch(), untrack(), peek() and tick()
// ============================================================================

use crate::core::context::with_context;
use crate::reactivity::scheduling::{flush_microtasks, flush_pending_reactions};

// =============================================================================
// BATCH
// =============================================================================

/// Group several writes so dirty watches run once, synchronously, when the
/// outermost batch ends instead of on the microtask queue.
///
/// Component re-renders are unaffected: they always go through the scheduler.
///
/// # Example
///
/// ```
/// use spark_fiber::{batch, signal, watch};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let a = signal(1);
/// let b = signal(2);
/// let runs = Rc::new(Cell::new(0));
///
/// let _watch = watch({
///     let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
///     move || {
///         a.get();
///         b.get();
///         runs.set(runs.get() + 1);
///     }
/// });
/// assert_eq!(runs.get(), 1);
///
/// batch(|| {
///     a.set(10);
///     b.set(20);
/// });
/// assert_eq!(runs.get(), 2);
/// ```
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    struct BatchGuard;

    impl Drop for BatchGuard {
        fn drop(&mut self) {
            if with_context(|ctx| ctx.exit_batch()) == 0 {
                flush_pending_reactions();
            }
        }
    }

    with_context(|ctx| ctx.enter_batch());
    let _guard = BatchGuard;
    f()
}

/// Check if currently inside `batch()`.
pub fn is_batching() -> bool {
    with_context(|ctx| ctx.is_batching())
}

// =============================================================================
// UNTRACK / PEEK
// =============================================================================

/// Run a closure without tracking dependencies.
///
/// Reads inside `f` do not subscribe the surrounding component, computed or
/// watch.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    struct UntrackGuard {
        prev: bool,
    }

    impl Drop for UntrackGuard {
        fn drop(&mut self) {
            with_context(|ctx| ctx.swap_untracking(self.prev));
        }
    }

    let prev = with_context(|ctx| ctx.swap_untracking(true));
    let _guard = UntrackGuard { prev };
    f()
}

/// Alias for `untrack()`.
pub fn peek<T>(f: impl FnOnce() -> T) -> T {
    untrack(f)
}

/// Check if currently in untrack mode.
pub fn is_untracking() -> bool {
    with_context(|ctx| ctx.is_untracking())
}

// =============================================================================
// TICK
// =============================================================================

/// Drain the microtask queue: pending watches and passive effects run.
///
/// Hosts call this once per event-loop turn; tests call it to observe
/// deferred work.
pub fn tick() {
    flush_microtasks();
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::signal::signal;
    use crate::primitives::watch::watch;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn untracked_read_does_not_subscribe() {
        let a = signal(1);
        let b = signal(2);
        let runs = Rc::new(Cell::new(0));

        let _w = watch({
            let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
            move || {
                a.get();
                untrack(|| b.get());
                runs.set(runs.get() + 1);
            }
        });
        assert_eq!(runs.get(), 1);

        b.set(20);
        tick();
        assert_eq!(runs.get(), 1);

        a.set(10);
        tick();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn nested_batches_flush_once_at_outermost_exit() {
        let a = signal(0);
        let runs = Rc::new(Cell::new(0));
        let _w = watch({
            let (a, runs) = (a.clone(), runs.clone());
            move || {
                a.get();
                runs.set(runs.get() + 1);
            }
        });

        batch(|| {
            a.set(1);
            batch(|| a.set(2));
            assert_eq!(runs.get(), 1);
            assert!(is_batching());
        });

        assert_eq!(runs.get(), 2);
        assert!(!is_batching());
    }

    #[test]
    fn untrack_restores_previous_state() {
        assert!(!is_untracking());
        untrack(|| {
            assert!(is_untracking());
            peek(|| assert!(is_untracking()));
            assert!(is_untracking());
        });
        assert!(!is_untracking());
    }
}
