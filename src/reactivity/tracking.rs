// ============================================================================
// spark-fiber - Dependency Tracking
// Tracking reads, propagating writes and wiring dependencies after a run
// ============================================================================
//
// The key challenge in Rust is borrow scoping: RefCell borrows on a source's
// reaction list must be released before any reaction is touched, so every
// walk uses the "collect-then-mutate" pattern.
// ============================================================================

use std::collections::HashSet;
use std::rc::{Rc, Weak};

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::{AnyReaction, AnySource};
use crate::primitives::computed::update_computed_chain;

// =============================================================================
// TRACK READ - Register dependency when reading a source
// =============================================================================

/// Track a read of a source, registering it as a dependency if inside a reaction.
///
/// Called by `Signal::get()` and `Computed::get()` after the value is current.
/// Disposed sources are never tracked.
pub fn track_read(source: Rc<dyn AnySource>) {
    if source.is_disposed() {
        return;
    }

    with_context(|ctx| {
        if ctx.is_untracking() {
            return;
        }

        let Some(reaction) = ctx.current_reaction().and_then(|weak| weak.upgrade()) else {
            return;
        };

        if reaction.is_destroyed() {
            return;
        }

        if (reaction.flags() & REACTION_IS_UPDATING) != 0 {
            // Each run has a unique read version and nested runs restore the
            // outer one, so a mismatch means "not yet read in this run".
            let read_version = ctx.current_read();
            if source.read_version() != read_version {
                source.set_read_version(read_version);
                ctx.record_dep(source);
            }
        } else {
            let target = Rc::as_ptr(&source) as *const ();
            let mut exists = false;
            reaction.for_each_dep(&mut |dep| {
                exists = Rc::as_ptr(dep) as *const () == target;
                !exists
            });

            if !exists {
                reaction.add_dep(source.clone());
                source.add_reaction(Rc::downgrade(&reaction));
            }
        }
    });
}

// =============================================================================
// NOTIFY WRITE - Called when a source's value changes
// =============================================================================

/// Notify the reactive graph that a source's value has changed.
///
/// Called by `Signal::set()` after the value and write version are updated.
pub fn notify_write(source: Rc<dyn AnySource>) {
    let inside_computed = with_context(|ctx| {
        ctx.current_reaction()
            .and_then(|weak| weak.upgrade())
            .is_some_and(|reaction| reaction.is_derived())
    });
    if inside_computed {
        tracing::warn!("signal written while evaluating a computed; computeds should be pure");
    }

    mark_reactions(source, DIRTY);
}

// =============================================================================
// MARK REACTIONS - Propagate dirty state through the graph
// =============================================================================

/// Mark all reactions of a source with the given status.
///
/// Direct dependents get `status` (usually DIRTY); dependents of computeds
/// get MAYBE_DIRTY. Every reaction that leaves the clean state is notified
/// once, after the whole walk: watches queue themselves and components
/// request a re-render. Delivery goes to a snapshot, so subscribers added by
/// a notification are not visited.
///
/// Iterative with an explicit stack so deep computed chains cannot overflow.
pub fn mark_reactions(source: Rc<dyn AnySource>, status: u32) {
    let mut to_notify: Vec<Rc<dyn AnyReaction>> = Vec::new();
    let mut stack: Vec<(Rc<dyn AnySource>, u32)> = vec![(source, status)];

    while let Some((current_source, current_status)) = stack.pop() {
        current_source.cleanup_dead_reactions();

        let reactions: Vec<Rc<dyn AnyReaction>> = {
            let mut collected = Vec::new();
            current_source.for_each_reaction(&mut |reaction| {
                collected.push(reaction);
                true
            });
            collected
        };

        for reaction in reactions {
            let flags = reaction.flags();
            if (flags & DESTROYED) != 0 {
                continue;
            }

            // Never downgrade DIRTY to MAYBE_DIRTY
            let not_dirty = (flags & DIRTY) == 0;
            if not_dirty {
                set_signal_status(&*reaction, current_status);
            }

            if (flags & DERIVED) != 0 {
                if let Some(computed_as_source) = reaction.as_derived_source() {
                    stack.push((computed_as_source, MAYBE_DIRTY));
                }
            } else if not_dirty && (flags & (EFFECT | COMPONENT)) != 0 {
                to_notify.push(reaction);
            }
        }
    }

    for reaction in to_notify {
        reaction.notify();
    }
}

// =============================================================================
// STATUS HELPERS
// =============================================================================

/// Set the status flags of a reaction (CLEAN, DIRTY, MAYBE_DIRTY).
pub fn set_signal_status(target: &dyn AnyReaction, status: u32) {
    target.set_flags(with_status(target.flags(), status));
}

/// Set status on an AnySource
pub fn set_source_status(target: &dyn AnySource, status: u32) {
    target.set_flags(with_status(target.flags(), status));
}

// =============================================================================
// IS DIRTY - Check if a reaction needs to re-run
// =============================================================================

/// Check if a reaction is dirty and needs to be re-run.
///
/// - DIRTY: definitely needs a run
/// - MAYBE_DIRTY: bring computed deps up to date, then compare their write
///   versions against the version recorded at the reaction's last run
/// - CLEAN: nothing to do
///
/// A MAYBE_DIRTY reaction found unchanged is marked clean.
pub fn is_dirty(reaction: &dyn AnyReaction) -> bool {
    let flags = reaction.flags();

    if (flags & DIRTY) != 0 {
        return true;
    }
    if (flags & MAYBE_DIRTY) == 0 {
        return false;
    }

    let deps: Vec<Rc<dyn AnySource>> = {
        let mut collected = Vec::new();
        reaction.for_each_dep(&mut |dep| {
            collected.push(dep.clone());
            true
        });
        collected
    };

    let last_run = reaction.run_version();
    for dep in deps {
        if dep.is_derived() {
            update_computed_chain(dep.clone());
        }
        if dep.write_version() > last_run {
            return true;
        }
    }

    set_signal_status(reaction, CLEAN);
    false
}

// =============================================================================
// REMOVE REACTIONS - Clean up stale dependencies
// =============================================================================

/// Unsubscribe a reaction from its dependencies, starting at `start`.
pub fn remove_reactions(reaction: Rc<dyn AnyReaction>, start: usize) {
    let deps_to_remove: Vec<Rc<dyn AnySource>> = {
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

    for dep in deps_to_remove {
        dep.remove_reaction(&reaction);
    }

    reaction.remove_deps_from(start);
}

// =============================================================================
// INSTALL DEPENDENCIES - Wire up deps after a run
// =============================================================================

/// Replace a reaction's dependency list with the sources read during its
/// latest run. Sources no longer read are unsubscribed.
pub fn install_dependencies(reaction: Rc<dyn AnyReaction>, new_deps: Vec<Rc<dyn AnySource>>) {
    remove_reactions(reaction.clone(), 0);

    let mut seen: HashSet<*const ()> = HashSet::with_capacity(new_deps.len());
    for dep in new_deps {
        if !seen.insert(Rc::as_ptr(&dep) as *const ()) {
            continue;
        }
        dep.add_reaction(Rc::downgrade(&reaction));
        reaction.add_dep(dep);
    }
}

// =============================================================================
// RUN TRACKED - Execute a reaction body with dependency collection
// =============================================================================

/// Restores the outer tracking state, including on unwind.
struct TrackingScope {
    prev_reaction: Option<Option<Weak<dyn AnyReaction>>>,
    prev_deps: Option<Vec<Rc<dyn AnySource>>>,
    prev_untracking: bool,
    prev_read_version: u32,
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        with_context(|ctx| {
            if let Some(reaction) = self.prev_reaction.take() {
                ctx.swap_reaction(reaction);
            }
            if let Some(deps) = self.prev_deps.take() {
                ctx.swap_new_deps(deps);
            }
            ctx.swap_untracking(self.prev_untracking);
            ctx.restore_read(self.prev_read_version);
        });
    }
}

/// Run `f` with `reaction` as the active reaction, then install the sources
/// it read as the reaction's dependencies.
///
/// Status flags are left to the caller. The run version is stamped after `f`
/// returns, so sources written during the run do not make it stale.
pub fn run_tracked<R>(reaction: &Rc<dyn AnyReaction>, f: impl FnOnce() -> R) -> R {
    let scope = with_context(|ctx| {
        let scope = TrackingScope {
            prev_reaction: Some(ctx.swap_reaction(Some(Rc::downgrade(reaction)))),
            prev_deps: Some(ctx.swap_new_deps(Vec::new())),
            prev_untracking: ctx.swap_untracking(false),
            prev_read_version: ctx.current_read(),
        };
        ctx.begin_read();
        scope
    });

    reaction.set_flags(reaction.flags() | REACTION_IS_UPDATING);
    let result = f();
    reaction.set_flags(reaction.flags() & !REACTION_IS_UPDATING);

    let new_deps = with_context(|ctx| {
        reaction.set_run_version(ctx.current_write());
        ctx.swap_new_deps(Vec::new())
    });
    drop(scope);

    install_dependencies(reaction.clone(), new_deps);
    result
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::computed::computed;
    use crate::primitives::signal::signal;
    use std::any::Any;
    use std::cell::{Cell, RefCell};

    /// Minimal reaction recording how often it was notified.
    struct Spy {
        flags: Cell<u32>,
        run_version: Cell<u32>,
        deps: RefCell<Vec<Rc<dyn AnySource>>>,
        notified: Cell<u32>,
    }

    impl Spy {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                flags: Cell::new(COMPONENT | CLEAN),
                run_version: Cell::new(0),
                deps: RefCell::new(Vec::new()),
                notified: Cell::new(0),
            })
        }
    }

    impl AnyReaction for Spy {
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
        fn clear_deps(&self) {
            self.deps.borrow_mut().clear();
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
        fn remove_source(&self, source: &Rc<dyn AnySource>) {
            let target = Rc::as_ptr(source) as *const ();
            self.deps
                .borrow_mut()
                .retain(|dep| Rc::as_ptr(dep) as *const () != target);
        }
        fn update(&self) -> bool {
            false
        }
        fn run_version(&self) -> u32 {
            self.run_version.get()
        }
        fn set_run_version(&self, version: u32) {
            self.run_version.set(version);
        }
        fn notify(&self) {
            self.notified.set(self.notified.get() + 1);
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn run_spy(spy: &Rc<Spy>, f: impl FnOnce()) {
        let reaction: Rc<dyn AnyReaction> = spy.clone();
        set_signal_status(&*reaction, CLEAN);
        run_tracked(&reaction, f);
    }

    #[test]
    fn run_tracked_collects_each_source_once() {
        let a = signal(1);
        let b = signal(2);
        let spy = Spy::new();

        run_spy(&spy, || {
            a.get();
            b.get();
            a.get();
        });

        assert_eq!(spy.dep_count(), 2);
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 1);
    }

    #[test]
    fn rerun_prunes_unread_sources() {
        let flag = signal(true);
        let a = signal(1);
        let b = signal(2);
        let spy = Spy::new();

        let read = |spy: &Rc<Spy>| {
            run_spy(spy, || {
                if flag.get() {
                    a.get();
                } else {
                    b.get();
                }
            })
        };

        read(&spy);
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 0);

        flag.set(false);
        read(&spy);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 1);
    }

    #[test]
    fn notification_fires_once_until_rerun() {
        let count = signal(0);
        let spy = Spy::new();
        run_spy(&spy, || {
            count.get();
        });

        count.set(1);
        count.set(2);
        assert_eq!(spy.notified.get(), 1);

        run_spy(&spy, || {
            count.get();
        });
        count.set(3);
        assert_eq!(spy.notified.get(), 2);
    }

    #[test]
    fn equal_write_notifies_nobody() {
        let count = signal(5);
        let spy = Spy::new();
        run_spy(&spy, || {
            count.get();
        });

        assert!(!count.set(5));
        assert_eq!(spy.notified.get(), 0);
    }

    #[test]
    fn unchanged_computed_leaves_reaction_clean() {
        let count = signal(2);
        let parity = computed({
            let count = count.clone();
            move || count.get() % 2
        });
        let spy = Spy::new();
        run_spy(&spy, || {
            parity.get();
        });

        count.set(4);
        assert_eq!(spy.notified.get(), 1);
        assert!(spy.is_maybe_dirty());
        assert!(!is_dirty(&*spy));
        assert!(spy.is_clean());

        count.set(5);
        assert!(is_dirty(&*spy));
    }

    #[test]
    fn nested_run_restores_outer_reaction() {
        let outer = Spy::new();
        let inner = Spy::new();
        let a = signal(1);
        let b = signal(2);

        run_spy(&outer, || {
            a.get();
            run_spy(&inner, || {
                b.get();
            });
            // Read after the nested run still lands on the outer reaction
            b.get();
        });

        assert_eq!(outer.dep_count(), 2);
        assert_eq!(inner.dep_count(), 1);
        assert!(!with_context(|ctx| ctx.in_reaction()));
    }
}
