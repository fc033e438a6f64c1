// ============================================================================
// spark-fiber - Watch Effects
// Side effects that re-run when the signals they read change
// ============================================================================
//
// A watch runs once, synchronously, when created so its dependencies are
// known. After that every re-run is deferred: a write marks it dirty and
// queues it, and the next microtask flush re-runs it once no matter how
// many writes happened in between.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::core::constants::*;
use crate::core::types::{AnyReaction, AnySource};
use crate::reactivity::scheduling::schedule_watch;
use crate::reactivity::tracking::{remove_reactions, run_tracked, set_signal_status};

// =============================================================================
// TYPE ALIASES
// =============================================================================

/// Cleanup returned by a watch or an effect hook
pub type CleanupFn = Box<dyn FnOnce()>;

/// Watch body - returns an optional cleanup that runs before the next run
pub type WatchFn = Box<dyn FnMut() -> Option<CleanupFn>>;

// =============================================================================
// WATCH INNER
// =============================================================================

/// The reaction behind a [`Watch`] handle.
pub struct WatchInner {
    flags: Cell<u32>,
    run_version: Cell<u32>,
    func: RefCell<Option<WatchFn>>,
    deps: RefCell<Vec<Rc<dyn AnySource>>>,
    teardown: RefCell<Option<CleanupFn>>,
    self_weak: Weak<WatchInner>,
}

impl WatchInner {
    fn new(func: WatchFn) -> Rc<Self> {
        Rc::new_cyclic(|self_weak| Self {
            flags: Cell::new(EFFECT | DIRTY),
            run_version: Cell::new(0),
            func: RefCell::new(Some(func)),
            deps: RefCell::new(Vec::new()),
            teardown: RefCell::new(None),
            self_weak: self_weak.clone(),
        })
    }

    fn as_weak_reaction(&self) -> Weak<dyn AnyReaction> {
        self.self_weak.clone() as Weak<dyn AnyReaction>
    }

    /// Number of sources read during the last run
    pub fn dependency_count(&self) -> usize {
        self.deps.borrow().len()
    }
}

impl AnyReaction for WatchInner {
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
        let deps = self.deps.borrow();
        for dep in deps.iter() {
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
        if let Some(watch) = self.self_weak.upgrade() {
            update_watch(&watch);
        }
        false
    }

    fn run_version(&self) -> u32 {
        self.run_version.get()
    }

    fn set_run_version(&self, version: u32) {
        self.run_version.set(version);
    }

    fn notify(&self) {
        let flags = self.flags.get();
        if (flags & (QUEUED | DESTROYED)) != 0 {
            return;
        }
        self.flags.set(flags | QUEUED);
        schedule_watch(self.as_weak_reaction());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// RUN / DESTROY
// =============================================================================

fn execute_teardown(watch: &WatchInner) {
    let teardown = watch.teardown.borrow_mut().take();
    if let Some(cleanup) = teardown {
        cleanup();
    }
}

/// Run a watch body with dependency tracking.
///
/// 1. Mark clean, so writes made by the body itself re-dirty it
/// 2. Run the previous teardown
/// 3. Run the body as the active reaction
/// 4. Keep the returned teardown for next time
pub(crate) fn update_watch(watch: &Rc<WatchInner>) {
    if (watch.flags.get() & DESTROYED) != 0 {
        return;
    }

    set_signal_status(&**watch, CLEAN);
    execute_teardown(watch);

    let reaction: Rc<dyn AnyReaction> = watch.clone();
    let teardown = run_tracked(&reaction, || {
        let mut func = watch.func.borrow_mut();
        func.as_mut().and_then(|f| f())
    });

    watch.flags.set(watch.flags.get() | EFFECT_RAN);
    *watch.teardown.borrow_mut() = teardown;
}

fn destroy_watch(watch: &Rc<WatchInner>) {
    if (watch.flags.get() & DESTROYED) != 0 {
        return;
    }
    remove_reactions(watch.clone() as Rc<dyn AnyReaction>, 0);
    watch.flags.set(watch.flags.get() | DESTROYED);
    execute_teardown(watch);
    *watch.func.borrow_mut() = None;
}

// =============================================================================
// WATCH HANDLE
// =============================================================================

/// Owning handle for a watch. Dropping the last handle disposes it.
///
/// # Example
///
/// ```
/// use spark_fiber::{signal, tick, watch};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = signal(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let handle = watch({
///     let (count, seen) = (count.clone(), seen.clone());
///     move || seen.set(count.get())
/// });
/// assert_eq!(seen.get(), 0);
///
/// count.set(1);
/// count.set(2);
/// assert_eq!(seen.get(), 0); // deferred
/// tick();
/// assert_eq!(seen.get(), 2);
///
/// handle.dispose();
/// count.set(3);
/// tick();
/// assert_eq!(seen.get(), 2);
/// ```
#[derive(Clone)]
pub struct Watch {
    inner: Rc<WatchInner>,
}

impl Watch {
    /// Stop the watch and run its pending teardown.
    pub fn dispose(&self) {
        destroy_watch(&self.inner);
    }

    /// Whether the watch has been disposed.
    pub fn is_disposed(&self) -> bool {
        (self.inner.flags.get() & DESTROYED) != 0
    }

    /// Get the inner reaction
    pub fn inner(&self) -> &Rc<WatchInner> {
        &self.inner
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        if Rc::strong_count(&self.inner) == 1 {
            destroy_watch(&self.inner);
        }
    }
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch")
            .field("deps", &self.inner.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Create a watch that re-runs (deferred) whenever a signal it read changes.
pub fn watch<F>(mut f: F) -> Watch
where
    F: FnMut() + 'static,
{
    watch_with_cleanup(move || {
        f();
        None
    })
}

/// Create a watch whose body may return a cleanup. The cleanup runs before
/// the next run and on dispose.
pub fn watch_with_cleanup<F>(f: F) -> Watch
where
    F: FnMut() -> Option<CleanupFn> + 'static,
{
    let inner = WatchInner::new(Box::new(f));
    update_watch(&inner);
    Watch { inner }
}

// =============================================================================
// TESTS
// =============================================================================
