// ============================================================================
// spark-fiber - Computed Values
// Lazy memoized values that re-evaluate when their dependencies change
// ============================================================================
//
// A computed is BOTH a source (can be read, has subscribers) AND a reaction
// (has deps, can be marked dirty, re-evaluates). Dependents of a computed
// are only marked MAYBE_DIRTY; they re-run only if the computed's value
// actually changed when it is brought up to date.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::error::{RenderError, Result};
use crate::core::types::{AnyReaction, AnySource, EqualsFn, default_equals, remove_weak};
use crate::reactivity::tracking::{remove_reactions, run_tracked, set_source_status, track_read};

// =============================================================================
// COMPUTED INNER
// =============================================================================

/// The internal data for a computed value.
pub struct ComputedInner<T> {
    /// Flags bitmask (DERIVED | SOURCE | status)
    flags: Cell<u32>,

    fn_: Box<dyn Fn() -> T>,

    /// Cached value (None until first evaluation)
    value: RefCell<Option<T>>,

    equals: EqualsFn<T>,

    /// Bumped only when the cached value changes
    write_version: Cell<u32>,

    read_version: Cell<u32>,

    /// Write version at the end of the last evaluation
    run_version: Cell<u32>,

    /// Subscribers (source side)
    reactions: RefCell<Vec<Weak<dyn AnyReaction>>>,

    /// Dependencies (reaction side)
    deps: RefCell<Vec<Rc<dyn AnySource>>>,

    self_ref: Weak<ComputedInner<T>>,
}

impl<T: Clone + 'static> ComputedInner<T> {
    /// Create a new computed with the given evaluation function
    pub fn new<F>(fn_: F) -> Rc<Self>
    where
        F: Fn() -> T + 'static,
        T: PartialEq,
    {
        Self::new_with_equals(fn_, default_equals)
    }

    /// Create a new computed with a custom equality function
    pub fn new_with_equals<F>(fn_: F, equals: EqualsFn<T>) -> Rc<Self>
    where
        F: Fn() -> T + 'static,
    {
        Rc::new_cyclic(|self_ref| Self {
            flags: Cell::new(DERIVED | SOURCE | DIRTY),
            fn_: Box::new(fn_),
            value: RefCell::new(None),
            equals,
            write_version: Cell::new(0),
            read_version: Cell::new(0),
            run_version: Cell::new(0),
            reactions: RefCell::new(Vec::new()),
            deps: RefCell::new(Vec::new()),
            self_ref: self_ref.clone(),
        })
    }

    /// Get the cached value, evaluating untracked if it was never computed.
    pub fn get_value(&self) -> T {
        if let Some(value) = self.value.borrow().as_ref() {
            return value.clone();
        }
        (self.fn_)()
    }

    /// Check if the value has been computed at least once
    pub fn is_initialized(&self) -> bool {
        self.value.borrow().is_some()
    }

    /// Run the evaluation function and update the cached value.
    /// Returns true if the value changed.
    pub fn compute(&self) -> bool {
        let new_value = (self.fn_)();

        let changed = match self.value.borrow().as_ref() {
            Some(current) => !(self.equals)(current, &new_value),
            None => true,
        };

        if changed {
            *self.value.borrow_mut() = Some(new_value);
            with_context(|ctx| {
                self.write_version.set(ctx.bump_write_version());
            });
        }

        changed
    }
}

impl<T: Clone + 'static> AnySource for ComputedInner<T> {
    fn flags(&self) -> u32 {
        self.flags.get()
    }

    fn set_flags(&self, flags: u32) {
        self.flags.set(flags);
    }

    fn write_version(&self) -> u32 {
        self.write_version.get()
    }

    fn set_write_version(&self, version: u32) {
        self.write_version.set(version);
    }

    fn read_version(&self) -> u32 {
        self.read_version.get()
    }

    fn set_read_version(&self, version: u32) {
        self.read_version.set(version);
    }

    fn reaction_count(&self) -> usize {
        self.reactions.borrow().len()
    }

    fn add_reaction(&self, reaction: Weak<dyn AnyReaction>) {
        self.reactions.borrow_mut().push(reaction);
    }

    fn cleanup_dead_reactions(&self) {
        self.reactions.borrow_mut().retain(|w| w.strong_count() > 0);
    }

    fn for_each_reaction(&self, f: &mut dyn FnMut(Rc<dyn AnyReaction>) -> bool) {
        let reactions = self.reactions.borrow();
        for weak in reactions.iter() {
            if let Some(rc) = weak.upgrade() {
                if !f(rc) {
                    break;
                }
            }
        }
    }

    fn remove_reaction(&self, reaction: &Rc<dyn AnyReaction>) {
        remove_weak(&self.reactions, reaction);
    }

    fn clear_reactions(&self) {
        self.reactions.borrow_mut().clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_derived_reaction(&self) -> Option<Rc<dyn AnyReaction>> {
        self.self_ref
            .upgrade()
            .map(|rc| rc as Rc<dyn AnyReaction>)
    }
}

impl<T: Clone + 'static> AnyReaction for ComputedInner<T> {
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
        self.compute()
    }

    fn run_version(&self) -> u32 {
        self.run_version.get()
    }

    fn set_run_version(&self, version: u32) {
        self.run_version.set(version);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_derived_source(&self) -> Option<Rc<dyn AnySource>> {
        self.self_ref.upgrade().map(|rc| rc as Rc<dyn AnySource>)
    }
}

// =============================================================================
// COMPUTED<T> WRAPPER
// =============================================================================

/// A lazily evaluated, memoized value derived from other signals.
///
/// # Example
/// ```
/// use spark_fiber::{computed, signal};
///
/// let count = signal(5);
/// let double = computed({
///     let count = count.clone();
///     move || count.get() * 2
/// });
/// assert_eq!(double.get(), 10);
///
/// count.set(6);
/// assert_eq!(double.get(), 12);
/// ```
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Get the value, re-evaluating first if a dependency changed.
    /// Inside a reaction, registers this computed as a dependency.
    pub fn get(&self) -> T {
        if !self.is_disposed() {
            update_computed_chain(self.inner.clone() as Rc<dyn AnySource>);
            track_read(self.inner.clone() as Rc<dyn AnySource>);
        }
        self.inner.get_value()
    }

    /// Access the current value with a closure.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.get();
        f(&value)
    }

    /// Computeds cannot be written. Always returns
    /// [`RenderError::ReadOnlySignal`].
    pub fn try_write(&self, _value: T) -> Result<()> {
        tracing::warn!("attempted to write a computed value");
        Err(RenderError::ReadOnlySignal)
    }

    /// Unsubscribe from every dependency and drop all subscribers.
    /// The last value stays readable.
    pub fn dispose(&self) {
        if self.is_disposed() {
            return;
        }
        let reaction = self.as_any_reaction();
        reaction.mark_destroyed();
        remove_reactions(reaction, 0);
        self.inner.clear_reactions();
    }

    /// Whether `dispose()` was called.
    pub fn is_disposed(&self) -> bool {
        AnyReaction::is_destroyed(&*self.inner)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.cleanup_dead_reactions();
        self.inner.reaction_count()
    }

    /// Number of sources read during the last evaluation.
    pub fn dependency_count(&self) -> usize {
        self.inner.dep_count()
    }

    /// Get access to the inner for graph operations
    pub fn inner(&self) -> &Rc<ComputedInner<T>> {
        &self.inner
    }

    /// Convert to type-erased AnySource
    pub fn as_any_source(&self) -> Rc<dyn AnySource> {
        self.inner.clone() as Rc<dyn AnySource>
    }

    /// Convert to type-erased AnyReaction
    pub fn as_any_reaction(&self) -> Rc<dyn AnyReaction> {
        self.inner.clone() as Rc<dyn AnyReaction>
    }
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Create a computed value.
pub fn computed<T, F>(fn_: F) -> Computed<T>
where
    T: Clone + PartialEq + 'static,
    F: Fn() -> T + 'static,
{
    Computed {
        inner: ComputedInner::new(fn_),
    }
}

/// Create a computed value with a custom equality function.
pub fn computed_with_equals<T, F>(fn_: F, equals: EqualsFn<T>) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    Computed {
        inner: ComputedInner::new_with_equals(fn_, equals),
    }
}

// =============================================================================
// UPDATE COMPUTED CHAIN - The MAYBE_DIRTY optimization
// =============================================================================

/// Bring a computed and all its dirty computed dependencies up to date.
///
/// 1. Collect all dirty/maybe-dirty computeds in the dependency chain
/// 2. Process from deepest (closest to signals) to shallowest (target)
/// 3. DIRTY: always re-evaluate
/// 4. MAYBE_DIRTY: re-evaluate only if a dep changed since the last run
///
/// Iterative to avoid stack overflow on deep chains.
pub fn update_computed_chain(target: Rc<dyn AnySource>) {
    if (target.flags() & (DIRTY | MAYBE_DIRTY)) == 0 || target.is_disposed() {
        return;
    }

    let mut chain: Vec<Rc<dyn AnySource>> = vec![target.clone()];
    let mut visited: Vec<*const ()> = vec![Rc::as_ptr(&target) as *const ()];
    let mut idx = 0;

    while idx < chain.len() {
        let current = chain[idx].clone();
        idx += 1;

        if (current.flags() & (DIRTY | MAYBE_DIRTY)) == 0 {
            continue;
        }

        if let Some(reaction) = current.as_derived_reaction() {
            let mut deps_to_add = Vec::new();
            reaction.for_each_dep(&mut |dep| {
                let dep_flags = dep.flags();
                if (dep_flags & DERIVED) != 0 && (dep_flags & (DIRTY | MAYBE_DIRTY)) != 0 {
                    let dep_ptr = Rc::as_ptr(dep) as *const ();
                    if !visited.contains(&dep_ptr) {
                        deps_to_add.push(dep.clone());
                        visited.push(dep_ptr);
                    }
                }
                true
            });
            chain.extend(deps_to_add);
        }
    }

    for current in chain.iter().rev() {
        let flags = current.flags();
        if (flags & (DIRTY | MAYBE_DIRTY)) == 0 {
            continue;
        }
        // Re-entrant read of a computed that is mid-evaluation: keep the cached value
        if (flags & REACTION_IS_UPDATING) != 0 {
            continue;
        }

        if (flags & DIRTY) != 0 || check_deps_changed(current) {
            update_computed(current);
        } else {
            set_source_status(&**current, CLEAN);
        }
    }
}

/// Check if any dependency has a newer write_version than the computed's last run.
fn check_deps_changed(source: &Rc<dyn AnySource>) -> bool {
    let Some(reaction) = source.as_derived_reaction() else {
        return false;
    };

    let last_run = reaction.run_version();
    let mut changed = false;
    reaction.for_each_dep(&mut |dep| {
        changed = dep.write_version() > last_run;
        !changed
    });
    changed
}

/// Re-evaluate a single computed with dependency tracking.
fn update_computed(source: &Rc<dyn AnySource>) {
    if let Some(reaction) = source.as_derived_reaction() {
        run_tracked(&reaction, || reaction.update());
        set_source_status(&**source, CLEAN);
    }
}

// =============================================================================
// TESTS
// =============================================================================
