// ============================================================================
// spark-fiber - Store
// A signal-backed container for shared state with selector subscriptions
// ============================================================================

use std::rc::Rc;

use crate::core::types::EqualsFn;
use crate::primitives::computed::{Computed, computed, computed_with_equals};
use crate::primitives::signal::Signal;
use crate::primitives::watch::{Watch, watch};
use crate::reactivity::batching::untrack;

/// Shared state held in one signal.
///
/// Components read slices through [`Store::select`], so a write re-renders
/// only the components whose slice actually changed.
///
/// # Example
///
/// ```
/// use spark_fiber::Store;
///
/// #[derive(Clone, PartialEq)]
/// struct Todos {
///     items: Vec<String>,
///     filter: String,
/// }
///
/// let store = Store::new(Todos { items: vec![], filter: "all".into() });
/// let count = store.select(|s| s.items.len());
///
/// store.update(|s| s.items.push("write docs".into()));
/// assert_eq!(count.get(), 1);
/// ```
pub struct Store<S> {
    state: Signal<S>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<S: Clone + 'static> Store<S> {
    /// Create a store comparing states with `PartialEq`.
    pub fn new(initial: S) -> Self
    where
        S: PartialEq,
    {
        Self {
            state: Signal::new(initial),
        }
    }

    /// Create a store with a custom equality between whole states.
    pub fn with_equals(initial: S, equals: EqualsFn<S>) -> Self {
        Self {
            state: Signal::new_with_equals(initial, equals),
        }
    }

    /// Current state, tracked.
    pub fn get(&self) -> S {
        self.state.get()
    }

    /// Borrow the current state, tracked.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        self.state.with(f)
    }

    /// Replace the state. Returns true if it changed.
    pub fn set(&self, state: S) -> bool {
        self.state.set(state)
    }

    /// Modify the state in place. Returns true if it changed.
    pub fn update(&self, f: impl FnOnce(&mut S)) -> bool {
        self.state.update(f)
    }

    /// A computed slice of the state, compared with `PartialEq`.
    pub fn select<T, F>(&self, selector: F) -> Computed<T>
    where
        T: Clone + PartialEq + 'static,
        F: Fn(&S) -> T + 'static,
    {
        let state = self.state.clone();
        computed(move || state.with(&selector))
    }

    /// A computed slice compared with a custom equality.
    pub fn select_with_equals<T, F>(&self, selector: F, equals: EqualsFn<T>) -> Computed<T>
    where
        T: Clone + 'static,
        F: Fn(&S) -> T + 'static,
    {
        let state = self.state.clone();
        computed_with_equals(move || state.with(&selector), equals)
    }

    /// Call `on_change(new, old)` whenever the selected slice changes.
    ///
    /// The callback does not fire for the initial value and runs outside
    /// tracking. Dropping the returned handle unsubscribes.
    pub fn subscribe<T, F, C>(&self, selector: F, on_change: C) -> Watch
    where
        T: Clone + PartialEq + 'static,
        F: Fn(&S) -> T + 'static,
        C: Fn(&T, &T) + 'static,
    {
        let slice = self.select(selector);
        let last: Rc<std::cell::RefCell<Option<T>>> = Rc::new(std::cell::RefCell::new(None));

        watch(move || {
            let current = slice.get();
            let previous = last.borrow_mut().replace(current.clone());
            if let Some(previous) = previous {
                if previous != current {
                    untrack(|| on_change(&current, &previous));
                }
            }
        })
    }

    /// The signal holding the state.
    pub fn signal(&self) -> &Signal<S> {
        &self.state
    }
}

impl<S: std::fmt::Debug + Clone + 'static> std::fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.state
            .inner()
            .with(|state| f.debug_struct("Store").field("state", state).finish())
    }
}

// =============================================================================
// TESTS
// =============================================================================
