// ============================================================================
// spark-fiber - Signal Primitive
// The core writable reactive value
// ============================================================================

use std::rc::Rc;

use crate::core::constants::DESTROYED;
use crate::core::context::with_context;
use crate::core::types::{AnyReaction, AnySource, EqualsFn, SourceInner};
use crate::reactivity::tracking::{notify_write, track_read};

// =============================================================================
// SIGNAL<T> - The public signal handle
// =============================================================================

/// A reactive value of type T.
///
/// Reading a signal inside a component render subscribes that component;
/// inside a computed or watch it records a dependency. Writing a different
/// value notifies every subscriber synchronously, while the re-renders and
/// watch re-runs it causes are deferred.
///
/// # Example
///
/// ```
/// use spark_fiber::signal;
///
/// let count = signal(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// assert_eq!(count.previous(), Some(0));
/// ```
pub struct Signal<T> {
    inner: Rc<SourceInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self {
            inner: Rc::new(SourceInner::new(value)),
        }
    }

    /// Create a new signal with a custom equality function.
    pub fn new_with_equals(value: T, equals: EqualsFn<T>) -> Self {
        Self {
            inner: Rc::new(SourceInner::new_with_equals(value, equals)),
        }
    }

    /// Get the current value (cloning), tracking the read.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        track_read(self.inner.clone() as Rc<dyn AnySource>);
        self.inner.get()
    }

    /// Access the current value with a closure (avoids cloning), tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        track_read(self.inner.clone() as Rc<dyn AnySource>);
        self.inner.with(f)
    }

    /// Get the current value without tracking.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        self.inner.get()
    }

    /// The value replaced by the last successful write, untracked.
    pub fn previous(&self) -> Option<T>
    where
        T: Clone,
    {
        self.inner.previous()
    }

    /// Set the signal's value.
    ///
    /// Returns true if the value changed. An equal value notifies nobody.
    pub fn set(&self, value: T) -> bool {
        let changed = self.inner.set(value);
        if changed {
            self.publish();
        }
        changed
    }

    /// Update the value in place. Returns true if the result differs from
    /// the old value.
    ///
    /// # Example
    ///
    /// ```
    /// use spark_fiber::signal;
    ///
    /// let items = signal(vec![1, 2]);
    /// assert!(items.update(|v| v.push(3)));
    /// assert_eq!(items.get(), vec![1, 2, 3]);
    /// ```
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool
    where
        T: Clone,
    {
        let changed = self.inner.update(f);
        if changed {
            self.publish();
        }
        changed
    }

    fn publish(&self) {
        with_context(|ctx| {
            let wv = ctx.bump_write_version();
            self.inner.set_write_version(wv);
        });
        if !self.is_disposed() {
            notify_write(self.inner.clone() as Rc<dyn AnySource>);
        }
    }

    /// Detach the signal from the graph.
    ///
    /// The last value stays readable; reads are no longer tracked and writes
    /// notify nobody.
    pub fn dispose(&self) {
        if self.is_disposed() {
            return;
        }
        self.inner.set_flags(self.inner.flags() | DESTROYED);

        let source = self.as_any_source();
        let reactions: Vec<Rc<dyn AnyReaction>> = {
            let mut collected = Vec::new();
            source.for_each_reaction(&mut |reaction| {
                collected.push(reaction);
                true
            });
            collected
        };
        for reaction in reactions {
            reaction.remove_source(&source);
        }
        source.clear_reactions();
    }

    /// Whether `dispose()` was called.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Number of live subscribers (components, computeds and watches).
    pub fn subscriber_count(&self) -> usize {
        self.inner.cleanup_dead_reactions();
        self.inner.reaction_count()
    }

    /// Get a reference to the inner source.
    pub fn inner(&self) -> &Rc<SourceInner<T>> {
        &self.inner
    }

    /// Get the inner source as a type-erased AnySource.
    pub fn as_any_source(&self) -> Rc<dyn AnySource> {
        self.inner.clone()
    }

    /// Whether two handles refer to the same signal.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: std::fmt::Debug + 'static> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner
            .with(|value| f.debug_struct("Signal").field("value", value).finish())
    }
}

// =============================================================================
// SIGNAL CREATION FUNCTIONS
// =============================================================================

/// Create a new reactive signal.
///
/// # Example
///
/// ```
/// use spark_fiber::signal;
///
/// let name = signal(String::from("hello"));
/// name.set("world".to_string());
/// assert_eq!(name.get(), "world");
/// ```
pub fn signal<T>(value: T) -> Signal<T>
where
    T: PartialEq + 'static,
{
    Signal::new(value)
}

/// Create a signal with a custom equality function.
pub fn signal_with_equals<T: 'static>(value: T, equals: EqualsFn<T>) -> Signal<T> {
    Signal::new_with_equals(value, equals)
}

// =============================================================================
// TESTS
// =============================================================================
