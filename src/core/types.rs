// ============================================================================
// spark-fiber - Type Definitions
// Type-erased graph nodes and the storage behind `Signal<T>`
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::constants::*;

// =============================================================================
// GRAPH NODES
// =============================================================================
//
// Propagation only touches flags, versions and edges, so the graph holds
// sources as `Rc<dyn AnySource>` and subscribers as `Weak<dyn AnyReaction>`.
// The typed handles (`Signal<T>`, `Computed<T>`, watches, component
// subscriptions) own the values.
// =============================================================================

/// Something reactions can depend on: a signal, or the output of a computed.
pub trait AnySource: Any {
    fn flags(&self) -> u32;
    fn set_flags(&self, flags: u32);

    /// Bumped on every change that is visible to readers.
    fn write_version(&self) -> u32;
    fn set_write_version(&self, version: u32);

    /// Stamp of the last run that recorded this source, used to skip
    /// duplicate reads within one run.
    fn read_version(&self) -> u32;
    fn set_read_version(&self, version: u32);

    fn reaction_count(&self) -> usize;
    fn add_reaction(&self, reaction: Weak<dyn AnyReaction>);
    fn cleanup_dead_reactions(&self);

    /// Visits live subscribers until `f` returns false.
    fn for_each_reaction(&self, f: &mut dyn FnMut(Rc<dyn AnyReaction>) -> bool);
    fn remove_reaction(&self, reaction: &Rc<dyn AnyReaction>);
    fn clear_reactions(&self);

    fn is_derived(&self) -> bool {
        self.flags() & DERIVED != 0
    }

    fn is_dirty(&self) -> bool {
        self.flags() & DIRTY != 0
    }

    fn is_disposed(&self) -> bool {
        self.flags() & DESTROYED != 0
    }

    fn as_any(&self) -> &dyn Any;

    /// A computed is both ends of an edge; signals return `None`.
    fn as_derived_reaction(&self) -> Option<Rc<dyn AnyReaction>> {
        None
    }
}

/// Something that reads sources and reacts when they change: a computed, a
/// watch, or a mounted component.
pub trait AnyReaction: Any {
    fn flags(&self) -> u32;
    fn set_flags(&self, flags: u32);

    fn dep_count(&self) -> usize;
    fn add_dep(&self, source: Rc<dyn AnySource>);
    fn clear_deps(&self);
    /// Truncate the dependency list to `start` entries.
    fn remove_deps_from(&self, start: usize);
    fn for_each_dep(&self, f: &mut dyn FnMut(&Rc<dyn AnySource>) -> bool);
    fn remove_source(&self, source: &Rc<dyn AnySource>);

    /// Run again. Only a computed reports a changed value with `true`.
    fn update(&self) -> bool;

    /// Global write version when this reaction last ran. A MAYBE_DIRTY
    /// reaction is stale once any dependency carries a newer one.
    fn run_version(&self) -> u32;
    fn set_run_version(&self, version: u32);

    /// Fired on the clean-to-dirty edge. Computeds ignore it, watches queue
    /// themselves and components ask their root for a render.
    fn notify(&self) {}

    fn is_derived(&self) -> bool {
        self.flags() & DERIVED != 0
    }

    fn is_dirty(&self) -> bool {
        self.flags() & DIRTY != 0
    }

    fn is_maybe_dirty(&self) -> bool {
        self.flags() & MAYBE_DIRTY != 0
    }

    fn is_clean(&self) -> bool {
        self.flags() & CLEAN != 0
    }

    fn is_destroyed(&self) -> bool {
        self.flags() & DESTROYED != 0
    }

    fn mark_clean(&self) {
        self.set_flags(with_status(self.flags(), CLEAN));
    }

    fn mark_destroyed(&self) {
        self.set_flags(self.flags() | DESTROYED);
    }

    fn as_any(&self) -> &dyn Any;

    /// The computed's own source end; `None` for watches and components.
    fn as_derived_source(&self) -> Option<Rc<dyn AnySource>> {
        None
    }
}

// =============================================================================
// SIGNAL STORAGE
// =============================================================================

/// Decides whether a write is a change. `true` means equal, so no change.
pub type EqualsFn<T> = fn(&T, &T) -> bool;

pub fn default_equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Value, history and subscribers of one signal.
pub struct SourceInner<T> {
    flags: Cell<u32>,
    value: RefCell<T>,
    previous: RefCell<Option<T>>,
    write_version: Cell<u32>,
    read_version: Cell<u32>,
    reactions: RefCell<Vec<Weak<dyn AnyReaction>>>,
    equals: EqualsFn<T>,
}

impl<T> SourceInner<T> {
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::new_with_equals(value, default_equals)
    }

    pub fn new_with_equals(value: T, equals: EqualsFn<T>) -> Self {
        Self {
            flags: Cell::new(SOURCE | CLEAN),
            value: RefCell::new(value),
            previous: RefCell::new(None),
            write_version: Cell::new(0),
            read_version: Cell::new(0),
            reactions: RefCell::new(Vec::new()),
            equals,
        }
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// The value the last real change replaced.
    pub fn previous(&self) -> Option<T>
    where
        T: Clone,
    {
        self.previous.borrow().clone()
    }

    /// Store `value` unless `equals` calls it the same. Returns whether it
    /// was stored.
    pub fn set(&self, value: T) -> bool {
        if (self.equals)(&self.value.borrow(), &value) {
            return false;
        }
        let replaced = self.value.replace(value);
        self.record_change(replaced);
        true
    }

    /// Mutate in place. An edit that leaves the value equal is not a change
    /// and keeps `previous` as it was.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool
    where
        T: Clone,
    {
        let before = self.value.borrow().clone();
        f(&mut self.value.borrow_mut());
        if (self.equals)(&before, &self.value.borrow()) {
            return false;
        }
        self.record_change(before);
        true
    }

    fn record_change(&self, replaced: T) {
        self.previous.replace(Some(replaced));
        self.write_version.set(self.write_version.get() + 1);
    }
}

impl<T: 'static> AnySource for SourceInner<T> {
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
        for reaction in self.reactions.borrow().iter().filter_map(Weak::upgrade) {
            if !f(reaction) {
                break;
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
}

/// Drop `reaction` (and any dead entries) from a subscriber list, comparing
/// allocations by address.
pub(crate) fn remove_weak(list: &RefCell<Vec<Weak<dyn AnyReaction>>>, reaction: &Rc<dyn AnyReaction>) {
    let target = Rc::as_ptr(reaction) as *const ();
    list.borrow_mut()
        .retain(|weak| weak.upgrade().is_some_and(|rc| Rc::as_ptr(&rc) as *const () != target));
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_keeps_the_replaced_value() {
        let source = SourceInner::new(1);
        assert_eq!(source.previous(), None);

        assert!(source.set(2));
        assert_eq!(source.get(), 2);
        assert_eq!(source.previous(), Some(1));
        assert_eq!(source.write_version(), 1);

        // Equal write is a no-op
        assert!(!source.set(2));
        assert_eq!(source.previous(), Some(1));
        assert_eq!(source.write_version(), 1);
    }

    #[test]
    fn update_that_changes_nothing_is_not_a_write() {
        let source = SourceInner::new(vec![1, 2]);
        assert!(!source.update(|v| v.sort()));
        assert_eq!(source.write_version(), 0);
        assert!(source.update(|v| v.push(3)));
        assert_eq!(source.previous(), Some(vec![1, 2]));
    }

    #[test]
    fn mixed_value_types_share_one_graph_list() {
        let sources: Vec<Rc<dyn AnySource>> = vec![
            Rc::new(SourceInner::new(42i32)),
            Rc::new(SourceInner::new(String::from("hello"))),
            Rc::new(SourceInner::new(true)),
        ];

        for source in &sources {
            assert!(source.flags() & SOURCE != 0);
            assert!(!source.is_derived());
        }

        sources[0].set_flags(with_status(sources[0].flags(), DIRTY));
        assert!(sources[0].is_dirty());
        assert!(!sources[1].is_dirty());
    }

    #[test]
    fn equality_function_decides_what_counts_as_a_change() {
        fn never_equal<T>(_: &T, _: &T) -> bool {
            false
        }

        let source = SourceInner::new_with_equals(42, never_equal);
        assert!(source.set(42));
        assert_eq!(source.previous(), Some(42));
    }

    #[test]
    fn remove_weak_drops_target_and_dead_entries() {
        struct Idle;
        impl AnyReaction for Idle {
            fn flags(&self) -> u32 {
                CLEAN
            }
            fn set_flags(&self, _: u32) {}
            fn dep_count(&self) -> usize {
                0
            }
            fn add_dep(&self, _: Rc<dyn AnySource>) {}
            fn clear_deps(&self) {}
            fn remove_deps_from(&self, _: usize) {}
            fn for_each_dep(&self, _: &mut dyn FnMut(&Rc<dyn AnySource>) -> bool) {}
            fn remove_source(&self, _: &Rc<dyn AnySource>) {}
            fn update(&self) -> bool {
                false
            }
            fn run_version(&self) -> u32 {
                0
            }
            fn set_run_version(&self, _: u32) {}
            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        let source = SourceInner::new(0);
        let kept: Rc<dyn AnyReaction> = Rc::new(Idle);
        let removed: Rc<dyn AnyReaction> = Rc::new(Idle);
        {
            let dropped: Rc<dyn AnyReaction> = Rc::new(Idle);
            source.add_reaction(Rc::downgrade(&dropped));
        }
        source.add_reaction(Rc::downgrade(&kept));
        source.add_reaction(Rc::downgrade(&removed));
        assert_eq!(source.reaction_count(), 3);

        source.remove_reaction(&removed);
        assert_eq!(source.reaction_count(), 1);
    }
}
