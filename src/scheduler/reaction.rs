// ============================================================================
// spark-fiber - Component Reaction
// The subscriber a component node registers with the signals it reads
// ============================================================================
//
// Installed as the active reaction while the component renders, so every
// tracked read subscribes the node. A write marks it dirty (or maybe-dirty
// through a computed) and the notification turns into an update request;
// the re-render itself is left to the scheduler.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::root::{UpdateReason, UpdateTarget};
use crate::core::constants::*;
use crate::core::types::{AnyReaction, AnySource};
use crate::reactivity::tracking::remove_reactions;

pub struct ComponentReaction {
    flags: Cell<u32>,
    run_version: Cell<u32>,
    deps: RefCell<Vec<Rc<dyn AnySource>>>,
    target: UpdateTarget,
}

impl ComponentReaction {
    pub fn new(target: UpdateTarget) -> Rc<Self> {
        Rc::new(Self {
            flags: Cell::new(COMPONENT | CLEAN),
            run_version: Cell::new(0),
            deps: RefCell::new(Vec::new()),
            target,
        })
    }

    /// Unsubscribe from every source; later writes are ignored.
    pub fn dispose(self: &Rc<Self>) {
        if self.is_destroyed() {
            return;
        }
        remove_reactions(self.clone() as Rc<dyn AnyReaction>, 0);
        self.mark_destroyed();
    }

    pub fn dependency_count(&self) -> usize {
        self.deps.borrow().len()
    }
}

impl AnyReaction for ComponentReaction {
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
        self.target.request(UpdateReason::Signal);
        false
    }

    fn run_version(&self) -> u32 {
        self.run_version.get()
    }

    fn set_run_version(&self, version: u32) {
        self.run_version.set(version);
    }

    fn notify(&self) {
        if self.is_destroyed() {
            return;
        }
        self.target.request(UpdateReason::Signal);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for ComponentReaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentReaction")
            .field("deps", &self.dependency_count())
            .field("flags", &self.flags.get())
            .finish()
    }
}
