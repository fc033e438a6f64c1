// ============================================================================
// spark-fiber - Effect Hooks
// use_effect and use_layout_effect
// ============================================================================
//
// A render only records what should run: the callback waits on the slot
// until the commit collects it. A render that is superseded before commit
// is overwritten by the next one, so its callback never runs. Deps are
// compared against the deps of the last committed run.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::scope::RenderScope;
use super::{HookKind, HookSlot};
use crate::core::error::Result;
use crate::primitives::watch::CleanupFn;

type EffectCallback = Box<dyn FnOnce() -> Option<CleanupFn>>;

/// When a collected effect runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectPhase {
    /// Synchronously, right after host mutation
    Layout,
    /// On the microtask queue after the commit
    Passive,
}

/// Shared between a slot and its queued jobs.
pub(crate) struct EffectCell {
    cleanup: RefCell<Option<CleanupFn>>,
    /// Cleared when the owning node is deleted
    alive: Cell<bool>,
}

struct PendingEffect {
    callback: EffectCallback,
    deps: Option<Box<dyn Any>>,
}

pub(crate) struct EffectState {
    committed: Option<Box<dyn Any>>,
    cell: Rc<EffectCell>,
    pending: Option<PendingEffect>,
}

impl EffectState {
    fn new(pending: Option<PendingEffect>) -> Self {
        Self {
            committed: None,
            cell: Rc::new(EffectCell {
                cleanup: RefCell::new(None),
                alive: Cell::new(true),
            }),
            pending,
        }
    }
}

// =============================================================================
// EFFECT JOB
// =============================================================================

/// An effect run collected by a commit.
pub struct EffectJob {
    pub phase: EffectPhase,
    cell: Rc<EffectCell>,
    callback: EffectCallback,
}

impl EffectJob {
    /// Run the cleanup left by the previous run, if any.
    pub(crate) fn run_cleanup(&self) {
        let cleanup = self.cell.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }

    /// Run the callback unless the node was deleted in the meantime.
    pub(crate) fn run_callback(self) {
        if !self.cell.alive.get() {
            return;
        }
        let cleanup = (self.callback)();
        if self.cell.alive.get() {
            *self.cell.cleanup.borrow_mut() = cleanup;
        } else if let Some(cleanup) = cleanup {
            cleanup();
        }
    }
}

impl std::fmt::Debug for EffectJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectJob")
            .field("phase", &self.phase)
            .field("alive", &self.cell.alive.get())
            .finish()
    }
}

/// Take the pending run of an effect slot, committing its deps.
pub(crate) fn collect(slot: &mut HookSlot) -> Option<EffectJob> {
    let phase = match slot.kind {
        HookKind::Effect => EffectPhase::Passive,
        HookKind::LayoutEffect => EffectPhase::Layout,
        _ => return None,
    };
    let state = slot.state.downcast_mut::<EffectState>()?;
    let pending = state.pending.take()?;
    if pending.deps.is_some() {
        state.committed = pending.deps;
    }
    Some(EffectJob {
        phase,
        cell: state.cell.clone(),
        callback: pending.callback,
    })
}

/// Mark an effect slot dead and hand back its cleanup.
pub(crate) fn retire(slot: &mut HookSlot) -> Option<CleanupFn> {
    let state = slot.state.downcast_mut::<EffectState>()?;
    state.pending = None;
    state.cell.alive.set(false);
    state.cell.cleanup.borrow_mut().take()
}

// =============================================================================
// HOOKS
// =============================================================================

impl RenderScope<'_> {
    fn effect_hook<D, F>(&mut self, kind: HookKind, deps: Option<D>, f: F) -> Result<()>
    where
        D: PartialEq + 'static,
        F: FnOnce() -> Option<CleanupFn> + 'static,
    {
        let live = !self.is_static();
        let pending = |deps: Option<D>, f: F| PendingEffect {
            callback: Box::new(f),
            deps: deps.map(|d| Box::new(d) as Box<dyn Any>),
        };

        if let Some(state) = self.existing_slot::<EffectState>(kind)? {
            let changed = match (&deps, &state.committed) {
                (Some(new), Some(old)) => old.downcast_ref::<D>() != Some(new),
                _ => true,
            };
            state.pending = (changed && live).then(|| pending(deps, f));
            return Ok(());
        }

        let state = EffectState::new(live.then(|| pending(deps, f)));
        self.push_slot(kind, state, None);
        Ok(())
    }

    /// Run `f` after the commit whenever `deps` differ from the last run.
    ///
    /// The cleanup `f` returns runs before the next run and when the node is
    /// deleted. Passive effects of one commit run together on the microtask
    /// queue: every cleanup first, then every callback.
    pub fn use_effect<D, F>(&mut self, deps: D, f: F) -> Result<()>
    where
        D: PartialEq + 'static,
        F: FnOnce() -> Option<CleanupFn> + 'static,
    {
        self.effect_hook(HookKind::Effect, Some(deps), f)
    }

    /// [`use_effect`](Self::use_effect) without deps: runs after every commit
    /// of this node.
    pub fn use_effect_each_render<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce() -> Option<CleanupFn> + 'static,
    {
        self.effect_hook::<(), F>(HookKind::Effect, None, f)
    }

    /// Like [`use_effect`](Self::use_effect), but runs synchronously right
    /// after the host tree was mutated, before the commit returns.
    pub fn use_layout_effect<D, F>(&mut self, deps: D, f: F) -> Result<()>
    where
        D: PartialEq + 'static,
        F: FnOnce() -> Option<CleanupFn> + 'static,
    {
        self.effect_hook(HookKind::LayoutEffect, Some(deps), f)
    }

    pub fn use_layout_effect_each_render<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce() -> Option<CleanupFn> + 'static,
    {
        self.effect_hook::<(), F>(HookKind::LayoutEffect, None, f)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_with(kind: HookKind, deps: Option<i32>, log: &Rc<RefCell<Vec<&'static str>>>) -> HookSlot {
        let log = log.clone();
        let pending = PendingEffect {
            callback: Box::new(move || {
                log.borrow_mut().push("run");
                let log = log.clone();
                Some(Box::new(move || log.borrow_mut().push("cleanup")) as CleanupFn)
            }),
            deps: deps.map(|d| Box::new(d) as Box<dyn Any>),
        };
        HookSlot::new(kind, Box::new(EffectState::new(Some(pending))))
    }

    #[test]
    fn collect_commits_deps_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut slot = slot_with(HookKind::Effect, Some(3), &log);

        let job = collect(&mut slot).unwrap();
        assert_eq!(job.phase, EffectPhase::Passive);
        assert!(collect(&mut slot).is_none());

        let state = slot.state.downcast_ref::<EffectState>().unwrap();
        assert_eq!(
            state.committed.as_ref().and_then(|d| d.downcast_ref::<i32>()),
            Some(&3)
        );

        job.run_cleanup();
        job.run_callback();
        assert_eq!(*log.borrow(), vec!["run"]);
    }

    #[test]
    fn unmount_returns_cleanup_and_kills_queued_job() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut slot = slot_with(HookKind::LayoutEffect, None, &log);
        collect(&mut slot).unwrap().run_callback();

        let mut again = slot_with(HookKind::LayoutEffect, None, &log);
        let queued = collect(&mut again).unwrap();

        let tasks = slot.unmount_tasks();
        assert_eq!(tasks.len(), 1);
        for task in tasks {
            task();
        }
        assert_eq!(*log.borrow(), vec!["run", "cleanup"]);

        assert!(again.unmount_tasks().is_empty());
        queued.run_callback();
        assert_eq!(*log.borrow(), vec!["run", "cleanup"]);
    }
}
