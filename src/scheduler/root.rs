// ============================================================================
// spark-fiber - Root State
// One mounted tree: its arena, worklist, host binding and scheduling flags
// ============================================================================
//
// Everything that mutates a tree goes through its root. Update requests
// stamp the node with a fresh generation and put it on the worklist; the
// root then asks to be driven, either through the host's `on_schedule`
// callback or by queueing a work slice on the microtask queue. A slice that
// yields parks its continuation for the next drain.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::work_loop::{WorkStatus, perform_work};
use crate::commit::effects::flush_passive;
use crate::core::config::RuntimeConfig;
use crate::core::context::try_with_context;
use crate::hooks::EffectJob;
use crate::host::{HostHandle, HostTree};
use crate::reactivity::scheduling::{queue_microtask, queue_next_flush};
use crate::tree::node::{NodeId, NodeTree};

// =============================================================================
// UPDATE REQUESTS
// =============================================================================

/// Why a node asked to re-render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateReason {
    /// A state setter or reducer dispatch; always re-renders
    State,
    /// A signal the component read changed; skipped if the value it reads
    /// through computeds turns out unchanged
    Signal,
}

/// Address of a node in a root, held by setters and reactions.
#[derive(Clone)]
pub struct UpdateTarget {
    root: Weak<RootInner>,
    node: NodeId,
}

impl UpdateTarget {
    pub(crate) fn new(root: Weak<RootInner>, node: NodeId) -> Self {
        Self { root, node }
    }

    /// Ask for a re-render. Ignored once the root or node is gone.
    pub fn request(&self, reason: UpdateReason) {
        if let Some(root) = self.root.upgrade() {
            root.request_update(self.node, reason);
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl std::fmt::Debug for UpdateTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateTarget")
            .field("node", &self.node)
            .field("root_alive", &(self.root.strong_count() > 0))
            .finish()
    }
}

// =============================================================================
// ROOT STATE
// =============================================================================

/// Where a root is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootStatus {
    Idle,
    Working,
    /// Stopped at a deadline with a saved cursor
    Yielded,
    Committing,
    /// A host operation failed; the root accepts no more work
    Failed,
    Unmounted,
}

/// Counters for one root's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkStats {
    /// Subtrees taken off the worklist
    pub units: u64,
    /// Component function calls
    pub renders: u64,
    pub yields: u64,
    pub commits: u64,
}

/// The subtree being processed and the next node in it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkUnit {
    pub top: NodeId,
    pub next: Option<NodeId>,
}

pub(crate) struct RootState {
    pub tree: NodeTree,
    pub root: NodeId,
    pub container: HostHandle,
    pub status: RootStatus,
    /// Monotonic; bumped by every update request
    pub generation: u64,
    pub worklist: Vec<NodeId>,
    pub unit: Option<WorkUnit>,
    /// Subtrees detached this pass, waiting for the deletion pass
    pub deletions: Vec<NodeId>,
    /// Unit tops processed this pass; the mutation pass walks these
    pub touched: Vec<NodeId>,
    /// Renders per component within the current pass
    pub pass_renders: HashMap<NodeId, u32>,
    pub stats: WorkStats,
}

impl RootState {
    pub(crate) fn new(tree: NodeTree, root: NodeId, container: HostHandle) -> Self {
        Self {
            tree,
            root,
            container,
            status: RootStatus::Idle,
            generation: 0,
            worklist: Vec::new(),
            unit: None,
            deletions: Vec::new(),
            touched: Vec::new(),
            pass_renders: HashMap::new(),
            stats: WorkStats::default(),
        }
    }

    pub(crate) fn has_work(&self) -> bool {
        self.unit.is_some() || !self.worklist.is_empty()
    }

    pub(crate) fn is_closed(&self) -> bool {
        matches!(self.status, RootStatus::Failed | RootStatus::Unmounted)
    }
}

// =============================================================================
// ROOT INNER
// =============================================================================

pub(crate) struct RootInner {
    pub(crate) state: RefCell<RootState>,
    pub(crate) host: RefCell<Box<dyn HostTree>>,
    /// Passive effects collected by commits, run on the microtask queue
    pub(crate) passive: RefCell<Vec<EffectJob>>,
    pub(crate) config: RuntimeConfig,
    pub(crate) on_schedule: RefCell<Option<Rc<dyn Fn()>>>,
    /// A work slice has been requested and not started yet
    pub(crate) scheduled: Cell<bool>,
    pub(crate) passive_scheduled: Cell<bool>,
    /// A synchronous driver (mount, flush_sync) owns the loop
    pub(crate) driving: Cell<bool>,
    /// `perform_work` is on the stack
    pub(crate) working: Cell<bool>,
    pub(crate) self_weak: Weak<RootInner>,
}

impl RootInner {
    pub(crate) fn new(
        state: RootState,
        host: Box<dyn HostTree>,
        config: RuntimeConfig,
    ) -> Rc<Self> {
        Rc::new_cyclic(|self_weak| Self {
            state: RefCell::new(state),
            host: RefCell::new(host),
            passive: RefCell::new(Vec::new()),
            config,
            on_schedule: RefCell::new(None),
            scheduled: Cell::new(false),
            passive_scheduled: Cell::new(false),
            driving: Cell::new(false),
            working: Cell::new(false),
            self_weak: self_weak.clone(),
        })
    }

    pub(crate) fn target(&self, node: NodeId) -> UpdateTarget {
        UpdateTarget::new(self.self_weak.clone(), node)
    }

    /// Mark `node` dirty and make sure the root gets driven.
    ///
    /// Requests for nodes that are gone or detached are dropped. While the
    /// root state is borrowed (mid-commit) the request is retried from the
    /// microtask queue.
    pub(crate) fn request_update(&self, node: NodeId, reason: UpdateReason) {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            let root = self.self_weak.clone();
            queue_microtask(move || {
                if let Some(root) = root.upgrade() {
                    root.request_update(node, reason);
                }
            });
            return;
        };
        if state.is_closed() || !state.tree.is_attached(node) {
            return;
        }

        state.generation += 1;
        let generation = state.generation;
        let Some(target) = state.tree.get_mut(node) else {
            return;
        };
        target.requested = generation;
        let newly_queued = !target.queued;
        match reason {
            UpdateReason::State => target.signal_only = false,
            UpdateReason::Signal if newly_queued => target.signal_only = true,
            UpdateReason::Signal => {}
        }
        if newly_queued {
            target.queued = true;
            state.worklist.push(node);
        }
        tracing::trace!(?node, generation, ?reason, "update requested");
        drop(state);

        self.schedule();
    }

    /// Ask to be driven unless a driver is active or a slice is already
    /// pending.
    pub(crate) fn schedule(&self) {
        if self.driving.get() || self.scheduled.replace(true) {
            return;
        }
        self.request_slice(Turn::Current);
    }

    /// Hand the root to `on_schedule`, or queue a work slice. Callers have
    /// already set `scheduled`.
    fn request_slice(&self, turn: Turn) {
        let hook = self.on_schedule.borrow().clone();
        match hook {
            Some(hook) => hook(),
            None => PendingSlice::new(self.self_weak.clone(), SliceKind::Work).queue(turn),
        }
    }

    /// One time slice of scheduled work; asks again if work remains.
    ///
    /// A slice that yields continues on the next drain, so the host gets
    /// control back between slices.
    fn run_scheduled(self: &Rc<Self>) {
        let deadline = self.config.deadline();
        match perform_work(self, &deadline) {
            Ok(WorkStatus::Idle) => {}
            Ok(status) => {
                tracing::trace!(?status, "slice ended with work left");
                if self.driving.get() {
                    // The driver's guard reschedules on release
                    self.scheduled.set(false);
                } else {
                    self.scheduled.set(true);
                    self.request_slice(Turn::Next);
                }
            }
            Err(error) => tracing::error!(%error, "scheduled work failed"),
        }
    }

    /// Queue a passive-effect flush unless one is pending.
    pub(crate) fn schedule_passive(&self) {
        if self.passive_scheduled.replace(true) {
            return;
        }
        PendingSlice::new(self.self_weak.clone(), SliceKind::Passive).queue(Turn::Current);
    }

    pub(crate) fn has_pending_work(&self) -> bool {
        let work = self
            .state
            .try_borrow()
            .map(|state| !state.is_closed() && state.has_work())
            .unwrap_or(true);
        work || !self.passive.borrow().is_empty()
    }

    pub(crate) fn status(&self) -> RootStatus {
        self.state
            .try_borrow()
            .map(|state| state.status)
            .unwrap_or(RootStatus::Committing)
    }

    /// Hold the loop for a synchronous driver. Work requested meanwhile is
    /// picked up by the driver, or scheduled when the guard drops.
    pub(crate) fn drive(self: &Rc<Self>) -> DrivingGuard {
        DrivingGuard {
            root: self.clone(),
            previous: self.driving.replace(true),
        }
    }
}

// =============================================================================
// PENDING SLICES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Turn {
    /// The drain in progress, or the next one if none is running
    Current,
    /// Strictly the next drain
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SliceKind {
    Work,
    Passive,
}

/// A queued request to drive a root.
///
/// The root's `scheduled` / `passive_scheduled` flag stays set while the
/// request sits in the queue. If the queue drops it unrun, the destructor
/// parks a replacement for the next drain, so the flag never outlives its
/// request.
struct PendingSlice {
    root: Weak<RootInner>,
    kind: SliceKind,
    done: bool,
}

impl PendingSlice {
    fn new(root: Weak<RootInner>, kind: SliceKind) -> Self {
        Self {
            root,
            kind,
            done: false,
        }
    }

    fn queue(self, turn: Turn) {
        match turn {
            Turn::Current => queue_microtask(move || self.run()),
            Turn::Next => queue_next_flush(move || self.run()),
        }
    }

    fn run(mut self) {
        self.done = true;
        let Some(root) = self.root.upgrade() else {
            return;
        };
        match self.kind {
            SliceKind::Work => root.run_scheduled(),
            SliceKind::Passive => flush_passive(&root),
        }
    }
}

impl Drop for PendingSlice {
    fn drop(&mut self) {
        if self.done || self.root.strong_count() == 0 {
            return;
        }
        tracing::warn!(
            kind = ?self.kind,
            "queued slice dropped unrun; parking it for the next drain"
        );
        let (root, kind) = (self.root.clone(), self.kind);
        // No context during thread exit; nothing would drain it anyway
        let _ = try_with_context(move |ctx| {
            let replacement = PendingSlice::new(root, kind);
            ctx.push_next_flush(Box::new(move || replacement.run()));
        });
    }
}

pub(crate) struct DrivingGuard {
    root: Rc<RootInner>,
    previous: bool,
}

impl Drop for DrivingGuard {
    fn drop(&mut self) {
        self.root.driving.set(self.previous);
        if !self.previous && self.root.has_pending_work() {
            self.root.scheduled.set(false);
            self.root.schedule();
        }
    }
}
