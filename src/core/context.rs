// ============================================================================
// spark-fiber - Reactive Context
// Per-thread tracking state, version clocks and the microtask queue
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use super::types::{AnyReaction, AnySource};

/// A deferred unit of work drained by `flush_microtasks()`.
pub type Microtask = Box<dyn FnOnce()>;

// =============================================================================
// REACTIVE CONTEXT
// =============================================================================

/// State shared by every signal, watch and root on one thread.
///
/// Roots mounted on the same thread see the same context, so a signal made
/// for one root can drive components of another.
pub struct ReactiveContext {
    // Tracking
    /// Component render, computed or watch whose reads are being recorded
    pub active_reaction: RefCell<Option<Weak<dyn AnyReaction>>>,
    /// Reads inside `untrack` record nothing
    pub untracking: Cell<bool>,

    // Clocks
    /// Bumped by every signal write that changes a value
    pub write_version: Cell<u32>,
    /// Stamp of the run collecting dependencies; a source already stamped
    /// with it is not recorded twice
    pub read_version: Cell<u32>,
    /// Highest read stamp issued so far
    pub read_counter: Cell<u32>,
    /// Sources read by the run in progress
    pub new_deps: RefCell<Vec<Rc<dyn AnySource>>>,

    // Watches
    pub batch_depth: Cell<u32>,
    pub pending_reactions: RefCell<Vec<Weak<dyn AnyReaction>>>,
    /// A pending-watch flush is already queued
    pub flush_scheduled: Cell<bool>,

    // Microtasks
    pub microtasks: RefCell<VecDeque<Microtask>>,
    /// Held back from the drain in progress; promoted when the next one starts
    pub next_flush: RefCell<VecDeque<Microtask>>,
    pub is_flushing: Cell<bool>,
}

impl ReactiveContext {
    pub fn new() -> Self {
        Self {
            active_reaction: RefCell::new(None),
            untracking: Cell::new(false),
            write_version: Cell::new(1),
            read_version: Cell::new(0),
            read_counter: Cell::new(0),
            new_deps: RefCell::new(Vec::new()),
            batch_depth: Cell::new(0),
            pending_reactions: RefCell::new(Vec::new()),
            flush_scheduled: Cell::new(false),
            microtasks: RefCell::new(VecDeque::new()),
            next_flush: RefCell::new(VecDeque::new()),
            is_flushing: Cell::new(false),
        }
    }

    // =========================================================================
    // TRACKING
    // =========================================================================

    /// Install `reaction` as the one recording reads; hands back the outer one
    /// so the caller can restore it.
    pub fn swap_reaction(
        &self,
        reaction: Option<Weak<dyn AnyReaction>>,
    ) -> Option<Weak<dyn AnyReaction>> {
        self.active_reaction.replace(reaction)
    }

    pub fn current_reaction(&self) -> Option<Weak<dyn AnyReaction>> {
        self.active_reaction.borrow().clone()
    }

    pub fn in_reaction(&self) -> bool {
        self.active_reaction.borrow().is_some()
    }

    pub fn swap_untracking(&self, value: bool) -> bool {
        self.untracking.replace(value)
    }

    pub fn is_untracking(&self) -> bool {
        self.untracking.get()
    }

    // =========================================================================
    // CLOCKS
    // =========================================================================

    /// Advance the write clock and return the new stamp.
    pub fn bump_write_version(&self) -> u32 {
        let next = self.write_version.get() + 1;
        self.write_version.set(next);
        next
    }

    pub fn current_write(&self) -> u32 {
        self.write_version.get()
    }

    /// Give the run that is starting a read stamp no earlier run has used.
    ///
    /// Nested runs restore the outer stamp with [`restore_read`](Self::restore_read)
    /// but the counter keeps climbing, so stamps never repeat.
    pub fn begin_read(&self) -> u32 {
        let stamp = self.read_counter.get() + 1;
        self.read_counter.set(stamp);
        self.read_version.set(stamp);
        stamp
    }

    pub fn restore_read(&self, stamp: u32) -> u32 {
        self.read_version.replace(stamp)
    }

    pub fn current_read(&self) -> u32 {
        self.read_version.get()
    }

    pub fn swap_new_deps(&self, deps: Vec<Rc<dyn AnySource>>) -> Vec<Rc<dyn AnySource>> {
        self.new_deps.replace(deps)
    }

    pub fn record_dep(&self, source: Rc<dyn AnySource>) {
        self.new_deps.borrow_mut().push(source);
    }

    // =========================================================================
    // WATCHES
    // =========================================================================

    pub fn enter_batch(&self) -> u32 {
        let depth = self.batch_depth.get() + 1;
        self.batch_depth.set(depth);
        depth
    }

    /// Leave one batch level; returns the remaining depth, zero at the outermost.
    pub fn exit_batch(&self) -> u32 {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        depth
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth.get() > 0
    }

    pub fn defer_watch(&self, reaction: Weak<dyn AnyReaction>) {
        self.pending_reactions.borrow_mut().push(reaction);
    }

    pub fn take_deferred_watches(&self) -> Vec<Weak<dyn AnyReaction>> {
        std::mem::take(&mut *self.pending_reactions.borrow_mut())
    }

    // =========================================================================
    // MICROTASKS
    // =========================================================================

    pub fn push_microtask(&self, task: Microtask) {
        self.microtasks.borrow_mut().push_back(task);
    }

    /// The queue borrow ends before this returns, so the task may queue more.
    pub fn pop_microtask(&self) -> Option<Microtask> {
        self.microtasks.borrow_mut().pop_front()
    }

    pub fn push_next_flush(&self, task: Microtask) {
        self.next_flush.borrow_mut().push_back(task);
    }

    /// Append parked tasks behind whatever is already queued.
    pub fn promote_next_flush(&self) {
        let parked = std::mem::take(&mut *self.next_flush.borrow_mut());
        self.microtasks.borrow_mut().extend(parked);
    }

    /// Queued plus parked.
    pub fn microtask_count(&self) -> usize {
        self.microtasks.borrow().len() + self.next_flush.borrow().len()
    }
}

impl Default for ReactiveContext {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// THREAD-LOCAL ACCESS
// =============================================================================

thread_local! {
    static CONTEXT: ReactiveContext = ReactiveContext::new();
}

/// Run `f` against this thread's context.
///
/// ```ignore
/// let stamp = with_context(|ctx| ctx.bump_write_version());
/// ```
pub fn with_context<R>(f: impl FnOnce(&ReactiveContext) -> R) -> R {
    CONTEXT.with(f)
}

/// Like [`with_context`], but `None` once the thread's context is being torn
/// down. For code that can run from destructors.
pub(crate) fn try_with_context<R>(f: impl FnOnce(&ReactiveContext) -> R) -> Option<R> {
    CONTEXT.try_with(f).ok()
}

/// True inside a reaction that is recording reads.
pub fn is_tracking() -> bool {
    with_context(|ctx| ctx.in_reaction() && !ctx.is_untracking())
}

pub fn write_version() -> u32 {
    with_context(|ctx| ctx.current_write())
}

pub fn read_version() -> u32 {
    with_context(|ctx| ctx.current_read())
}

// =============================================================================
// TESTS
// =============================================================================
