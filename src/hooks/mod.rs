// ============================================================================
// spark-fiber - Hooks Module
// Ordered, persistent per-node state requested through a RenderScope
// ============================================================================
//
// Hook N of a render pairs with slot N of the node's previous render. The
// slot list lives on the node; the scope only borrows it for the duration
// of one component call.
// ============================================================================

use std::any::Any;
use std::fmt;

use crate::primitives::watch::CleanupFn;

pub mod effect;
pub mod memo;
pub mod reactive;
pub mod scope;
pub mod state;

pub use effect::{EffectJob, EffectPhase};
pub use scope::{RenderScope, ScopeMode};
pub use state::{Dispatch, StateSetter};

// =============================================================================
// HOOK KIND
// =============================================================================

/// Which hook created a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    State,
    Reducer,
    Effect,
    LayoutEffect,
    Memo,
    Callback,
    Ref,
    Context,
    Id,
    Signal,
    Computed,
    Watch,
    Store,
}

impl HookKind {
    pub fn name(self) -> &'static str {
        match self {
            HookKind::State => "use_state",
            HookKind::Reducer => "use_reducer",
            HookKind::Effect => "use_effect",
            HookKind::LayoutEffect => "use_layout_effect",
            HookKind::Memo => "use_memo",
            HookKind::Callback => "use_callback",
            HookKind::Ref => "use_ref",
            HookKind::Context => "use_context",
            HookKind::Id => "use_id",
            HookKind::Signal => "use_signal",
            HookKind::Computed => "use_computed",
            HookKind::Watch => "use_watch",
            HookKind::Store => "use_store",
        }
    }

    fn is_effect(self) -> bool {
        matches!(self, HookKind::Effect | HookKind::LayoutEffect)
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// HOOK SLOT
// =============================================================================

/// One persisted hook.
pub struct HookSlot {
    pub kind: HookKind,
    pub state: Box<dyn Any>,
    /// Disposal for reactive primitives owned by the slot
    pub dispose: Option<CleanupFn>,
}

impl HookSlot {
    pub fn new(kind: HookKind, state: Box<dyn Any>) -> Self {
        Self {
            kind,
            state,
            dispose: None,
        }
    }

    /// Everything that must run when the owning node is deleted, in order.
    ///
    /// An effect slot is marked dead first, so a callback still waiting in
    /// the passive queue is skipped.
    pub fn unmount_tasks(mut self) -> Vec<CleanupFn> {
        let mut tasks = Vec::new();
        if self.kind.is_effect() {
            if let Some(cleanup) = effect::retire(&mut self) {
                tasks.push(cleanup);
            }
        }
        if let Some(dispose) = self.dispose.take() {
            tasks.push(dispose);
        }
        tasks
    }
}

impl fmt::Debug for HookSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSlot")
            .field("kind", &self.kind)
            .field("dispose", &self.dispose.is_some())
            .finish()
    }
}
