// ============================================================================
// spark-fiber - Render Scope
// The handle a component body receives; every hook is a method on it
// ============================================================================

use std::any::Any;
use std::rc::Rc;

use super::{HookKind, HookSlot};
use crate::core::error::{RenderError, Result};
use crate::primitives::watch::CleanupFn;
use crate::scheduler::root::UpdateTarget;
use crate::tree::context::ContextId;
use crate::tree::element::{Child, Props};

/// How updates requested from this render are delivered.
#[derive(Clone)]
pub enum ScopeMode {
    /// Mounted node; setters schedule a re-render of it
    Live(UpdateTarget),
    /// One-shot render (`render_to_string`); setters only store the value
    /// and effects never run
    Static,
}

/// Node data a scope is built from.
pub(crate) struct ScopeParts<'a> {
    pub component: &'a str,
    pub props: &'a Props,
    pub children: &'a [Child],
    pub providers: &'a [(ContextId, Rc<dyn Any>)],
    pub id_path: &'a str,
    pub captured: Option<&'a RenderError>,
}

/// Per-render access to a component's props, children, context and hooks.
///
/// Hooks must be called in the same order on every render. A render that
/// asks for a different hook at some position than the previous render
/// fails with [`RenderError::HookMismatch`].
pub struct RenderScope<'a> {
    parts: ScopeParts<'a>,
    hooks: &'a mut Vec<HookSlot>,
    cursor: usize,
    first_render: bool,
    pub(crate) mode: ScopeMode,
    pub(crate) id_counter: usize,
}

impl<'a> RenderScope<'a> {
    pub(crate) fn new(
        parts: ScopeParts<'a>,
        hooks: &'a mut Vec<HookSlot>,
        first_render: bool,
        mode: ScopeMode,
    ) -> Self {
        Self {
            parts,
            hooks,
            cursor: 0,
            first_render,
            mode,
            id_counter: 0,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn props(&self) -> &Props {
        self.parts.props
    }

    /// Children passed to the component element.
    pub fn children(&self) -> &[Child] {
        self.parts.children
    }

    pub fn component_name(&self) -> &str {
        self.parts.component
    }

    /// The error this node caught, when it is an error boundary showing its
    /// fallback.
    pub fn captured_error(&self) -> Option<&RenderError> {
        self.parts.captured
    }

    /// True during `render_to_string`.
    pub fn is_static(&self) -> bool {
        matches!(self.mode, ScopeMode::Static)
    }

    /// Whether this is the node's first complete render.
    pub fn is_first_render(&self) -> bool {
        self.first_render
    }

    pub(crate) fn providers(&self) -> &[(ContextId, Rc<dyn Any>)] {
        self.parts.providers
    }

    pub(crate) fn id_path(&self) -> &str {
        self.parts.id_path
    }

    pub(crate) fn target(&self) -> Option<UpdateTarget> {
        match &self.mode {
            ScopeMode::Live(target) => Some(target.clone()),
            ScopeMode::Static => None,
        }
    }

    // =========================================================================
    // SLOTS
    // =========================================================================

    fn mismatch(&self, index: usize, expected: String, found: String) -> RenderError {
        RenderError::HookMismatch {
            component: self.parts.component.to_string(),
            index,
            expected,
            found,
        }
    }

    /// Claim the next slot for a `kind` hook.
    ///
    /// `Ok(None)` means the slot does not exist yet and the caller must
    /// create it with [`push_slot`](Self::push_slot).
    pub(crate) fn existing_slot<S: 'static>(&mut self, kind: HookKind) -> Result<Option<&mut S>> {
        let index = self.cursor;
        self.cursor += 1;

        let Some(found_kind) = self.hooks.get(index).map(|slot| slot.kind) else {
            if self.first_render {
                return Ok(None);
            }
            return Err(self.mismatch(index, "no hook".into(), kind.to_string()));
        };
        if found_kind != kind {
            return Err(self.mismatch(index, found_kind.to_string(), kind.to_string()));
        }
        if !self.hooks[index].state.is::<S>() {
            return Err(self.mismatch(
                index,
                found_kind.to_string(),
                format!("{kind} holding {}", std::any::type_name::<S>()),
            ));
        }
        Ok(self.hooks[index].state.downcast_mut::<S>())
    }

    /// Store a new slot at the position claimed by the last
    /// [`existing_slot`](Self::existing_slot) call.
    pub(crate) fn push_slot<S: 'static>(
        &mut self,
        kind: HookKind,
        state: S,
        dispose: Option<CleanupFn>,
    ) {
        let mut slot = HookSlot::new(kind, Box::new(state));
        slot.dispose = dispose;
        self.hooks.push(slot);
    }

    /// Check that the render asked for every hook the previous one did.
    pub(crate) fn finish(&self) -> Result<()> {
        if self.first_render || self.cursor >= self.hooks.len() {
            return Ok(());
        }
        let expected = self.hooks[self.cursor].kind.to_string();
        Err(self.mismatch(self.cursor, expected, "no more hooks".into()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
