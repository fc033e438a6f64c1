// ============================================================================
// spark-fiber - Work Loop
// Interruptible depth-first rendering of dirty subtrees
// ============================================================================
//
// The worklist holds dirty nodes. The loop takes the shallowest one as the
// top of a unit and walks its subtree depth-first over child/sibling/parent
// ids, rendering components and reconciling everything else. The cursor is
// saved in the root between calls, so a deadline can stop the walk after
// any node and the next call resumes there.
//
// When the worklist drains, the pass commits.
// ============================================================================

use std::rc::Rc;

use crate::commit::{self, effects::flush_passive};
use crate::core::error::{RenderError, Result};
use crate::core::types::AnyReaction;
use crate::hooks::scope::{RenderScope, ScopeMode, ScopeParts};
use crate::reactivity::tracking::{is_dirty, run_tracked};
use crate::reconciler::{normalize_children, normalize_output, reconcile};
use crate::tree::element::{Child, ElementType};
use crate::tree::node::{MutationTag, NodeId, NodeKind};

use super::deadline::Deadline;
use super::reaction::ComponentReaction;
use super::root::{RootInner, RootState, RootStatus, WorkUnit};

/// Outcome of one `perform_work` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    /// Nothing left to do
    Idle,
    /// Stopped at the deadline; call again to resume
    Yielded,
    /// Committed, but effects of that commit requested more work
    Pending,
}

/// Clears the reentrancy flag on every exit path.
struct WorkingGuard<'a>(&'a RootInner);

impl Drop for WorkingGuard<'_> {
    fn drop(&mut self) {
        self.0.working.set(false);
    }
}

/// Render dirty subtrees until the worklist drains or `deadline` asks to
/// yield, then commit.
pub(crate) fn perform_work(root: &Rc<RootInner>, deadline: &dyn Deadline) -> Result<WorkStatus> {
    match root.state.try_borrow().map(|state| state.status) {
        Ok(RootStatus::Unmounted) => return Err(RenderError::Unmounted),
        Ok(RootStatus::Failed) => return Err(RenderError::RootFailed),
        Ok(_) => {}
        Err(_) => return Ok(WorkStatus::Pending),
    }
    if root.working.replace(true) {
        return Ok(WorkStatus::Pending);
    }
    let _working = WorkingGuard(root);
    root.scheduled.set(false);

    flush_passive(root);

    let span = tracing::debug_span!("perform_work");
    let _enter = span.enter();

    {
        let mut state = root.state.borrow_mut();
        if state.is_closed() {
            return Err(RenderError::RootFailed);
        }
        if !state.has_work() && state.deletions.is_empty() && state.touched.is_empty() {
            return Ok(WorkStatus::Idle);
        }
        state.status = RootStatus::Working;
    }

    loop {
        let Some(id) = next_node(root) else {
            break;
        };
        match process_node(root, id) {
            Ok(()) => advance(&mut root.state.borrow_mut(), id),
            Err(error) => handle_render_error(root, id, error)?,
        }

        let more = root.state.borrow().has_work();
        if more && deadline.should_yield() {
            let mut state = root.state.borrow_mut();
            state.status = RootStatus::Yielded;
            state.stats.yields += 1;
            tracing::debug!("yielding to host");
            return Ok(WorkStatus::Yielded);
        }
    }

    let needs_commit = {
        let state = root.state.borrow();
        !state.touched.is_empty() || !state.deletions.is_empty()
    };
    if needs_commit {
        commit::commit_root(root)?;
    }

    let mut state = root.state.borrow_mut();
    state.pass_renders.clear();
    if state.is_closed() {
        return Err(RenderError::RootFailed);
    }
    state.status = RootStatus::Idle;
    Ok(if state.has_work() {
        WorkStatus::Pending
    } else {
        WorkStatus::Idle
    })
}

// =============================================================================
// UNIT SELECTION
// =============================================================================

/// The next node of the current unit, starting a new unit from the
/// worklist when the current one is done.
fn next_node(root: &RootInner) -> Option<NodeId> {
    loop {
        let (id, check) = {
            let mut state = root.state.borrow_mut();
            if let Some(unit) = state.unit {
                if let Some(next) = unit.next {
                    return Some(next);
                }
                state.unit = None;
            }
            pick_shallowest(&mut state)?
        };

        // Signal-only requests render only if a dependency really changed.
        // Checking may evaluate computeds, so the state is not borrowed here.
        if let Some(reaction) = check {
            if !is_dirty(&*reaction) {
                let mut state = root.state.borrow_mut();
                if let Some(node) = state.tree.get_mut(id) {
                    node.signal_only = false;
                    node.rendered = node.requested;
                }
                tracing::trace!(?id, "signal update skipped, dependencies unchanged");
                continue;
            }
        }

        let mut state = root.state.borrow_mut();
        state.unit = Some(WorkUnit {
            top: id,
            next: Some(id),
        });
        state.touched.push(id);
        state.stats.units += 1;
        return Some(id);
    }
}

/// Remove the shallowest stale node from the worklist. Entries that are
/// detached or already rendered at their requested generation are dropped.
fn pick_shallowest(state: &mut RootState) -> Option<(NodeId, Option<Rc<ComponentReaction>>)> {
    let RootState { tree, worklist, .. } = state;

    worklist.retain(|&id| {
        let live = tree.is_attached(id) && tree.get(id).is_some_and(|n| n.requested > n.rendered);
        if !live {
            if let Some(node) = tree.get_mut(id) {
                node.queued = false;
            }
        }
        live
    });

    let (position, _) = worklist
        .iter()
        .enumerate()
        .filter_map(|(i, &id)| tree.get(id).map(|n| (i, n.depth)))
        .min_by_key(|&(i, depth)| (depth, i))?;
    let id = worklist.remove(position);

    let node = tree.get_mut(id)?;
    node.queued = false;
    let check = if node.signal_only {
        node.reaction.clone()
    } else {
        None
    };
    Some((id, check))
}

/// Move the cursor to the next node in depth-first order, staying inside
/// the unit's subtree.
fn advance(state: &mut RootState, id: NodeId) {
    let RootState { tree, unit, .. } = state;
    let Some(unit) = unit.as_mut() else {
        return;
    };

    if let Some(child) = tree.get(id).and_then(|n| n.child) {
        unit.next = Some(child);
        return;
    }

    let mut current = id;
    unit.next = loop {
        if current == unit.top {
            break None;
        }
        let Some(node) = tree.get(current) else {
            break None;
        };
        if let Some(sibling) = node.sibling {
            break Some(sibling);
        }
        match node.parent {
            Some(parent) => current = parent,
            None => break None,
        }
    };
}

// =============================================================================
// PROCESSING
// =============================================================================

fn process_node(root: &Rc<RootInner>, id: NodeId) -> Result<()> {
    let kind = root.state.borrow().tree.get(id).map(|n| n.kind);
    match kind {
        None | Some(NodeKind::Text) => Ok(()),
        Some(NodeKind::Component) => render_component(root, id),
        Some(_) => {
            let mut state = root.state.borrow_mut();
            let RootState {
                tree, deletions, ..
            } = &mut *state;
            let children = tree
                .get(id)
                .map(|n| normalize_children(&n.children))
                .unwrap_or_default();
            reconcile(tree, id, children, deletions);
            Ok(())
        }
    }
}

fn render_component(root: &Rc<RootInner>, id: NodeId) -> Result<()> {
    let limit = root.config.max_rerenders;

    // Take what the render needs, then release the root so setters and
    // signal writes made by the component can reach it.
    let (def, name, props, children, captured, mut hooks, first, providers, path, reaction) = {
        let mut state = root.state.borrow_mut();
        let generation = state.generation;
        let count = {
            let count = state.pass_renders.entry(id).or_insert(0);
            *count += 1;
            *count
        };
        let (providers, path) = state.tree.scope_context(id);
        state.stats.renders += 1;

        let Some(node) = state.tree.get_mut(id) else {
            return Ok(());
        };
        let ElementType::Component(def) = &node.ty else {
            return Ok(());
        };
        let def = def.clone();
        let name = node.component_name().to_string();
        if count > limit {
            tracing::warn!(component = %name, limit, "render-phase update loop");
            return Err(RenderError::TooManyRerenders {
                component: name,
                limit,
            });
        }

        node.rendered = generation;
        node.queued = false;
        node.signal_only = false;
        let reaction = node
            .reaction
            .get_or_insert_with(|| ComponentReaction::new(root.target(id)))
            .clone();
        (
            def,
            name,
            node.props.clone(),
            node.children.clone(),
            node.captured.clone(),
            std::mem::take(&mut node.hooks),
            !node.hooks_ready,
            providers,
            path,
            reaction,
        )
    };

    let span = tracing::trace_span!("render", component = %name);
    let _enter = span.enter();

    reaction.mark_clean();
    let active: Rc<dyn AnyReaction> = reaction;
    let result = run_tracked(&active, || -> Result<Child> {
        let parts = ScopeParts {
            component: &name,
            props: &props,
            children: &children,
            providers: &providers,
            id_path: &path,
            captured: captured.as_ref(),
        };
        let mut scope = RenderScope::new(parts, &mut hooks, first, ScopeMode::Live(root.target(id)));
        let output = def.call(&mut scope)?;
        scope.finish()?;
        Ok(output)
    });

    let mut state = root.state.borrow_mut();
    let RootState {
        tree, deletions, ..
    } = &mut *state;
    let Some(node) = tree.get_mut(id) else {
        return Ok(());
    };
    node.hooks = hooks;
    let output = result?;
    node.hooks_ready = true;
    reconcile(tree, id, normalize_output(output), deletions);
    Ok(())
}

// =============================================================================
// ERRORS
// =============================================================================

/// Send a render error to the nearest error boundary above `failed`, or
/// tear the tree down when there is none.
fn handle_render_error(root: &Rc<RootInner>, failed: NodeId, error: RenderError) -> Result<()> {
    let mut state = root.state.borrow_mut();

    let mut boundary = None;
    let mut current = state.tree.get(failed).and_then(|n| n.parent);
    while let Some(id) = current {
        let Some(node) = state.tree.get(id) else {
            break;
        };
        if node.is_boundary() && node.captured.is_none() {
            boundary = Some(id);
            break;
        }
        current = node.parent;
    }

    let Some(boundary) = boundary else {
        drop(state);
        tracing::error!(%error, "uncaught render error; tearing down the tree");
        teardown(root)?;
        return Err(error);
    };

    tracing::debug!(%error, "render error caught by boundary");
    if let Some(node) = state.tree.get_mut(boundary) {
        node.captured = Some(error);
    }
    // Resume at the boundary. If it sits above the current unit, it becomes
    // the top of a new unit covering the old one.
    let top = match state.unit {
        Some(unit) if state.tree.is_within(boundary, unit.top) => unit.top,
        _ => {
            state.touched.push(boundary);
            boundary
        }
    };
    state.unit = Some(WorkUnit {
        top,
        next: Some(boundary),
    });
    Ok(())
}

/// Delete every child of the root node, running their cleanups, and drop
/// all pending work. The root stays mounted and can render again.
pub(crate) fn teardown(root: &Rc<RootInner>) -> Result<()> {
    {
        let mut state = root.state.borrow_mut();
        let root_id = state.root;
        for child in state.tree.child_ids(root_id) {
            if let Some(node) = state.tree.get_mut(child) {
                node.tag = MutationTag::Deletion;
                node.sibling = None;
            }
            state.deletions.push(child);
        }
        if let Some(node) = state.tree.get_mut(root_id) {
            node.child = None;
            node.children.clear();
        }
        let RootState { tree, worklist, .. } = &mut *state;
        for id in worklist.drain(..) {
            if let Some(node) = tree.get_mut(id) {
                node.queued = false;
            }
        }
        state.unit = None;
        state.touched.clear();
        state.pass_renders.clear();
        state.status = RootStatus::Committing;
    }

    commit::deletion::run_deletions(root)?;

    let mut state = root.state.borrow_mut();
    if !state.is_closed() {
        state.status = RootStatus::Idle;
    }
    Ok(())
}
