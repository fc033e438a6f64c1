// ============================================================================
// spark-fiber - Deletion Pass
// Unmounting removed subtrees before any other host work
// ============================================================================
//
// For every detached subtree, in order: hook cleanups run in preorder and
// slot order, component reactions unsubscribe, refs clear, and only then
// are the outermost host nodes removed and the nodes freed. Cleanups run
// without the root borrowed, so they may read refs, write signals or call
// setters on other nodes.
// ============================================================================

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use crate::core::error::{HostError, Result};
use crate::host::{HostHandle, HostTree};
use crate::primitives::watch::CleanupFn;
use crate::scheduler::reaction::ComponentReaction;
use crate::scheduler::root::RootInner;
use crate::tree::element::NodeRef;

use super::fail;

struct Unmount {
    component: String,
    task: CleanupFn,
}

/// Unmount and free every subtree on the root's deletion list.
pub(crate) fn run_deletions(root: &RootInner) -> Result<()> {
    let mut tasks = Vec::new();
    let mut reactions: Vec<Rc<ComponentReaction>> = Vec::new();
    let mut refs: Vec<NodeRef> = Vec::new();

    let subtrees = {
        let mut state = root.state.borrow_mut();
        let subtrees = std::mem::take(&mut state.deletions);
        for &top in &subtrees {
            for id in state.tree.subtree_preorder(top) {
                let Some(node) = state.tree.get_mut(id) else {
                    continue;
                };
                node.queued = false;
                let component = node.component_name().to_string();
                for slot in std::mem::take(&mut node.hooks) {
                    tasks.extend(slot.unmount_tasks().into_iter().map(|task| Unmount {
                        component: component.clone(),
                        task,
                    }));
                }
                reactions.extend(node.reaction.take());
                refs.extend(node.node_ref.clone());
            }
        }
        subtrees
    };
    if subtrees.is_empty() {
        return Ok(());
    }
    tracing::debug!(subtrees = subtrees.len(), cleanups = tasks.len(), "deleting");

    for reaction in &reactions {
        reaction.dispose();
    }
    for Unmount { component, task } in tasks {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
            tracing::error!(
                component = %component,
                message = %panic_message(&*payload),
                "cleanup panicked during unmount"
            );
        }
    }
    for node_ref in &refs {
        node_ref.clear();
    }

    let removed = {
        let mut state = root.state.borrow_mut();
        let mut host = root.host.borrow_mut();
        let mut result = Ok(());
        for &top in &subtrees {
            if result.is_ok() {
                result = detach(host.as_mut(), state.tree.host_removals(top));
            }
            for id in state.tree.subtree_preorder(top) {
                state.tree.remove(id);
            }
        }
        result
    };
    removed.map_err(|error| fail(root, error.into()))
}

fn detach(
    host: &mut dyn HostTree,
    removals: Vec<(HostHandle, HostHandle)>,
) -> std::result::Result<(), HostError> {
    for (parent, child) in removals {
        host.remove_child(parent, child)?;
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

