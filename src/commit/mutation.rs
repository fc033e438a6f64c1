// ============================================================================
// spark-fiber - Mutation Pass
// Applying placements and updates to the host tree
// ============================================================================
//
// Walks every subtree processed this pass in preorder, so a parent's host
// node exists before its children are inserted into it. Each node is
// committed exactly once: its host work is applied, its effect slots hand
// over their pending runs, and its fields become the snapshot the next
// commit diffs against.
// ============================================================================

use crate::core::error::HostError;
use crate::hooks::{EffectJob, effect};
use crate::host::{HostHandle, HostTree};
use crate::scheduler::root::{RootInner, RootState};
use crate::tree::element::{ElementType, PropValue, Props};
use crate::tree::node::{MutationTag, NodeId, NodeKind, NodeTree};

type HostResult<T> = std::result::Result<T, HostError>;

/// Commit the touched subtrees and return the effect runs they collected,
/// parents before children.
pub(crate) fn apply_mutations(root: &RootInner) -> HostResult<Vec<EffectJob>> {
    let mut state = root.state.borrow_mut();
    let mut host = root.host.borrow_mut();
    let RootState { tree, touched, .. } = &mut *state;

    let tops = outermost(tree, std::mem::take(touched));
    let mut jobs = Vec::new();
    for top in tops {
        for id in tree.subtree_preorder(top) {
            commit_node(tree, host.as_mut(), id, &mut jobs)?;
        }
    }
    Ok(jobs)
}

/// Attached tops that are not inside another top.
fn outermost(tree: &NodeTree, mut tops: Vec<NodeId>) -> Vec<NodeId> {
    tops.retain(|&id| tree.is_attached(id));
    tops.sort_by_key(|&id| tree.get(id).map_or(0, |n| n.depth));
    let mut kept: Vec<NodeId> = Vec::new();
    for id in tops {
        if !kept.iter().any(|&top| tree.is_within(id, top)) {
            kept.push(id);
        }
    }
    kept
}

fn commit_node(
    tree: &mut NodeTree,
    host: &mut dyn HostTree,
    id: NodeId,
    jobs: &mut Vec<EffectJob>,
) -> HostResult<()> {
    let Some(tag) = tree.get(id).map(|n| n.tag) else {
        return Ok(());
    };
    match tag {
        MutationTag::Placement => place(tree, host, id)?,
        MutationTag::Update => update(tree, host, id)?,
        MutationTag::None | MutationTag::Deletion => {}
    }

    let Some(node) = tree.get_mut(id) else {
        return Ok(());
    };
    if node.kind == NodeKind::Component {
        jobs.extend(node.hooks.iter_mut().filter_map(effect::collect));
    }
    if node.kind.is_host() {
        if let (Some(node_ref), Some(handle)) = (&node.node_ref, node.host) {
            node_ref.set(handle);
        }
    }
    node.previous = Some(node.snapshot());
    node.tag = MutationTag::None;
    Ok(())
}

// =============================================================================
// PLACEMENT
// =============================================================================

fn place(tree: &mut NodeTree, host: &mut dyn HostTree, id: NodeId) -> HostResult<()> {
    let Some(kind) = tree.get(id).map(|n| n.kind) else {
        return Ok(());
    };

    if kind.is_host() {
        let handle = match tree.get(id).and_then(|n| n.host) {
            // A moved node may also have changed
            Some(handle) => {
                update(tree, host, id)?;
                handle
            }
            None => {
                let handle = match tree.get(id) {
                    Some(node) => create(host, node.kind, &node.ty, node.text.as_deref(), &node.props)?,
                    None => return Ok(()),
                };
                if let Some(node) = tree.get_mut(id) {
                    node.host = Some(handle);
                }
                handle
            }
        };
        let parent = host_parent(tree, id)?;
        host.insert_before(parent, handle, tree.host_sibling(id))?;
        return Ok(());
    }

    // A portal's contents stay in its own container
    if kind == NodeKind::Portal {
        return Ok(());
    }

    // A moved component or fragment carries its host nodes along
    let hosts = tree.top_level_hosts(id);
    if hosts.is_empty() {
        return Ok(());
    }
    let parent = host_parent(tree, id)?;
    let before = tree.host_sibling(id);
    for handle in hosts {
        host.insert_before(parent, handle, before)?;
    }
    Ok(())
}

fn create(
    host: &mut dyn HostTree,
    kind: NodeKind,
    ty: &ElementType,
    text: Option<&str>,
    props: &Props,
) -> HostResult<HostHandle> {
    match (kind, ty) {
        (NodeKind::Host, ElementType::Host(tag)) => {
            let handle = host.create_element(tag)?;
            sync_props(host, handle, None, props)?;
            Ok(handle)
        }
        _ => host.create_text(text.unwrap_or_default()),
    }
}

fn host_parent(tree: &NodeTree, id: NodeId) -> HostResult<HostHandle> {
    tree.host_parent(id)
        .ok_or_else(|| HostError::Operation(format!("no host parent for {id:?}")))
}

// =============================================================================
// UPDATE
// =============================================================================

fn update(tree: &NodeTree, host: &mut dyn HostTree, id: NodeId) -> HostResult<()> {
    let Some(node) = tree.get(id) else {
        return Ok(());
    };
    let Some(handle) = node.host else {
        return Ok(());
    };
    let previous = node.previous.as_ref();
    match node.kind {
        NodeKind::Host => sync_props(host, handle, previous.map(|p| &p.props), &node.props),
        NodeKind::Text => {
            let old = previous.and_then(|p| p.text.as_deref());
            let new = node.text.as_deref();
            if old != new {
                host.set_text(handle, new.unwrap_or_default())?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Bring a host node's attributes and listeners from `old` to `new`.
/// Props named `on<event>` holding a handler become listeners; everything
/// with an attribute form becomes an attribute.
fn sync_props(
    host: &mut dyn HostTree,
    handle: HostHandle,
    old: Option<&Props>,
    new: &Props,
) -> HostResult<()> {
    if let Some(old) = old {
        for (name, value) in old.iter() {
            let next = new.get(name);
            match event_name(name, value) {
                Some(event) => {
                    if !next.is_some_and(PropValue::is_handler) {
                        host.remove_event_listener(handle, event)?;
                    }
                }
                None => {
                    let had = value.to_attr_string().is_some();
                    if had && next.and_then(PropValue::to_attr_string).is_none() {
                        host.remove_attribute(handle, name)?;
                    }
                }
            }
        }
    }

    for (name, value) in new.iter() {
        let previous = old.and_then(|o| o.get(name));
        if let PropValue::Handler(handler) = value {
            if let Some(event) = event_name(name, value) {
                if previous != Some(value) {
                    host.add_event_listener(handle, event, handler.clone())?;
                }
            }
            continue;
        }
        let Some(text) = value.to_attr_string() else {
            continue;
        };
        let unchanged = previous
            .and_then(PropValue::to_attr_string)
            .is_some_and(|before| before == text);
        if !unchanged {
            host.set_attribute(handle, name, &text)?;
        }
    }
    Ok(())
}

fn event_name<'a>(name: &'a str, value: &PropValue) -> Option<&'a str> {
    if value.is_handler() {
        name.strip_prefix("on")
    } else {
        None
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::host::{Event, HostOp, MemoryHost};

    #[test]
    fn sync_props_diffs_attributes_and_listeners() {
        let mut host = MemoryHost::new();
        let node = host.create_element("div").unwrap();
        let handler: crate::host::EventHandler = Rc::new(|_: &Event| {});

        let old = Props::new()
            .with("id", "a")
            .with("hidden", true)
            .with("onclick", PropValue::Handler(handler.clone()));
        sync_props(&mut host, node, None, &old).unwrap();
        assert_eq!(host.attribute(node, "id").as_deref(), Some("a"));
        assert!(host.has_listener(node, "click"));

        host.clear_ops();
        let new = Props::new()
            .with("id", "a")
            .with("title", "t")
            .with("onclick", PropValue::Handler(handler));
        sync_props(&mut host, node, Some(&old), &new).unwrap();
        assert_eq!(
            host.ops(),
            vec![
                HostOp::RemoveAttribute {
                    node,
                    name: "hidden".into()
                },
                HostOp::SetAttribute {
                    node,
                    name: "title".into(),
                    value: "t".into()
                },
            ]
        );

        sync_props(&mut host, node, Some(&new), &Props::new()).unwrap();
        assert!(!host.has_listener(node, "click"));
        assert_eq!(host.attribute(node, "id"), None);
    }

    #[test]
    fn handler_props_without_prefix_are_ignored() {
        let mut host = MemoryHost::new();
        let node = host.create_element("div").unwrap();
        let handler: crate::host::EventHandler = Rc::new(|_: &Event| {});
        let props = Props::new().with("callback", PropValue::Handler(handler));
        sync_props(&mut host, node, None, &props).unwrap();
        assert!(!host.has_listener(node, "callback"));
        assert_eq!(host.attribute(node, "callback"), None);
    }
}
