// ============================================================================
// spark-fiber - Reconcile
// Applying a child plan to the node arena
// ============================================================================

use crate::tree::element::Element;
use crate::tree::node::{MutationTag, Node, NodeId, NodeTree};

use super::diff::{ChildDesc, ChildOp, plan_children};

/// Replace `parent`'s child chain with nodes for `elements`.
///
/// Reused nodes take the new element's fields and are tagged `Placement`
/// when they moved (or were never committed), `Update` otherwise. Fresh
/// nodes are tagged `Placement`. Old children without a match are tagged
/// `Deletion`, unlinked and appended to `deletions`.
///
/// Returns the new first child.
pub fn reconcile(
    tree: &mut NodeTree,
    parent: NodeId,
    elements: Vec<Element>,
    deletions: &mut Vec<NodeId>,
) -> Option<NodeId> {
    let old_ids: Vec<NodeId> = tree
        .child_ids(parent)
        .into_iter()
        .filter(|id| tree.contains(*id))
        .collect();
    let depth = tree.get(parent).map_or(0, |node| node.depth + 1);

    let plan = {
        let old: Vec<ChildDesc<'_>> = old_ids
            .iter()
            .filter_map(|id| tree.get(*id))
            .map(|node| ChildDesc::new(node.key.as_ref(), &node.ty))
            .collect();
        let new: Vec<ChildDesc<'_>> = elements
            .iter()
            .map(|element| ChildDesc::new(element.key.as_ref(), &element.ty))
            .collect();
        plan_children(&old, &new)
    };

    // Deleted nodes leave the sibling chain now but stay in the arena with
    // their parent link. The commit reaches them through `deletions`, runs
    // their cleanups and ref detaches, then removes their host nodes.
    for &old_index in &plan.deletions {
        let id = old_ids[old_index];
        if let Some(node) = tree.get_mut(id) {
            node.tag = MutationTag::Deletion;
            node.sibling = None;
        }
        deletions.push(id);
    }

    let mut new_ids = Vec::with_capacity(elements.len());
    for (index, (element, op)) in elements.into_iter().zip(plan.ops).enumerate() {
        let id = match op {
            ChildOp::Reuse { old, moved } => {
                let id = old_ids[old];
                if let Some(node) = tree.get_mut(id) {
                    node.absorb(element);
                    node.index = index;
                    node.depth = depth;
                    node.captured = None;
                    node.tag = if moved
                        || node.previous.is_none()
                        || node.tag == MutationTag::Placement
                    {
                        MutationTag::Placement
                    } else {
                        MutationTag::Update
                    };
                }
                id
            }
            ChildOp::Create => tree.insert(Node::from_element(element, parent, depth, index)),
        };
        new_ids.push(id);
    }

    // Relink
    for pair in new_ids.windows(2) {
        if let Some(node) = tree.get_mut(pair[0]) {
            node.sibling = Some(pair[1]);
        }
    }
    if let Some(node) = new_ids.last().and_then(|&last| tree.get_mut(last)) {
        node.sibling = None;
    }
    let first = new_ids.first().copied();
    if let Some(node) = tree.get_mut(parent) {
        node.child = first;
    }
    first
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostHandle;
    use crate::tree::element::{h, text};

    fn list(keys: &[&str]) -> Vec<Element> {
        keys.iter().map(|k| h("li").key(*k)).collect()
    }

    /// Pretend a commit happened.
    fn commit_all(tree: &mut NodeTree, root: NodeId) {
        for id in tree.subtree_preorder(root) {
            let node = tree.get_mut(id).unwrap();
            node.previous = Some(node.snapshot());
            node.tag = MutationTag::None;
        }
    }

    fn keys_of(tree: &NodeTree, parent: NodeId) -> Vec<String> {
        tree.child_ids(parent)
            .into_iter()
            .map(|id| tree.get(id).unwrap().key.as_ref().unwrap().to_string())
            .collect()
    }

    #[test]
    fn first_reconcile_places_everything() {
        let mut tree = NodeTree::new();
        let root = tree.insert(Node::root(HostHandle(1)));
        let mut deletions = Vec::new();
        reconcile(&mut tree, root, list(&["a", "b"]), &mut deletions);

        assert!(deletions.is_empty());
        assert_eq!(keys_of(&tree, root), vec!["a", "b"]);
        for id in tree.child_ids(root) {
            let node = tree.get(id).unwrap();
            assert_eq!(node.tag, MutationTag::Placement);
            assert_eq!(node.depth, 1);
            assert_eq!(node.parent, Some(root));
        }
    }

    #[test]
    fn reorder_reuses_nodes_and_tags_one_move() {
        let mut tree = NodeTree::new();
        let root = tree.insert(Node::root(HostHandle(1)));
        let mut deletions = Vec::new();
        reconcile(&mut tree, root, list(&["a", "b", "c"]), &mut deletions);
        let before = tree.child_ids(root);
        commit_all(&mut tree, root);

        reconcile(&mut tree, root, list(&["c", "a", "b"]), &mut deletions);
        let after = tree.child_ids(root);

        assert_eq!(after, vec![before[2], before[0], before[1]]);
        let tags: Vec<MutationTag> = after.iter().map(|id| tree.get(*id).unwrap().tag).collect();
        assert_eq!(
            tags,
            vec![MutationTag::Placement, MutationTag::Update, MutationTag::Update]
        );
        assert_eq!(tree.get(before[2]).unwrap().index, 0);
        assert!(deletions.is_empty());
    }

    #[test]
    fn removed_children_are_tagged_and_unlinked() {
        let mut tree = NodeTree::new();
        let root = tree.insert(Node::root(HostHandle(1)));
        let mut deletions = Vec::new();
        reconcile(&mut tree, root, list(&["a", "b", "c"]), &mut deletions);
        let before = tree.child_ids(root);
        commit_all(&mut tree, root);

        reconcile(&mut tree, root, list(&["a", "c"]), &mut deletions);
        assert_eq!(deletions, vec![before[1]]);
        let removed = tree.get(before[1]).unwrap();
        assert_eq!(removed.tag, MutationTag::Deletion);
        assert_eq!(removed.sibling, None);
        assert_eq!(tree.child_ids(root), vec![before[0], before[2]]);
    }

    #[test]
    fn empty_list_clears_chain() {
        let mut tree = NodeTree::new();
        let root = tree.insert(Node::root(HostHandle(1)));
        let mut deletions = Vec::new();
        reconcile(&mut tree, root, vec![text("x")], &mut deletions);
        assert_eq!(reconcile(&mut tree, root, Vec::new(), &mut deletions), None);
        assert_eq!(deletions.len(), 1);
        assert!(tree.child_ids(root).is_empty());
    }
}
