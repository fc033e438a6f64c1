// ============================================================================
// spark-fiber - Node Arena
// Rendered nodes stored in a slot map, linked child/sibling/parent by id
// ============================================================================
//
// Ownership runs parent -> first child -> next sibling. Parent links are
// plain ids, so a partially rebuilt child chain never invalidates anything
// outside it. Removed nodes stay in the arena, tagged for deletion, until
// the commit's deletion pass.
// ============================================================================

use std::any::Any;
use std::rc::Rc;

use slotmap::SlotMap;

use super::context::ContextId;
use super::element::{Child, Element, ElementType, Key, NodeRef, Props};
use crate::core::error::RenderError;
use crate::hooks::HookSlot;
use crate::host::HostHandle;
use crate::scheduler::reaction::ComponentReaction;

slotmap::new_key_type! {
    /// Generational id of a node in a root's arena.
    pub struct NodeId;
}

// =============================================================================
// NODE KINDS & TAGS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The container a root is mounted into
    Root,
    Host,
    Component,
    Fragment,
    Provider,
    Text,
    Portal,
}

impl NodeKind {
    pub fn of(ty: &ElementType) -> Self {
        match ty {
            ElementType::Host(_) => NodeKind::Host,
            ElementType::Text => NodeKind::Text,
            ElementType::Component(_) => NodeKind::Component,
            ElementType::Fragment => NodeKind::Fragment,
            ElementType::Provider(_) => NodeKind::Provider,
            ElementType::Portal(_) => NodeKind::Portal,
        }
    }

    /// Nodes that own a host node placed into their parent's host.
    pub fn is_host(self) -> bool {
        matches!(self, NodeKind::Host | NodeKind::Text)
    }

    /// Nodes whose host receives their children's host nodes.
    pub fn is_host_parent(self) -> bool {
        matches!(self, NodeKind::Root | NodeKind::Host | NodeKind::Portal)
    }
}

/// Host work a node needs at the next commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationTag {
    #[default]
    None,
    /// Insert (new node) or move (reused node)
    Placement,
    Update,
    Deletion,
}

/// The fields of a node as of its last commit.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub props: Props,
    pub text: Option<String>,
    pub index: usize,
    pub key: Option<Key>,
}

// =============================================================================
// NODE
// =============================================================================

pub struct Node {
    pub kind: NodeKind,
    pub ty: ElementType,
    pub key: Option<Key>,
    pub props: Props,
    pub text: Option<String>,
    pub node_ref: Option<NodeRef>,
    /// Element children as last supplied; input to reconciliation
    pub children: Vec<Child>,
    /// Value of a provider node
    pub context_value: Option<Rc<dyn Any>>,

    pub parent: Option<NodeId>,
    pub child: Option<NodeId>,
    pub sibling: Option<NodeId>,

    pub previous: Option<Snapshot>,
    pub hooks: Vec<HookSlot>,
    /// Whether the hook list has been through a complete render
    pub hooks_ready: bool,
    pub host: Option<HostHandle>,
    pub tag: MutationTag,
    pub depth: u32,
    pub index: usize,

    /// Generation of the newest update request
    pub requested: u64,
    /// Generation at the start of the last render
    pub rendered: u64,
    /// Whether the node sits on the worklist
    pub queued: bool,
    /// Queued only by signal notifications, so it may be skipped when its
    /// dependencies turn out unchanged
    pub signal_only: bool,
    pub reaction: Option<Rc<ComponentReaction>>,
    /// Error caught by a boundary node
    pub captured: Option<RenderError>,
}

impl Node {
    /// A fresh node for `element`, tagged for placement.
    pub fn from_element(element: Element, parent: NodeId, depth: u32, index: usize) -> Self {
        let kind = NodeKind::of(&element.ty);
        let host = match &element.ty {
            ElementType::Portal(container) => Some(*container),
            _ => None,
        };
        Self {
            kind,
            ty: element.ty,
            key: element.key,
            props: element.props,
            text: element.text,
            node_ref: element.node_ref,
            children: element.children,
            context_value: element.value,
            parent: Some(parent),
            child: None,
            sibling: None,
            previous: None,
            hooks: Vec::new(),
            hooks_ready: false,
            host,
            tag: MutationTag::Placement,
            depth,
            index,
            requested: 0,
            rendered: 0,
            queued: false,
            signal_only: false,
            reaction: None,
            captured: None,
        }
    }

    /// The root node, owning the container handle.
    pub fn root(container: HostHandle) -> Self {
        Self {
            kind: NodeKind::Root,
            ty: ElementType::Fragment,
            key: None,
            props: Props::new(),
            text: None,
            node_ref: None,
            children: Vec::new(),
            context_value: None,
            parent: None,
            child: None,
            sibling: None,
            previous: Some(Snapshot {
                props: Props::new(),
                text: None,
                index: 0,
                key: None,
            }),
            hooks: Vec::new(),
            hooks_ready: true,
            host: Some(container),
            tag: MutationTag::None,
            depth: 0,
            index: 0,
            requested: 0,
            rendered: 0,
            queued: false,
            signal_only: false,
            reaction: None,
            captured: None,
        }
    }

    /// Take new fields from a matching element.
    pub fn absorb(&mut self, element: Element) {
        self.key = element.key;
        self.props = element.props;
        self.text = element.text;
        self.node_ref = element.node_ref;
        self.children = element.children;
        self.context_value = element.value;
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            props: self.props.clone(),
            text: self.text.clone(),
            index: self.index,
            key: self.key.clone(),
        }
    }

    pub fn component_name(&self) -> &str {
        match &self.ty {
            ElementType::Component(def) => def.name(),
            ElementType::Host(tag) => tag,
            ElementType::Text => "#text",
            ElementType::Fragment if self.kind == NodeKind::Root => "#root",
            ElementType::Fragment => "#fragment",
            ElementType::Provider(_) => "#provider",
            ElementType::Portal(_) => "#portal",
        }
    }

    pub fn is_boundary(&self) -> bool {
        matches!(&self.ty, ElementType::Component(def) if def.is_boundary())
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("name", &self.component_name())
            .field("key", &self.key)
            .field("tag", &self.tag)
            .field("host", &self.host)
            .finish()
    }
}

// =============================================================================
// NODE TREE
// =============================================================================

/// Providers visible to a node, outermost first.
pub type ProviderStack = Vec<(ContextId, Rc<dyn Any>)>;

/// The arena plus the walks the scheduler and commit phase need.
#[derive(Default)]
pub struct NodeTree {
    nodes: SlotMap<NodeId, Node>,
}

impl NodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> NodeId {
        self.nodes.insert(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.nodes.remove(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of the current child chain.
    pub fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut cursor = self.get(id).and_then(|n| n.child);
        while let Some(child) = cursor {
            ids.push(child);
            cursor = self.get(child).and_then(|n| n.sibling);
        }
        ids
    }

    /// `id` and its descendants in document order.
    pub fn subtree_preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.contains(id) {
            return order;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            let children = self.child_ids(current);
            stack.extend(children.into_iter().rev());
        }
        order
    }

    /// Whether `id` still hangs off the root: every node on the way up is
    /// live and none is tagged for deletion.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            let Some(node) = self.get(current) else {
                return false;
            };
            if node.tag == MutationTag::Deletion {
                return false;
            }
            if node.kind == NodeKind::Root {
                return true;
            }
            match node.parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.get(node).and_then(|n| n.parent);
        }
        false
    }

    /// Host node that `id`'s host nodes live in.
    pub fn host_parent(&self, id: NodeId) -> Option<HostHandle> {
        let mut current = self.get(id)?.parent;
        while let Some(parent) = current {
            let node = self.get(parent)?;
            if node.kind.is_host_parent() {
                return node.host;
            }
            current = node.parent;
        }
        None
    }

    /// First host node after `id` in document order that is already in place
    /// under the same host parent. Nodes still waiting for placement and
    /// portal subtrees are skipped.
    pub fn host_sibling(&self, id: NodeId) -> Option<HostHandle> {
        let mut current = id;
        'siblings: loop {
            // Climb until a node with a next sibling, stopping at the host parent
            loop {
                let node = self.get(current)?;
                if let Some(sibling) = node.sibling {
                    current = sibling;
                    break;
                }
                let parent = self.get(node.parent?)?;
                if parent.kind.is_host_parent() {
                    return None;
                }
                current = node.parent?;
            }

            // Descend to the first host node of that sibling
            loop {
                let node = self.get(current)?;
                if node.tag == MutationTag::Placement || node.kind == NodeKind::Portal {
                    continue 'siblings;
                }
                if node.kind.is_host() {
                    match node.host {
                        Some(handle) => return Some(handle),
                        None => continue 'siblings,
                    }
                }
                match node.child {
                    Some(child) => current = child,
                    None => continue 'siblings,
                }
            }
        }
    }

    /// Host nodes directly under `id`'s host parent that belong to `id`:
    /// the node itself if it is a host node, otherwise the outermost host
    /// nodes below it. Portal contents are not included.
    pub fn top_level_hosts(&self, id: NodeId) -> Vec<HostHandle> {
        let mut hosts = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            if node.kind.is_host() {
                if let Some(handle) = node.host {
                    hosts.push(handle);
                }
                continue;
            }
            if node.kind == NodeKind::Portal {
                continue;
            }
            let children = self.child_ids(current);
            stack.extend(children.into_iter().rev());
        }
        hosts
    }

    /// Every `(host parent, host node)` pair that must be detached to remove
    /// `id` from the host tree. Host nodes take their descendants along, so
    /// below them only portal contents need removals of their own.
    pub fn host_removals(&self, id: NodeId) -> Vec<(HostHandle, HostHandle)> {
        let mut removals = Vec::new();
        let Some(parent_host) = self.host_parent(id) else {
            return removals;
        };
        let mut stack = vec![(id, Some(parent_host))];
        while let Some((current, parent_host)) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            let inner_parent = match (node.kind, node.host) {
                (NodeKind::Portal, Some(container)) => Some(container),
                (kind, host) if kind.is_host() => {
                    if let (Some(parent), Some(handle)) = (parent_host, host) {
                        removals.push((parent, handle));
                    }
                    None
                }
                _ => parent_host,
            };
            let children = self.child_ids(current);
            stack.extend(children.into_iter().rev().map(|c| (c, inner_parent)));
        }
        removals
    }

    /// Providers above `id` (outermost first) and its index path from the
    /// root, used for derived ids.
    pub fn scope_context(&self, id: NodeId) -> (ProviderStack, String) {
        let mut providers = Vec::new();
        let mut path = Vec::new();

        if let Some(node) = self.get(id) {
            if node.kind != NodeKind::Root {
                path.push(node.index);
            }
        }

        let mut current = self.get(id).and_then(|n| n.parent);
        while let Some(parent) = current {
            let Some(node) = self.get(parent) else {
                break;
            };
            if let (ElementType::Provider(context), Some(value)) = (&node.ty, &node.context_value)
            {
                providers.push((*context, value.clone()));
            }
            if node.kind != NodeKind::Root {
                path.push(node.index);
            }
            current = node.parent;
        }

        providers.reverse();
        path.reverse();
        let path = path
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(".");
        (providers, path)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::element::{fragment, h, portal, text};

    /// Append a child to `parent`'s chain.
    fn append(tree: &mut NodeTree, parent: NodeId, element: Element) -> NodeId {
        let siblings = tree.child_ids(parent);
        let depth = tree.get(parent).unwrap().depth + 1;
        let id = tree.insert(Node::from_element(element, parent, depth, siblings.len()));
        match siblings.last() {
            Some(&last) => tree.get_mut(last).unwrap().sibling = Some(id),
            None => tree.get_mut(parent).unwrap().child = Some(id),
        }
        id
    }

    fn committed(tree: &mut NodeTree, id: NodeId, host: u64) {
        let node = tree.get_mut(id).unwrap();
        node.host = Some(HostHandle(host));
        node.tag = MutationTag::None;
    }

    #[test]
    fn preorder_and_attachment() {
        let mut tree = NodeTree::new();
        let root = tree.insert(Node::root(HostHandle(1)));
        let div = append(&mut tree, root, h("div"));
        let a = append(&mut tree, div, text("a"));
        let b = append(&mut tree, root, h("p"));

        assert_eq!(tree.subtree_preorder(root), vec![root, div, a, b]);
        assert!(tree.is_attached(a));

        tree.get_mut(div).unwrap().tag = MutationTag::Deletion;
        assert!(!tree.is_attached(a));
        assert!(tree.is_attached(b));
    }

    #[test]
    fn host_parent_skips_fragments() {
        let mut tree = NodeTree::new();
        let root = tree.insert(Node::root(HostHandle(1)));
        let div = append(&mut tree, root, h("div"));
        committed(&mut tree, div, 2);
        let frag = append(&mut tree, div, fragment(Vec::<Child>::new()));
        let span = append(&mut tree, frag, h("span"));

        assert_eq!(tree.host_parent(span), Some(HostHandle(2)));
        assert_eq!(tree.host_parent(div), Some(HostHandle(1)));
    }

    #[test]
    fn host_sibling_skips_pending_placements() {
        let mut tree = NodeTree::new();
        let root = tree.insert(Node::root(HostHandle(1)));
        let a = append(&mut tree, root, h("a"));
        let frag = append(&mut tree, root, fragment(Vec::<Child>::new()));
        let b = append(&mut tree, frag, h("b"));
        let c = append(&mut tree, root, h("c"));
        committed(&mut tree, c, 30);

        // b is still waiting for placement, so a's anchor is c
        assert_eq!(tree.host_sibling(a), Some(HostHandle(30)));
        assert_eq!(tree.host_sibling(b), Some(HostHandle(30)));

        committed(&mut tree, b, 20);
        tree.get_mut(frag).unwrap().tag = MutationTag::None;
        assert_eq!(tree.host_sibling(a), Some(HostHandle(20)));
        assert_eq!(tree.host_sibling(c), None);
    }

    #[test]
    fn removals_follow_portals() {
        let mut tree = NodeTree::new();
        let root = tree.insert(Node::root(HostHandle(1)));
        let frag = append(&mut tree, root, fragment(Vec::<Child>::new()));
        let p = append(&mut tree, frag, h("p"));
        committed(&mut tree, p, 2);
        let portal_node = append(&mut tree, frag, portal(HostHandle(9), Vec::<Child>::new()));
        let modal = append(&mut tree, portal_node, h("dialog"));
        committed(&mut tree, modal, 3);

        assert_eq!(tree.top_level_hosts(frag), vec![HostHandle(2)]);
        assert_eq!(
            tree.host_removals(frag),
            vec![(HostHandle(1), HostHandle(2)), (HostHandle(9), HostHandle(3))]
        );
        assert_eq!(tree.host_parent(modal), Some(HostHandle(9)));
    }

    #[test]
    fn removals_reach_portals_under_host_nodes() {
        let mut tree = NodeTree::new();
        let root = tree.insert(Node::root(HostHandle(1)));
        let div = append(&mut tree, root, h("div"));
        committed(&mut tree, div, 2);
        let span = append(&mut tree, div, h("span"));
        committed(&mut tree, span, 3);
        let portal_node = append(&mut tree, div, portal(HostHandle(9), Vec::<Child>::new()));
        let modal = append(&mut tree, portal_node, h("dialog"));
        committed(&mut tree, modal, 4);

        assert_eq!(
            tree.host_removals(div),
            vec![(HostHandle(1), HostHandle(2)), (HostHandle(9), HostHandle(4))]
        );
    }

    #[test]
    fn scope_context_collects_providers_and_path() {
        let ctx = crate::tree::context::Context::with_default("n", 0);
        let mut tree = NodeTree::new();
        let root = tree.insert(Node::root(HostHandle(1)));
        let _first = append(&mut tree, root, h("header"));
        let provider = append(&mut tree, root, ctx.provide(5, Child::Empty));
        let leaf = append(&mut tree, provider, h("span"));

        let (providers, path) = tree.scope_context(leaf);
        assert_eq!(providers.len(), 1);
        assert_eq!(ctx.lookup(&providers).as_deref(), Some(&5));
        assert_eq!(path, "1.0");
    }
}
