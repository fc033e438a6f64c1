// ============================================================================
// spark-fiber - In-Memory Host
// A HostTree backed by plain data: operation log, HTML output, event dispatch
// ============================================================================

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{Event, EventHandler, HostHandle, HostTree};
use crate::core::error::HostError;
use crate::render::string::{escape_html, is_void_element};

// =============================================================================
// OPERATION LOG
// =============================================================================

/// One call made against a [`MemoryHost`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    CreateElement {
        node: HostHandle,
        tag: String,
    },
    CreateText {
        node: HostHandle,
        text: String,
    },
    SetText {
        node: HostHandle,
        text: String,
    },
    SetAttribute {
        node: HostHandle,
        name: String,
        value: String,
    },
    RemoveAttribute {
        node: HostHandle,
        name: String,
    },
    InsertBefore {
        parent: HostHandle,
        node: HostHandle,
        before: Option<HostHandle>,
    },
    RemoveChild {
        parent: HostHandle,
        child: HostHandle,
    },
    AddListener {
        node: HostHandle,
        event: String,
    },
    RemoveListener {
        node: HostHandle,
        event: String,
    },
}

impl HostOp {
    /// Whether this op inserted or moved a node.
    pub fn is_insert(&self) -> bool {
        matches!(self, HostOp::InsertBefore { .. })
    }

    /// Whether this op created a node.
    pub fn is_create(&self) -> bool {
        matches!(self, HostOp::CreateElement { .. } | HostOp::CreateText { .. })
    }

    /// Whether this op detached a node.
    pub fn is_remove(&self) -> bool {
        matches!(self, HostOp::RemoveChild { .. })
    }
}

// =============================================================================
// NODES
// =============================================================================

enum MemKind {
    Container,
    Element(String),
    Text(String),
}

struct MemNode {
    kind: MemKind,
    attributes: IndexMap<String, String>,
    listeners: IndexMap<String, EventHandler>,
    children: Vec<HostHandle>,
    parent: Option<HostHandle>,
}

impl MemNode {
    fn new(kind: MemKind) -> Self {
        Self {
            kind,
            attributes: IndexMap::new(),
            listeners: IndexMap::new(),
            children: Vec::new(),
            parent: None,
        }
    }
}

#[derive(Default)]
struct MemoryDom {
    nodes: HashMap<HostHandle, MemNode>,
    next_id: u64,
    log: Vec<HostOp>,
    /// Successful operations left before an injected failure
    fail_after: Option<usize>,
}

impl MemoryDom {
    fn alloc(&mut self, kind: MemKind) -> HostHandle {
        self.next_id += 1;
        let handle = HostHandle(self.next_id);
        self.nodes.insert(handle, MemNode::new(kind));
        handle
    }

    fn node(&self, handle: HostHandle) -> Result<&MemNode, HostError> {
        self.nodes.get(&handle).ok_or(HostError::UnknownNode(handle))
    }

    fn node_mut(&mut self, handle: HostHandle) -> Result<&mut MemNode, HostError> {
        self.nodes
            .get_mut(&handle)
            .ok_or(HostError::UnknownNode(handle))
    }

    /// Count down the injected failure, if armed.
    fn check_failure(&mut self) -> Result<(), HostError> {
        match self.fail_after {
            Some(0) => Err(HostError::Operation("injected failure".into())),
            Some(left) => {
                self.fail_after = Some(left - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn detach(&mut self, node: HostHandle) -> Result<(), HostError> {
        let Some(parent) = self.node(node)?.parent else {
            return Ok(());
        };
        let parent_node = self.node_mut(parent)?;
        parent_node.children.retain(|&c| c != node);
        self.node_mut(node)?.parent = None;
        Ok(())
    }

    fn write_html(&self, handle: HostHandle, out: &mut String) {
        let Some(node) = self.nodes.get(&handle) else {
            return;
        };
        match &node.kind {
            MemKind::Text(text) => out.push_str(&escape_html(text)),
            MemKind::Container => self.write_children(node, out),
            MemKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &node.attributes {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape_html(value));
                        out.push('"');
                    }
                }
                if is_void_element(tag) && node.children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                self.write_children(node, out);
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    fn write_children(&self, node: &MemNode, out: &mut String) {
        for &child in &node.children {
            self.write_html(child, out);
        }
    }

    fn write_text(&self, handle: HostHandle, out: &mut String) {
        let Some(node) = self.nodes.get(&handle) else {
            return;
        };
        if let MemKind::Text(text) = &node.kind {
            out.push_str(text);
        }
        for &child in &node.children {
            self.write_text(child, out);
        }
    }
}

// =============================================================================
// MEMORY HOST
// =============================================================================

/// An in-memory [`HostTree`].
///
/// Clones share the same tree, so a test keeps one clone for inspection and
/// hands another to `mount`.
///
/// # Example
///
/// ```
/// use spark_fiber::{HostTree, MemoryHost};
///
/// let mut host = MemoryHost::new();
/// let root = host.create_container();
/// let p = host.create_element("p").unwrap();
/// let t = host.create_text("hi").unwrap();
/// host.insert_before(p, t, None).unwrap();
/// host.insert_before(root, p, None).unwrap();
///
/// assert_eq!(host.to_html(root), "<p>hi</p>");
/// ```
#[derive(Clone, Default)]
pub struct MemoryHost {
    dom: Rc<RefCell<MemoryDom>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a root container to mount into.
    pub fn create_container(&self) -> HostHandle {
        self.dom.borrow_mut().alloc(MemKind::Container)
    }

    /// HTML of the node's children.
    pub fn to_html(&self, node: HostHandle) -> String {
        let dom = self.dom.borrow();
        let mut out = String::new();
        if let Some(n) = dom.nodes.get(&node) {
            dom.write_children(n, &mut out);
        }
        out
    }

    /// HTML of the node itself, including its own tag.
    pub fn outer_html(&self, node: HostHandle) -> String {
        let mut out = String::new();
        self.dom.borrow().write_html(node, &mut out);
        out
    }

    /// Concatenated text of the node and its descendants.
    pub fn text_content(&self, node: HostHandle) -> String {
        let mut out = String::new();
        self.dom.borrow().write_text(node, &mut out);
        out
    }

    pub fn children(&self, node: HostHandle) -> Vec<HostHandle> {
        self.dom
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn parent(&self, node: HostHandle) -> Option<HostHandle> {
        self.dom.borrow().nodes.get(&node).and_then(|n| n.parent)
    }

    pub fn attribute(&self, node: HostHandle, name: &str) -> Option<String> {
        self.dom
            .borrow()
            .nodes
            .get(&node)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    /// Tag name of an element node.
    pub fn tag(&self, node: HostHandle) -> Option<String> {
        match &self.dom.borrow().nodes.get(&node)?.kind {
            MemKind::Element(tag) => Some(tag.clone()),
            _ => None,
        }
    }

    /// Content of a text node.
    pub fn text(&self, node: HostHandle) -> Option<String> {
        match &self.dom.borrow().nodes.get(&node)?.kind {
            MemKind::Text(text) => Some(text.clone()),
            _ => None,
        }
    }

    pub fn has_listener(&self, node: HostHandle, event: &str) -> bool {
        self.dom
            .borrow()
            .nodes
            .get(&node)
            .is_some_and(|n| n.listeners.contains_key(event))
    }

    /// Elements with the given tag under `root`, in document order.
    pub fn find_all(&self, root: HostHandle, tag: &str) -> Vec<HostHandle> {
        let dom = self.dom.borrow();
        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(handle) = stack.pop() {
            let Some(node) = dom.nodes.get(&handle) else {
                continue;
            };
            if matches!(&node.kind, MemKind::Element(t) if t == tag) {
                found.push(handle);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        found
    }

    /// First element with the given tag under `root`.
    pub fn find(&self, root: HostHandle, tag: &str) -> Option<HostHandle> {
        self.find_all(root, tag).into_iter().next()
    }

    /// Call the listener for `event` on `node`. Returns false if none is
    /// attached.
    pub fn dispatch(&self, node: HostHandle, event: &str) -> bool {
        let handler = self
            .dom
            .borrow()
            .nodes
            .get(&node)
            .and_then(|n| n.listeners.get(event).cloned());
        match handler {
            Some(handler) => {
                handler(&Event::new(event, node));
                true
            }
            None => false,
        }
    }

    /// Whether the node is connected to a container.
    pub fn is_attached(&self, node: HostHandle) -> bool {
        let dom = self.dom.borrow();
        let mut current = node;
        loop {
            let Some(n) = dom.nodes.get(&current) else {
                return false;
            };
            if matches!(n.kind, MemKind::Container) {
                return true;
            }
            match n.parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Number of nodes ever created and still known, containers included.
    pub fn node_count(&self) -> usize {
        self.dom.borrow().nodes.len()
    }

    /// Every operation since creation or the last [`clear_ops`](Self::clear_ops).
    pub fn ops(&self) -> Vec<HostOp> {
        self.dom.borrow().log.clone()
    }

    pub fn clear_ops(&self) {
        self.dom.borrow_mut().log.clear();
    }

    /// Let `ops` more operations succeed, then fail every one after.
    pub fn fail_after(&self, ops: usize) {
        self.dom.borrow_mut().fail_after = Some(ops);
    }

    /// Stop injecting failures.
    pub fn heal(&self) {
        self.dom.borrow_mut().fail_after = None;
    }
}

impl std::fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dom = self.dom.borrow();
        f.debug_struct("MemoryHost")
            .field("nodes", &dom.nodes.len())
            .field("ops", &dom.log.len())
            .finish()
    }
}

impl HostTree for MemoryHost {
    fn create_element(&mut self, tag: &str) -> Result<HostHandle, HostError> {
        let mut dom = self.dom.borrow_mut();
        dom.check_failure()?;
        let node = dom.alloc(MemKind::Element(tag.to_string()));
        dom.log.push(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        Ok(node)
    }

    fn create_text(&mut self, text: &str) -> Result<HostHandle, HostError> {
        let mut dom = self.dom.borrow_mut();
        dom.check_failure()?;
        let node = dom.alloc(MemKind::Text(text.to_string()));
        dom.log.push(HostOp::CreateText {
            node,
            text: text.to_string(),
        });
        Ok(node)
    }

    fn set_text(&mut self, node: HostHandle, text: &str) -> Result<(), HostError> {
        let mut dom = self.dom.borrow_mut();
        dom.check_failure()?;
        match &mut dom.node_mut(node)?.kind {
            MemKind::Text(content) => *content = text.to_string(),
            _ => return Err(HostError::Operation(format!("{node} is not a text node"))),
        }
        dom.log.push(HostOp::SetText {
            node,
            text: text.to_string(),
        });
        Ok(())
    }

    fn set_attribute(
        &mut self,
        node: HostHandle,
        name: &str,
        value: &str,
    ) -> Result<(), HostError> {
        let mut dom = self.dom.borrow_mut();
        dom.check_failure()?;
        dom.node_mut(node)?
            .attributes
            .insert(name.to_string(), value.to_string());
        dom.log.push(HostOp::SetAttribute {
            node,
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn remove_attribute(&mut self, node: HostHandle, name: &str) -> Result<(), HostError> {
        let mut dom = self.dom.borrow_mut();
        dom.check_failure()?;
        dom.node_mut(node)?.attributes.shift_remove(name);
        dom.log.push(HostOp::RemoveAttribute {
            node,
            name: name.to_string(),
        });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: HostHandle,
        node: HostHandle,
        before: Option<HostHandle>,
    ) -> Result<(), HostError> {
        let mut dom = self.dom.borrow_mut();
        dom.check_failure()?;
        if matches!(dom.node(parent)?.kind, MemKind::Text(_)) {
            return Err(HostError::NotAContainer(parent));
        }
        dom.node(node)?;
        dom.detach(node)?;

        let children = &mut dom.node_mut(parent)?.children;
        let at = match before {
            Some(reference) => children
                .iter()
                .position(|&c| c == reference)
                .ok_or(HostError::NotAChild {
                    parent,
                    child: reference,
                })?,
            None => children.len(),
        };
        children.insert(at, node);
        dom.node_mut(node)?.parent = Some(parent);

        dom.log.push(HostOp::InsertBefore {
            parent,
            node,
            before,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError> {
        let mut dom = self.dom.borrow_mut();
        dom.check_failure()?;
        if dom.node(child)?.parent != Some(parent) {
            return Err(HostError::NotAChild { parent, child });
        }
        dom.detach(child)?;
        dom.log.push(HostOp::RemoveChild { parent, child });
        Ok(())
    }

    fn add_event_listener(
        &mut self,
        node: HostHandle,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HostError> {
        let mut dom = self.dom.borrow_mut();
        dom.check_failure()?;
        dom.node_mut(node)?
            .listeners
            .insert(event.to_string(), handler);
        dom.log.push(HostOp::AddListener {
            node,
            event: event.to_string(),
        });
        Ok(())
    }

    fn remove_event_listener(&mut self, node: HostHandle, event: &str) -> Result<(), HostError> {
        let mut dom = self.dom.borrow_mut();
        dom.check_failure()?;
        dom.node_mut(node)?.listeners.shift_remove(event);
        dom.log.push(HostOp::RemoveListener {
            node,
            event: event.to_string(),
        });
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
