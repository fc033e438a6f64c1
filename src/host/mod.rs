// ============================================================================
// spark-fiber - Host Binding
// The platform interface the commit phase writes through
// ============================================================================
//
// The runtime never touches a platform tree directly. Everything it needs is
// the small set of operations below; a DOM binding, a terminal renderer or
// the in-memory tree used by tests all plug in the same way.
// ============================================================================

pub mod memory;

use std::fmt;
use std::rc::Rc;

use crate::core::error::HostError;

pub use memory::{HostOp, MemoryHost};

// =============================================================================
// HANDLES & EVENTS
// =============================================================================

/// Opaque reference to a live host node, handed out by the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostHandle(pub u64);

impl fmt::Display for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An event delivered by the binding to a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub target: HostHandle,
}

impl Event {
    pub fn new(name: impl Into<String>, target: HostHandle) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }
}

/// Listener attached to a host node. Identity (the `Rc` pointer) decides
/// whether a re-render swaps the listener.
pub type EventHandler = Rc<dyn Fn(&Event)>;

// =============================================================================
// HOST TREE
// =============================================================================

/// Operations a platform binding provides. Only the commit phase calls them.
///
/// Every operation may fail; a failure aborts the commit and marks the root
/// failed.
pub trait HostTree {
    /// Create a detached element node.
    fn create_element(&mut self, tag: &str) -> Result<HostHandle, HostError>;

    /// Create a detached text node.
    fn create_text(&mut self, text: &str) -> Result<HostHandle, HostError>;

    /// Replace the content of a text node.
    fn set_text(&mut self, node: HostHandle, text: &str) -> Result<(), HostError>;

    fn set_attribute(&mut self, node: HostHandle, name: &str, value: &str)
    -> Result<(), HostError>;

    fn remove_attribute(&mut self, node: HostHandle, name: &str) -> Result<(), HostError>;

    /// Insert `node` into `parent` before `before`, or at the end when
    /// `before` is `None`. A node that already has a parent is moved.
    fn insert_before(
        &mut self,
        parent: HostHandle,
        node: HostHandle,
        before: Option<HostHandle>,
    ) -> Result<(), HostError>;

    /// Detach `child` from `parent`.
    fn remove_child(&mut self, parent: HostHandle, child: HostHandle) -> Result<(), HostError>;

    /// Attach a listener, replacing any listener for the same event.
    fn add_event_listener(
        &mut self,
        node: HostHandle,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HostError>;

    fn remove_event_listener(&mut self, node: HostHandle, event: &str) -> Result<(), HostError>;
}
