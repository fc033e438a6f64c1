// ============================================================================
// spark-fiber - Tree Module
// Element descriptions, context objects and the node arena
// ============================================================================

pub mod context;
pub mod element;
pub mod node;

pub use context::{Context, ContextId, provider};
pub use element::{
    Child, Component, Element, ElementType, Key, NodeRef, PropValue, Props, component,
    error_boundary, fragment, h, keyed, portal, text,
};
pub use node::{MutationTag, Node, NodeId, NodeKind, NodeTree, Snapshot};
