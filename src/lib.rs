// ============================================================================
// spark-fiber - An Incremental UI Rendering Runtime for Rust
// ============================================================================
//
// Components describe host trees with elements; a keyed reconciler diffs
// each description against the live node tree; an interruptible work loop
// renders dirty subtrees under a deadline; a commit phase applies the result
// to a host binding and runs effects. Fine-grained signals sit alongside
// hooks, so a write re-renders only the components that read it.
// ============================================================================

//! An incremental UI rendering runtime.
//!
//! ```
//! use spark_fiber::{Component, MemoryHost, Props, h, mount};
//!
//! let counter = Component::new("Counter", |cx| {
//!     let (count, set_count) = cx.use_state(|| 0)?;
//!     Ok(h("button")
//!         .on("click", move |_| {
//!             set_count.update(|n| n + 1);
//!         })
//!         .child(format!("clicked {count} times"))
//!         .into())
//! });
//!
//! let host = MemoryHost::new();
//! let container = host.create_container();
//! let mut root = mount(&counter, Props::new(), host.clone(), container).unwrap();
//!
//! let button = host.find(container, "button").unwrap();
//! host.dispatch(button, "click");
//! root.flush_sync().unwrap();
//! assert_eq!(host.text_content(container), "clicked 1 times");
//! ```

#[macro_use]
mod macros;

mod commit;
pub mod core;
pub mod hooks;
pub mod host;
pub mod primitives;
pub mod reactivity;
pub mod reconciler;
pub mod render;
pub mod scheduler;
pub mod tree;

// Core
pub use crate::core::config::RuntimeConfig;
pub use crate::core::constants;
pub use crate::core::context::{is_tracking, read_version, with_context, write_version};
pub use crate::core::error::{HostError, RenderError, Result};
pub use crate::core::types::{AnyReaction, AnySource, EqualsFn, default_equals};

// Elements and the node tree
pub use tree::{
    Child, Component, Context, ContextId, Element, ElementType, Key, NodeId, NodeKind, NodeRef,
    PropValue, Props, component, error_boundary, fragment, h, keyed, portal, provider, text,
};

// Hooks
pub use hooks::{Dispatch, EffectPhase, HookKind, RenderScope, StateSetter};

// Signals
pub use primitives::{
    CleanupFn, Computed, Signal, Store, Watch, computed, computed_with_equals, signal,
    signal_with_equals, watch, watch_with_cleanup,
};
pub use reactivity::batching::{batch, peek, tick, untrack};
pub use reactivity::equality::{always_equals, equals, never_equals, rc_ptr_equals};
pub use reactivity::scheduling::{flush_microtasks, queue_microtask, queue_next_flush};

// Scheduling and rendering
pub use host::{Event, EventHandler, HostHandle, HostOp, HostTree, MemoryHost};
pub use render::{Root, mount, mount_with_config, render_to_string};
pub use scheduler::{
    Deadline, NeverYield, RootStatus, TimeSlice, UnitBudget, UpdateReason, WorkStats, WorkStatus,
};
