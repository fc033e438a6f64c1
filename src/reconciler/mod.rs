// ============================================================================
// spark-fiber - Reconciler Module
// Diffing new children against the current tree
// ============================================================================

pub mod apply;
pub mod diff;
pub mod normalize;

pub use apply::reconcile;
pub use diff::{ChildDesc, ChildOp, ChildPlan, longest_increasing_run, plan_children};
pub use normalize::{normalize_children, normalize_output};
