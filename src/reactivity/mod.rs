// ============================================================================
// spark-fiber - Reactivity Module
// Dependency tracking, dirty propagation, microtasks and batching
// ============================================================================

pub mod batching;
pub mod equality;
pub mod scheduling;
pub mod tracking;

pub use batching::{batch, is_batching, is_untracking, peek, tick, untrack};
pub use scheduling::{
    flush_microtasks, flush_microtasks_with_limit, flush_pending_reactions,
    has_pending_microtasks, queue_microtask, queue_next_flush,
};
pub use tracking::{
    install_dependencies, is_dirty, mark_reactions, notify_write, remove_reactions, run_tracked,
    set_signal_status, track_read,
};
