// ============================================================================
// spark-fiber - Primitives Module
// Core reactive primitives: signal, computed, watch, store
// ============================================================================

pub mod computed;
pub mod signal;
pub mod store;
pub mod watch;

// Re-export for convenience
pub use computed::{Computed, ComputedInner, computed, computed_with_equals};
pub use signal::{Signal, signal, signal_with_equals};
pub use store::Store;
pub use watch::{CleanupFn, Watch, WatchFn, WatchInner, watch, watch_with_cleanup};
