// ============================================================================
// spark-fiber - Constants
// Flag words for reactive sources and reactions
// ============================================================================

// =============================================================================
// TYPE FLAGS
// =============================================================================

/// Source signal (basic reactive value)
pub const SOURCE: u32 = 1 << 0;

/// Computed value (both a source and a reaction)
pub const DERIVED: u32 = 1 << 1;

/// Watch effect (re-runs on the microtask queue)
pub const EFFECT: u32 = 1 << 2;

/// Component subscription (re-render requested through the scheduler)
pub const COMPONENT: u32 = 1 << 3;

// =============================================================================
// STATE FLAGS
// =============================================================================

/// Signal/reaction is clean (up-to-date)
pub const CLEAN: u32 = 1 << 10;

/// Signal/reaction is dirty (definitely needs update)
pub const DIRTY: u32 = 1 << 11;

/// Signal/reaction might be dirty (needs to check dependencies)
pub const MAYBE_DIRTY: u32 = 1 << 12;

/// Reaction is currently being updated
pub const REACTION_IS_UPDATING: u32 = 1 << 13;

/// Source or reaction has been disposed
pub const DESTROYED: u32 = 1 << 14;

/// Watch is sitting in the pending queue
pub const QUEUED: u32 = 1 << 15;

/// Watch has run at least once
pub const EFFECT_RAN: u32 = 1 << 16;

// =============================================================================
// STATUS MASK
// =============================================================================

/// Everything except the three exclusive status bits
pub const STATUS_MASK: u32 = !(DIRTY | MAYBE_DIRTY | CLEAN);

/// `flags` with its status replaced by `status`.
pub const fn with_status(flags: u32, status: u32) -> u32 {
    (flags & STATUS_MASK) | status
}

// =============================================================================
// LIMITS
// =============================================================================

/// Default bound on microtask drain iterations before the queue is abandoned
pub const MAX_FLUSH_COUNT: u32 = 1000;

// =============================================================================
// TESTS
// =============================================================================
