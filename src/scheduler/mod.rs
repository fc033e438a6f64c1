// ============================================================================
// spark-fiber - Scheduler Module
// Update requests, worklists and the interruptible render loop
// ============================================================================

pub mod deadline;
pub mod reaction;
pub mod root;
pub mod work_loop;

pub use deadline::{Deadline, NeverYield, TimeSlice, UnitBudget};
pub use reaction::ComponentReaction;
pub use root::{RootStatus, UpdateReason, UpdateTarget, WorkStats};
pub use work_loop::WorkStatus;
