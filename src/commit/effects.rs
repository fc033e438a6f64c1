// ============================================================================
// spark-fiber - Effect Runs
// Cleanups and callbacks of effects collected by a commit
// ============================================================================

use crate::hooks::EffectJob;
use crate::scheduler::root::RootInner;

/// Run a batch of effects: every previous cleanup first, then every
/// callback, both in collection order.
pub(crate) fn run_effects(jobs: Vec<EffectJob>) {
    if jobs.is_empty() {
        return;
    }
    for job in &jobs {
        job.run_cleanup();
    }
    for job in jobs {
        job.run_callback();
    }
}

/// Run the passive effects queued by earlier commits.
pub(crate) fn flush_passive(root: &RootInner) {
    root.passive_scheduled.set(false);
    let jobs = std::mem::take(&mut *root.passive.borrow_mut());
    if jobs.is_empty() {
        return;
    }
    tracing::trace!(count = jobs.len(), "running passive effects");
    run_effects(jobs);
}
