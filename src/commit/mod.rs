// ============================================================================
// spark-fiber - Commit Module
// Making a finished render pass visible in the host tree
// ============================================================================
//
// A commit runs in one piece once the worklist has drained:
//
//   1. deletion  - cleanups of removed subtrees, then host removal
//   2. mutation  - placements and updates, effect collection
//   3. layout    - layout effects, synchronously
//   4. passive   - passive effects, queued on the microtask queue
//
// A host failure stops the commit where it happened and marks the root
// failed; no effects of that commit run.
// ============================================================================

pub(crate) mod deletion;
pub(crate) mod effects;
pub(crate) mod mutation;

use std::rc::Rc;

use crate::core::error::{RenderError, Result};
use crate::hooks::{EffectJob, EffectPhase};
use crate::scheduler::root::{RootInner, RootStatus};

/// Commit everything the current pass produced.
pub(crate) fn commit_root(root: &Rc<RootInner>) -> Result<()> {
    let span = tracing::debug_span!("commit");
    let _enter = span.enter();

    {
        let mut state = root.state.borrow_mut();
        state.status = RootStatus::Committing;
        state.stats.commits += 1;
    }

    deletion::run_deletions(root)?;
    let jobs = mutation::apply_mutations(root).map_err(|error| fail(root, error.into()))?;

    let (layout, passive): (Vec<EffectJob>, Vec<EffectJob>) = jobs
        .into_iter()
        .partition(|job| job.phase == EffectPhase::Layout);
    tracing::trace!(layout = layout.len(), passive = passive.len(), "committed");

    effects::run_effects(layout);
    if !passive.is_empty() {
        root.passive.borrow_mut().extend(passive);
        root.schedule_passive();
    }
    Ok(())
}

/// Mark the root failed after a host error and hand the error back.
pub(crate) fn fail(root: &RootInner, error: RenderError) -> RenderError {
    tracing::error!(%error, "host operation failed; root is no longer usable");
    if let Ok(mut state) = root.state.try_borrow_mut() {
        state.status = RootStatus::Failed;
        state.worklist.clear();
        state.unit = None;
        state.touched.clear();
    }
    error
}
