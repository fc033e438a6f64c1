// ============================================================================
// spark-fiber - Child Diff
// Pure planning: which old children are reused, moved, created or deleted
// ============================================================================
//
// The planner only sees child identities (type and key), never the arena,
// so the same inputs always produce the same plan.
//
//   1. Lock-step from the front while both sides are unkeyed
//   2. Match the rest through a map on `key`, or position when unkeyed
//   3. Reused children outside the longest increasing run of old indices
//      are marked as moved
// ============================================================================

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::tree::element::{ElementType, Key};

/// The identity of one child, old or new.
#[derive(Debug, Clone, Copy)]
pub struct ChildDesc<'a> {
    pub key: Option<&'a Key>,
    pub ty: &'a ElementType,
}

impl<'a> ChildDesc<'a> {
    pub fn new(key: Option<&'a Key>, ty: &'a ElementType) -> Self {
        Self { key, ty }
    }
}

/// What happens to one new child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOp {
    /// Reuse the old child at index `old`; `moved` when it must be
    /// repositioned in the host tree
    Reuse { old: usize, moved: bool },
    /// No old child matches; create a fresh node
    Create,
}

/// One operation per new child, plus the old children to delete.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChildPlan {
    pub ops: Vec<ChildOp>,
    /// Old indices, ascending
    pub deletions: Vec<usize>,
}

impl ChildPlan {
    pub fn moved(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, ChildOp::Reuse { moved: true, .. }))
            .count()
    }

    pub fn created(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, ChildOp::Create))
            .count()
    }

    pub fn reused(&self) -> usize {
        self.ops.len() - self.created()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MatchKey<'a> {
    Keyed(&'a Key),
    Index(usize),
}

impl<'a> MatchKey<'a> {
    fn of(desc: &ChildDesc<'a>, index: usize) -> Self {
        match desc.key {
            Some(key) => MatchKey::Keyed(key),
            None => MatchKey::Index(index),
        }
    }
}

/// Plan how `new` children reuse `old` ones.
///
/// # Example
///
/// ```
/// use spark_fiber::reconciler::diff::{plan_children, ChildDesc, ChildOp};
/// use spark_fiber::{h, Key};
///
/// let li = h("li");
/// let keys: Vec<Key> = ["a", "b", "c"].into_iter().map(Key::from).collect();
/// let desc = |k: &'static str| {
///     let key = keys.iter().find(|key| key.as_str() == k).unwrap();
///     ChildDesc::new(Some(key), li.ty())
/// };
///
/// let old = [desc("a"), desc("b"), desc("c")];
/// let new = [desc("c"), desc("a"), desc("b")];
/// let plan = plan_children(&old, &new);
///
/// assert_eq!(plan.ops[0], ChildOp::Reuse { old: 2, moved: true });
/// assert_eq!(plan.moved(), 1);
/// assert!(plan.deletions.is_empty());
/// ```
pub fn plan_children(old: &[ChildDesc<'_>], new: &[ChildDesc<'_>]) -> ChildPlan {
    let mut ops = Vec::with_capacity(new.len());
    let mut deletions = Vec::new();
    // Old index per new position, for reused children
    let mut reused: Vec<(usize, usize)> = Vec::new();

    // Phase 1: lock-step while both sides are unkeyed
    let mut start = 0;
    while start < old.len() && start < new.len() {
        let (o, n) = (&old[start], &new[start]);
        if o.key.is_some() || n.key.is_some() {
            break;
        }
        if o.ty.same_type(n.ty) {
            reused.push((start, start));
            ops.push(ChildOp::Reuse {
                old: start,
                moved: false,
            });
        } else {
            deletions.push(start);
            ops.push(ChildOp::Create);
        }
        start += 1;
    }

    // Phase 2: map the remaining old children; the first of a duplicated
    // key stays matchable, later ones are deleted
    let mut remaining: HashMap<MatchKey<'_>, usize> = HashMap::with_capacity(old.len() - start);
    for (old_index, desc) in old.iter().enumerate().skip(start) {
        match remaining.entry(MatchKey::of(desc, old_index)) {
            Entry::Occupied(entry) => {
                tracing::warn!(
                    key = ?entry.key(),
                    index = old_index,
                    "duplicate key among siblings; the later child is discarded"
                );
                deletions.push(old_index);
            }
            Entry::Vacant(entry) => {
                entry.insert(old_index);
            }
        }
    }

    for (index, desc) in new.iter().enumerate().skip(start) {
        let match_key = MatchKey::of(desc, index);
        let found = remaining
            .get(&match_key)
            .copied()
            .filter(|&old_index| old[old_index].ty.same_type(desc.ty));
        match found {
            Some(old_index) => {
                remaining.remove(&match_key);
                reused.push((index, old_index));
                ops.push(ChildOp::Reuse {
                    old: old_index,
                    moved: false,
                });
            }
            None => ops.push(ChildOp::Create),
        }
    }

    deletions.extend(remaining.into_values());
    deletions.sort_unstable();

    // Phase 3: everything off the longest increasing run moves
    let sequence: Vec<usize> = reused.iter().map(|&(_, old_index)| old_index).collect();
    let keep = longest_increasing_run(&sequence);
    for (&(new_index, old_index), stays) in reused.iter().zip(keep) {
        if !stays {
            ops[new_index] = ChildOp::Reuse {
                old: old_index,
                moved: true,
            };
        }
    }

    ChildPlan { ops, deletions }
}

/// Flags the members of one longest strictly increasing subsequence.
///
/// Patience sorting with predecessor links, O(n log n).
pub fn longest_increasing_run(sequence: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessor: Vec<Option<usize>> = vec![None; sequence.len()];

    for (position, &value) in sequence.iter().enumerate() {
        let at = tails.partition_point(|&tail| sequence[tail] < value);
        if at > 0 {
            predecessor[position] = Some(tails[at - 1]);
        }
        if at == tails.len() {
            tails.push(position);
        } else {
            tails[at] = position;
        }
    }

    let mut keep = vec![false; sequence.len()];
    let mut cursor = tails.last().copied();
    while let Some(position) = cursor {
        keep[position] = true;
        cursor = predecessor[position];
    }
    keep
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::element::{h, text};
    use proptest::prelude::*;

    struct Fixture {
        li: ElementType,
        span: ElementType,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                li: h("li").ty().clone(),
                span: h("span").ty().clone(),
            }
        }
    }

    fn keyed_descs<'a>(keys: &'a [Key], ty: &'a ElementType) -> Vec<ChildDesc<'a>> {
        keys.iter().map(|k| ChildDesc::new(Some(k), ty)).collect()
    }

    fn keys(names: &[&str]) -> Vec<Key> {
        names.iter().map(|n| Key::from(*n)).collect()
    }

    #[test]
    fn lis_picks_longest_run() {
        assert_eq!(
            longest_increasing_run(&[2, 0, 1]),
            vec![false, true, true]
        );
        assert_eq!(
            longest_increasing_run(&[0, 1, 2, 3]),
            vec![true, true, true, true]
        );
        assert_eq!(longest_increasing_run(&[3, 2, 1, 0]).iter().filter(|k| **k).count(), 1);
        assert!(longest_increasing_run(&[]).is_empty());
    }

    #[test]
    fn rotate_moves_one() {
        let f = Fixture::new();
        let old_keys = keys(&["a", "b", "c"]);
        let new_keys = keys(&["c", "a", "b"]);
        let plan = plan_children(
            &keyed_descs(&old_keys, &f.li),
            &keyed_descs(&new_keys, &f.li),
        );
        assert_eq!(
            plan.ops,
            vec![
                ChildOp::Reuse { old: 2, moved: true },
                ChildOp::Reuse { old: 0, moved: false },
                ChildOp::Reuse { old: 1, moved: false },
            ]
        );
        assert!(plan.deletions.is_empty());
        assert_eq!(plan.created(), 0);
    }

    #[test]
    fn unkeyed_lockstep_and_tail() {
        let f = Fixture::new();
        let text_ty = text("x").ty().clone();
        let old = vec![
            ChildDesc::new(None, &f.li),
            ChildDesc::new(None, &f.span),
            ChildDesc::new(None, &f.li),
        ];
        let new = vec![
            ChildDesc::new(None, &f.li),
            ChildDesc::new(None, &text_ty),
        ];
        let plan = plan_children(&old, &new);
        assert_eq!(
            plan.ops,
            vec![ChildOp::Reuse { old: 0, moved: false }, ChildOp::Create]
        );
        assert_eq!(plan.deletions, vec![1, 2]);
    }

    #[test]
    fn type_change_under_same_key_recreates() {
        let f = Fixture::new();
        let k = keys(&["a"]);
        let plan = plan_children(&keyed_descs(&k, &f.li), &keyed_descs(&k, &f.span));
        assert_eq!(plan.ops, vec![ChildOp::Create]);
        assert_eq!(plan.deletions, vec![0]);
    }

    #[test]
    fn insert_in_middle_keeps_others_in_place() {
        let f = Fixture::new();
        let old_keys = keys(&["a", "c"]);
        let new_keys = keys(&["a", "b", "c"]);
        let plan = plan_children(
            &keyed_descs(&old_keys, &f.li),
            &keyed_descs(&new_keys, &f.li),
        );
        assert_eq!(plan.created(), 1);
        assert_eq!(plan.moved(), 0);
        assert_eq!(plan.ops[1], ChildOp::Create);
    }

    #[test]
    fn keyed_and_unkeyed_mix() {
        let f = Fixture::new();
        let k = keys(&["x"]);
        let old = vec![ChildDesc::new(None, &f.li), ChildDesc::new(Some(&k[0]), &f.li)];
        let new = vec![ChildDesc::new(Some(&k[0]), &f.li), ChildDesc::new(None, &f.li)];
        let plan = plan_children(&old, &new);
        // "x" is found by key; the unkeyed li at new index 1 has no old
        // unkeyed child at index 1, so it is created
        assert_eq!(plan.ops[0], ChildOp::Reuse { old: 1, moved: false });
        assert_eq!(plan.ops[1], ChildOp::Create);
        assert_eq!(plan.deletions, vec![0]);
    }

    #[test]
    fn duplicated_old_keys_are_all_accounted_for() {
        let f = Fixture::new();
        let old_keys = keys(&["a", "a"]);
        let new_keys = keys(&["b"]);
        let plan = plan_children(
            &keyed_descs(&old_keys, &f.li),
            &keyed_descs(&new_keys, &f.li),
        );
        assert_eq!(plan.ops, vec![ChildOp::Create]);
        assert_eq!(plan.deletions, vec![0, 1]);

        // The first occurrence is the one that can be reused
        let new_keys = keys(&["a"]);
        let plan = plan_children(
            &keyed_descs(&old_keys, &f.li),
            &keyed_descs(&new_keys, &f.li),
        );
        assert_eq!(plan.ops, vec![ChildOp::Reuse { old: 0, moved: false }]);
        assert_eq!(plan.deletions, vec![1]);
    }

    #[test]
    fn planning_is_deterministic() {
        let f = Fixture::new();
        let old_keys = keys(&["a", "b", "c", "d"]);
        let new_keys = keys(&["d", "b", "e", "a"]);
        let old = keyed_descs(&old_keys, &f.li);
        let new = keyed_descs(&new_keys, &f.li);
        assert_eq!(plan_children(&old, &new), plan_children(&old, &new));
    }

    proptest! {
        #[test]
        fn permutations_reuse_everything(perm in Just((0..12usize).collect::<Vec<_>>()).prop_shuffle()) {
            let f = Fixture::new();
            let old_keys: Vec<Key> = (0..12usize).map(Key::from).collect();
            let new_keys: Vec<Key> = perm.iter().map(|&i| Key::from(i)).collect();
            let plan = plan_children(
                &keyed_descs(&old_keys, &f.li),
                &keyed_descs(&new_keys, &f.li),
            );

            prop_assert!(plan.deletions.is_empty());
            prop_assert_eq!(plan.created(), 0);

            // Unmoved children keep their relative order
            let stay: Vec<usize> = plan.ops.iter().filter_map(|op| match op {
                ChildOp::Reuse { old, moved: false } => Some(*old),
                _ => None,
            }).collect();
            prop_assert!(stay.windows(2).all(|w| w[0] < w[1]));

            // And no smaller set of moves exists
            let sequence: Vec<usize> = perm.clone();
            let best = longest_increasing_run(&sequence).iter().filter(|k| **k).count();
            prop_assert_eq!(plan.moved(), 12 - best);
        }
    }
}
