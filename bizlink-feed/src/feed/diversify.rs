//! Streak-bounded interleaving of a ranked list

use crate::model::ContentKind;

/// Reorder `items` so no kind runs longer than `max_seq` where avoidable
///
/// Greedy: repeatedly take the first remaining item (in ranked order) whose
/// kind differs from the last emitted kind, or whose kind may still extend
/// the current streak. When nothing qualifies, the first remaining item is
/// taken regardless. The output is always a permutation of the input.
pub fn diversify<T, F>(items: Vec<T>, max_seq: usize, kind_of: F) -> Vec<T>
where
    F: Fn(&T) -> ContentKind,
{
    let max_seq = max_seq.max(1);
    let mut pool = items;
    let mut out = Vec::with_capacity(pool.len());
    let mut last_kind: Option<ContentKind> = None;
    let mut streak = 0usize;

    while !pool.is_empty() {
        let pick = pool
            .iter()
            .position(|item| Some(kind_of(item)) != last_kind || streak < max_seq)
            .unwrap_or(0);
        let item = pool.remove(pick);
        let kind = kind_of(&item);

        if Some(kind) == last_kind {
            streak += 1;
        } else {
            last_kind = Some(kind);
            streak = 1;
        }
        out.push(item);
    }

    out
}
