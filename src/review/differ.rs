use super::ReviewComment;
use std::collections::HashSet;

/// Comments in `current` whose id does not appear in `previous`.
///
/// With no previous snapshot (first iteration) every current comment is new.
/// Order of `current` is preserved.
pub fn new_since(
    previous: Option<&[ReviewComment]>,
    current: &[ReviewComment],
) -> Vec<ReviewComment> {
    let known: HashSet<u64> = previous
        .unwrap_or_default()
        .iter()
        .map(|comment| comment.id)
        .collect();

    current
        .iter()
        .filter(|comment| !known.contains(&comment.id))
        .cloned()
        .collect()
}
