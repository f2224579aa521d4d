//! Column-local reordering shared by the feature and execution stores

/// Move the `old`-th item of the subsequence selected by `in_column` to
/// position `new` of that subsequence
///
/// Items outside the subsequence keep their slots. Returns false (and leaves
/// `items` untouched) when either index is out of range or they are equal.
pub(crate) fn reorder_subsequence<T>(
    items: &mut Vec<T>,
    in_column: impl Fn(&T) -> bool,
    old: usize,
    new: usize,
) -> bool {
    let positions: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| in_column(item))
        .map(|(i, _)| i)
        .collect();

    if old == new || old >= positions.len() || new >= positions.len() {
        return false;
    }

    let mut column: Vec<T> = Vec::with_capacity(positions.len());
    for &slot in positions.iter().rev() {
        column.push(items.remove(slot));
    }
    column.reverse();

    let moved = column.remove(old);
    column.insert(new, moved);

    // Ascending re-insertion restores every slot
    for (&slot, item) in positions.iter().zip(column) {
        items.insert(slot, item);
    }
    true
}
