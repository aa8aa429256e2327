//! Temporal gap filling for keypoint sequences.

/// Replace each missing frame with the nearest preceding detection.
///
/// Leading gaps stay empty; the output has the same length as the input.
pub fn forward_fill<T: Clone>(sequence: &[Option<T>]) -> Vec<Option<T>> {
    let mut last: Option<&T> = None;
    sequence
        .iter()
        .map(|item| {
            if let Some(value) = item {
                last = Some(value);
            }
            last.cloned()
        })
        .collect()
}

/// Number of entries `forward_fill` would populate from an earlier frame.
pub fn filled_count<T>(sequence: &[Option<T>]) -> usize {
    sequence
        .iter()
        .skip_while(|item| item.is_none())
        .filter(|item| item.is_none())
        .count()
}
