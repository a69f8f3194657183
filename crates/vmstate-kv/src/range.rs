use std::collections::BTreeMap;
use std::ops::Bound;

/// Smallest key that sorts after every key beginning with `prefix`.
///
/// Returns `None` when no such bound exists (empty prefix, or a prefix made
/// only of `0xFF` bytes); the range is then unbounded above.
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xFF {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// First entry of `map` at or after `cursor` and strictly before `end`.
pub(crate) fn first_in_range<'m, V>(
    map: &'m BTreeMap<Vec<u8>, V>,
    cursor: &Bound<Vec<u8>>,
    end: Option<&[u8]>,
) -> Option<(&'m Vec<u8>, &'m V)> {
    let lower: Bound<&[u8]> = match cursor {
        Bound::Included(k) => Bound::Included(k.as_slice()),
        Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    };
    if let Some(end) = end {
        let exhausted = match lower {
            Bound::Included(k) | Bound::Excluded(k) => k >= end,
            Bound::Unbounded => false,
        };
        if exhausted {
            return None;
        }
    }
    let upper = match end {
        Some(end) => Bound::Excluded(end),
        None => Bound::Unbounded,
    };
    map.range::<[u8], _>((lower, upper)).next()
}
