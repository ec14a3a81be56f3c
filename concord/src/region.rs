//! Region reduction and filtering.
//!
//! Each document in a comparison contributes an ordered, non-overlapping
//! list of processable regions. [`reduce_regions`] intersects them into one
//! list (or reports that no filtering is needed) and [`filter_by_regions`]
//! drops annotations that are not wholly inside a region.

use concord_core::Span;

/// Intersect per-document region lists.
///
/// Returns `None` when every list equals `unfiltered`; filtering would be a
/// no-op in that case.
#[must_use]
pub fn reduce_regions(per_doc: &[Vec<Span>], unfiltered: &[Span]) -> Option<Vec<Span>> {
    if per_doc.iter().all(|r| r.as_slice() == unfiltered) {
        return None;
    }
    let mut iter = per_doc.iter();
    let mut pivot = iter.next()?.clone();
    for other in iter {
        pivot = intersect(&pivot, other);
    }
    Some(pivot)
}

/// Two-pointer intersection of two sorted region lists.
#[must_use]
pub fn intersect(a: &[Span], b: &[Span]) -> Vec<Span> {
    let mut a: Vec<Span> = a.to_vec();
    let mut b: Vec<Span> = b.to_vec();
    let (mut i, mut j) = (0, 0);
    let mut out = Vec::new();
    while i < a.len() && j < b.len() {
        let (x, y) = (a[i], b[j]);
        if x.end <= y.start {
            i += 1;
        } else if y.end <= x.start {
            j += 1;
        } else if x.start < y.start {
            a[i].start = y.start;
        } else if y.start < x.start {
            b[j].start = x.start;
        } else {
            let end = x.end.min(y.end);
            out.push(Span::new(x.start, end));
            if x.end > end {
                a[i].start = end;
            } else {
                i += 1;
            }
            if y.end > end {
                b[j].start = end;
            } else {
                j += 1;
            }
        }
    }
    out
}

/// Keep the items whose extent lies wholly inside one region.
///
/// `extent` yields an item's span, or `None` for spanless items with no
/// implied span; those are tested as if they covered `maximal`, the
/// document's unfiltered extent. Straddling items are discarded.
pub fn filter_by_regions<T, F>(regions: &[Span], maximal: Span, items: Vec<T>, extent: F) -> Vec<T>
where
    F: Fn(&T) -> Option<Span>,
{
    let mut keyed: Vec<(Span, T)> = items
        .into_iter()
        .map(|item| (extent(&item).unwrap_or(maximal), item))
        .collect();
    keyed.sort_by_key(|(span, _)| span.start);

    let mut kept = Vec::new();
    let mut pending = keyed.into_iter().peekable();
    for region in regions {
        while let Some((span, _)) = pending.peek() {
            if span.start < region.start {
                pending.next();
            } else if span.end <= region.end {
                if let Some((_, item)) = pending.next() {
                    kept.push(item);
                }
            } else {
                // Wait for a later region; it will discard this one.
                break;
            }
        }
    }
    kept
}
