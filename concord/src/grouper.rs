//! Overlap grouping.
//!
//! A sweep over start/end coordinates collects maximal groups of
//! transitively overlapping annotations from both sides. Each group is
//! handed to the matcher independently.

use concord_core::Span;
use std::collections::BTreeMap;

/// Annotations from both sides that must be matched together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapGroup<T> {
    /// Reference members, in sweep order.
    pub refs: Vec<T>,
    /// Hypothesis members, in sweep order.
    pub hyps: Vec<T>,
}

impl<T> OverlapGroup<T> {
    fn empty() -> Self {
        Self {
            refs: Vec::new(),
            hyps: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.refs.is_empty() && self.hyps.is_empty()
    }
}

#[derive(Default)]
struct Events {
    starts: [Vec<usize>; 2],
    ends: [Vec<usize>; 2],
}

/// Group spanned items by transitive overlap.
///
/// Items are `(payload, span)`. A zero-length item forms a group with
/// whatever is open at its coordinate, or a group of its own.
#[must_use]
pub fn overlap_groups<T: Copy>(refs: &[(T, Span)], hyps: &[(T, Span)]) -> Vec<OverlapGroup<T>> {
    let sides = [refs, hyps];
    let mut events: BTreeMap<usize, Events> = BTreeMap::new();
    for (side, items) in sides.iter().enumerate() {
        for (i, (_, span)) in items.iter().enumerate() {
            events.entry(span.start).or_default().starts[side].push(i);
            events.entry(span.end).or_default().ends[side].push(i);
        }
    }

    let mut active: [usize; 2] = [0, 0];
    let mut groups = Vec::new();
    let mut acc = OverlapGroup::empty();

    let flush = |acc: &mut OverlapGroup<T>, groups: &mut Vec<OverlapGroup<T>>| {
        if !acc.is_empty() {
            groups.push(std::mem::replace(acc, OverlapGroup::empty()));
        }
    };

    for (coord, ev) in &events {
        for side in 0..2 {
            for &i in &ev.ends[side] {
                if sides[side][i].1.start < *coord {
                    active[side] -= 1;
                }
            }
        }
        if active == [0, 0] {
            flush(&mut acc, &mut groups);
        }
        for side in 0..2 {
            for &i in &ev.starts[side] {
                let (payload, span) = sides[side][i];
                if side == 0 {
                    acc.refs.push(payload);
                } else {
                    acc.hyps.push(payload);
                }
                if span.end > span.start {
                    active[side] += 1;
                }
            }
        }
    }
    flush(&mut acc, &mut groups);
    groups
}

/// Group items that have no extent by their true label.
///
/// Labels are visited in sorted order.
#[must_use]
pub fn label_groups<T>(refs: Vec<(T, String)>, hyps: Vec<(T, String)>) -> Vec<OverlapGroup<T>> {
    let mut by_label: BTreeMap<String, OverlapGroup<T>> = BTreeMap::new();
    for (payload, label) in refs {
        by_label
            .entry(label)
            .or_insert_with(OverlapGroup::empty)
            .refs
            .push(payload);
    }
    for (payload, label) in hyps {
        by_label
            .entry(label)
            .or_insert_with(OverlapGroup::empty)
            .hyps
            .push(payload);
    }
    by_label.into_values().collect()
}
