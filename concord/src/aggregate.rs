//! File and corpus aggregation of accumulator rows.
//!
//! Leaves count one label (and one decomposition subset) in one file.
//! [`build_file_aggregates`] sums them per file into aggregation rows;
//! [`CorpusAggregate`] then sums every `(tag, subset)` across files.

use crate::bootstrap::{BootstrapConfig, Bootstrapper, CancelToken};
use crate::error::{Error, Result};
use crate::rows::{RowArena, RowId, RowKind, ScoreRow};
use std::collections::{BTreeMap, BTreeSet};

/// The aggregation over every label.
pub const ALL: &str = "<all>";
/// The undecomposed subset.
pub const NONE: &str = "<none>";

/// `(tag, subset)`.
pub type RowKey = (String, String);

/// Decomposition subsets seen for one label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubsetKinds {
    /// Attribute decomposition values, e.g. `type=PER`.
    pub attrs: BTreeSet<String>,
    /// Partition values, e.g. `length=short`.
    pub partitions: BTreeSet<String>,
}

impl SubsetKinds {
    /// True when nothing was decomposed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.partitions.is_empty()
    }

    /// Union with another label's subsets. A value that is an attribute
    /// subset on one side and a partition subset on the other is an error.
    pub fn merge(&mut self, other: &SubsetKinds, aggregate: &str) -> Result<()> {
        let attrs: BTreeSet<&String> = self.attrs.iter().chain(&other.attrs).collect();
        let partitions: BTreeSet<&String> =
            self.partitions.iter().chain(&other.partitions).collect();
        if let Some(clash) = attrs.intersection(&partitions).next() {
            return Err(Error::score_table(format!(
                "subset '{}' of aggregate '{}' is both an attribute and a partition decomposition",
                clash, aggregate
            )));
        }
        self.attrs.extend(other.attrs.iter().cloned());
        self.partitions.extend(other.partitions.iter().cloned());
        Ok(())
    }

    /// `<none>`, then attribute subsets, then partition subsets.
    pub fn ordered(&self) -> impl Iterator<Item = &str> {
        std::iter::once(NONE)
            .chain(self.attrs.iter().map(String::as_str))
            .chain(self.partitions.iter().map(String::as_str))
    }
}

/// A named group of labels summed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAggregation {
    /// Row tag.
    pub name: String,
    /// Member labels.
    pub labels: Vec<String>,
}

/// Rows of one file.
#[derive(Debug, Clone)]
pub struct FileRows {
    /// File basename.
    pub file: String,
    /// Leaves and aggregation rows, by `(tag, subset)`.
    pub rows: BTreeMap<RowKey, RowId>,
    /// The file's `<all>/<none>` row.
    pub all: RowId,
}

/// Add the aggregation rows of one file. `<all>` is added after
/// `aggregations`. An aggregation gets one row per subset found among its
/// members' leaves; `<all>/<none>` always exists.
pub fn build_file_aggregates(
    arena: &mut RowArena,
    file: &str,
    test_toks: u64,
    leaves: &BTreeMap<RowKey, RowId>,
    aggregations: &[TagAggregation],
    kinds: &BTreeMap<String, SubsetKinds>,
) -> Result<FileRows> {
    let all_labels: Vec<String> = leaves
        .keys()
        .map(|(tag, _)| tag.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let everything = TagAggregation {
        name: ALL.to_string(),
        labels: all_labels,
    };

    let mut rows = leaves.clone();
    let mut all = None;
    for agg in aggregations.iter().chain(std::iter::once(&everything)) {
        let mut merged = SubsetKinds::default();
        for label in &agg.labels {
            if let Some(k) = kinds.get(label) {
                merged.merge(k, &agg.name)?;
            }
        }
        let mut by_subset: BTreeMap<&str, Vec<RowId>> = BTreeMap::new();
        for ((tag, subset), &id) in leaves {
            if agg.labels.contains(tag) {
                by_subset.entry(subset.as_str()).or_default().push(id);
            }
        }
        if agg.name == ALL {
            by_subset.entry(NONE).or_default();
        }
        for (subset, children) in by_subset {
            let mut row = ScoreRow::new(RowKind::FileAggregate, file, &agg.name, subset, test_toks);
            row.children = children;
            let id = arena.push(row);
            if agg.name == ALL && subset == NONE {
                all = Some(id);
            }
            rows.insert((agg.name.clone(), subset.to_string()), id);
        }
    }
    let all = all.ok_or_else(|| Error::score_table(format!("no <all> row for file {}", file)))?;
    Ok(FileRows {
        file: file.to_string(),
        rows,
        all,
    })
}

/// Tag aggregate rows over every file.
#[derive(Debug, Clone)]
pub struct CorpusAggregate {
    rows: BTreeMap<RowKey, RowId>,
    members: BTreeMap<RowKey, Vec<(usize, RowId)>>,
    file_totals: Vec<RowId>,
    bootstrap: Option<Bootstrapper>,
}

impl CorpusAggregate {
    /// Group every file row by `(tag, subset)` and add one tag aggregate
    /// row per group.
    pub fn new(arena: &mut RowArena, files: &[FileRows]) -> Self {
        let mut members: BTreeMap<RowKey, Vec<(usize, RowId)>> = BTreeMap::new();
        for (i, f) in files.iter().enumerate() {
            for (key, &id) in &f.rows {
                let group = members.entry(key.clone()).or_default();
                if !group.iter().any(|&(_, seen)| seen == id) {
                    group.push((i, id));
                }
            }
        }
        members
            .entry((ALL.to_string(), NONE.to_string()))
            .or_default();
        let file_totals: Vec<RowId> = files.iter().map(|f| f.all).collect();

        let mut rows = BTreeMap::new();
        for ((tag, subset), group) in &members {
            let mut row = ScoreRow::new(RowKind::TagAggregate, ALL, tag, subset, 0);
            row.children = group.iter().map(|&(_, id)| id).collect();
            row.total_toks = file_totals.clone();
            rows.insert((tag.clone(), subset.clone()), arena.push(row));
        }
        log::debug!(
            "corpus aggregate: {} keys over {} files",
            rows.len(),
            files.len()
        );
        Self {
            rows,
            members,
            file_totals,
            bootstrap: None,
        }
    }

    /// Tag aggregate row of a key.
    #[must_use]
    pub fn row(&self, tag: &str, subset: &str) -> Option<RowId> {
        self.rows.get(&(tag.to_string(), subset.to_string())).copied()
    }

    /// All tag aggregate rows.
    #[must_use]
    pub fn rows(&self) -> &BTreeMap<RowKey, RowId> {
        &self.rows
    }

    /// Per key, the contributing `(file index, row)` pairs.
    #[must_use]
    pub fn members(&self) -> &BTreeMap<RowKey, Vec<(usize, RowId)>> {
        &self.members
    }

    /// Each file's `<all>/<none>` row, in file order.
    #[must_use]
    pub fn file_totals(&self) -> &[RowId] {
        &self.file_totals
    }

    /// Run the bootstrap on first use and copy its statistics into the tag
    /// aggregate rows.
    pub fn bootstrap(
        &mut self,
        arena: &mut RowArena,
        config: &BootstrapConfig,
        cancel: &CancelToken,
    ) -> Result<&Bootstrapper> {
        if self.bootstrap.is_none() {
            let boot = Bootstrapper::run(arena, self, config, cancel)?;
            for (key, &id) in &self.rows {
                let row = arena.get_mut(id);
                for metric in boot.metrics() {
                    if let Some(stats) = boot.value(metric, &key.0, &key.1) {
                        row.stats.insert(metric.to_string(), stats);
                    }
                }
            }
            self.bootstrap = Some(boot);
        }
        self.bootstrap
            .as_ref()
            .ok_or_else(|| Error::score_table("bootstrap unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::{MATCH, MISSING, TEST_TOKS};

    fn key(t: &str, s: &str) -> RowKey {
        (t.to_string(), s.to_string())
    }

    fn file(arena: &mut RowArena, name: &str, toks: u64, rows: &[(&str, &str, u64)]) -> BTreeMap<RowKey, RowId> {
        rows.iter()
            .map(|(tag, subset, matched)| {
                let mut row = ScoreRow::leaf(name, *tag, *subset, toks);
                row.incr(MATCH, *matched);
                row.incr(MISSING, 1);
                (key(tag, subset), arena.push(row))
            })
            .collect()
    }

    #[test]
    fn test_file_aggregates() {
        let mut arena = RowArena::new(true);
        let leaves = file(
            &mut arena,
            "a",
            20,
            &[("PER", NONE, 2), ("PER", "type=x", 2), ("ORG", NONE, 1)],
        );
        let aggs = vec![TagAggregation {
            name: "names".into(),
            labels: vec!["PER".into()],
        }];
        let f = build_file_aggregates(&mut arena, "a", 20, &leaves, &aggs, &BTreeMap::new()).unwrap();
        let all = f.rows[&key(ALL, NONE)];
        assert_eq!(all, f.all);
        assert_eq!(arena.value(all, MATCH), 3.0);
        assert_eq!(arena.value(all, TEST_TOKS), 20.0);
        assert_eq!(arena.value(f.rows[&key("names", "type=x")], MATCH), 2.0);
        assert!(f.rows.contains_key(&key(ALL, "type=x")));
    }

    #[test]
    fn test_empty_file_still_has_all_row() {
        let mut arena = RowArena::new(true);
        let f = build_file_aggregates(&mut arena, "e", 7, &BTreeMap::new(), &[], &BTreeMap::new())
            .unwrap();
        assert_eq!(arena.value(f.all, TEST_TOKS), 7.0);
        assert_eq!(arena.value(f.all, "tag_sensitive_accuracy"), 1.0);
    }

    #[test]
    fn test_subset_kind_conflict() {
        let mut kinds = BTreeMap::new();
        let mut a = SubsetKinds::default();
        a.attrs.insert("x=1".into());
        let mut b = SubsetKinds::default();
        b.partitions.insert("x=1".into());
        kinds.insert("A".to_string(), a);
        kinds.insert("B".to_string(), b);
        let mut arena = RowArena::new(false);
        let leaves = file(&mut arena, "f", 1, &[("A", NONE, 1), ("B", NONE, 1)]);
        let err = build_file_aggregates(&mut arena, "f", 1, &leaves, &[], &kinds).unwrap_err();
        assert!(err.to_string().contains("x=1"));
    }

    #[test]
    fn test_corpus_sums_files() {
        let mut arena = RowArena::new(true);
        let la = file(&mut arena, "a", 10, &[("PER", NONE, 2)]);
        let lb = file(&mut arena, "b", 30, &[("PER", NONE, 1), ("ORG", NONE, 4)]);
        let fa = build_file_aggregates(&mut arena, "a", 10, &la, &[], &BTreeMap::new()).unwrap();
        let fb = build_file_aggregates(&mut arena, "b", 30, &lb, &[], &BTreeMap::new()).unwrap();
        let corpus = CorpusAggregate::new(&mut arena, &[fa, fb]);
        let per = corpus.row("PER", NONE).unwrap();
        assert_eq!(arena.value(per, MATCH), 3.0);
        assert_eq!(arena.value(per, TEST_TOKS), 40.0);
        let all = corpus.row(ALL, NONE).unwrap();
        assert_eq!(arena.value(all, MATCH), 7.0);
        assert_eq!(arena.value(all, MISSING), 3.0);
        assert!(corpus.row("ORG", "type=x").is_none());
    }

    #[test]
    fn test_corpus_without_files() {
        let mut arena = RowArena::new(false);
        let corpus = CorpusAggregate::new(&mut arena, &[]);
        let all = corpus.row(ALL, NONE).unwrap();
        assert_eq!(arena.value(all, TEST_TOKS), 0.0);
        assert_eq!(arena.value(all, "precision"), 1.0);
    }
}
