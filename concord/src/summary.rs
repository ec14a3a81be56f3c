//! Summary tables: one per counting unit.
//!
//! | Kind          | Unit counted per pair          | `test toks` header |
//! |---------------|--------------------------------|--------------------|
//! | `Tag`         | one per annotation             | `test toks`        |
//! | `Token`       | token annotations covered      | `test toks`        |
//! | `PseudoToken` | whitespace chunks covered      | `test pseudo-toks` |
//! | `Character`   | characters covered             | `test chars`       |
//!
//! Leaves are accumulated per file, label and subset while document pairs
//! are scored. [`SummaryTable::finish`] adds the file and corpus
//! aggregates, optionally runs the bootstrap, and lays out the rows:
//! every file in name order (labels in strata order, each label's
//! `<none>` row before its subsets, then the aggregations, `<all>` last),
//! followed by the same rows for the whole corpus under file `<all>`.

use crate::aggregate::{
    build_file_aggregates, CorpusAggregate, FileRows, RowKey, SubsetKinds, TagAggregation, ALL,
    NONE,
};
use crate::bootstrap::{BootstrapConfig, CancelToken};
use crate::error::{Error, Result};
use crate::record::Side;
use crate::rows::{
    RowArena, RowId, ScoreRow, StatKind, HYPCLASH, MATCH, MISSING, REFCLASH, SPURIOUS,
    TAG_METRICS, TEST_TOKS, TOKEN_METRICS,
};
use crate::table::cell::CellValue;
use crate::table::{CellFormat, Column, ScoreTable};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// What a summary table counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryKind {
    /// Annotations.
    Tag,
    /// Token annotations.
    Token,
    /// Whitespace-delimited chunks.
    PseudoToken,
    /// Characters.
    Character,
}

impl SummaryKind {
    /// Section heading in text output.
    #[must_use]
    pub fn heading(self) -> &'static str {
        match self {
            SummaryKind::Tag => "By tag",
            SummaryKind::Token => "By token",
            SummaryKind::PseudoToken => "By pseudo-token",
            SummaryKind::Character => "By character",
        }
    }

    /// CSV basename.
    #[must_use]
    pub fn basename(self) -> &'static str {
        match self {
            SummaryKind::Tag => "bytag",
            SummaryKind::Token => "bytoken",
            SummaryKind::PseudoToken => "bypseudotoken",
            SummaryKind::Character => "bychar",
        }
    }

    /// Header of the token count column.
    #[must_use]
    pub fn toks_header(self) -> &'static str {
        match self {
            SummaryKind::Tag | SummaryKind::Token => "test toks",
            SummaryKind::PseudoToken => "test pseudo-toks",
            SummaryKind::Character => "test chars",
        }
    }

    /// Whether the accuracy metrics apply.
    #[must_use]
    pub fn has_accuracy(self) -> bool {
        !matches!(self, SummaryKind::Tag)
    }
}

#[derive(Debug, Clone, Default)]
struct FileLeaves {
    test_toks: u64,
    leaves: BTreeMap<RowKey, RowId>,
}

/// Corpus-wide inputs to [`SummaryTable::finish`].
#[derive(Debug, Clone, Copy)]
pub struct FinishContext<'a> {
    /// Value of the `similarity profile` column.
    pub similarity_profile: &'a str,
    /// Value of the `score profile` column.
    pub score_profile: &'a str,
    /// Labels in display order; others follow sorted.
    pub label_order: &'a [String],
    /// Profile aggregations, in declared order.
    pub aggregations: &'a [TagAggregation],
    /// Decomposition subsets per label.
    pub kinds: &'a BTreeMap<String, SubsetKinds>,
    /// Number of document pairs scored.
    pub num_docs: usize,
    /// Whether to show the `tag subset` column.
    pub show_subsets: bool,
    /// Bootstrap settings, when confidence data is wanted.
    pub bootstrap: Option<(&'a BootstrapConfig, &'a CancelToken)>,
}

/// Accumulates one kind of counts and turns them into a [`ScoreTable`].
#[derive(Debug)]
pub struct SummaryTable {
    kind: SummaryKind,
    arena: RowArena,
    files: BTreeMap<String, FileLeaves>,
    ref_details: BTreeSet<String>,
    hyp_details: BTreeSet<String>,
    table: Option<ScoreTable>,
}

impl SummaryTable {
    /// Empty table of a kind.
    #[must_use]
    pub fn new(kind: SummaryKind) -> Self {
        Self {
            kind,
            arena: RowArena::new(kind.has_accuracy()),
            files: BTreeMap::new(),
            ref_details: BTreeSet::new(),
            hyp_details: BTreeSet::new(),
            table: None,
        }
    }

    /// Kind of the table.
    #[must_use]
    pub fn kind(&self) -> SummaryKind {
        self.kind
    }

    /// Note a scored document. Documents sharing a basename add up.
    pub fn register_file(&mut self, file: &str, test_toks: u64) {
        self.files.entry(file.to_string()).or_default().test_toks += test_toks;
    }

    fn leaf(&mut self, file: &str, tag: &str, subset: &str) -> RowId {
        let entry = self.files.entry(file.to_string()).or_default();
        let arena = &mut self.arena;
        *entry
            .leaves
            .entry((tag.to_string(), subset.to_string()))
            .or_insert_with(|| arena.push(ScoreRow::leaf(file, tag, subset, 0)))
    }

    /// Make sure a file has a `<none>` row for `tag`.
    pub fn seed(&mut self, file: &str, tag: &str) {
        self.leaf(file, tag, NONE);
    }

    /// Add `n` to a slot of the `<none>` row and of every subset row.
    pub fn incr(&mut self, file: &str, tag: &str, subsets: &[String], slot: &str, n: u64) {
        for subset in std::iter::once(NONE).chain(subsets.iter().map(String::as_str)) {
            let id = self.leaf(file, tag, subset);
            self.arena.get_mut(id).incr(slot, n);
        }
    }

    /// Count one clash token as a `<side><token> (detail)` slot.
    pub fn incr_detail(&mut self, file: &str, tag: &str, subsets: &[String], side: Side, token: &str) {
        let slot = format!("{}{} (detail)", side.prefix(), token);
        match side {
            Side::Ref => self.ref_details.insert(slot.clone()),
            Side::Hyp => self.hyp_details.insert(slot.clone()),
        };
        self.incr(file, tag, subsets, &slot, 1);
    }

    /// Build the aggregates and the final table. Accumulation must be over.
    pub fn finish(&mut self, ctx: &FinishContext<'_>) -> Result<()> {
        if self.table.is_some() {
            return Err(Error::score_table(format!(
                "{} table is already finished",
                self.kind.basename()
            )));
        }
        let arena = &mut self.arena;
        for f in self.files.values() {
            for &id in f.leaves.values() {
                arena.get_mut(id).test_toks = f.test_toks;
            }
        }
        let mut file_rows: Vec<FileRows> = Vec::with_capacity(self.files.len());
        for (name, f) in &self.files {
            file_rows.push(build_file_aggregates(
                arena,
                name,
                f.test_toks,
                &f.leaves,
                ctx.aggregations,
                ctx.kinds,
            )?);
        }
        let mut corpus = CorpusAggregate::new(arena, &file_rows);
        if let Some((config, cancel)) = ctx.bootstrap {
            corpus.bootstrap(arena, config, cancel)?;
        }

        let arena = Arc::new(std::mem::take(&mut self.arena));
        let mut table = ScoreTable::new(self.columns(ctx), arena);
        for f in &file_rows {
            for key in ordered_keys(&f.rows, ctx) {
                if let Some(&id) = f.rows.get(&key) {
                    table.add_row(row_values(ctx, &f.file, 1, &key), Some(id))?;
                }
            }
        }
        for key in ordered_keys(corpus.rows(), ctx) {
            if let Some(id) = corpus.row(&key.0, &key.1) {
                table.add_row(row_values(ctx, ALL, ctx.num_docs, &key), Some(id))?;
            }
        }
        log::debug!(
            "{} table: {} rows over {} files",
            self.kind.basename(),
            table.len(),
            file_rows.len()
        );
        self.table = Some(table);
        Ok(())
    }

    fn columns(&self, ctx: &FinishContext<'_>) -> Vec<Column> {
        let mut cols = vec![
            Column::literal("similarity profile"),
            Column::literal("score profile"),
            Column::literal("file"),
            Column::literal("test docs"),
            Column::literal("tag"),
        ];
        if ctx.show_subsets {
            cols.push(Column::literal("tag subset"));
        }
        let slot = |s: &str| Column::aggregator(s, s);
        cols.push(Column::aggregator(self.kind.toks_header(), TEST_TOKS));
        cols.extend([slot(MATCH), slot(REFCLASH)]);
        cols.extend(self.ref_details.iter().map(|d| slot(d.as_str())));
        cols.extend([slot(MISSING), slot("refonly"), slot("reftotal"), slot(HYPCLASH)]);
        cols.extend(self.hyp_details.iter().map(|d| slot(d.as_str())));
        cols.extend([slot(SPURIOUS), slot("hyponly"), slot("hyptotal")]);

        let mut groups: Vec<&[&str]> = vec![&TAG_METRICS[..]];
        if self.kind.has_accuracy() {
            groups.push(&TOKEN_METRICS[..]);
        }
        for group in groups {
            for &m in group {
                cols.push(slot(m).with_format(CellFormat::Ratio));
            }
            if ctx.bootstrap.is_some() {
                for &m in group {
                    for kind in StatKind::ALL {
                        let name = format!("{}{}", m, kind.suffix());
                        cols.push(Column::aggregator(name.clone(), name).with_format(CellFormat::Ratio));
                    }
                }
            }
        }
        cols
    }

    /// The finished table.
    #[must_use]
    pub fn table(&self) -> Option<&ScoreTable> {
        self.table.as_ref()
    }

    /// Corpus rows of the finished table.
    #[must_use]
    pub fn global_summary(&self) -> Option<ScoreTable> {
        self.table.as_ref().map(ScoreTable::extract_global_summary)
    }
}

fn row_values(
    ctx: &FinishContext<'_>,
    file: &str,
    docs: usize,
    (tag, subset): &RowKey,
) -> BTreeMap<String, CellValue> {
    let mut values = BTreeMap::new();
    values.insert("similarity profile".to_string(), CellValue::from(ctx.similarity_profile));
    values.insert("score profile".to_string(), CellValue::from(ctx.score_profile));
    values.insert("file".to_string(), CellValue::from(file));
    values.insert("test docs".to_string(), CellValue::Int(docs as i64));
    values.insert("tag".to_string(), CellValue::from(tag.as_str()));
    values.insert("tag subset".to_string(), CellValue::from(subset.as_str()));
    values
}

fn merged<'a>(kinds: &BTreeMap<String, SubsetKinds>, labels: impl Iterator<Item = &'a String>) -> SubsetKinds {
    let mut out = SubsetKinds::default();
    for k in labels.filter_map(|l| kinds.get(l)) {
        out.attrs.extend(k.attrs.iter().cloned());
        out.partitions.extend(k.partitions.iter().cloned());
    }
    out
}

/// Keys of `rows` in display order.
fn ordered_keys(rows: &BTreeMap<RowKey, RowId>, ctx: &FinishContext<'_>) -> Vec<RowKey> {
    let aggregate_names: BTreeSet<&str> = ctx
        .aggregations
        .iter()
        .map(|a| a.name.as_str())
        .chain(std::iter::once(ALL))
        .collect();
    let present: BTreeSet<&str> = rows
        .keys()
        .map(|(tag, _)| tag.as_str())
        .filter(|tag| !aggregate_names.contains(tag))
        .collect();
    let mut labels: Vec<&str> = Vec::new();
    for label in ctx.label_order.iter().map(String::as_str).chain(present.iter().copied()) {
        if present.contains(label) && !labels.contains(&label) {
            labels.push(label);
        }
    }

    let mut out = Vec::new();
    let mut push = |tag: &str, kinds: &SubsetKinds| {
        for subset in kinds.ordered() {
            let key = (tag.to_string(), subset.to_string());
            if rows.contains_key(&key) {
                out.push(key);
            }
        }
    };
    let none = SubsetKinds::default();
    for label in labels {
        push(label, ctx.kinds.get(label).unwrap_or(&none));
    }
    for agg in ctx.aggregations {
        push(&agg.name, &merged(ctx.kinds, agg.labels.iter()));
    }
    push(ALL, &merged(ctx.kinds, ctx.kinds.keys()));
    out
}
