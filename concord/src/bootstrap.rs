//! Bootstrap confidence data over files.
//!
//! Each sample draws as many files as the corpus has, with replacement,
//! and recomputes every metric of every `(tag, subset)` key over the drawn
//! files. Sample `i` uses its own `StdRng` seeded with `seed + i`, so the
//! result does not depend on how samples are scheduled.
//!
//! With the `parallel` feature, samples run on the rayon pool.
//!
//! # Example
//!
//! ```rust
//! use concord::aggregate::{build_file_aggregates, CorpusAggregate};
//! use concord::bootstrap::{BootstrapConfig, Bootstrapper, CancelToken};
//! use concord::rows::{RowArena, ScoreRow, MATCH};
//! use std::collections::BTreeMap;
//!
//! let mut arena = RowArena::new(false);
//! let mut files = Vec::new();
//! for name in ["a", "b"] {
//!     let mut row = ScoreRow::leaf(name, "PER", "<none>", 10);
//!     row.incr(MATCH, 1);
//!     let mut leaves = BTreeMap::new();
//!     leaves.insert(("PER".to_string(), "<none>".to_string()), arena.push(row));
//!     files.push(build_file_aggregates(&mut arena, name, 10, &leaves, &[], &BTreeMap::new()).unwrap());
//! }
//! let corpus = CorpusAggregate::new(&mut arena, &files);
//! let config = BootstrapConfig::default().with_samples(50);
//! let boot = Bootstrapper::run(&arena, &corpus, &config, &CancelToken::new()).unwrap();
//! let stats = boot.value("precision", "PER", "<none>").unwrap();
//! assert_eq!(stats.mean, 1.0);
//! assert_eq!(stats.variance, 0.0);
//! ```

use crate::aggregate::{CorpusAggregate, RowKey};
use crate::error::{Error, Result};
use crate::rows::{RowArena, ScoreRow, Stats, BASE_SLOTS, TEST_TOKS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Bootstrap settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Number of resamples.
    pub samples: usize,
    /// Base seed; sample `i` uses `seed + i`.
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            samples: 1000,
            seed: 0,
        }
    }
}

impl BootstrapConfig {
    /// Set the sample count.
    #[must_use]
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Set the base seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-file counts of one key: base slots in `BASE_SLOTS` order.
type Counts = [f64; BASE_SLOTS.len()];

/// Immutable input of the resampling.
struct Snapshot {
    /// Per key, per file index, the file's counts if the key occurs there.
    keys: Vec<(RowKey, Vec<Option<Counts>>)>,
    /// Token count of each file.
    file_toks: Vec<f64>,
}

/// Per key, metric values in `metrics` order.
type Sample = Vec<Option<Vec<f64>>>;

/// Bootstrap statistics of every key.
#[derive(Debug, Clone)]
pub struct Bootstrapper {
    metrics: Vec<String>,
    stats: BTreeMap<RowKey, BTreeMap<String, Stats>>,
}

impl Bootstrapper {
    /// Resample the corpus.
    pub fn run(
        arena: &RowArena,
        corpus: &CorpusAggregate,
        config: &BootstrapConfig,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let snapshot = Self::snapshot(arena, corpus);
        let metrics: Vec<&'static str> = arena.metrics();
        let scratch = arena.scratch();
        let n_files = snapshot.file_toks.len();

        let draw = |i: usize| -> Option<Sample> {
            if cancel.is_cancelled() {
                return None;
            }
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(i as u64));
            let drawn: Vec<usize> = (0..n_files).map(|_| rng.gen_range(0..n_files)).collect();
            Some(evaluate(&snapshot, &drawn, &scratch, &metrics))
        };

        let n_samples = if n_files == 0 { 0 } else { config.samples };
        #[cfg(feature = "parallel")]
        let samples: Vec<Option<Sample>> = {
            use rayon::prelude::*;
            (0..n_samples).into_par_iter().map(draw).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let samples: Vec<Option<Sample>> = (0..n_samples).map(draw).collect();
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut stats = BTreeMap::new();
        for (k, (key, _)) in snapshot.keys.iter().enumerate() {
            let mut per_metric = BTreeMap::new();
            for (m, metric) in metrics.iter().enumerate() {
                let values: Vec<f64> = samples
                    .iter()
                    .flatten()
                    .filter_map(|s| s[k].as_ref().map(|v| v[m]))
                    .collect();
                if let Some(s) = Stats::of(&values) {
                    per_metric.insert(metric.to_string(), s);
                }
            }
            stats.insert(key.clone(), per_metric);
        }
        log::info!(
            "bootstrap: {} samples over {} files, {} keys",
            config.samples,
            n_files,
            stats.len()
        );
        Ok(Self {
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            stats,
        })
    }

    fn snapshot(arena: &RowArena, corpus: &CorpusAggregate) -> Snapshot {
        let n_files = corpus.file_totals().len();
        let keys = corpus
            .members()
            .iter()
            .map(|(key, group)| {
                let mut per_file: Vec<Option<Counts>> = vec![None; n_files];
                for &(file, id) in group {
                    let mut counts = [0.0; BASE_SLOTS.len()];
                    for (c, slot) in counts.iter_mut().zip(BASE_SLOTS) {
                        *c = arena.value(id, slot);
                    }
                    per_file[file] = Some(counts);
                }
                (key.clone(), per_file)
            })
            .collect();
        let file_toks = corpus
            .file_totals()
            .iter()
            .map(|&id| arena.value(id, TEST_TOKS))
            .collect();
        Snapshot { keys, file_toks }
    }

    /// Metrics estimated, in column order.
    #[must_use]
    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    /// Statistics of a metric for a key, or `None` when no sample drew a
    /// file containing the key.
    #[must_use]
    pub fn value(&self, metric: &str, tag: &str, subset: &str) -> Option<Stats> {
        self.stats
            .get(&(tag.to_string(), subset.to_string()))?
            .get(metric)
            .copied()
    }
}

fn evaluate(snapshot: &Snapshot, drawn: &[usize], scratch: &RowArena, metrics: &[&str]) -> Sample {
    let toks: f64 = drawn.iter().map(|&f| snapshot.file_toks[f]).sum();
    let mut arena = scratch.clone();
    snapshot
        .keys
        .iter()
        .map(|(_, per_file)| {
            let mut total: Option<Counts> = None;
            for &f in drawn {
                if let Some(counts) = &per_file[f] {
                    let acc = total.get_or_insert([0.0; BASE_SLOTS.len()]);
                    for (a, c) in acc.iter_mut().zip(counts) {
                        *a += c;
                    }
                }
            }
            total.map(|counts| {
                let mut row = ScoreRow::leaf("", "", "", toks as u64);
                for (slot, c) in BASE_SLOTS.iter().zip(counts) {
                    row.incr(slot, c as u64);
                }
                let id = arena.push(row);
                metrics.iter().map(|m| arena.value(id, m)).collect()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{build_file_aggregates, FileRows, NONE};
    use crate::rows::{MATCH, SPURIOUS};

    fn corpus(arena: &mut RowArena, files: &[(&str, u64, u64)]) -> CorpusAggregate {
        let rows: Vec<FileRows> = files
            .iter()
            .map(|(name, matched, spurious)| {
                let mut row = ScoreRow::leaf(*name, "PER", NONE, 10);
                row.incr(MATCH, *matched);
                row.incr(SPURIOUS, *spurious);
                let mut leaves = BTreeMap::new();
                leaves.insert(("PER".to_string(), NONE.to_string()), arena.push(row));
                build_file_aggregates(arena, name, 10, &leaves, &[], &BTreeMap::new()).unwrap()
            })
            .collect();
        CorpusAggregate::new(arena, &rows)
    }

    #[test]
    fn test_same_seed_same_stats() {
        let mut arena = RowArena::new(true);
        let c = corpus(&mut arena, &[("a", 1, 1), ("b", 3, 0), ("c", 0, 2)]);
        let config = BootstrapConfig::default().with_samples(200).with_seed(7);
        let x = Bootstrapper::run(&arena, &c, &config, &CancelToken::new()).unwrap();
        let y = Bootstrapper::run(&arena, &c, &config, &CancelToken::new()).unwrap();
        assert_eq!(
            x.value("precision", "PER", NONE),
            y.value("precision", "PER", NONE)
        );
        let s = x.value("precision", "PER", NONE).unwrap();
        assert!(s.mean > 0.0 && s.mean < 1.0);
        assert!(s.variance > 0.0);
        assert!((s.stddev * s.stddev - s.variance).abs() < 1e-12);
        assert!(x.value("tag_blind_accuracy", "<all>", NONE).is_some());
    }

    #[test]
    fn test_cancelled() {
        let mut arena = RowArena::new(false);
        let c = corpus(&mut arena, &[("a", 1, 0)]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = Bootstrapper::run(&arena, &c, &BootstrapConfig::default(), &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_no_files_no_stats() {
        let mut arena = RowArena::new(false);
        let c = corpus(&mut arena, &[]);
        let b = Bootstrapper::run(&arena, &c, &BootstrapConfig::default(), &CancelToken::new()).unwrap();
        assert!(b.value("precision", "<all>", NONE).is_none());
    }

    #[test]
    fn test_stats_land_in_aggregate_rows() {
        let mut arena = RowArena::new(false);
        let mut c = corpus(&mut arena, &[("a", 1, 1), ("b", 2, 0)]);
        let config = BootstrapConfig::default().with_samples(20);
        c.bootstrap(&mut arena, &config, &CancelToken::new()).unwrap();
        let per = c.row("PER", NONE).unwrap();
        assert!(arena.get(per).stats.contains_key("recall"));
        assert_eq!(arena.value(per, "recall_mean"), 1.0);
    }
}
