//! Corpus scoring.
//!
//! A [`Scorer`] pairs every reference/hypothesis document pair it is
//! given and accumulates the counts of all tables. [`Scorer::finish`]
//! builds the aggregates; only then can the results be rendered or
//! written.
//!
//! # Example
//!
//! ```rust
//! use concord::{CancelToken, Scorer, ScorerConfig};
//! use concord_core::{AnnotationType, Document, TypeCatalog};
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(TypeCatalog::new().with_type(AnnotationType::spanned("PERSON")));
//! let mut scorer = Scorer::new(catalog, ScorerConfig::default()).unwrap();
//!
//! let mut r = Document::new("John met Mary.");
//! r.add_spanned("PERSON", 0, 4).unwrap();
//! r.add_spanned("PERSON", 9, 13).unwrap();
//! let mut h = Document::new("John met Mary.");
//! h.add_spanned("PERSON", 0, 4).unwrap();
//!
//! scorer.add_document_pairs(&[("doc1.json", &r, &h)]).unwrap();
//! scorer.finish(&CancelToken::new()).unwrap();
//! let text = scorer.format_results().unwrap();
//! assert!(text.starts_with("By tag:"));
//! ```

use crate::bootstrap::CancelToken;
use crate::config::ScorerConfig;
use crate::confusability::{Confusability, Units};
use crate::detail::{add_pairs, detail_table};
use crate::error::{Error, Result};
use crate::pairer::Pairer;
use crate::record::{AnnKey, DocPair, PairSide, Side, Status};
use crate::region::filter_by_regions;
use crate::rows::{HYPCLASH, MATCH, MISSING, REFCLASH, SPURIOUS};
use crate::score_profile::{CompiledScoreProfile, Decomposer};
use crate::similarity::SimilarityEngine;
use crate::summary::{FinishContext, SummaryKind, SummaryTable};
use crate::table::format::Flavor;
use crate::table::ScoreTable;
use crate::token_pairs::{PseudoTokens, TokenIndex, UnitIndex};
use concord_core::{Document, Span, TypeCatalog};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Profile column value when no profile was configured.
pub const DEFAULT_PROFILE: &str = "<default>";

/// Scores a corpus of document pairs.
#[derive(Debug)]
pub struct Scorer {
    config: ScorerConfig,
    pairer: Pairer,
    score_profile: Option<CompiledScoreProfile>,
    decomposer: Decomposer,
    tags: SummaryTable,
    tokens: Option<SummaryTable>,
    pseudo_tokens: Option<SummaryTable>,
    characters: Option<SummaryTable>,
    details: Option<ScoreTable>,
    confusability: Option<Confusability>,
    found_tokens: bool,
    num_docs: usize,
    finished: bool,
    results_ready: bool,
}

impl Scorer {
    /// Compile the configured profiles against the catalog.
    pub fn new(catalog: Arc<TypeCatalog>, config: ScorerConfig) -> Result<Self> {
        let engine = SimilarityEngine::compile(
            Arc::clone(&catalog),
            config.similarity_profile.as_ref(),
            &config.methods,
        )?;
        let score_profile = config
            .score_profile
            .as_ref()
            .map(|p| CompiledScoreProfile::compile(p, &catalog, &config.partitions))
            .transpose()?;
        let details = if config.compute_detail_table {
            Some(detail_table(engine.detail_dimensions())?)
        } else {
            None
        };
        let needs_tokens = config.compute_token_table
            || config.compute_pseudo_token_table
            || config.compute_character_table
            || config.compute_confusability;
        let pairer = Pairer::new(engine)
            .with_equivalence_classes(config.equivalence_classes.clone())
            .with_labels_to_ignore(config.labels_to_ignore.iter().cloned())
            .with_skip_tokens(!needs_tokens);
        let table = |on: bool, kind: SummaryKind| on.then(|| SummaryTable::new(kind));
        Ok(Self {
            tokens: table(config.compute_token_table, SummaryKind::Token),
            pseudo_tokens: table(config.compute_pseudo_token_table, SummaryKind::PseudoToken),
            characters: table(config.compute_character_table, SummaryKind::Character),
            confusability: config.compute_confusability.then(Confusability::new),
            tags: SummaryTable::new(SummaryKind::Tag),
            details,
            config,
            pairer,
            score_profile,
            decomposer: Decomposer::new(),
            found_tokens: false,
            num_docs: 0,
            finished: false,
            results_ready: false,
        })
    }

    /// The pairer in use.
    #[must_use]
    pub fn pairer(&self) -> &Pairer {
        &self.pairer
    }

    /// Document pairs scored so far.
    #[must_use]
    pub fn num_docs(&self) -> usize {
        self.num_docs
    }

    /// Score `(name, reference, hypothesis)` triples. Rows are keyed by
    /// the basename of `name`.
    pub fn add_document_pairs(&mut self, pairs: &[(&str, &Document, &Document)]) -> Result<()> {
        if self.finished {
            return Err(Error::score_table("cannot add documents after finish()"));
        }
        for &(name, reference, hypothesis) in pairs {
            self.add_pair(name, reference, hypothesis)?;
        }
        Ok(())
    }

    fn add_pair(&mut self, name: &str, r: &Document, h: &Document) -> Result<()> {
        if r.signal() != h.signal() {
            log::warn!("signals for '{}' don't match; skipping", name);
            return Ok(());
        }
        let catalog = Arc::clone(self.pairer.engine().catalog());
        if let Err(e) = r.validate(&catalog).and_then(|()| h.validate(&catalog)) {
            log::warn!("skipping '{}': {}", name, e);
            return Ok(());
        }
        let pairing = self.pairer.pair(r, h, self.config.gold)?;
        let file = basename(name);
        let docs = DocPair::new(r, h);
        self.num_docs += 1;
        self.decomposer.start_document();

        let maximal = Span::new(0, r.char_len());
        let toks: Vec<Span> = match catalog.token_label() {
            Some(label) => {
                let spans: Vec<Span> = r.with_label(label).filter_map(|a| a.span).collect();
                filter_by_regions(&pairing.regions, maximal, spans, |s| Some(*s))
            }
            None => Vec::new(),
        };

        let mut boundaries = BTreeSet::new();
        for pair in &pairing.pairs {
            for (side, ps) in [(Side::Ref, &pair.reference), (Side::Hyp, &pair.hypothesis)] {
                let span = ps
                    .as_ref()
                    .and_then(|ps| docs.doc(side).get(ps.ann))
                    .and_then(|a| a.span);
                if let Some(span) = span {
                    boundaries.insert(span.start);
                    boundaries.insert(span.end);
                }
            }
        }
        let pseudo = PseudoTokens::new(r.signal(), boundaries);

        let wants_index = self.tokens.is_some() || self.confusability.is_some();
        let index = if wants_index && !toks.is_empty() {
            let index = TokenIndex::new(toks.clone());
            if pairing
                .token_pairs
                .iter()
                .all(|tp| index.range(tp.span).is_some())
            {
                Some(index)
            } else {
                log::warn!(
                    "Found annotation boundary in '{}' which doesn't fall on a token boundary; skipping token scoring",
                    name
                );
                self.tokens = None;
                None
            }
        } else {
            None
        };

        let n_toks = toks.len() as u64;
        self.tags.register_file(&file, n_toks);
        if let (Some(t), Some(_)) = (&mut self.tokens, &index) {
            t.register_file(&file, n_toks);
            self.found_tokens = true;
        }
        if let Some(t) = &mut self.pseudo_tokens {
            t.register_file(&file, pseudo.total() as u64);
        }
        if let Some(t) = &mut self.characters {
            t.register_file(&file, r.char_len() as u64);
        }
        for tag in &self.config.tag_seed_list {
            self.decomposer.seed(tag);
            self.tags.seed(&file, tag);
            for t in [&mut self.pseudo_tokens, &mut self.characters].into_iter().flatten() {
                t.seed(&file, tag);
            }
            if let (Some(t), Some(_)) = (&mut self.tokens, &index) {
                t.seed(&file, tag);
            }
        }

        for pair in &pairing.pairs {
            match (&pair.reference, &pair.hypothesis) {
                (Some(rs), None) => self.count_tag(docs, &file, Side::Ref, rs, MISSING)?,
                (None, Some(hs)) => self.count_tag(docs, &file, Side::Hyp, hs, SPURIOUS)?,
                (Some(rs), Some(_)) if pair.is_match() => {
                    self.count_tag(docs, &file, Side::Ref, rs, MATCH)?;
                }
                (Some(rs), Some(hs)) => {
                    self.count_tag(docs, &file, Side::Hyp, hs, HYPCLASH)?;
                    self.count_tag(docs, &file, Side::Ref, rs, REFCLASH)?;
                }
                (None, None) => {}
            }
        }
        if let Some(table) = &mut self.details {
            add_pairs(table, &file, docs, &pairing.pairs)?;
        }

        for tp in &pairing.token_pairs {
            let pseudo_n = pseudo.count(tp.span).unwrap_or(0) as u64;
            let char_n = tp.span.len() as u64;
            let tok_n = index.as_ref().and_then(|i| i.count(tp.span));
            let entries: Vec<(Side, &PairSide, &str)> = match (&tp.pair.reference, &tp.pair.hypothesis) {
                (Some(rs), None) => vec![(Side::Ref, rs, MISSING)],
                (None, Some(hs)) => vec![(Side::Hyp, hs, SPURIOUS)],
                (Some(rs), Some(_)) if tp.pair.is_match() => vec![(Side::Ref, rs, MATCH)],
                (Some(rs), Some(hs)) => vec![(Side::Ref, rs, REFCLASH), (Side::Hyp, hs, HYPCLASH)],
                (None, None) => Vec::new(),
            };
            for (side, ps, slot) in entries {
                let Some((label, subsets)) = self.decompose(docs, side, ps)? else {
                    continue;
                };
                if let Some(t) = &mut self.pseudo_tokens {
                    t.incr(&file, &label, &subsets, slot, pseudo_n);
                }
                if let Some(t) = &mut self.characters {
                    t.incr(&file, &label, &subsets, slot, char_n);
                }
                if let (Some(t), Some(n)) = (&mut self.tokens, tok_n) {
                    t.incr(&file, &label, &subsets, slot, n as u64);
                }
            }
        }

        if let Some(conf) = &mut self.confusability {
            let kept = match (&index, conf.units()) {
                (Some(idx), None | Some(Units::Tokens)) => {
                    conf.add_document(Units::Tokens, idx, &pairing.token_pairs)
                }
                (None, Some(Units::Tokens)) => {
                    log::warn!("Aborting confusability as well, since it began with token scoring");
                    false
                }
                _ => conf.add_document(Units::PseudoTokens, &pseudo, &pairing.token_pairs),
            };
            if !kept {
                self.confusability = None;
            }
        }
        log::debug!(
            "scored '{}': {} pairs, {} token pairs",
            file,
            pairing.pairs.len(),
            pairing.token_pairs.len()
        );
        Ok(())
    }

    /// Effective label and subsets of a pair side, or `None` when the
    /// score profile leaves its label out.
    fn decompose(
        &mut self,
        docs: DocPair<'_>,
        side: Side,
        ps: &PairSide,
    ) -> Result<Option<(String, Vec<String>)>> {
        let Some(ann) = docs.doc(side).get(ps.ann) else {
            return Ok(None);
        };
        let key = AnnKey { side, id: ps.ann };
        let subsets = self
            .decomposer
            .decompose(self.score_profile.as_ref(), key, ann, &ps.label)?;
        Ok(subsets.map(|s| (ps.label.clone(), s)))
    }

    fn count_tag(
        &mut self,
        docs: DocPair<'_>,
        file: &str,
        side: Side,
        ps: &PairSide,
        slot: &str,
    ) -> Result<()> {
        let Some((label, subsets)) = self.decompose(docs, side, ps)? else {
            return Ok(());
        };
        self.tags.incr(file, &label, &subsets, slot, 1);
        if self.config.show_tag_output_mismatch_details {
            if let Status::Clash(tokens) = &ps.status {
                for token in tokens {
                    self.tags.incr_detail(file, &label, &subsets, side, token);
                }
            }
        }
        Ok(())
    }

    /// Labels in display order: strata order when the similarity profile
    /// declares strata, sorted otherwise, then seeded tags.
    fn label_order(&self) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        match self.pairer.engine().profile_strata() {
            Some(strata) => {
                for stratum in strata {
                    for group in [&stratum.spanned, &stratum.spanless] {
                        let mut labels: Vec<String> = group
                            .iter()
                            .flat_map(|t| self.decomposer.effective_labels(t))
                            .collect();
                        labels.sort();
                        labels.dedup();
                        order.extend(labels);
                    }
                }
            }
            None => order.extend(self.decomposer.tags().iter().cloned()),
        }
        for tag in &self.config.tag_seed_list {
            if !order.contains(tag) {
                order.push(tag.clone());
            }
        }
        order
    }

    /// Build every table. With confidence data on, this runs the
    /// bootstrap, which `cancel` can interrupt; a cancelled scorer has no
    /// results and cannot be finished again.
    pub fn finish(&mut self, cancel: &CancelToken) -> Result<()> {
        if self.finished {
            return Err(Error::score_table("scoring is already finished"));
        }
        self.finished = true;
        let label_order = self.label_order();
        let aggregations = self.decomposer.aggregations(self.score_profile.as_ref());
        let similarity_profile = self
            .pairer
            .engine()
            .profile_name()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_PROFILE);
        let score_profile = self
            .score_profile
            .as_ref()
            .map(CompiledScoreProfile::name)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_PROFILE);
        let ctx = FinishContext {
            similarity_profile,
            score_profile,
            label_order: &label_order,
            aggregations: &aggregations,
            kinds: self.decomposer.kinds(),
            num_docs: self.num_docs,
            show_subsets: self
                .score_profile
                .as_ref()
                .map_or(false, CompiledScoreProfile::has_decompositions),
            bootstrap: self
                .config
                .compute_confidence_data
                .then_some((&self.config.bootstrap, cancel)),
        };
        let tables = std::iter::once(&mut self.tags)
            .chain(self.tokens.iter_mut())
            .chain(self.pseudo_tokens.iter_mut())
            .chain(self.characters.iter_mut());
        for table in tables {
            table.finish(&ctx)?;
        }
        if let Some(conf) = &mut self.confusability {
            conf.declare_tags(self.decomposer.tags().iter().cloned());
        }
        self.results_ready = true;
        log::info!("scored {} document pairs", self.num_docs);
        Ok(())
    }

    fn ensure_finished(&self) -> Result<()> {
        if self.results_ready {
            Ok(())
        } else {
            Err(Error::score_table("results are only available after finish()"))
        }
    }

    /// Summary tables that have results, in output order.
    fn summaries(&self) -> Vec<&SummaryTable> {
        let mut out = vec![&self.tags];
        if self.found_tokens {
            out.extend(self.tokens.as_ref());
        }
        out.extend(self.pseudo_tokens.as_ref());
        out.extend(self.characters.as_ref());
        out
    }

    /// A summary table by kind, if it was produced.
    #[must_use]
    pub fn summary(&self, kind: SummaryKind) -> Option<&SummaryTable> {
        self.summaries().into_iter().find(|t| t.kind() == kind)
    }

    /// The per-pair detail table.
    #[must_use]
    pub fn details(&self) -> Option<&ScoreTable> {
        self.details.as_ref()
    }

    /// The confusability matrix, unless disabled or abandoned.
    #[must_use]
    pub fn confusability(&self) -> Option<&Confusability> {
        self.confusability.as_ref()
    }

    /// Global summaries, details and confusability as text.
    pub fn format_results(&self) -> Result<String> {
        self.ensure_finished()?;
        let mut sections = Vec::new();
        for t in self.summaries() {
            if let Some(summary) = t.global_summary() {
                sections.push(format!("{}:\n\n{}", t.kind().heading(), summary.format()));
            }
        }
        if let Some(details) = &self.details {
            sections.push(format!("Details:\n\n{}", details.format()));
        }
        if let Some(conf) = &self.confusability {
            let heading = if conf.units() == Some(Units::Tokens) {
                "Token confusability matrix"
            } else {
                "Pseudo-token confusability matrix"
            };
            sections.push(format!("{}:\n\n{}", heading, conf.format()));
        }
        Ok(sections.join("\n\n"))
    }

    /// Write every table into `dir`, creating it if needed. Returns the
    /// files written.
    pub fn write_csv(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        self.ensure_finished()?;
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for t in self.summaries() {
            if let Some(table) = t.table() {
                written.extend(table.write_csv_by_format(dir, t.kind().basename(), &self.config.format)?);
            }
        }
        if let Some(details) = &self.details {
            let path = dir.join("details.csv");
            details.write_csv(&path, Flavor::Literal)?;
            written.push(path);
        }
        if let Some(conf) = &self.confusability {
            let path = dir.join("confusability.csv");
            conf.write_csv(&path)?;
            written.push(path);
        }
        log::info!("wrote {} score files to {}", written.len(), dir.display());
        Ok(written)
    }
}

fn basename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::{AnnotationType, Category};

    fn catalog() -> Arc<TypeCatalog> {
        Arc::new(
            TypeCatalog::new()
                .with_type(AnnotationType::spanned("PERSON"))
                .with_type(AnnotationType::spanned("ORG"))
                .with_type(AnnotationType::spanned("lex").with_category(Category::Token)),
        )
    }

    const TEXT: &str = "John met Mary at IBM";

    fn tokenized() -> Document {
        let mut d = Document::new(TEXT);
        for (s, e) in [(0, 4), (5, 8), (9, 13), (14, 16), (17, 20)] {
            d.add_spanned("lex", s, e).unwrap();
        }
        d
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("/tmp/x/doc1.json"), "doc1.json");
        assert_eq!(basename("doc2"), "doc2");
    }

    #[test]
    fn test_results_need_finish() {
        let scorer = Scorer::new(catalog(), ScorerConfig::default()).unwrap();
        assert!(scorer.format_results().is_err());
    }

    #[test]
    fn test_signal_mismatch_is_skipped() {
        let mut scorer = Scorer::new(catalog(), ScorerConfig::default()).unwrap();
        let r = Document::new("abc");
        let h = Document::new("abd");
        scorer.add_document_pairs(&[("x", &r, &h)]).unwrap();
        assert_eq!(scorer.num_docs(), 0);
    }

    #[test]
    fn test_token_tables_and_confusability() {
        let config = ScorerConfig::builder().with_confusability(true).build();
        let mut scorer = Scorer::new(catalog(), config).unwrap();
        let mut r = tokenized();
        r.add_spanned("PERSON", 0, 4).unwrap();
        r.add_spanned("ORG", 17, 20).unwrap();
        let mut h = tokenized();
        h.add_spanned("PERSON", 0, 4).unwrap();
        h.add_spanned("PERSON", 17, 20).unwrap();
        scorer.add_document_pairs(&[("d", &r, &h)]).unwrap();
        scorer.finish(&CancelToken::new()).unwrap();

        let text = scorer.format_results().unwrap();
        assert!(text.contains("By token:"));
        assert!(text.contains("Token confusability matrix:"));
        let conf = scorer.confusability().unwrap();
        let (header, rows) = conf.rows();
        assert_eq!(header, vec!["", "ORG (ref)", "PERSON (ref)", "null (ref)"]);
        assert_eq!(rows[1], vec!["PERSON (hyp)", "1", "1", "0"]);
        assert_eq!(rows[2], vec!["null (hyp)", "0", "0", "3"]);

        let table = scorer.summary(SummaryKind::Token).unwrap().table().unwrap();
        let last = table.rows().last().unwrap();
        assert_eq!(last.value("tag").map(|v| v.to_string()), Some("<all>".to_string()));
    }

    #[test]
    fn test_misaligned_tokens_fall_back_to_pseudo_tokens() {
        let config = ScorerConfig::builder().with_confusability(true).build();
        let mut scorer = Scorer::new(catalog(), config).unwrap();
        let mut r = tokenized();
        r.add_spanned("PERSON", 0, 3).unwrap();
        let h = r.clone();
        scorer.add_document_pairs(&[("d", &r, &h)]).unwrap();
        scorer.finish(&CancelToken::new()).unwrap();
        assert!(scorer.summary(SummaryKind::Token).is_none());
        assert!(scorer.summary(SummaryKind::PseudoToken).is_some());
        let text = scorer.format_results().unwrap();
        assert!(!text.contains("By token:"));
        assert!(text.contains("Pseudo-token confusability matrix:"));
    }
}
