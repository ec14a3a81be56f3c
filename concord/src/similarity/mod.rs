//! Weighted similarity between reference and hypothesis annotations.
//!
//! A [`SimilarityEngine`] is compiled once per scoring run from the type
//! catalog and an optional [`SimilarityProfile`]. It is immutable. Each
//! document pair gets a [`Comparison`], which owns the per-pair caches:
//! implied spans, computed similarities, and recorded pairs.
//!
//! # Lookup order
//!
//! 1. A method entry for the `(ref true label, hyp true label)` pair.
//! 2. Otherwise, if both labels share a stratum and spannedness, each
//!    side's *unpaired* entry is evaluated from its own point of view and
//!    the minimum wins. Unpaired entries skip attribute dimensions and
//!    charge their weight as dead weight.
//! 3. Otherwise 0.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use concord::similarity::{Candidate, MethodRegistry, SimilarityEngine};
//! use concord::record::{AnnKey, DocPair};
//! use concord_core::{AnnotationType, Document, TypeCatalog};
//!
//! let catalog = Arc::new(TypeCatalog::new().with_type(AnnotationType::spanned("PERSON")));
//! let engine = SimilarityEngine::compile(catalog, None, &MethodRegistry::new()).unwrap();
//!
//! let mut r = Document::new("John met Mary.");
//! let rid = r.add_spanned("PERSON", 0, 4).unwrap();
//! let mut h = Document::new("John met Mary.");
//! let hid = h.add_spanned("PERSON", 0, 4).unwrap();
//!
//! let mut cmp = engine.comparison(DocPair::new(&r, &h));
//! let sim = cmp.compute_similarity(
//!     &Candidate::new(AnnKey::reference(rid), "PERSON"),
//!     &Candidate::new(AnnKey::hypothesis(hid), "PERSON"),
//!     false,
//! );
//! assert_eq!(sim.score, 1.0);
//! ```

pub mod dimension;
pub mod profile;

pub use dimension::{Dimension, DimensionKind, MethodRegistry, ValueComparator};
pub use profile::{DimensionSpec, SimilarityProfile, TagProfile};

use crate::error::{Error, Result};
use crate::implied_span::ImpliedSpans;
use crate::munkres;
use crate::record::{AnnKey, DocPair, Side, ANNATTRIBUTENOTPAIRED, ANNCLASH, SETCLASH};
use crate::strata::{check_stratification, compile_strata, stratum_index, Stratum};
use concord_core::{Aggregation, Annotation, AnnotationId, AttrKind, AttributeDecl, Category};
use concord_core::{Span, TypeCatalog, Value};
use dimension::{label_equality, set_equality, span_overlap, ErrPair};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

// ============================================================================
// Results
// ============================================================================

/// Outcome of comparing two annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct SimResult {
    /// Similarity in `[0, 1]`; exactly 1.0 when every dimension was perfect.
    pub score: f64,
    /// Clash tokens from the reference's and the hypothesis's view.
    pub errs: Option<(BTreeSet<String>, BTreeSet<String>)>,
}

impl SimResult {
    fn zero() -> Self {
        Self {
            score: 0.0,
            errs: None,
        }
    }

    fn swapped(self) -> Self {
        Self {
            score: self.score,
            errs: self.errs.map(|(r, h)| (h, r)),
        }
    }
}

/// An annotation offered for comparison, under its effective label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Which annotation.
    pub key: AnnKey,
    /// Effective label.
    pub label: String,
}

impl Candidate {
    /// Create a candidate.
    #[must_use]
    pub fn new(key: AnnKey, label: impl Into<String>) -> Self {
        Self {
            key,
            label: label.into(),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone)]
struct MethodEntry {
    dimensions: Vec<Dimension>,
    use_dead_weight: bool,
    dead_weight: f64,
}

impl MethodEntry {
    fn new(dimensions: Vec<Dimension>) -> Self {
        Self {
            dimensions,
            use_dead_weight: false,
            dead_weight: 0.0,
        }
    }

    fn unpaired(&self) -> Self {
        Self {
            dimensions: self
                .dimensions
                .iter()
                .filter(|d| !d.is_attribute())
                .cloned()
                .collect(),
            use_dead_weight: true,
            dead_weight: self
                .dimensions
                .iter()
                .filter(|d| d.is_attribute())
                .map(|d| d.weight)
                .sum(),
        }
    }

    fn spanned_default() -> Self {
        Self::new(vec![
            Dimension::label(0.1, Some(0.5)),
            Dimension::span(0.9),
            Dimension::non_annotation_remainder(0.1),
            Dimension::annotation_remainder(0.1),
        ])
    }

    fn spanless_default() -> Self {
        Self::new(vec![
            Dimension::label(0.2, Some(0.5)),
            Dimension::non_annotation_remainder(0.2),
            Dimension::annotation_remainder(0.6),
        ])
    }
}

/// Attributes of a label that no dimension of its own entry claims.
#[derive(Debug, Clone, Default)]
struct Remainder {
    scalar: Vec<AttributeDecl>,
    /// Annotation-valued attribute names by aggregation: single, set, list.
    annotation: [Vec<String>; 3],
    annotation_count: usize,
}

const AGGREGATIONS: [Aggregation; 3] = [Aggregation::Single, Aggregation::Set, Aggregation::List];

/// Compiled similarity model for one scoring run.
#[derive(Debug)]
pub struct SimilarityEngine {
    catalog: Arc<TypeCatalog>,
    profile_name: Option<String>,
    profile_strata: Option<Vec<Stratum>>,
    label_to_stratum: BTreeMap<String, usize>,
    entries: Vec<MethodEntry>,
    method_map: BTreeMap<String, BTreeMap<String, usize>>,
    unpaired_map: BTreeMap<String, MethodEntry>,
    remainders: BTreeMap<String, Remainder>,
    detail_dimensions: Vec<String>,
}

impl SimilarityEngine {
    /// Compile a profile (or the defaults) against a catalog.
    pub fn compile(
        catalog: Arc<TypeCatalog>,
        profile: Option<&SimilarityProfile>,
        methods: &MethodRegistry,
    ) -> Result<Self> {
        let profile_strata = match profile.and_then(|p| p.strata.as_deref()) {
            Some(groups) => Some(compile_strata(&catalog, groups)?),
            None => None,
        };
        let strata = match &profile_strata {
            Some(s) => s.clone(),
            None => {
                let mut all = Stratum::default();
                for ty in catalog.types().filter(|t| t.category == Category::Content) {
                    if ty.has_span {
                        all.spanned.push(ty.label.clone());
                    } else {
                        all.spanless.push(ty.label.clone());
                    }
                }
                vec![all]
            }
        };
        check_stratification(&catalog, &strata)?;

        let mut engine = Self {
            label_to_stratum: stratum_index(&strata),
            catalog,
            profile_name: profile.map(|p| p.name.clone()),
            profile_strata,
            entries: Vec::new(),
            method_map: BTreeMap::new(),
            unpaired_map: BTreeMap::new(),
            remainders: BTreeMap::new(),
            detail_dimensions: Vec::new(),
        };

        let mut recorded: BTreeSet<String> = BTreeSet::new();
        for tp in profile.map_or(&[][..], |p| p.tag_profiles.as_slice()) {
            engine.compile_tag_profile(tp, methods)?;
            recorded.extend(tp.true_labels.iter().cloned());
        }

        for stratum in &strata {
            let spanned: Vec<&String> = stratum.spanned.iter().filter(|l| !recorded.contains(*l)).collect();
            let spanless: Vec<&String> = stratum.spanless.iter().filter(|l| !recorded.contains(*l)).collect();
            engine.install_entry(MethodEntry::spanned_default(), &spanned);
            engine.install_entry(MethodEntry::spanless_default(), &spanless);
        }

        engine.compute_remainders();
        Ok(engine)
    }

    fn compile_tag_profile(&mut self, tp: &TagProfile, methods: &MethodRegistry) -> Result<()> {
        let mut reverse: BTreeMap<&str, &str> = BTreeMap::new();
        for (equiv, names) in &tp.attr_equivalences {
            for name in names {
                if reverse.insert(name, equiv).is_some() {
                    return Err(Error::pairing(format!(
                        "a tag profile specifies the attribute '{}' in more than one attribute equivalence",
                        name
                    )));
                }
            }
        }
        let mut types = Vec::with_capacity(tp.true_labels.len());
        for label in &tp.true_labels {
            let ty = self.catalog.get(label).ok_or_else(|| {
                Error::pairing(format!("label '{}' in tag profile is unknown", label))
            })?;
            types.push(ty);
        }
        if tp.dimensions.is_empty() {
            return Err(Error::pairing("no dimensions in tag profile"));
        }
        let mut dims = Vec::with_capacity(tp.dimensions.len());
        for spec in &tp.dimensions {
            dims.push(Dimension::compile(spec, &types, &tp.attr_equivalences, methods)?);
            let name = spec.name.trim();
            if name != "_label" && name != "_span" && !self.detail_dimensions.iter().any(|d| d == name) {
                self.detail_dimensions.push(name.to_string());
            }
        }
        let total: f64 = dims.iter().map(|d| d.weight).sum();
        if total <= 0.0 {
            return Err(Error::pairing("tag profile has a total weight of 0"));
        }
        let labels: Vec<&String> = tp.true_labels.iter().collect();
        self.install_entry(MethodEntry::new(dims), &labels);
        Ok(())
    }

    fn install_entry(&mut self, entry: MethodEntry, labels: &[&String]) {
        if labels.is_empty() {
            return;
        }
        let idx = self.entries.len();
        for l in labels {
            self.unpaired_map.insert((*l).clone(), entry.unpaired());
            for other in labels {
                self.method_map
                    .entry((*l).clone())
                    .or_default()
                    .insert((*other).clone(), idx);
            }
        }
        self.entries.push(entry);
    }

    fn compute_remainders(&mut self) {
        for ty in self.catalog.types() {
            let declared: BTreeSet<String> = self
                .entry_for(&ty.label, &ty.label)
                .map(|e| {
                    e.dimensions
                        .iter()
                        .flat_map(Dimension::declared_attributes)
                        .collect()
                })
                .unwrap_or_default();
            let mut rem = Remainder::default();
            for attr in ty.attributes.iter().filter(|a| !declared.contains(&a.name)) {
                if attr.kind == AttrKind::Annotation {
                    let slot = AGGREGATIONS
                        .iter()
                        .position(|a| *a == attr.aggregation)
                        .unwrap_or(0);
                    rem.annotation[slot].push(attr.name.clone());
                    rem.annotation_count += 1;
                } else if !self.catalog.is_effective_label_attribute(&ty.label, &attr.name) {
                    rem.scalar.push(attr.clone());
                }
            }
            self.remainders.insert(ty.label.clone(), rem);
        }
    }

    fn entry_for(&self, r: &str, h: &str) -> Option<&MethodEntry> {
        self.method_map
            .get(r)
            .and_then(|m| m.get(h))
            .map(|&i| &self.entries[i])
    }

    /// The catalog the engine was compiled against.
    #[must_use]
    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// Name of the similarity profile, if one was given.
    #[must_use]
    pub fn profile_name(&self) -> Option<&str> {
        self.profile_name.as_deref()
    }

    /// Strata declared by the profile, if any.
    #[must_use]
    pub fn profile_strata(&self) -> Option<&[Stratum]> {
        self.profile_strata.as_deref()
    }

    /// Stratum index of a true label.
    #[must_use]
    pub fn stratum_of(&self, label: &str) -> Option<usize> {
        self.label_to_stratum.get(label).copied()
    }

    /// Profile dimension names other than `_label` and `_span`, in
    /// declaration order. Detail tables show these as extra columns.
    #[must_use]
    pub fn detail_dimensions(&self) -> &[String] {
        &self.detail_dimensions
    }

    /// Start a comparison of two documents.
    #[must_use]
    pub fn comparison<'a>(&'a self, docs: DocPair<'a>) -> Comparison<'a> {
        Comparison {
            engine: self,
            docs,
            implied: ImpliedSpans::new(),
            cache: HashMap::new(),
            pairs: HashSet::new(),
        }
    }
}

// ============================================================================
// Per document pair
// ============================================================================

type DimOutcome = (f64, f64, Vec<ErrPair>);

/// Similarity state for one document pair.
#[derive(Debug)]
pub struct Comparison<'a> {
    engine: &'a SimilarityEngine,
    docs: DocPair<'a>,
    implied: ImpliedSpans,
    cache: HashMap<(AnnotationId, AnnotationId), SimResult>,
    pairs: HashSet<(AnnotationId, AnnotationId)>,
}

impl<'a> Comparison<'a> {
    /// The documents being compared.
    #[must_use]
    pub fn docs(&self) -> DocPair<'a> {
        self.docs
    }

    /// The engine.
    #[must_use]
    pub fn engine(&self) -> &'a SimilarityEngine {
        self.engine
    }

    /// Implied span of an annotation.
    pub fn implied_span(&mut self, key: AnnKey) -> Option<Span> {
        self.implied.resolve(self.docs, key)
    }

    /// Remember that a reference and a hypothesis annotation were paired,
    /// so annotation-valued attributes pointing at them can be compared.
    pub fn record_pair(&mut self, reference: AnnotationId, hypothesis: AnnotationId) {
        self.pairs.insert((reference, hypothesis));
    }

    /// Similarity of a reference candidate and a hypothesis candidate.
    ///
    /// `token_mode` treats spans as matching and bypasses the cache.
    pub fn compute_similarity(&mut self, r: &Candidate, h: &Candidate, token_mode: bool) -> SimResult {
        let cache_key = (r.key.id, h.key.id);
        if !token_mode {
            if let Some(hit) = self.cache.get(&cache_key) {
                return hit.clone();
            }
        }
        let engine = self.engine;
        let (Some(ra), Some(ha)) = (self.docs.get(r.key), self.docs.get(h.key)) else {
            return SimResult::zero();
        };
        let result = if let Some(entry) = engine.entry_for(&ra.label, &ha.label) {
            self.evaluate(entry, r, h, token_mode)
        } else {
            let same_stratum = matches!(
                (engine.stratum_of(&ra.label), engine.stratum_of(&ha.label)),
                (Some(a), Some(b)) if a == b
            );
            match (
                engine.unpaired_map.get(&ra.label),
                engine.unpaired_map.get(&ha.label),
            ) {
                (Some(r_entry), Some(h_entry)) if same_stratum && ra.has_span() == ha.has_span() => {
                    let from_ref = self.evaluate(r_entry, r, h, token_mode);
                    let from_hyp = self.evaluate(h_entry, h, r, token_mode);
                    if from_hyp.score < from_ref.score {
                        from_hyp.swapped()
                    } else {
                        from_ref
                    }
                }
                _ => SimResult::zero(),
            }
        };
        if !token_mode {
            self.cache.insert(cache_key, result.clone());
        }
        result
    }

    fn evaluate(&mut self, entry: &MethodEntry, r: &Candidate, h: &Candidate, token_mode: bool) -> SimResult {
        let r_span = self.implied.resolve(self.docs, r.key);
        let h_span = self.implied.resolve(self.docs, h.key);
        if let (Some(rs), Some(hs)) = (r_span, h_span) {
            if rs.end <= hs.start || rs.start >= hs.end {
                return SimResult::zero();
            }
        }
        let (Some(ra), Some(ha)) = (self.docs.get(r.key), self.docs.get(h.key)) else {
            return SimResult::zero();
        };

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        let mut perfect = true;
        let mut errs: BTreeSet<ErrPair> = BTreeSet::new();
        for dim in &entry.dimensions {
            if token_mode && matches!(dim.kind, DimensionKind::Span { .. }) {
                numerator += dim.weight;
                denominator += dim.weight;
                continue;
            }
            if entry.use_dead_weight && dim.is_attribute() {
                continue;
            }
            let (score, weight, dim_errs) = self.dimension(dim, r, ra, h, ha);
            if score < 1.0 {
                perfect = false;
            }
            denominator += weight;
            numerator += score * weight;
            errs.extend(dim_errs);
        }
        if entry.use_dead_weight && entry.dead_weight > 0.0 {
            perfect = false;
            denominator += entry.dead_weight;
        }

        if perfect {
            return SimResult {
                score: 1.0,
                errs: None,
            };
        }
        let score = if denominator > 0.0 {
            numerator / denominator
        } else {
            0.0
        };
        let errs = (!errs.is_empty()).then(|| {
            (
                errs.iter().map(|e| e.0.to_string()).collect(),
                errs.iter().map(|e| e.1.to_string()).collect(),
            )
        });
        SimResult { score, errs }
    }

    fn dimension(
        &self,
        dim: &Dimension,
        r: &Candidate,
        ra: &Annotation,
        h: &Candidate,
        ha: &Annotation,
    ) -> DimOutcome {
        let w = dim.weight;
        match &dim.kind {
            DimensionKind::Label { true_residue } => {
                let (s, e) = label_equality(&r.label, &ra.label, &h.label, &ha.label, *true_residue);
                (s, w, e.into_iter().collect())
            }
            DimensionKind::Span {
                match_lower,
                mismatch_upper,
            } => match (ra.span, ha.span) {
                (Some(rs), Some(hs)) => {
                    let (s, e) = span_overlap(rs, hs, *match_lower, *mismatch_upper);
                    (s, w, e.into_iter().collect())
                }
                _ => (0.0, w, Vec::new()),
            },
            DimensionKind::Attribute { attr, comparator } => {
                let rv = ra.get(attr.attr_for(&ra.label));
                let hv = ha.get(attr.attr_for(&ha.label));
                let (s, e) = self.compare_optional(attr.aggregation, comparator, rv, hv, r.key.side);
                (s, w, e.into_iter().collect())
            }
            DimensionKind::MultiAttribute { attrs } => {
                let rvals: Vec<&Value> = attrs.iter().filter_map(|a| ra.get(a.attr_for(&ra.label))).collect();
                let hvals: Vec<&Value> = attrs.iter().filter_map(|a| ha.get(a.attr_for(&ha.label))).collect();
                if rvals.is_empty() && hvals.is_empty() {
                    return (1.0, w, Vec::new());
                }
                let (s, e) = self.hungarian_set(&rvals, &hvals, &ValueComparator::AnnotationSimilarity, r.key.side);
                (s, w, e.into_iter().collect())
            }
            DimensionKind::NonAnnotationRemainder => self.scalar_remainder(w, ra, ha, r.key.side),
            DimensionKind::AnnotationRemainder => self.annotation_remainder(w, ra, ha, r.key.side),
        }
    }

    fn compare_optional(
        &self,
        aggregation: Aggregation,
        comparator: &ValueComparator,
        rv: Option<&Value>,
        hv: Option<&Value>,
        r_side: Side,
    ) -> (f64, Option<ErrPair>) {
        match (rv, hv) {
            (None, None) => (1.0, None),
            (Some(rv), Some(hv)) => self.compare_values(aggregation, comparator, rv, hv, r_side),
            _ => (0.0, None),
        }
    }

    fn compare_values(
        &self,
        aggregation: Aggregation,
        comparator: &ValueComparator,
        rv: &Value,
        hv: &Value,
        r_side: Side,
    ) -> (f64, Option<ErrPair>) {
        if aggregation == Aggregation::Single {
            return self.compare_scalar(comparator, rv, hv, r_side);
        }
        let rs: Vec<&Value> = rv.members().collect();
        let hs: Vec<&Value> = hv.members().collect();
        match comparator {
            ValueComparator::Equality => set_equality(&rs, &hs),
            other => self.hungarian_set(&rs, &hs, other, r_side),
        }
    }

    fn compare_scalar(
        &self,
        comparator: &ValueComparator,
        rv: &Value,
        hv: &Value,
        r_side: Side,
    ) -> (f64, Option<ErrPair>) {
        match comparator {
            ValueComparator::Equality => (if rv == hv { 1.0 } else { 0.0 }, None),
            ValueComparator::AnnotationSimilarity => self.annotation_similarity(rv, hv, r_side),
            ValueComparator::Custom(_, f) => (f(rv, hv).clamp(0.0, 1.0), None),
        }
    }

    /// Best one-to-one alignment of two value sets, normalized by the
    /// larger set.
    fn hungarian_set(
        &self,
        rs: &[&Value],
        hs: &[&Value],
        comparator: &ValueComparator,
        r_side: Side,
    ) -> (f64, Option<ErrPair>) {
        let max = rs.len().max(hs.len());
        if max == 0 {
            return (1.0, None);
        }
        let matrix: Vec<Vec<f64>> = rs
            .iter()
            .map(|r| {
                hs.iter()
                    .map(|h| self.compare_scalar(comparator, r, h, r_side).0)
                    .collect()
            })
            .collect();
        let raw = munkres::total(&matrix, &munkres::maximize(&matrix));
        if raw == max as f64 {
            (1.0, None)
        } else {
            (raw / max as f64, Some((SETCLASH, SETCLASH)))
        }
    }

    fn annotation_similarity(&self, rv: &Value, hv: &Value, r_side: Side) -> (f64, Option<ErrPair>) {
        let (Some(r_id), Some(h_id)) = (rv.as_annotation(), hv.as_annotation()) else {
            return (0.0, Some((ANNATTRIBUTENOTPAIRED, ANNATTRIBUTENOTPAIRED)));
        };
        let key = match r_side {
            Side::Ref => (r_id, h_id),
            Side::Hyp => (h_id, r_id),
        };
        if !self.pairs.contains(&key) {
            return (0.0, Some((ANNATTRIBUTENOTPAIRED, ANNATTRIBUTENOTPAIRED)));
        }
        let score = self.cache.get(&key).map_or(0.0, |c| c.score);
        if score == 1.0 {
            (1.0, None)
        } else {
            (score, Some((ANNCLASH, ANNCLASH)))
        }
    }

    fn scalar_remainder(
        &self,
        weight: f64,
        ra: &Annotation,
        ha: &Annotation,
        r_side: Side,
    ) -> DimOutcome {
        let engine = self.engine;
        let Some(local) = engine.remainders.get(&ra.label).filter(|r| !r.scalar.is_empty()) else {
            return (1.0, 0.0, Vec::new());
        };
        let h_ty = engine.catalog.get(&ha.label);
        let checkable: Vec<&AttributeDecl> = local
            .scalar
            .iter()
            .filter(|d| {
                h_ty.and_then(|t| t.attribute(&d.name)).is_some_and(|hd| {
                    hd.kind == d.kind
                        && hd.aggregation == d.aggregation
                        && !engine.catalog.is_effective_label_attribute(&ha.label, &d.name)
                })
            })
            .collect();

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        let mut perfect = true;
        let mut errs = Vec::new();
        for decl in &checkable {
            let (s, e) = self.compare_optional(
                decl.aggregation,
                &ValueComparator::Equality,
                ra.get(&decl.name),
                ha.get(&decl.name),
                r_side,
            );
            if s < 1.0 {
                perfect = false;
            }
            numerator += s;
            denominator += 1.0;
            errs.extend(e);
        }
        let unmatched = local.scalar.len() - checkable.len();
        if unmatched > 0 {
            perfect = false;
            denominator += unmatched as f64;
        }
        if perfect {
            (1.0, weight, Vec::new())
        } else {
            (numerator / denominator, weight, errs)
        }
    }

    fn annotation_remainder(&self, weight: f64, ra: &Annotation, ha: &Annotation, r_side: Side) -> DimOutcome {
        let engine = self.engine;
        let Some(local) = engine.remainders.get(&ra.label).filter(|r| r.annotation_count > 0) else {
            return (1.0, 0.0, Vec::new());
        };
        let empty = Remainder::default();
        let other = engine.remainders.get(&ha.label).unwrap_or(&empty);
        let size = local.annotation_count.max(other.annotation_count) as f64;

        let mut total = 0.0;
        for (slot, aggregation) in AGGREGATIONS.iter().enumerate() {
            let rvals: Vec<&Value> = local.annotation[slot].iter().filter_map(|n| ra.get(n)).collect();
            let hvals: Vec<&Value> = other.annotation[slot].iter().filter_map(|n| ha.get(n)).collect();
            if rvals.is_empty() || hvals.is_empty() {
                continue;
            }
            let matrix: Vec<Vec<f64>> = rvals
                .iter()
                .map(|rv| {
                    hvals
                        .iter()
                        .map(|hv| {
                            self.compare_values(*aggregation, &ValueComparator::AnnotationSimilarity, rv, hv, r_side)
                                .0
                        })
                        .collect()
                })
                .collect();
            total += munkres::total(&matrix, &munkres::maximize(&matrix));
        }
        if total == size {
            (1.0, weight, Vec::new())
        } else {
            (total / size, weight, Vec::new())
        }
    }
}
