//! Score profiles: aggregations, label limitation and decompositions.
//!
//! A score profile shapes the summary tables rather than the pairing:
//!
//! - `aggregations` add rows that sum a named group of labels;
//! - `label_limitation` drops every other label from the counts;
//! - `attr_decompositions` split a label's counts by attribute values
//!   (`type=PER,sub=x`);
//! - `partition_decompositions` split them by a named function of the
//!   annotation (`length=short`).
//!
//! ```json
//! {
//!   "name": "by-type",
//!   "aggregations": [{"name": "names", "true_labels": ["PERSON", "ORG"]}],
//!   "attr_decompositions": [{"true_labels": ["PERSON"], "attrs": ["type"]}]
//! }
//! ```

use crate::aggregate::{SubsetKinds, TagAggregation};
use crate::error::{Error, Result};
use crate::record::AnnKey;
use concord_core::{Annotation, TypeCatalog};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Shown for an attribute an annotation does not carry.
pub const NULL_VALUE: &str = "<null>";

// ============================================================================
// Configuration
// ============================================================================

/// A score profile as configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreProfile {
    /// Profile name, reported in summary tables.
    #[serde(default)]
    pub name: String,
    /// Named label groups.
    #[serde(default)]
    pub aggregations: Vec<AggregationSpec>,
    /// When set, only these true labels are counted.
    #[serde(default)]
    pub label_limitation: Option<Vec<String>>,
    /// Attribute-value decompositions.
    #[serde(default)]
    pub attr_decompositions: Vec<AttrDecompositionSpec>,
    /// Partition-function decompositions.
    #[serde(default)]
    pub partition_decompositions: Vec<PartitionDecompositionSpec>,
}

impl ScoreProfile {
    /// Parse a profile from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A named group of true labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSpec {
    /// Row tag of the aggregation.
    pub name: String,
    /// Member true labels.
    pub true_labels: Vec<String>,
}

/// Split labels by the values of some attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrDecompositionSpec {
    /// Labels decomposed.
    pub true_labels: Vec<String>,
    /// Attributes whose values form the subset.
    pub attrs: Vec<String>,
}

/// Split labels by a registered partition function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDecompositionSpec {
    /// Labels decomposed.
    pub true_labels: Vec<String>,
    /// Name of the function in the [`PartitionRegistry`].
    pub method: String,
}

// ============================================================================
// Partition functions
// ============================================================================

/// A partition function: the subset value of an annotation, or `None` to
/// leave it out.
pub type PartitionFn = Arc<dyn Fn(&Annotation) -> Option<String> + Send + Sync>;

/// Named partition functions available to score profiles.
#[derive(Clone, Default)]
pub struct PartitionRegistry {
    methods: HashMap<String, PartitionFn>,
}

impl PartitionRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under a name.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Annotation) -> Option<String> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(f));
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Annotation) -> Option<String> + Send + Sync + 'static,
    {
        self.register(name, f);
        self
    }

    /// Look up a function.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PartitionFn> {
        self.methods.get(name)
    }
}

impl fmt::Debug for PartitionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.methods.keys().collect();
        names.sort();
        f.debug_struct("PartitionRegistry")
            .field("methods", &names)
            .finish()
    }
}

// ============================================================================
// Compiled profile
// ============================================================================

#[derive(Clone, Default)]
struct LabelDecomposition {
    attrs: Vec<Vec<String>>,
    partitions: Vec<(String, PartitionFn)>,
}

/// A score profile checked against a catalog.
#[derive(Clone)]
pub struct CompiledScoreProfile {
    name: String,
    aggregations: Vec<AggregationSpec>,
    label_limitation: Option<BTreeSet<String>>,
    decompositions: BTreeMap<String, LabelDecomposition>,
}

impl fmt::Debug for CompiledScoreProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledScoreProfile")
            .field("name", &self.name)
            .field("aggregations", &self.aggregations)
            .field("label_limitation", &self.label_limitation)
            .field("decomposed", &self.decompositions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CompiledScoreProfile {
    /// Check every label, attribute and method the profile names.
    pub fn compile(
        profile: &ScoreProfile,
        catalog: &TypeCatalog,
        partitions: &PartitionRegistry,
    ) -> Result<Self> {
        let mut names = BTreeSet::new();
        for agg in &profile.aggregations {
            if !names.insert(agg.name.as_str()) {
                return Err(Error::score_table(format!(
                    "duplicate aggregation name '{}' in score profile",
                    agg.name
                )));
            }
            for label in &agg.true_labels {
                if catalog.get(label).is_none() {
                    return Err(Error::score_table(format!(
                        "unknown label '{}' in aggregation for score profile",
                        label
                    )));
                }
            }
        }

        let mut decompositions: BTreeMap<String, LabelDecomposition> = BTreeMap::new();
        for decomp in &profile.attr_decompositions {
            for label in &decomp.true_labels {
                let ty = catalog.get(label).ok_or_else(|| {
                    Error::score_table(format!(
                        "unknown label '{}' in attr decomposition for score profile",
                        label
                    ))
                })?;
                for attr in &decomp.attrs {
                    if ty.attribute(attr).is_none() {
                        return Err(Error::score_table(format!(
                            "label '{}' is decomposed by unknown attr '{}' in attr decomposition for score profile",
                            label, attr
                        )));
                    }
                }
                decompositions
                    .entry(label.clone())
                    .or_default()
                    .attrs
                    .push(decomp.attrs.clone());
            }
        }
        for decomp in &profile.partition_decompositions {
            let method = partitions.get(&decomp.method).ok_or_else(|| {
                Error::score_table(format!(
                    "unknown partition method '{}' for partition decomposition in score profile",
                    decomp.method
                ))
            })?;
            for label in &decomp.true_labels {
                if catalog.get(label).is_none() {
                    return Err(Error::score_table(format!(
                        "unknown label '{}' in partition decomposition for score profile",
                        label
                    )));
                }
                decompositions
                    .entry(label.clone())
                    .or_default()
                    .partitions
                    .push((decomp.method.clone(), Arc::clone(method)));
            }
        }

        Ok(Self {
            name: profile.name.clone(),
            aggregations: profile.aggregations.clone(),
            label_limitation: profile
                .label_limitation
                .as_ref()
                .filter(|l| !l.is_empty())
                .map(|l| l.iter().cloned().collect()),
            decompositions,
        })
    }

    /// Profile name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when any decomposition is configured; the tables then carry a
    /// `tag subset` column.
    #[must_use]
    pub fn has_decompositions(&self) -> bool {
        !self.decompositions.is_empty()
    }

    /// Whether annotations of this true label are counted.
    #[must_use]
    pub fn admits(&self, true_label: &str) -> bool {
        self.label_limitation
            .as_ref()
            .map_or(true, |l| l.contains(true_label))
    }

    /// Configured aggregations.
    #[must_use]
    pub fn aggregations(&self) -> &[AggregationSpec] {
        &self.aggregations
    }
}

// ============================================================================
// Decomposition state
// ============================================================================

/// Per-run record of the labels and subsets that were counted.
#[derive(Debug, Default)]
pub struct Decomposer {
    cache: HashMap<AnnKey, Vec<String>>,
    recorded: BTreeMap<String, Vec<BTreeSet<String>>>,
    kinds: BTreeMap<String, SubsetKinds>,
    effective: BTreeMap<String, BTreeSet<String>>,
    tags: BTreeSet<String>,
}

impl Decomposer {
    /// Empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the annotation cache; keys are only unique within one
    /// document pair.
    pub fn start_document(&mut self) {
        self.cache.clear();
    }

    /// Note that `ann` is counted under `label` and return its subset
    /// values. `Ok(None)` means the label limitation drops it.
    pub fn decompose(
        &mut self,
        profile: Option<&CompiledScoreProfile>,
        key: AnnKey,
        ann: &Annotation,
        label: &str,
    ) -> Result<Option<Vec<String>>> {
        if let Some(p) = profile {
            if !p.admits(&ann.label) {
                return Ok(None);
            }
        }
        self.tags.insert(label.to_string());
        self.effective
            .entry(ann.label.clone())
            .or_default()
            .insert(label.to_string());
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Some(cached.clone()));
        }
        let mut subsets = Vec::new();
        let entry = profile.and_then(|p| p.decompositions.get(&ann.label));
        if let Some(entry) = entry {
            let n_sets = entry.attrs.len() + entry.partitions.len();
            let recorded = self
                .recorded
                .entry(label.to_string())
                .or_default();
            if recorded.len() < n_sets {
                recorded.resize(n_sets, BTreeSet::new());
            }
            let kinds = self.kinds.entry(label.to_string()).or_default();
            for (i, attrs) in entry.attrs.iter().enumerate() {
                let value = attrs
                    .iter()
                    .map(|a| {
                        let v = ann.get(a).map_or(NULL_VALUE.to_string(), |v| v.to_string());
                        format!("{}={}", a, v)
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                record(recorded, i, &value, label, "attribute")?;
                kinds.attrs.insert(value.clone());
                subsets.push(value);
            }
            for (j, (name, method)) in entry.partitions.iter().enumerate() {
                let Some(v) = method(ann) else { continue };
                let value = format!("{}={}", name, v);
                record(recorded, entry.attrs.len() + j, &value, label, "partition")?;
                kinds.partitions.insert(value.clone());
                subsets.push(value);
            }
        }
        self.cache.insert(key, subsets.clone());
        Ok(Some(subsets))
    }

    /// Subset kinds per effective label.
    #[must_use]
    pub fn kinds(&self) -> &BTreeMap<String, SubsetKinds> {
        &self.kinds
    }

    /// Every effective label counted so far.
    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Make a seeded tag visible to aggregations. The tag stands for its
    /// own true label.
    pub fn seed(&mut self, tag: &str) {
        self.effective
            .entry(tag.to_string())
            .or_default()
            .insert(tag.to_string());
    }

    /// Effective labels a true label was counted under, sorted.
    #[must_use]
    pub fn effective_labels(&self, true_label: &str) -> Vec<String> {
        self.effective
            .get(true_label)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Effective labels of the profile's aggregations.
    #[must_use]
    pub fn aggregations(&self, profile: Option<&CompiledScoreProfile>) -> Vec<TagAggregation> {
        let Some(p) = profile else {
            return Vec::new();
        };
        p.aggregations
            .iter()
            .map(|agg| {
                let labels: BTreeSet<String> = agg
                    .true_labels
                    .iter()
                    .filter_map(|t| self.effective.get(t))
                    .flatten()
                    .cloned()
                    .collect();
                TagAggregation {
                    name: agg.name.clone(),
                    labels: labels.into_iter().collect(),
                }
            })
            .collect()
    }
}

/// Add `value` to decomposition set `i` of `label`; it must not already
/// belong to another set.
fn record(
    recorded: &mut [BTreeSet<String>],
    i: usize,
    value: &str,
    label: &str,
    what: &str,
) -> Result<()> {
    if recorded[i].contains(value) {
        return Ok(());
    }
    if recorded.iter().any(|set| set.contains(value)) {
        return Err(Error::score_table(format!(
            "value '{}' for {} decomposition for label '{}' also appears as a recorded value for another decomposition for that label",
            value, what, label
        )));
    }
    recorded[i].insert(value.to_string());
    Ok(())
}
