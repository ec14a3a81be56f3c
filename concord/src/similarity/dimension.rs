//! Similarity dimensions.
//!
//! Dimension names and comparator names are resolved when a profile is
//! compiled. The set of dimension kinds is closed; the only extension point
//! is [`MethodRegistry`], which supplies named comparators for scalar
//! attribute values.
//!
//! | Dimension name                       | Kind                    | Default method |
//! |--------------------------------------|-------------------------|----------------|
//! | `_label`                             | label equality          | `label_equality` |
//! | `_span`                              | span overlap            | `overlap`      |
//! | `_nonannotation_attribute_remainder` | unclaimed scalar attrs  | `overlap`      |
//! | `_annotation_attribute_remainder`    | unclaimed annotation attrs | `overlap`   |
//! | `attr`                               | one attribute           | `equality` / `similarity` |
//! | `a,b`                                | several annotation attrs | `_annotation_set_similarity` (required) |

use super::profile::DimensionSpec;
use crate::error::{Error, Result};
use crate::record::{COMPUTEDTAGCLASH, OVERLAP, OVERMARK, SETCLASH, TAGCLASH, UNDERMARK};
use concord_core::{Aggregation, AnnotationType, AttrKind, Span, Value};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Pair of clash tokens: the reference's view, then the hypothesis's.
pub type ErrPair = (&'static str, &'static str);

// ============================================================================
// Registries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Special {
    Label,
    Span,
    NonAnnotationRemainder,
    AnnotationRemainder,
}

static SPECIAL_DIMENSIONS: Lazy<BTreeMap<&'static str, Special>> = Lazy::new(|| {
    BTreeMap::from([
        ("_label", Special::Label),
        ("_span", Special::Span),
        (
            "_nonannotation_attribute_remainder",
            Special::NonAnnotationRemainder,
        ),
        ("_annotation_attribute_remainder", Special::AnnotationRemainder),
    ])
});

/// Built-in comparator names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    LabelEquality,
    Overlap,
    Equality,
    AnnotationSimilarity,
    AnnotationSetSimilarity,
}

static BUILTIN_METHODS: Lazy<BTreeMap<&'static str, Builtin>> = Lazy::new(|| {
    BTreeMap::from([
        ("label_equality", Builtin::LabelEquality),
        ("overlap", Builtin::Overlap),
        ("equality", Builtin::Equality),
        ("similarity", Builtin::AnnotationSimilarity),
        ("_annotation_set_similarity", Builtin::AnnotationSetSimilarity),
    ])
});

/// A caller-supplied comparator for attribute values, returning a
/// similarity in `[0, 1]`.
pub type CustomComparator = Arc<dyn Fn(&Value, &Value) -> f64 + Send + Sync>;

/// Named custom comparators available to profiles.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    methods: BTreeMap<String, CustomComparator>,
}

impl MethodRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a comparator under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Value, &Value) -> f64 + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(f));
    }

    /// Comparator by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CustomComparator> {
        self.methods.get(name)
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.methods.keys()).finish()
    }
}

// ============================================================================
// Compiled dimensions
// ============================================================================

/// How two attribute values are compared.
#[derive(Clone)]
pub enum ValueComparator {
    /// Scalar equality; Jaccard overlap for aggregates.
    Equality,
    /// Similarity of the referenced annotations, if they were paired.
    AnnotationSimilarity,
    /// A registered comparator; Hungarian-matched for aggregates.
    Custom(String, CustomComparator),
}

impl fmt::Debug for ValueComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueComparator::Equality => f.write_str("Equality"),
            ValueComparator::AnnotationSimilarity => f.write_str("AnnotationSimilarity"),
            ValueComparator::Custom(name, _) => write!(f, "Custom({})", name),
        }
    }
}

/// An attribute as seen by a dimension, possibly under a different name
/// per label.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRef {
    /// Dimension-level name.
    pub name: String,
    /// Value kind shared by every label.
    pub kind: AttrKind,
    /// Aggregation shared by every label.
    pub aggregation: Aggregation,
    /// True label to attribute name, when an equivalence applies.
    pub label_map: Option<BTreeMap<String, String>>,
}

impl AttributeRef {
    /// Attribute name to read on an annotation of `true_label`.
    #[must_use]
    pub fn attr_for<'a>(&'a self, true_label: &str) -> &'a str {
        self.label_map
            .as_ref()
            .and_then(|m| m.get(true_label))
            .map_or(self.name.as_str(), String::as_str)
    }

    fn declared(&self) -> Vec<String> {
        match &self.label_map {
            Some(m) => m.values().cloned().collect(),
            None => vec![self.name.clone()],
        }
    }
}

/// What a dimension compares.
#[derive(Debug, Clone)]
pub enum DimensionKind {
    /// Effective and true label equality.
    Label {
        /// Credit when only the effective labels differ.
        true_residue: Option<f64>,
    },
    /// Span overlap ratio.
    Span {
        /// Ratios above this count as 1.
        match_lower: Option<f64>,
        /// Ratios below this count as 0.
        mismatch_upper: Option<f64>,
    },
    /// One attribute.
    Attribute {
        /// The attribute.
        attr: AttributeRef,
        /// How values compare.
        comparator: ValueComparator,
    },
    /// Several annotation-valued attributes pooled into a set.
    MultiAttribute {
        /// The attributes.
        attrs: Vec<AttributeRef>,
    },
    /// Scalar attributes no other dimension claims.
    NonAnnotationRemainder,
    /// Annotation-valued attributes no other dimension claims.
    AnnotationRemainder,
}

/// A weighted, compiled dimension.
#[derive(Debug, Clone)]
pub struct Dimension {
    /// Name as written in the profile.
    pub name: String,
    /// Weight.
    pub weight: f64,
    /// What it compares.
    pub kind: DimensionKind,
}

impl Dimension {
    pub(crate) fn label(weight: f64, true_residue: Option<f64>) -> Self {
        Self {
            name: "_label".into(),
            weight,
            kind: DimensionKind::Label { true_residue },
        }
    }

    pub(crate) fn span(weight: f64) -> Self {
        Self {
            name: "_span".into(),
            weight,
            kind: DimensionKind::Span {
                match_lower: None,
                mismatch_upper: None,
            },
        }
    }

    pub(crate) fn non_annotation_remainder(weight: f64) -> Self {
        Self {
            name: "_nonannotation_attribute_remainder".into(),
            weight,
            kind: DimensionKind::NonAnnotationRemainder,
        }
    }

    pub(crate) fn annotation_remainder(weight: f64) -> Self {
        Self {
            name: "_annotation_attribute_remainder".into(),
            weight,
            kind: DimensionKind::AnnotationRemainder,
        }
    }

    /// True for dimensions that read named attributes. These are skipped
    /// when comparing labels that share no tag profile.
    #[must_use]
    pub fn is_attribute(&self) -> bool {
        matches!(
            self.kind,
            DimensionKind::Attribute { .. } | DimensionKind::MultiAttribute { .. }
        )
    }

    /// Attribute names this dimension claims.
    #[must_use]
    pub fn declared_attributes(&self) -> Vec<String> {
        match &self.kind {
            DimensionKind::Attribute { attr, .. } => attr.declared(),
            DimensionKind::MultiAttribute { attrs } => {
                attrs.iter().flat_map(AttributeRef::declared).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Compile a profile dimension for the given label group.
    pub fn compile(
        spec: &DimensionSpec,
        types: &[&AnnotationType],
        equivalences: &BTreeMap<String, Vec<String>>,
        methods: &MethodRegistry,
    ) -> Result<Self> {
        let name = spec.name.trim();
        let kind = if let Some(special) = SPECIAL_DIMENSIONS.get(name) {
            compile_special(*special, spec, types)?
        } else if name.contains(',') {
            let names: Vec<&str> = name.split(',').map(str::trim).collect();
            if names.len() < 2 {
                return Err(Error::pairing(
                    "can't define a multi-attribute dimension on fewer than two attributes",
                ));
            }
            match spec.method.as_deref().map(|m| BUILTIN_METHODS.get(m)) {
                Some(Some(Builtin::AnnotationSetSimilarity)) => {}
                None => {
                    return Err(Error::pairing(format!(
                        "the dimension '{}' is a multi-attribute comparison, but it has no method specified",
                        name
                    )))
                }
                _ => {
                    return Err(Error::pairing(format!(
                        "unknown method for multi-attribute dimension '{}'",
                        name
                    )))
                }
            }
            let mut attrs = Vec::with_capacity(names.len());
            for n in names {
                let attr = common_attribute(types, equivalences, n)?;
                if attr.kind != AttrKind::Annotation || attr.aggregation != Aggregation::Single {
                    return Err(Error::pairing(format!(
                        "_annotation_set_similarity can only compare single annotation attributes, not '{}'",
                        n
                    )));
                }
                attrs.push(attr);
            }
            DimensionKind::MultiAttribute { attrs }
        } else {
            let attr = common_attribute(types, equivalences, name)?;
            let comparator = attribute_comparator(&attr, spec.method.as_deref(), methods)?;
            DimensionKind::Attribute { attr, comparator }
        };
        Ok(Self {
            name: name.to_string(),
            weight: spec.weight,
            kind,
        })
    }
}

fn check_method(spec: &DimensionSpec, allowed: Builtin) -> Result<()> {
    match spec.method.as_deref() {
        None => Ok(()),
        Some(m) if BUILTIN_METHODS.get(m) == Some(&allowed) => Ok(()),
        Some(m) => Err(Error::pairing(format!(
            "dimension method '{}' is unknown for dimension '{}'",
            m, spec.name
        ))),
    }
}

fn compile_special(
    special: Special,
    spec: &DimensionSpec,
    types: &[&AnnotationType],
) -> Result<DimensionKind> {
    Ok(match special {
        Special::Label => {
            check_method(spec, Builtin::LabelEquality)?;
            DimensionKind::Label {
                true_residue: spec.params.get("true_residue").copied(),
            }
        }
        Special::Span => {
            check_method(spec, Builtin::Overlap)?;
            if let Some(t) = types.iter().find(|t| !t.has_span) {
                return Err(Error::pairing(format!(
                    "can't define a _span dimension on type '{}', because it has no span",
                    t.label
                )));
            }
            DimensionKind::Span {
                match_lower: spec.params.get("overlap_match_lower_bound").copied(),
                mismatch_upper: spec.params.get("overlap_mismatch_upper_bound").copied(),
            }
        }
        Special::NonAnnotationRemainder => {
            check_method(spec, Builtin::Overlap)?;
            DimensionKind::NonAnnotationRemainder
        }
        Special::AnnotationRemainder => {
            check_method(spec, Builtin::Overlap)?;
            DimensionKind::AnnotationRemainder
        }
    })
}

fn attribute_comparator(
    attr: &AttributeRef,
    method: Option<&str>,
    methods: &MethodRegistry,
) -> Result<ValueComparator> {
    let is_ann = attr.kind == AttrKind::Annotation;
    let Some(method) = method else {
        return Ok(if is_ann {
            ValueComparator::AnnotationSimilarity
        } else {
            ValueComparator::Equality
        });
    };
    match (BUILTIN_METHODS.get(method), is_ann) {
        (Some(Builtin::Equality), false) => Ok(ValueComparator::Equality),
        (Some(Builtin::AnnotationSimilarity), true) => Ok(ValueComparator::AnnotationSimilarity),
        _ => methods
            .get(method)
            .map(|f| ValueComparator::Custom(method.to_string(), Arc::clone(f)))
            .ok_or_else(|| {
                Error::pairing(format!(
                    "custom dimension method '{}' in similarity profile is unknown",
                    method
                ))
            }),
    }
}

/// Resolve a dimension name to an attribute every label in the group
/// declares, with a consistent kind and aggregation.
fn common_attribute(
    types: &[&AnnotationType],
    equivalences: &BTreeMap<String, Vec<String>>,
    dim_name: &str,
) -> Result<AttributeRef> {
    let (candidates, mapped): (Vec<&str>, bool) = match equivalences.get(dim_name) {
        Some(names) => (names.iter().map(String::as_str).collect(), true),
        None => (vec![dim_name], false),
    };
    let mut shape: Option<(AttrKind, Aggregation)> = None;
    let mut label_map = BTreeMap::new();
    for ty in types {
        let decl = candidates
            .iter()
            .rev()
            .find_map(|c| ty.attribute(c))
            .ok_or_else(|| {
                Error::pairing(format!(
                    "the attribute '{}' specified as a dimension for label '{}' is unknown",
                    dim_name, ty.label
                ))
            })?;
        match shape {
            Some((kind, _)) if kind != decl.kind => {
                return Err(Error::pairing(format!(
                    "the attribute '{}' for label '{}' has a different type than it does in another label in the tag profile",
                    decl.name, ty.label
                )))
            }
            Some((_, aggr)) if aggr != decl.aggregation => {
                return Err(Error::pairing(format!(
                    "the attribute '{}' for label '{}' has a different aggregation than it does in another label in the tag profile",
                    decl.name, ty.label
                )))
            }
            _ => shape = Some((decl.kind, decl.aggregation)),
        }
        label_map.insert(ty.label.clone(), decl.name.clone());
    }
    let (kind, aggregation) = shape.ok_or_else(|| {
        Error::pairing(format!("dimension '{}' applies to no labels", dim_name))
    })?;
    Ok(AttributeRef {
        name: dim_name.to_string(),
        kind,
        aggregation,
        label_map: mapped.then_some(label_map),
    })
}

// ============================================================================
// Stateless comparisons
// ============================================================================

/// Overlap ratio of two spans with threshold snapping and mark type.
#[must_use]
pub fn span_overlap(
    r: Span,
    h: Span,
    match_lower: Option<f64>,
    mismatch_upper: Option<f64>,
) -> (f64, Option<ErrPair>) {
    let union = r.cover(&h).len();
    let shared = r.intersection(&h).map_or(0, |s| s.len()) as f64;
    let mut pct = if union == 0 {
        if r == h {
            1.0
        } else {
            0.0
        }
    } else {
        shared / union as f64
    };
    if match_lower.is_some_and(|lb| pct > lb) {
        pct = 1.0;
    } else if mismatch_upper.is_some_and(|ub| pct < ub) {
        pct = 0.0;
    }
    if pct == 1.0 {
        return (1.0, None);
    }
    let err = if h.start <= r.start && h.end >= r.end {
        (UNDERMARK, OVERMARK)
    } else if h.start >= r.start && h.end <= r.end {
        (OVERMARK, UNDERMARK)
    } else {
        (OVERLAP, OVERLAP)
    };
    (pct, Some(err))
}

/// Label comparison on effective and true labels.
#[must_use]
pub fn label_equality(
    r_effective: &str,
    r_true: &str,
    h_effective: &str,
    h_true: &str,
    true_residue: Option<f64>,
) -> (f64, Option<ErrPair>) {
    if r_effective == h_effective {
        (1.0, None)
    } else if r_true != h_true {
        (0.0, Some((TAGCLASH, TAGCLASH)))
    } else if let Some(residue) = true_residue {
        (residue, Some((COMPUTEDTAGCLASH, COMPUTEDTAGCLASH)))
    } else {
        (0.0, Some((TAGCLASH, TAGCLASH)))
    }
}

/// Jaccard overlap of two aggregates under equality.
#[must_use]
pub fn set_equality(r: &[&Value], h: &[&Value]) -> (f64, Option<ErrPair>) {
    let mut ur: Vec<&Value> = Vec::new();
    for v in r {
        if !ur.contains(v) {
            ur.push(v);
        }
    }
    let mut uh: Vec<&Value> = Vec::new();
    for v in h {
        if !uh.contains(v) {
            uh.push(v);
        }
    }
    let inter = ur.iter().filter(|v| uh.contains(v)).count();
    let union = ur.len() + uh.len() - inter;
    if union == 0 {
        return (1.0, None);
    }
    let v = inter as f64 / union as f64;
    if v == 1.0 {
        (1.0, None)
    } else {
        (v, Some((SETCLASH, SETCLASH)))
    }
}
