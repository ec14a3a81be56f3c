//! Similarity profile configuration.
//!
//! Profiles arrive already parsed (JSON via [`SimilarityProfile::from_json`])
//! and are compiled into a [`SimilarityEngine`](super::SimilarityEngine).
//!
//! ```json
//! {
//!   "name": "people",
//!   "strata": [["PERSON"], ["MEET"]],
//!   "tag_profiles": [{
//!     "true_labels": ["PERSON"],
//!     "dimensions": [
//!       {"name": "_label", "weight": 0.2, "params": {"true_residue": 0.5}},
//!       {"name": "_span", "weight": 0.8}
//!     ]
//!   }]
//! }
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named similarity profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityProfile {
    /// Profile name, reported in summary tables.
    pub name: String,
    /// Ordered label groups; `None` means a single stratum of content labels.
    #[serde(default)]
    pub strata: Option<Vec<Vec<String>>>,
    /// Per-label-group comparison recipes.
    #[serde(default)]
    pub tag_profiles: Vec<TagProfile>,
}

impl SimilarityProfile {
    /// Parse a profile from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Comparison recipe shared by a group of true labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagProfile {
    /// Labels the recipe applies to. Any two of them may be compared.
    pub true_labels: Vec<String>,
    /// Dimension name to the per-label attribute names it stands for.
    #[serde(default)]
    pub attr_equivalences: BTreeMap<String, Vec<String>>,
    /// Weighted dimensions.
    pub dimensions: Vec<DimensionSpec>,
}

/// One weighted dimension of a tag profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionSpec {
    /// `_label`, `_span`, a remainder name, an attribute, or `a,b` for a
    /// multi-attribute dimension.
    pub name: String,
    /// Relative weight.
    pub weight: f64,
    /// Comparator name; defaults per dimension kind.
    #[serde(default)]
    pub method: Option<String>,
    /// Numeric comparator parameters.
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl DimensionSpec {
    /// Dimension with default method and no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            method: None,
            params: BTreeMap::new(),
        }
    }

    /// Set the comparator.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set a parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}
