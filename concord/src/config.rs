//! Scorer configuration.
//!
//! ```rust
//! use concord::ScorerConfig;
//!
//! let config = ScorerConfig::builder()
//!     .with_confidence_data(true)
//!     .with_bootstrap_samples(200)
//!     .with_confusability(true)
//!     .build();
//! assert!(config.compute_confidence_data);
//! assert!(config.compute_token_table);
//! ```

use crate::bootstrap::BootstrapConfig;
use crate::pairer::GoldRestriction;
use crate::score_profile::{PartitionRegistry, ScoreProfile};
use crate::similarity::{MethodRegistry, SimilarityProfile};
use crate::table::format::ScoreFormat;
use std::collections::BTreeMap;

/// Everything a [`crate::Scorer`] needs besides the type catalog.
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    /// Pairing profile; the built-in defaults when absent.
    pub similarity_profile: Option<SimilarityProfile>,
    /// Aggregations, label limitation and decompositions.
    pub score_profile: Option<ScoreProfile>,
    /// Partition functions score profiles may name.
    pub partitions: PartitionRegistry,
    /// Attribute comparators similarity profiles may name.
    pub methods: MethodRegistry,
    /// CSV flavors to write.
    pub format: ScoreFormat,
    /// Produce the by-token table.
    pub compute_token_table: bool,
    /// Produce the by-pseudo-token table.
    pub compute_pseudo_token_table: bool,
    /// Produce the by-character table.
    pub compute_character_table: bool,
    /// Produce the per-pair detail table.
    pub compute_detail_table: bool,
    /// Run the bootstrap and add statistic columns.
    pub compute_confidence_data: bool,
    /// Produce the token confusability matrix.
    pub compute_confusability: bool,
    /// Count each clash token in its own `(detail)` column.
    pub show_tag_output_mismatch_details: bool,
    /// Label to class label.
    pub equivalence_classes: BTreeMap<String, String>,
    /// Labels left out of scoring.
    pub labels_to_ignore: Vec<String>,
    /// Tags that get rows even when never seen.
    pub tag_seed_list: Vec<String>,
    /// Restriction of either side to its gold segments.
    pub gold: GoldRestriction,
    /// Bootstrap sample count and seed.
    pub bootstrap: BootstrapConfig,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        ScorerConfigBuilder::default().build()
    }
}

impl ScorerConfig {
    /// Start a builder with the defaults.
    #[must_use]
    pub fn builder() -> ScorerConfigBuilder {
        ScorerConfigBuilder::new()
    }
}

/// Builder for [`ScorerConfig`].
#[derive(Debug, Clone)]
pub struct ScorerConfigBuilder {
    config: ScorerConfig,
}

impl Default for ScorerConfigBuilder {
    fn default() -> Self {
        Self {
            config: ScorerConfig {
                similarity_profile: None,
                score_profile: None,
                partitions: PartitionRegistry::new(),
                methods: MethodRegistry::new(),
                format: ScoreFormat::default(),
                compute_token_table: true,
                compute_pseudo_token_table: true,
                compute_character_table: true,
                compute_detail_table: true,
                compute_confidence_data: false,
                compute_confusability: false,
                show_tag_output_mismatch_details: false,
                equivalence_classes: BTreeMap::new(),
                labels_to_ignore: Vec::new(),
                tag_seed_list: Vec::new(),
                gold: GoldRestriction::default(),
                bootstrap: BootstrapConfig::default(),
            },
        }
    }
}

impl ScorerConfigBuilder {
    /// Create a new builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the similarity profile.
    #[must_use]
    pub fn with_similarity_profile(mut self, profile: SimilarityProfile) -> Self {
        self.config.similarity_profile = Some(profile);
        self
    }

    /// Set the score profile.
    #[must_use]
    pub fn with_score_profile(mut self, profile: ScoreProfile) -> Self {
        self.config.score_profile = Some(profile);
        self
    }

    /// Set the partition functions.
    #[must_use]
    pub fn with_partitions(mut self, partitions: PartitionRegistry) -> Self {
        self.config.partitions = partitions;
        self
    }

    /// Set the custom attribute comparators.
    #[must_use]
    pub fn with_methods(mut self, methods: MethodRegistry) -> Self {
        self.config.methods = methods;
        self
    }

    /// Set the CSV flavors.
    #[must_use]
    pub fn with_format(mut self, format: ScoreFormat) -> Self {
        self.config.format = format;
        self
    }

    /// Enable or disable the by-token table.
    #[must_use]
    pub fn with_token_table(mut self, enable: bool) -> Self {
        self.config.compute_token_table = enable;
        self
    }

    /// Enable or disable the by-pseudo-token table.
    #[must_use]
    pub fn with_pseudo_token_table(mut self, enable: bool) -> Self {
        self.config.compute_pseudo_token_table = enable;
        self
    }

    /// Enable or disable the by-character table.
    #[must_use]
    pub fn with_character_table(mut self, enable: bool) -> Self {
        self.config.compute_character_table = enable;
        self
    }

    /// Enable or disable the detail table.
    #[must_use]
    pub fn with_detail_table(mut self, enable: bool) -> Self {
        self.config.compute_detail_table = enable;
        self
    }

    /// Enable bootstrap confidence data.
    #[must_use]
    pub fn with_confidence_data(mut self, enable: bool) -> Self {
        self.config.compute_confidence_data = enable;
        self
    }

    /// Enable the confusability matrix.
    #[must_use]
    pub fn with_confusability(mut self, enable: bool) -> Self {
        self.config.compute_confusability = enable;
        self
    }

    /// Count clash tokens in `(detail)` columns.
    #[must_use]
    pub fn with_mismatch_details(mut self, enable: bool) -> Self {
        self.config.show_tag_output_mismatch_details = enable;
        self
    }

    /// Set label equivalence classes.
    #[must_use]
    pub fn with_equivalence_classes(mut self, classes: BTreeMap<String, String>) -> Self {
        self.config.equivalence_classes = classes;
        self
    }

    /// Set the labels to ignore.
    #[must_use]
    pub fn with_labels_to_ignore<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.labels_to_ignore = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Set the tag seed list.
    #[must_use]
    pub fn with_tag_seed_list<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.tag_seed_list = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict the reference and/or hypothesis to gold segments.
    #[must_use]
    pub fn with_gold_restriction(mut self, gold: GoldRestriction) -> Self {
        self.config.gold = gold;
        self
    }

    /// Set the number of bootstrap samples.
    #[must_use]
    pub fn with_bootstrap_samples(mut self, samples: usize) -> Self {
        self.config.bootstrap = self.config.bootstrap.with_samples(samples);
        self
    }

    /// Set the bootstrap seed.
    #[must_use]
    pub fn with_bootstrap_seed(mut self, seed: u64) -> Self {
        self.config.bootstrap = self.config.bootstrap.with_seed(seed);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ScorerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::format::Flavor;

    #[test]
    fn test_defaults() {
        let c = ScorerConfig::default();
        assert!(c.compute_detail_table);
        assert!(!c.compute_confidence_data);
        assert_eq!(c.bootstrap.samples, 1000);
        assert_eq!(c.format.flavors(), &[Flavor::Excel]);
    }

    #[test]
    fn test_builder_overrides() {
        let c = ScorerConfig::builder()
            .with_token_table(false)
            .with_labels_to_ignore(["ORG"])
            .with_tag_seed_list(vec!["PERSON".to_string()])
            .with_bootstrap_seed(9)
            .with_format(ScoreFormat::parse("excel,literal").unwrap())
            .build();
        assert!(!c.compute_token_table);
        assert_eq!(c.labels_to_ignore, vec!["ORG"]);
        assert_eq!(c.tag_seed_list, vec!["PERSON"]);
        assert_eq!(c.bootstrap.seed, 9);
        assert_eq!(c.format.flavors().len(), 2);
    }
}
