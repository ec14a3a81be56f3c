//! # concord
//!
//! Pairing and scoring of reference and hypothesis annotations.
//!
//! - **Pairing**: strata of labels, overlap groups, weighted similarity and
//!   optimal assignment ([`Pairer`])
//! - **Scoring**: per-tag, per-token, per-pseudo-token and per-character
//!   tables whose derived cells render as spreadsheet formulas ([`Scorer`])
//! - **Confidence**: bootstrap resampling of documents ([`BootstrapConfig`])
//! - **Profiles**: similarity profiles pick dimensions and weights; score
//!   profiles add aggregations and tag decompositions
//!
//! The data model (spans, documents, the type catalog) lives in
//! `concord-core`.
//!
//! | Module | Role |
//! |--------|------|
//! | [`pairer`] | document pairing entry point |
//! | [`similarity`] | dimensions, profiles, the similarity engine |
//! | [`scorer`] | corpus accumulation and output |
//! | [`table`] | score tables and formula rendering |
//! | [`bootstrap`] | resampled confidence data |

#![warn(missing_docs)]

pub mod aggregate;
pub mod bootstrap;
pub mod config;
pub mod confusability;
pub mod detail;
pub mod error;
pub mod grouper;
pub mod implied_span;
pub mod matcher;
pub mod munkres;
pub mod pairer;
pub mod record;
pub mod region;
pub mod rows;
pub mod score_profile;
pub mod scorer;
pub mod similarity;
pub mod strata;
pub mod summary;
pub mod table;
pub mod token_pairs;

pub use bootstrap::{BootstrapConfig, CancelToken};
pub use config::{ScorerConfig, ScorerConfigBuilder};
pub use confusability::{Confusability, Units};
pub use error::{Error, Result};
pub use pairer::{DocumentPairing, GoldRestriction, Pairer};
pub use record::{PairRecord, PairSide, Side, Status, TokenPairRecord};
pub use score_profile::{PartitionRegistry, ScoreProfile};
pub use scorer::Scorer;
pub use similarity::{MethodRegistry, SimilarityEngine, SimilarityProfile};
pub use summary::{SummaryKind, SummaryTable};
pub use table::format::{Flavor, ScoreFormat};
pub use table::ScoreTable;

pub use concord_core::{Annotation, AnnotationId, Document, Span, TypeCatalog};
