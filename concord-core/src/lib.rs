//! # concord-core
//!
//! Data model shared by the concord scorer.
//!
//! This crate provides:
//! - **Spans**: half-open character intervals ([`Span`])
//! - **Annotations**: arena-addressed annotations and typed attribute values
//! - **Type catalog**: labels, attribute declarations, effective labels
//! - **Documents**: a signal, its annotations, zones and gold segments
//!
//! It contains no scoring logic.

#![warn(missing_docs)]

pub mod annotation;
pub mod catalog;
pub mod document;
pub mod error;
pub mod span;

pub use annotation::{Annotation, AnnotationId, Value};
pub use catalog::{Aggregation, AnnotationType, AttrKind, AttributeDecl, Category, TypeCatalog};
pub use document::{Document, Segment, SegmentStatus};
pub use error::{Error, Result};
pub use span::Span;
