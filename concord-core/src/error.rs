//! Error types for concord-core.

use thiserror::Error;

/// Result type for concord-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for concord-core operations.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A label is not declared in the type catalog.
    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    /// An attribute is not declared on the annotation's type.
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// A span is malformed or falls outside the document signal.
    #[error("Invalid span: {0}")]
    InvalidSpan(String),

    /// An attribute value does not agree with its declaration.
    #[error("Attribute kind mismatch: {0}")]
    AttributeKind(String),

    /// An annotation-valued attribute points at an annotation that doesn't exist.
    #[error("Dangling annotation reference: {0}")]
    DanglingReference(String),
}

impl Error {
    /// Create an unknown label error.
    #[must_use]
    pub fn unknown_label(label: impl Into<String>) -> Self {
        Self::UnknownLabel(label.into())
    }

    /// Create an unknown attribute error.
    #[must_use]
    pub fn unknown_attribute(msg: impl Into<String>) -> Self {
        Self::UnknownAttribute(msg.into())
    }

    /// Create an invalid span error.
    #[must_use]
    pub fn invalid_span(msg: impl Into<String>) -> Self {
        Self::InvalidSpan(msg.into())
    }

    /// Create an attribute kind error.
    #[must_use]
    pub fn attribute_kind(msg: impl Into<String>) -> Self {
        Self::AttributeKind(msg.into())
    }

    /// Create a dangling reference error.
    #[must_use]
    pub fn dangling_reference(msg: impl Into<String>) -> Self {
        Self::DanglingReference(msg.into())
    }
}
