//! Annotations and attribute values.
//!
//! An [`Annotation`] lives in a [`Document`](crate::Document) arena and is
//! addressed by its [`AnnotationId`]. Annotation-valued attributes hold
//! ids, never references, so the whole structure is plain data.

use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable index of an annotation within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationId(pub u32);

impl AnnotationId {
    /// Arena position.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

// ============================================================================
// Attribute values
// ============================================================================

/// An attribute value.
///
/// List and set aggregations are both stored as [`Value::Many`]; the
/// declaration in the catalog says which one it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// String value.
    Str(String),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// Reference to another annotation in the same document.
    Annotation(AnnotationId),
    /// Aggregate of values.
    Many(Vec<Value>),
}

impl Value {
    /// Referenced annotation, if this is a single annotation value.
    #[must_use]
    pub fn as_annotation(&self) -> Option<AnnotationId> {
        match self {
            Value::Annotation(id) => Some(*id),
            _ => None,
        }
    }

    /// Iterate over the scalar members: the value itself, or each element
    /// of an aggregate.
    pub fn members(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Value::Many(vals) => Box::new(vals.iter()),
            other => Box::new(std::iter::once(other)),
        }
    }

    /// All annotation ids mentioned by this value.
    pub fn annotation_refs(&self) -> impl Iterator<Item = AnnotationId> + '_ {
        self.members().filter_map(Value::as_annotation)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", if *b { "yes" } else { "no" }),
            Value::Annotation(id) => write!(f, "{}", id),
            Value::Many(vals) => {
                let parts: Vec<String> = vals.iter().map(ToString::to_string).collect();
                write!(f, "{{{}}}", parts.join(","))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<AnnotationId> for Value {
    fn from(id: AnnotationId) -> Self {
        Value::Annotation(id)
    }
}

// ============================================================================
// Annotation
// ============================================================================

/// A typed, optionally spanned marking of a document region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Arena index within the owning document.
    pub id: AnnotationId,
    /// Identifier assigned by whatever produced the document, if any.
    pub external_id: Option<String>,
    /// True type name.
    pub label: String,
    /// Character extent; `None` for spanless annotations.
    pub span: Option<Span>,
    /// Attribute values keyed by declared attribute name.
    pub attrs: BTreeMap<String, Value>,
}

impl Annotation {
    /// True when the annotation has its own span.
    #[must_use]
    pub fn has_span(&self) -> bool {
        self.span.is_some()
    }

    /// Attribute value by name.
    #[must_use]
    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.attrs.get(attr)
    }

    /// Short human-readable rendering, used in detail tables.
    ///
    /// Spanned annotations render as `LABEL[start-end]`, spanless ones as
    /// `LABEL(attr=value,...)`.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.span {
            Some(span) => format!("{}[{}]", self.label, span),
            None => {
                let parts: Vec<String> = self
                    .attrs
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                format!("{}({})", self.label, parts.join(","))
            }
        }
    }
}
