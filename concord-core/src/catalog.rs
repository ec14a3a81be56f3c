//! Annotation-type catalog.
//!
//! The catalog is the task-level description of every label a document may
//! carry: whether it is spanned, what attributes it declares, and which
//! category it belongs to. Scoring consults it for content labels, the
//! token label, annotation-valued attribute restrictions, and effective
//! labels.
//!
//! # Effective labels
//!
//! A task may expose a label whose identity is really a true label plus an
//! attribute value, e.g. `PERSON` for an `ENAMEX` with `type=PERSON`.
//! [`TypeCatalog::declare_effective_label`] records such a mapping and
//! [`TypeCatalog::effective_label`] applies it.
//!
//! # Example
//!
//! ```
//! use concord_core::{AnnotationType, AttrKind, AttributeDecl, TypeCatalog};
//!
//! let mut catalog = TypeCatalog::new();
//! catalog.insert(
//!     AnnotationType::spanned("ENAMEX")
//!         .with_attribute(AttributeDecl::single("type", AttrKind::String)),
//! );
//! catalog.declare_effective_label("PERSON", "ENAMEX", "type", "PERSON").unwrap();
//! assert_eq!(catalog.true_label_for("PERSON"), Some("ENAMEX"));
//! ```

use crate::annotation::{Annotation, Value};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Attribute declarations
// ============================================================================

/// Scalar kind of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrKind {
    /// Free string.
    String,
    /// Integer.
    Int,
    /// Floating point number.
    Float,
    /// Boolean.
    Boolean,
    /// Reference to another annotation.
    Annotation,
}

/// How many values an attribute holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// A single value.
    #[default]
    #[serde(rename = "none")]
    Single,
    /// An ordered list of values.
    List,
    /// An unordered set of values.
    Set,
}

/// Declaration of one attribute on an annotation type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDecl {
    /// Attribute name.
    pub name: String,
    /// Scalar kind.
    pub kind: AttrKind,
    /// Single, list or set.
    #[serde(default)]
    pub aggregation: Aggregation,
    /// Labels an annotation-valued attribute may point at. Empty means
    /// unrestricted.
    #[serde(default)]
    pub label_restrictions: Vec<String>,
}

impl AttributeDecl {
    /// Single-valued attribute.
    #[must_use]
    pub fn single(name: impl Into<String>, kind: AttrKind) -> Self {
        Self {
            name: name.into(),
            kind,
            aggregation: Aggregation::Single,
            label_restrictions: Vec::new(),
        }
    }

    /// Set-valued attribute.
    #[must_use]
    pub fn set(name: impl Into<String>, kind: AttrKind) -> Self {
        Self {
            aggregation: Aggregation::Set,
            ..Self::single(name, kind)
        }
    }

    /// List-valued attribute.
    #[must_use]
    pub fn list(name: impl Into<String>, kind: AttrKind) -> Self {
        Self {
            aggregation: Aggregation::List,
            ..Self::single(name, kind)
        }
    }

    /// Restrict the labels an annotation-valued attribute may reference.
    #[must_use]
    pub fn restricted_to<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.label_restrictions = labels.into_iter().map(Into::into).collect();
        self
    }

    /// True for annotation-valued attributes.
    #[must_use]
    pub fn is_annotation_valued(&self) -> bool {
        self.kind == AttrKind::Annotation
    }

    fn check_scalar(&self, value: &Value) -> bool {
        matches!(
            (self.kind, value),
            (AttrKind::String, Value::Str(_))
                | (AttrKind::Int, Value::Int(_))
                | (AttrKind::Float, Value::Float(_) | Value::Int(_))
                | (AttrKind::Boolean, Value::Bool(_))
                | (AttrKind::Annotation, Value::Annotation(_))
        )
    }

    /// Check that a value agrees with this declaration.
    pub fn check_value(&self, value: &Value) -> Result<()> {
        let ok = match (self.aggregation, value) {
            (Aggregation::Single, Value::Many(_)) => false,
            (Aggregation::Single, v) => self.check_scalar(v),
            (_, Value::Many(vals)) => vals.iter().all(|v| self.check_scalar(v)),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::attribute_kind(format!(
                "value {} does not fit attribute '{}' ({:?}, {:?})",
                value, self.name, self.kind, self.aggregation
            )))
        }
    }
}

// ============================================================================
// Annotation types
// ============================================================================

/// Role of a label within a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Scored content annotation.
    #[default]
    Content,
    /// Lexical token.
    Token,
    /// Zone marking processable regions.
    Zone,
    /// Segment carrying a gold status.
    Segment,
    /// Bookkeeping annotation that is never scored.
    Admin,
}

/// Declaration of one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationType {
    /// True label.
    pub label: String,
    /// Whether annotations of this label carry their own span.
    pub has_span: bool,
    /// Role within the task.
    #[serde(default)]
    pub category: Category,
    /// Declared attributes, in declaration order.
    #[serde(default)]
    pub attributes: Vec<AttributeDecl>,
}

impl AnnotationType {
    /// Spanned content type with no attributes.
    #[must_use]
    pub fn spanned(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            has_span: true,
            category: Category::Content,
            attributes: Vec::new(),
        }
    }

    /// Spanless content type with no attributes.
    #[must_use]
    pub fn spanless(label: impl Into<String>) -> Self {
        Self {
            has_span: false,
            ..Self::spanned(label)
        }
    }

    /// Add an attribute declaration.
    #[must_use]
    pub fn with_attribute(mut self, decl: AttributeDecl) -> Self {
        self.attributes.push(decl);
        self
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Attribute declaration by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDecl> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Annotation-valued attribute declarations.
    pub fn annotation_attributes(&self) -> impl Iterator<Item = &AttributeDecl> {
        self.attributes.iter().filter(|a| a.is_annotation_valued())
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct EffectiveLabel {
    true_label: String,
    attr: String,
    value: String,
}

/// Repository of annotation types for one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeCatalog {
    types: BTreeMap<String, AnnotationType>,
    #[serde(default)]
    effective: BTreeMap<String, EffectiveLabel>,
}

impl TypeCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a type.
    pub fn insert(&mut self, ty: AnnotationType) {
        self.types.insert(ty.label.clone(), ty);
    }

    /// Builder-style [`TypeCatalog::insert`].
    #[must_use]
    pub fn with_type(mut self, ty: AnnotationType) -> Self {
        self.insert(ty);
        self
    }

    /// Declare `effective` as the label of `true_label` annotations whose
    /// string attribute `attr` equals `value`.
    pub fn declare_effective_label(
        &mut self,
        effective: impl Into<String>,
        true_label: &str,
        attr: &str,
        value: impl Into<String>,
    ) -> Result<()> {
        let ty = self.require(true_label)?;
        let decl = ty.attribute(attr).ok_or_else(|| {
            Error::unknown_attribute(format!("{} has no attribute '{}'", true_label, attr))
        })?;
        if decl.kind != AttrKind::String || decl.aggregation != Aggregation::Single {
            return Err(Error::attribute_kind(format!(
                "effective label attribute '{}' of {} must be a single string",
                attr, true_label
            )));
        }
        self.effective.insert(
            effective.into(),
            EffectiveLabel {
                true_label: true_label.to_string(),
                attr: attr.to_string(),
                value: value.into(),
            },
        );
        Ok(())
    }

    /// Type by label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&AnnotationType> {
        self.types.get(label)
    }

    /// Type by label, failing with [`Error::UnknownLabel`].
    pub fn require(&self, label: &str) -> Result<&AnnotationType> {
        self.types
            .get(label)
            .ok_or_else(|| Error::unknown_label(label))
    }

    /// All declared types, ordered by label.
    pub fn types(&self) -> impl Iterator<Item = &AnnotationType> {
        self.types.values()
    }

    /// Sorted content labels.
    #[must_use]
    pub fn content_labels(&self) -> Vec<&str> {
        self.types
            .values()
            .filter(|t| t.category == Category::Content)
            .map(|t| t.label.as_str())
            .collect()
    }

    /// The token label, if the task declares one.
    #[must_use]
    pub fn token_label(&self) -> Option<&str> {
        self.types
            .values()
            .find(|t| t.category == Category::Token)
            .map(|t| t.label.as_str())
    }

    /// Effective label of an annotation: a declared effective label whose
    /// attribute condition holds, else the true label.
    #[must_use]
    pub fn effective_label<'a>(&'a self, ann: &'a Annotation) -> &'a str {
        self.effective
            .iter()
            .find(|(_, e)| {
                e.true_label == ann.label
                    && matches!(ann.get(&e.attr), Some(Value::Str(s)) if *s == e.value)
            })
            .map(|(name, _)| name.as_str())
            .unwrap_or(ann.label.as_str())
    }

    /// True label behind a true or effective label.
    #[must_use]
    pub fn true_label_for<'a>(&'a self, label: &'a str) -> Option<&'a str> {
        if let Some(e) = self.effective.get(label) {
            return Some(e.true_label.as_str());
        }
        self.types.get(label).map(|t| t.label.as_str())
    }

    /// True when `attr` on `true_label` is consumed by an effective label
    /// declaration.
    #[must_use]
    pub fn is_effective_label_attribute(&self, true_label: &str, attr: &str) -> bool {
        self.effective
            .values()
            .any(|e| e.true_label == true_label && e.attr == attr)
    }

    /// Check an annotation against its declaration.
    pub fn check_annotation(&self, ann: &Annotation) -> Result<()> {
        let ty = self.require(&ann.label)?;
        if ty.has_span != ann.has_span() {
            return Err(Error::invalid_span(format!(
                "{} is declared {} but annotation {} is {}",
                ty.label,
                if ty.has_span { "spanned" } else { "spanless" },
                ann.id,
                if ann.has_span() { "spanned" } else { "spanless" },
            )));
        }
        for (name, value) in &ann.attrs {
            let decl = ty.attribute(name).ok_or_else(|| {
                Error::unknown_attribute(format!("{} has no attribute '{}'", ty.label, name))
            })?;
            decl.check_value(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationId;
    use crate::span::Span;

    fn catalog() -> TypeCatalog {
        let mut c = TypeCatalog::new()
            .with_type(
                AnnotationType::spanned("ENAMEX")
                    .with_attribute(AttributeDecl::single("type", AttrKind::String)),
            )
            .with_type(AnnotationType::spanned("lex").with_category(Category::Token))
            .with_type(
                AnnotationType::spanless("EVENT").with_attribute(
                    AttributeDecl::set("args", AttrKind::Annotation).restricted_to(["ENAMEX"]),
                ),
            );
        c.declare_effective_label("PERSON", "ENAMEX", "type", "PERSON")
            .unwrap();
        c
    }

    fn enamex(ty: &str) -> Annotation {
        let mut attrs = BTreeMap::new();
        attrs.insert("type".to_string(), Value::from(ty));
        Annotation {
            id: AnnotationId(0),
            external_id: None,
            label: "ENAMEX".into(),
            span: Some(Span::new(0, 4)),
            attrs,
        }
    }

    #[test]
    fn test_content_and_token_labels() {
        let c = catalog();
        assert_eq!(c.content_labels(), vec!["ENAMEX", "EVENT"]);
        assert_eq!(c.token_label(), Some("lex"));
    }

    #[test]
    fn test_effective_label_applies_on_match_only() {
        let c = catalog();
        assert_eq!(c.effective_label(&enamex("PERSON")), "PERSON");
        assert_eq!(c.effective_label(&enamex("ORG")), "ENAMEX");
        assert!(c.is_effective_label_attribute("ENAMEX", "type"));
        assert_eq!(c.true_label_for("ENAMEX"), Some("ENAMEX"));
        assert_eq!(c.true_label_for("NOPE"), None);
    }

    #[test]
    fn test_effective_label_requires_string_attribute() {
        let mut c = catalog();
        assert!(matches!(
            c.declare_effective_label("X", "EVENT", "args", "y"),
            Err(Error::AttributeKind(_))
        ));
        assert!(matches!(
            c.declare_effective_label("X", "ENAMEX", "nope", "y"),
            Err(Error::UnknownAttribute(_))
        ));
    }

    #[test]
    fn test_check_annotation() {
        let c = catalog();
        assert!(c.check_annotation(&enamex("PERSON")).is_ok());

        let mut bad = enamex("PERSON");
        bad.attrs.insert("type".into(), Value::Int(3));
        assert!(matches!(
            c.check_annotation(&bad),
            Err(Error::AttributeKind(_))
        ));

        let mut spanless = enamex("PERSON");
        spanless.span = None;
        assert!(matches!(
            c.check_annotation(&spanless),
            Err(Error::InvalidSpan(_))
        ));
    }

    #[test]
    fn test_aggregation_serde_name() {
        let json = serde_json::to_string(&Aggregation::Single).unwrap();
        assert_eq!(json, "\"none\"");
    }
}
