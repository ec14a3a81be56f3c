//! Documents: a signal plus an arena of annotations.
//!
//! Offsets are character offsets into the signal, not byte offsets.

use crate::annotation::{Annotation, AnnotationId, Value};
use crate::catalog::TypeCatalog;
use crate::error::{Error, Result};
use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Index;

/// Gold status of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    /// Annotated by a human and accepted.
    HumanGold,
    /// Settled by reconciliation.
    Reconciled,
    /// Anything else.
    NonGold,
}

impl SegmentStatus {
    /// True for statuses that count as gold.
    #[must_use]
    pub fn is_gold(self) -> bool {
        matches!(self, SegmentStatus::HumanGold | SegmentStatus::Reconciled)
    }
}

/// A segment of the signal with a gold status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Extent.
    pub span: Span,
    /// Gold status.
    pub status: SegmentStatus,
}

/// A text signal and the annotations over it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    signal: String,
    annotations: Vec<Annotation>,
    zones: Vec<Span>,
    segments: Vec<Segment>,
}

impl Document {
    /// Empty document over `signal`.
    #[must_use]
    pub fn new(signal: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            ..Self::default()
        }
    }

    /// The text.
    #[must_use]
    pub fn signal(&self) -> &str {
        &self.signal
    }

    /// Signal length in characters.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.signal.chars().count()
    }

    /// Text covered by `span`.
    #[must_use]
    pub fn slice(&self, span: Span) -> String {
        self.signal
            .chars()
            .skip(span.start)
            .take(span.len())
            .collect()
    }

    /// All annotations in arena order.
    #[must_use]
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Annotation by id.
    #[must_use]
    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(id.index())
    }

    /// Annotations with the given true label, in arena order.
    pub fn with_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Annotation> + 'a {
        self.annotations.iter().filter(move |a| a.label == label)
    }

    /// Distinct true labels present, sorted.
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.annotations.iter().map(|a| a.label.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    fn check_span(&self, span: Span) -> Result<()> {
        let len = self.char_len();
        if span.start > span.end || span.end > len {
            return Err(Error::invalid_span(format!(
                "{} is outside a signal of length {}",
                span, len
            )));
        }
        Ok(())
    }

    fn push(&mut self, label: &str, span: Option<Span>) -> AnnotationId {
        let id = AnnotationId(self.annotations.len() as u32);
        self.annotations.push(Annotation {
            id,
            external_id: None,
            label: label.to_string(),
            span,
            attrs: BTreeMap::new(),
        });
        id
    }

    /// Add a spanned annotation.
    pub fn add_spanned(&mut self, label: &str, start: usize, end: usize) -> Result<AnnotationId> {
        let span = Span::try_new(start, end)?;
        self.check_span(span)?;
        Ok(self.push(label, Some(span)))
    }

    /// Add a spanless annotation.
    pub fn add_spanless(&mut self, label: &str) -> AnnotationId {
        self.push(label, None)
    }

    /// Set the external identifier of an annotation.
    pub fn set_external_id(&mut self, id: AnnotationId, external: impl Into<String>) -> Result<()> {
        let ann = self
            .annotations
            .get_mut(id.index())
            .ok_or_else(|| Error::dangling_reference(id.to_string()))?;
        ann.external_id = Some(external.into());
        Ok(())
    }

    /// Set an attribute value. Annotation references must point into this
    /// document.
    pub fn set_attr(
        &mut self,
        id: AnnotationId,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value = value.into();
        let count = self.annotations.len();
        if let Some(bad) = value.annotation_refs().find(|r| r.index() >= count) {
            return Err(Error::dangling_reference(format!(
                "{} refers to missing annotation {}",
                id, bad
            )));
        }
        let ann = self
            .annotations
            .get_mut(id.index())
            .ok_or_else(|| Error::dangling_reference(id.to_string()))?;
        ann.attrs.insert(name.into(), value);
        Ok(())
    }

    /// Add a zone region.
    pub fn add_zone(&mut self, start: usize, end: usize) -> Result<()> {
        let span = Span::try_new(start, end)?;
        self.check_span(span)?;
        self.zones.push(span);
        self.zones.sort();
        Ok(())
    }

    /// Add a segment.
    pub fn add_segment(&mut self, start: usize, end: usize, status: SegmentStatus) -> Result<()> {
        let span = Span::try_new(start, end)?;
        self.check_span(span)?;
        self.segments.push(Segment { span, status });
        self.segments.sort_by_key(|s| s.span);
        Ok(())
    }

    /// Segments in order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Regions eligible for scoring: the zones, or the whole signal.
    #[must_use]
    pub fn processable_regions(&self) -> Vec<Span> {
        if self.zones.is_empty() {
            vec![Span::new(0, self.char_len())]
        } else {
            self.zones.clone()
        }
    }

    /// Spans of gold segments, or `None` when the document has no segments
    /// at all.
    #[must_use]
    pub fn gold_regions(&self) -> Option<Vec<Span>> {
        if self.segments.is_empty() {
            return None;
        }
        Some(
            self.segments
                .iter()
                .filter(|s| s.status.is_gold())
                .map(|s| s.span)
                .collect(),
        )
    }

    /// Check every annotation against the catalog.
    pub fn validate(&self, catalog: &TypeCatalog) -> Result<()> {
        self.annotations
            .iter()
            .try_for_each(|a| catalog.check_annotation(a))
    }
}

impl Index<AnnotationId> for Document {
    type Output = Annotation;

    fn index(&self, id: AnnotationId) -> &Annotation {
        &self.annotations[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AnnotationType, AttrKind, AttributeDecl};

    #[test]
    fn test_add_and_slice() {
        let mut doc = Document::new("John met Mary.");
        let john = doc.add_spanned("PERSON", 0, 4).unwrap();
        let mary = doc.add_spanned("PERSON", 9, 13).unwrap();
        assert_eq!(doc.slice(doc[john].span.unwrap()), "John");
        assert_eq!(doc.slice(doc[mary].span.unwrap()), "Mary");
        assert_eq!(doc.labels(), vec!["PERSON"]);
    }

    #[test]
    fn test_offsets_are_characters() {
        let mut doc = Document::new("né là");
        assert_eq!(doc.char_len(), 5);
        let id = doc.add_spanned("W", 3, 5).unwrap();
        assert_eq!(doc.slice(doc[id].span.unwrap()), "là");
        assert!(doc.add_spanned("W", 3, 6).is_err());
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let mut doc = Document::new("abc");
        let ev = doc.add_spanless("EVENT");
        let err = doc.set_attr(ev, "arg", AnnotationId(7)).unwrap_err();
        assert!(matches!(err, Error::DanglingReference(_)));
    }

    #[test]
    fn test_regions() {
        let mut doc = Document::new("0123456789");
        assert_eq!(doc.processable_regions(), vec![Span::new(0, 10)]);
        assert_eq!(doc.gold_regions(), None);
        doc.add_zone(5, 9).unwrap();
        doc.add_zone(0, 3).unwrap();
        assert_eq!(
            doc.processable_regions(),
            vec![Span::new(0, 3), Span::new(5, 9)]
        );
        doc.add_segment(0, 5, SegmentStatus::HumanGold).unwrap();
        doc.add_segment(5, 10, SegmentStatus::NonGold).unwrap();
        assert_eq!(doc.gold_regions(), Some(vec![Span::new(0, 5)]));
    }

    #[test]
    fn test_validate_against_catalog() {
        let catalog = TypeCatalog::new().with_type(
            AnnotationType::spanned("PERSON")
                .with_attribute(AttributeDecl::single("age", AttrKind::Int)),
        );
        let mut doc = Document::new("John");
        let id = doc.add_spanned("PERSON", 0, 4).unwrap();
        doc.set_attr(id, "age", 40i64).unwrap();
        assert!(doc.validate(&catalog).is_ok());
        doc.set_attr(id, "age", "forty").unwrap();
        assert!(doc.validate(&catalog).is_err());
    }
}
