//! Implied spans for spanless annotations.
//!
//! A spanned annotation's implied span is its own span. A spanless one
//! covers the implied spans of every annotation it references, or has none
//! if it references nothing with an extent.

use crate::record::{AnnKey, DocPair};
use concord_core::Span;
use std::collections::{HashMap, HashSet};

/// Memo of implied spans for one comparison.
#[derive(Debug, Default)]
pub struct ImpliedSpans {
    cache: HashMap<AnnKey, Option<Span>>,
    in_progress: HashSet<AnnKey>,
}

impl ImpliedSpans {
    /// Empty memo.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything; called between document pairs.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.in_progress.clear();
    }

    /// Implied span of the annotation behind `key`.
    pub fn resolve(&mut self, docs: DocPair<'_>, key: AnnKey) -> Option<Span> {
        if let Some(cached) = self.cache.get(&key) {
            return *cached;
        }
        let ann = docs.get(key)?;
        if let Some(span) = ann.span {
            self.cache.insert(key, Some(span));
            return Some(span);
        }
        if !self.in_progress.insert(key) {
            log::warn!(
                "annotation {} refers to itself through its attributes; ignoring the cycle",
                ann.describe()
            );
            return None;
        }
        let refs: Vec<_> = ann
            .attrs
            .values()
            .flat_map(|v| v.annotation_refs())
            .collect();
        let mut implied: Option<Span> = None;
        for id in refs {
            let target = AnnKey { side: key.side, id };
            if let Some(span) = self.resolve(docs, target) {
                implied = Some(match implied {
                    Some(acc) => acc.cover(&span),
                    None => span,
                });
            }
        }
        self.in_progress.remove(&key);
        self.cache.insert(key, implied);
        implied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::{Document, Value};

    #[test]
    fn test_spanless_covers_referenced() {
        let mut doc = Document::new("John met Mary.");
        let john = doc.add_spanned("PERSON", 0, 4).unwrap();
        let mary = doc.add_spanned("PERSON", 9, 13).unwrap();
        let ev = doc.add_spanless("MEET");
        doc.set_attr(ev, "who", Value::Many(vec![john.into(), mary.into()]))
            .unwrap();
        let outer = doc.add_spanless("OUTER");
        doc.set_attr(outer, "ev", ev).unwrap();
        let empty = doc.add_spanless("EMPTY");

        let other = Document::new("John met Mary.");
        let docs = DocPair::new(&doc, &other);
        let mut spans = ImpliedSpans::new();
        assert_eq!(
            spans.resolve(docs, AnnKey::reference(outer)),
            Some(Span::new(0, 13))
        );
        assert_eq!(spans.resolve(docs, AnnKey::reference(empty)), None);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut doc = Document::new("abc");
        let a = doc.add_spanless("X");
        let b = doc.add_spanless("X");
        let t = doc.add_spanned("T", 1, 2).unwrap();
        doc.set_attr(a, "next", b).unwrap();
        doc.set_attr(b, "next", a).unwrap();
        doc.set_attr(b, "tok", t).unwrap();
        let docs = DocPair::new(&doc, &doc);
        let mut spans = ImpliedSpans::new();
        assert_eq!(
            spans.resolve(docs, AnnKey::reference(a)),
            Some(Span::new(1, 2))
        );
    }
}
