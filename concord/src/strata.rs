//! Label stratification.
//!
//! Pairing runs stratum by stratum, spanned labels before spanless ones,
//! so that an annotation-valued attribute is only compared after the
//! annotations it points at have been paired. A stratification is legal
//! when every label an attribute may reference has been placed strictly
//! earlier in that order.

use crate::error::{Error, Result};
use concord_core::{Category, TypeCatalog};
use std::collections::{BTreeMap, BTreeSet};

/// One pairing stratum: spanned labels, then spanless labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stratum {
    /// Spanned true labels.
    pub spanned: Vec<String>,
    /// Spanless true labels.
    pub spanless: Vec<String>,
}

impl Stratum {
    /// All labels, spanned first.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.spanned
            .iter()
            .chain(self.spanless.iter())
            .map(String::as_str)
    }

    fn push(&mut self, catalog: &TypeCatalog, label: &str) -> Result<()> {
        let ty = catalog
            .get(label)
            .ok_or_else(|| Error::pairing(format!("unknown label '{}' in similarity stratum", label)))?;
        if ty.category != Category::Content {
            return Err(Error::pairing(format!(
                "label '{}' in similarity stratum is not a content tag",
                label
            )));
        }
        if ty.has_span {
            self.spanned.push(label.to_string());
        } else {
            self.spanless.push(label.to_string());
        }
        Ok(())
    }
}

/// Build strata from profile-declared groups, or a single stratum of
/// `found_labels` (the content labels present in the documents).
pub fn stratify(
    catalog: &TypeCatalog,
    profile_strata: Option<&[Vec<String>]>,
    found_labels: &[&str],
) -> Result<Vec<Stratum>> {
    let strata = match profile_strata {
        Some(groups) => compile_strata(catalog, groups)?,
        None => {
            let mut only = Stratum::default();
            for label in found_labels {
                if catalog
                    .get(label)
                    .is_some_and(|t| t.category == Category::Content)
                {
                    only.push(catalog, label)?;
                }
            }
            vec![only]
        }
    };
    check_stratification(catalog, &strata)?;
    Ok(strata)
}

/// Compile profile-declared label groups into strata, rejecting duplicate,
/// unknown and non-content labels.
pub fn compile_strata(catalog: &TypeCatalog, groups: &[Vec<String>]) -> Result<Vec<Stratum>> {
    let mut seen = BTreeSet::new();
    let mut strata = Vec::with_capacity(groups.len());
    for group in groups {
        let mut stratum = Stratum::default();
        for label in group {
            if !seen.insert(label.as_str()) {
                return Err(Error::pairing(format!(
                    "label '{}' appears more than once in similarity strata",
                    label
                )));
            }
            stratum.push(catalog, label)?;
        }
        strata.push(stratum);
    }
    Ok(strata)
}

/// Map each label to the index of its stratum.
#[must_use]
pub fn stratum_index(strata: &[Stratum]) -> BTreeMap<String, usize> {
    strata
        .iter()
        .enumerate()
        .flat_map(|(i, s)| s.labels().map(move |l| (l.to_string(), i)))
        .collect()
}

/// Verify that every referenced label is paired before its referrer.
pub fn check_stratification(catalog: &TypeCatalog, strata: &[Stratum]) -> Result<()> {
    let mut already_found: BTreeSet<&str> = BTreeSet::new();
    for stratum in strata {
        for set in [&stratum.spanned, &stratum.spanless] {
            let current: BTreeSet<&str> = set.iter().map(String::as_str).collect();
            for label in set {
                let Some(ty) = catalog.get(label) else {
                    continue;
                };
                for attr in ty.annotation_attributes() {
                    for target in &attr.label_restrictions {
                        if already_found.contains(target.as_str()) {
                            continue;
                        }
                        return Err(if current.contains(target.as_str()) {
                            Error::pairing(format!(
                                "label {} is stratified with an annotation type which refers to it",
                                target
                            ))
                        } else {
                            Error::pairing(format!(
                                "label {} is referenced in a stratum before it's paired",
                                target
                            ))
                        });
                    }
                }
            }
            already_found.extend(current);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_core::{AnnotationType, AttrKind, AttributeDecl};

    fn catalog() -> TypeCatalog {
        TypeCatalog::new()
            .with_type(AnnotationType::spanned("PERSON"))
            .with_type(AnnotationType::spanned("lex").with_category(Category::Token))
            .with_type(
                AnnotationType::spanless("EVENT").with_attribute(
                    AttributeDecl::set("args", AttrKind::Annotation).restricted_to(["PERSON"]),
                ),
            )
            .with_type(
                AnnotationType::spanned("VOTE").with_attribute(
                    AttributeDecl::single("prev", AttrKind::Annotation).restricted_to(["VOTE"]),
                ),
            )
    }

    fn groups(v: &[&[&str]]) -> Vec<Vec<String>> {
        v.iter()
            .map(|g| g.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_implicit_stratum_spanned_before_spanless() {
        let strata = stratify(&catalog(), None, &["EVENT", "PERSON", "lex"]).unwrap();
        assert_eq!(strata.len(), 1);
        assert_eq!(strata[0].spanned, vec!["PERSON"]);
        assert_eq!(strata[0].spanless, vec!["EVENT"]);
    }

    #[test]
    fn test_self_reference_rejected() {
        let err = stratify(&catalog(), None, &["VOTE"]).unwrap_err();
        assert!(err
            .to_string()
            .contains("label VOTE is stratified with an annotation type which refers to it"));
    }

    #[test]
    fn test_reference_to_later_stratum_rejected() {
        let g = groups(&[&["EVENT"], &["PERSON"]]);
        let err = stratify(&catalog(), Some(&g), &[]).unwrap_err();
        assert!(err.to_string().contains("before it's paired"));

        let ok = groups(&[&["PERSON"], &["EVENT"]]);
        assert!(stratify(&catalog(), Some(&ok), &[]).is_ok());
    }

    #[test]
    fn test_compile_errors() {
        let c = catalog();
        assert!(compile_strata(&c, &groups(&[&["PERSON"], &["PERSON"]])).is_err());
        assert!(compile_strata(&c, &groups(&[&["NOPE"]])).is_err());
        assert!(compile_strata(&c, &groups(&[&["lex"]])).is_err());
    }

    #[test]
    fn test_stratum_index() {
        let strata = compile_strata(&catalog(), &groups(&[&["PERSON"], &["EVENT"]])).unwrap();
        let idx = stratum_index(&strata);
        assert_eq!(idx["PERSON"], 0);
        assert_eq!(idx["EVENT"], 1);
    }
}
