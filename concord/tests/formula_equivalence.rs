//! Spreadsheet formulas must evaluate to the literal values.
//!
//! Each summary table is rendered twice, as Excel formulas and as
//! literals. A small evaluator below resolves every `=...` cell against
//! the rendered sheet and the result is compared with the literal
//! rendering of the same cell.

use concord::{CancelToken, Flavor, ScoreProfile, Scorer, ScorerConfig, SummaryKind};
use concord_core::{AnnotationType, Category, Document, TypeCatalog};
use std::sync::Arc;

// =============================================================================
// Evaluator
// =============================================================================

struct Sheet {
    cells: Vec<Vec<String>>,
}

impl Sheet {
    fn value(&self, row: usize, col: usize) -> f64 {
        let text = &self.cells[row][col];
        match text.strip_prefix('=') {
            Some(formula) => Parser::new(formula, self).run(),
            None => text.parse().unwrap_or(0.0),
        }
    }
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    sheet: &'a Sheet,
}

impl<'a> Parser<'a> {
    fn new(text: &str, sheet: &'a Sheet) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            sheet,
        }
    }

    fn run(mut self) -> f64 {
        let v = self.comparison();
        self.skip_ws();
        assert_eq!(self.pos, self.chars.len(), "trailing input in formula");
        v
    }

    fn skip_ws(&mut self) {
        while self.chars.get(self.pos) == Some(&' ') {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn expect(&mut self, c: char) {
        assert_eq!(self.peek(), Some(c), "expected '{}' at {}", c, self.pos);
        self.pos += 1;
    }

    fn comparison(&mut self) -> f64 {
        let left = self.additive();
        if self.peek() == Some('=') {
            self.pos += 1;
            let right = self.additive();
            return if left == right { 1.0 } else { 0.0 };
        }
        left
    }

    fn additive(&mut self) -> f64 {
        let mut v = self.multiplicative();
        loop {
            match self.peek() {
                Some('+') => {
                    self.pos += 1;
                    v += self.multiplicative();
                }
                Some('-') => {
                    self.pos += 1;
                    v -= self.multiplicative();
                }
                _ => return v,
            }
        }
    }

    fn multiplicative(&mut self) -> f64 {
        let mut v = self.unary();
        loop {
            match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    v *= self.unary();
                }
                Some('/') => {
                    self.pos += 1;
                    v /= self.unary();
                }
                _ => return v,
            }
        }
    }

    fn unary(&mut self) -> f64 {
        if self.peek() == Some('-') {
            self.pos += 1;
            return -self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> f64 {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let v = self.comparison();
                self.expect(')');
                v
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) if c.is_ascii_uppercase() => {
                let name = self.letters();
                if self.peek() == Some('(') {
                    self.pos += 1;
                    self.call(&name)
                } else {
                    let (r, c) = self.reference(&name);
                    self.sheet.value(r, c)
                }
            }
            other => panic!("unexpected {:?} at {}", other, self.pos),
        }
    }

    fn number(&mut self) -> f64 {
        let start = self.pos;
        while let Some(&c) = self.chars.get(self.pos) {
            let exp_sign = (c == '-' || c == '+')
                && matches!(self.chars.get(self.pos.wrapping_sub(1)), Some('e'));
            if c.is_ascii_digit() || c == '.' || c == 'e' || exp_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse().expect("number")
    }

    fn letters(&mut self) -> String {
        let start = self.pos;
        while self.chars.get(self.pos).is_some_and(|c| c.is_ascii_uppercase()) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Row and column of a cell name whose letters were already read.
    fn reference(&mut self, letters: &str) -> (usize, usize) {
        let start = self.pos;
        while self.chars.get(self.pos).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        let row: usize = digits.parse().expect("row number");
        let col = letters
            .chars()
            .fold(0usize, |n, c| n * 26 + (c as usize - 'A' as usize + 1))
            - 1;
        (row - 2, col)
    }

    fn separator(&mut self) -> bool {
        if matches!(self.peek(), Some(',') | Some(';')) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn call(&mut self, name: &str) -> f64 {
        let v = match name {
            "SUM" => {
                let mut total = 0.0;
                loop {
                    total += self.sum_arg();
                    if !self.separator() {
                        break;
                    }
                }
                total
            }
            "IF" => {
                let cond = self.comparison();
                assert!(self.separator());
                let yes = self.comparison();
                assert!(self.separator());
                let no = self.comparison();
                if cond != 0.0 {
                    yes
                } else {
                    no
                }
            }
            other => panic!("unknown function {}", other),
        };
        self.expect(')');
        v
    }

    /// A range `A2:B3` or an ordinary expression.
    fn sum_arg(&mut self) -> f64 {
        let save = self.pos;
        if self.peek().is_some_and(|c| c.is_ascii_uppercase()) {
            let name = self.letters();
            if self.chars.get(self.pos).is_some_and(|c| c.is_ascii_digit()) {
                let (r0, c0) = self.reference(&name);
                if self.peek() == Some(':') {
                    self.pos += 1;
                    let name = self.letters();
                    let (r1, c1) = self.reference(&name);
                    let mut total = 0.0;
                    for r in r0..=r1 {
                        for c in c0..=c1 {
                            total += self.sheet.value(r, c);
                        }
                    }
                    return total;
                }
            }
        }
        self.pos = save;
        self.comparison()
    }
}

// =============================================================================
// Corpus
// =============================================================================

fn catalog() -> Arc<TypeCatalog> {
    Arc::new(
        TypeCatalog::new()
            .with_type(AnnotationType::spanned("PERSON"))
            .with_type(AnnotationType::spanned("ORG"))
            .with_type(AnnotationType::spanned("LOC"))
            .with_type(AnnotationType::spanned("lex").with_category(Category::Token)),
    )
}

/// A document with one token annotation per whitespace-separated word.
fn tokenized(text: &str) -> Document {
    let mut doc = Document::new(text);
    let mut start = None;
    for (i, c) in text.chars().chain(std::iter::once(' ')).enumerate() {
        match (c.is_whitespace(), start) {
            (false, None) => start = Some(i),
            (true, Some(s)) => {
                doc.add_spanned("lex", s, i).unwrap();
                start = None;
            }
            _ => {}
        }
    }
    doc
}

fn annotate(doc: &mut Document, anns: &[(&str, usize, usize)]) {
    for &(label, s, e) in anns {
        doc.add_spanned(label, s, e).unwrap();
    }
}

fn scored(config: ScorerConfig) -> Scorer {
    scored_with_empty(config, false)
}

/// The two-document corpus, plus a document with an empty signal when
/// `empty` is set.
fn scored_with_empty(config: ScorerConfig, empty: bool) -> Scorer {
    let mut scorer = Scorer::new(catalog(), config).unwrap();

    let text1 = "John Smith met Mary at IBM in Paris";
    let mut r1 = tokenized(text1);
    annotate(&mut r1, &[("PERSON", 0, 10), ("PERSON", 15, 19), ("ORG", 23, 26), ("LOC", 30, 35)]);
    let mut h1 = tokenized(text1);
    annotate(&mut h1, &[("PERSON", 0, 4), ("PERSON", 15, 19), ("LOC", 23, 26)]);

    let text2 = "Alice and Bob visited Rome and Acme Corp";
    let mut r2 = tokenized(text2);
    annotate(&mut r2, &[("PERSON", 0, 5), ("PERSON", 10, 13), ("LOC", 22, 26)]);
    let mut h2 = tokenized(text2);
    annotate(&mut h2, &[("PERSON", 0, 5), ("LOC", 22, 26), ("ORG", 31, 40)]);

    scorer
        .add_document_pairs(&[("a/doc1.json", &r1, &h1), ("b/doc2.json", &r2, &h2)])
        .unwrap();
    if empty {
        let (r3, h3) = (Document::new(""), Document::new(""));
        scorer.add_document_pairs(&[("c/empty.json", &r3, &h3)]).unwrap();
    }
    scorer.finish(&CancelToken::new()).unwrap();
    scorer
}

fn check_equivalence(scorer: &Scorer, kind: SummaryKind) -> usize {
    let table = scorer.summary(kind).unwrap().table().unwrap();
    let (header, excel) = table.render_rows(Flavor::Excel);
    let (_, literal) = table.render_rows(Flavor::Literal);
    let (_, oo) = table.render_rows(Flavor::Oo);
    let sheet = Sheet { cells: excel.clone() };
    let oo_sheet = Sheet { cells: oo };
    let mut formulas = 0;
    for (r, row) in excel.iter().enumerate() {
        for (c, text) in row.iter().enumerate() {
            if !text.starts_with('=') {
                continue;
            }
            formulas += 1;
            let expected: f64 = literal[r][c].parse().unwrap();
            let got = sheet.value(r, c);
            assert!(
                (got - expected).abs() < 1e-9,
                "{:?} row {} column '{}': {} evaluates to {}, literal {}",
                kind,
                r,
                header[c],
                text,
                got,
                expected
            );
            assert!((oo_sheet.value(r, c) - expected).abs() < 1e-9);
        }
    }
    formulas
}

#[test]
fn summary_formulas_match_literals() {
    let scorer = scored(ScorerConfig::default());
    for kind in [
        SummaryKind::Tag,
        SummaryKind::Token,
        SummaryKind::PseudoToken,
        SummaryKind::Character,
    ] {
        assert!(check_equivalence(&scorer, kind) > 0, "{:?} has no formulas", kind);
    }
}

#[test]
fn aggregation_formulas_match_literals() {
    let profile = ScoreProfile::from_json(
        r#"{"name": "grouped", "aggregations": [{"name": "names", "true_labels": ["PERSON", "ORG"]}]}"#,
    )
    .unwrap();
    let scorer = scored(ScorerConfig::builder().with_score_profile(profile).build());
    let table = scorer.summary(SummaryKind::Tag).unwrap().table().unwrap();
    let (header, rows) = table.render_rows(Flavor::Literal);
    let tag = header.iter().position(|h| h == "tag").unwrap();
    assert!(rows.iter().any(|r| r[tag] == "names"));
    check_equivalence(&scorer, SummaryKind::Tag);
    check_equivalence(&scorer, SummaryKind::Character);
}

#[test]
fn sum_ranges_collapse() {
    let scorer = scored(ScorerConfig::default());
    let table = scorer.summary(SummaryKind::Tag).unwrap().table().unwrap();
    let (_, excel) = table.render_rows(Flavor::Excel);
    assert!(excel.iter().flatten().any(|t| t.starts_with("=SUM(") && t.contains(':')));
}

#[test]
fn empty_file_accuracy_matches_literal() {
    let scorer = scored_with_empty(ScorerConfig::default(), true);
    assert_eq!(scorer.num_docs(), 3);
    for kind in [SummaryKind::Tag, SummaryKind::PseudoToken, SummaryKind::Character] {
        check_equivalence(&scorer, kind);
    }

    let table = scorer.summary(SummaryKind::Character).unwrap().table().unwrap();
    let (header, excel) = table.render_rows(Flavor::Excel);
    let (_, literal) = table.render_rows(Flavor::Literal);
    let file = header.iter().position(|h| h == "file").unwrap();
    let acc = header.iter().position(|h| h == "tag_sensitive_accuracy").unwrap();
    let toks = header.iter().position(|h| h == "test chars").unwrap();
    let row = literal.iter().position(|r| r[file] == "empty.json").unwrap();
    assert_eq!(literal[row][toks], "0");
    assert_eq!(literal[row][acc], "1.0");
    assert!(excel[row][acc].starts_with("=IF("));
}

#[test]
fn file_test_tokens_refer_to_first_child() {
    let scorer = scored(ScorerConfig::default());
    let table = scorer.summary(SummaryKind::Character).unwrap().table().unwrap();
    let (header, excel) = table.render_rows(Flavor::Excel);
    let file = header.iter().position(|h| h == "file").unwrap();
    let tag = header.iter().position(|h| h == "tag").unwrap();
    let toks = header.iter().position(|h| h == "test chars").unwrap();
    let row = excel
        .iter()
        .find(|r| r[file] == "doc1.json" && r[tag] == "<all>")
        .unwrap();
    let text = &row[toks];
    assert!(text.starts_with('='), "{}", text);
    assert!(text[1..].chars().next().is_some_and(|c| c.is_ascii_uppercase()));
}
