//! CSV output flavors.

use crate::error::{Error, Result};
use std::fmt;

/// How formula cells are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// Formulas with `,` separators.
    Excel,
    /// Formulas with `;` separators (OpenOffice).
    Oo,
    /// Computed values instead of formulas.
    Literal,
}

impl Flavor {
    /// Name used in file names and on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Flavor::Excel => "excel",
            Flavor::Oo => "oo",
            Flavor::Literal => "literal",
        }
    }

    /// Formula argument separator.
    #[must_use]
    pub fn separator(self) -> &'static str {
        match self {
            Flavor::Oo => ";",
            Flavor::Excel | Flavor::Literal => ",",
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Flavor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "excel" => Ok(Flavor::Excel),
            "oo" => Ok(Flavor::Oo),
            "literal" => Ok(Flavor::Literal),
            other => Err(Error::score_table(format!(
                "unknown CSV formula output type '{}'",
                other
            ))),
        }
    }
}

/// The flavors to write, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreFormat {
    flavors: Vec<Flavor>,
}

impl Default for ScoreFormat {
    fn default() -> Self {
        Self {
            flavors: vec![Flavor::Excel],
        }
    }
}

impl ScoreFormat {
    /// Explicit flavor list.
    #[must_use]
    pub fn new(flavors: Vec<Flavor>) -> Self {
        Self { flavors }
    }

    /// Parse a comma-separated list such as `excel,oo`.
    pub fn parse(spec: &str) -> Result<Self> {
        let flavors = spec
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<Flavor>)
            .collect::<Result<Vec<Flavor>>>()?;
        if flavors.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self { flavors })
    }

    /// Flavors in order.
    #[must_use]
    pub fn flavors(&self) -> &[Flavor] {
        &self.flavors
    }
}

/// Lay out rows as right-aligned text columns, with a `-----` rule under
/// the header.
#[must_use]
pub fn layout(header: &[String], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(header[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let mut out = vec![
        aligned(header.iter().map(String::as_str), &widths),
        aligned(widths.iter().map(|_| "-----"), &widths),
    ];
    for row in rows {
        out.push(aligned(row.iter().map(String::as_str), &widths));
    }
    out.join("\n")
}

fn aligned<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(c, w)| format!("{:>width$}", c, width = *w))
        .collect::<Vec<_>>()
        .join(" ")
}
