//! Table cells.

use super::formula::{format_number, Formula};
use crate::rows::RowArena;
use std::collections::BTreeMap;
use std::fmt;

/// A literal cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Text.
    Str(String),
    /// Whole number.
    Int(i64),
    /// Real number.
    Float(f64),
    /// Structured value carried by a fake column and read by computed
    /// columns; never rendered.
    Record(BTreeMap<String, CellValue>),
}

impl CellValue {
    /// Numeric view.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Field of a record value.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&CellValue> {
        match self {
            CellValue::Record(fields) => fields.get(name),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Str(s) => f.write_str(s),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(x) => f.write_str(&format_number(*x, false)),
            CellValue::Record(_) => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Str(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Str(s)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<f64> for CellValue {
    fn from(x: f64) -> Self {
        CellValue::Float(x)
    }
}

/// One table cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    /// Nothing.
    #[default]
    Empty,
    /// A fixed value.
    Literal(CellValue),
    /// A value derived from other cells.
    Formula(Formula),
}

impl Cell {
    /// The cell's value, evaluating formulas against `arena`.
    #[must_use]
    pub fn value(&self, arena: &RowArena) -> Option<CellValue> {
        match self {
            Cell::Empty => None,
            Cell::Literal(v) => Some(v.clone()),
            Cell::Formula(f) => {
                let x = f.compute(arena);
                Some(if f.is_count() {
                    CellValue::Int(x.round() as i64)
                } else {
                    CellValue::Float(x)
                })
            }
        }
    }

    /// Replace a formula with its value.
    #[must_use]
    pub fn frozen(&self, arena: &RowArena) -> Cell {
        match self {
            Cell::Formula(_) => self.value(arena).map_or(Cell::Empty, Cell::Literal),
            other => other.clone(),
        }
    }
}
