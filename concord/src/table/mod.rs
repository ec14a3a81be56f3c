//! Score tables.
//!
//! A [`ScoreTable`] is a list of typed columns over rows. Literal cells
//! come from the row's key values; aggregator cells are bound to an
//! accumulator row in a shared [`RowArena`] and render either as
//! spreadsheet formulas or as their computed values.
//!
//! | Column kind  | Rendered | Cell |
//! |--------------|----------|------|
//! | `Literal`    | yes      | the row's value for the column key |
//! | `Fake`       | no       | a value later columns compute from |
//! | `Computed`   | yes      | function of earlier cells |
//! | `Aggregator` | yes      | the accumulator row's slot |
//!
//! # Example
//!
//! ```rust
//! use concord::rows::{RowArena, ScoreRow, MATCH};
//! use concord::table::{Column, ScoreTable};
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! let mut arena = RowArena::new(false);
//! let mut row = ScoreRow::leaf("doc", "PERSON", "<none>", 5);
//! row.incr(MATCH, 2);
//! let id = arena.push(row);
//!
//! let mut table = ScoreTable::new(
//!     vec![Column::literal("tag"), Column::aggregator("match", MATCH)],
//!     Arc::new(arena),
//! );
//! let mut values = BTreeMap::new();
//! values.insert("tag".to_string(), "PERSON".into());
//! table.add_row(values, Some(id)).unwrap();
//! assert!(table.format().ends_with("PERSON     2"));
//! ```

pub mod cell;
pub mod format;
pub mod formula;

use crate::error::{Error, Result};
use crate::rows::{RowArena, RowId};
use cell::{Cell, CellValue};
use format::{layout, Flavor, ScoreFormat};
use formula::{Locations, RenderContext};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Function behind a computed column. Inputs arrive in declaration order.
pub type ComputeFn = Arc<dyn Fn(&[Option<&CellValue>]) -> Option<CellValue> + Send + Sync>;

/// What fills a column.
#[derive(Clone)]
pub enum ColumnKind {
    /// Value supplied with the row.
    Literal,
    /// Value supplied with the row, never rendered.
    Fake,
    /// Value computed from earlier columns.
    Computed {
        /// Names of the input columns.
        inputs: Vec<String>,
        /// The computation.
        compute: ComputeFn,
    },
    /// Slot of the row's accumulator.
    Aggregator {
        /// Slot name.
        slot: String,
    },
}

/// How a value is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellFormat {
    /// As is.
    #[default]
    Plain,
    /// Three decimals in text output.
    Ratio,
    /// Wrapped in double quotes.
    Quoted,
}

/// One table column.
#[derive(Clone)]
pub struct Column {
    /// Header.
    pub name: String,
    /// Row value key for literal and fake columns.
    pub key: String,
    /// Source of the cells.
    pub kind: ColumnKind,
    /// Display format.
    pub format: CellFormat,
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            ColumnKind::Literal => "literal".to_string(),
            ColumnKind::Fake => "fake".to_string(),
            ColumnKind::Computed { inputs, .. } => format!("computed({})", inputs.join(",")),
            ColumnKind::Aggregator { slot } => format!("aggregator({})", slot),
        };
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("format", &self.format)
            .finish()
    }
}

impl Column {
    /// Literal column keyed by its own name.
    #[must_use]
    pub fn literal(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: name.clone(),
            name,
            kind: ColumnKind::Literal,
            format: CellFormat::Plain,
        }
    }

    /// Literal column whose row key differs from its header.
    #[must_use]
    pub fn keyed(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::literal(name)
        }
    }

    /// Hidden column.
    #[must_use]
    pub fn fake(name: impl Into<String>) -> Self {
        Self {
            kind: ColumnKind::Fake,
            ..Self::literal(name)
        }
    }

    /// Computed column.
    #[must_use]
    pub fn computed<F>(name: impl Into<String>, inputs: &[&str], compute: F) -> Self
    where
        F: Fn(&[Option<&CellValue>]) -> Option<CellValue> + Send + Sync + 'static,
    {
        Self {
            kind: ColumnKind::Computed {
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                compute: Arc::new(compute),
            },
            ..Self::literal(name)
        }
    }

    /// Column bound to an accumulator slot.
    #[must_use]
    pub fn aggregator(name: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            kind: ColumnKind::Aggregator { slot: slot.into() },
            ..Self::literal(name)
        }
    }

    /// Set the display format.
    #[must_use]
    pub fn with_format(mut self, format: CellFormat) -> Self {
        self.format = format;
        self
    }

    fn is_rendered(&self) -> bool {
        !matches!(self.kind, ColumnKind::Fake)
    }
}

/// One table row.
#[derive(Debug, Clone, Default)]
pub struct TableRow {
    values: BTreeMap<String, CellValue>,
    accum: Option<RowId>,
    frozen: BTreeMap<String, Cell>,
}

impl TableRow {
    /// Value supplied for a key.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&CellValue> {
        self.values.get(key)
    }

    /// Accumulator row, if bound.
    #[must_use]
    pub fn accum(&self) -> Option<RowId> {
        self.accum
    }
}

/// A table of score rows.
#[derive(Debug, Clone)]
pub struct ScoreTable {
    columns: Vec<Column>,
    rows: Vec<TableRow>,
    arena: Arc<RowArena>,
}

impl ScoreTable {
    /// Empty table.
    #[must_use]
    pub fn new(columns: Vec<Column>, arena: Arc<RowArena>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            arena,
        }
    }

    /// Columns, hidden ones included.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Rows in order.
    #[must_use]
    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True without rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Accumulator rows behind the aggregator cells.
    #[must_use]
    pub fn arena(&self) -> &Arc<RowArena> {
        &self.arena
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Insert a column after the named one, or append it.
    pub fn add_column(&mut self, column: Column, after: Option<&str>) -> Result<()> {
        if self.column_index(&column.name).is_some() {
            return Err(Error::score_table(format!(
                "duplicate column '{}'",
                column.name
            )));
        }
        match after {
            None => self.columns.push(column),
            Some(prev) => {
                let i = self.column_index(prev).ok_or_else(|| {
                    Error::score_table(format!("no column '{}' to insert after", prev))
                })?;
                self.columns.insert(i + 1, column);
            }
        }
        Ok(())
    }

    /// Append a row. Every literal column needs a value.
    pub fn add_row(&mut self, values: BTreeMap<String, CellValue>, accum: Option<RowId>) -> Result<()> {
        for col in &self.columns {
            if matches!(col.kind, ColumnKind::Literal) && !values.contains_key(&col.key) {
                return Err(Error::score_table(format!(
                    "missing value for row key {}",
                    col.key
                )));
            }
        }
        self.rows.push(TableRow {
            values,
            accum,
            frozen: BTreeMap::new(),
        });
        Ok(())
    }

    /// Same columns, same rows.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Append the rows of `other` that `keep` accepts. When the two tables
    /// use different arenas, aggregator cells arrive as their values.
    pub fn import_rows<F>(&mut self, other: &ScoreTable, keep: F)
    where
        F: Fn(&TableRow) -> bool,
    {
        let shared = Arc::ptr_eq(&self.arena, &other.arena);
        for row in other.rows.iter().filter(|r| keep(r)) {
            let mut imported = TableRow {
                values: row.values.clone(),
                accum: None,
                frozen: row.frozen.clone(),
            };
            if shared {
                imported.accum = row.accum;
            } else if let Some(id) = row.accum {
                for col in &self.columns {
                    if let ColumnKind::Aggregator { slot } = &col.kind {
                        imported
                            .frozen
                            .entry(col.name.clone())
                            .or_insert_with(|| other.arena.cell(id, slot).frozen(&other.arena));
                    }
                }
            }
            self.rows.push(imported);
        }
    }

    /// The corpus rows without the file column. Cells that refer to rows
    /// outside the summary become values.
    #[must_use]
    pub fn extract_global_summary(&self) -> Self {
        let columns = self
            .columns
            .iter()
            .filter(|c| c.name != "file")
            .cloned()
            .collect();
        let mut summary = Self::new(columns, Arc::clone(&self.arena));
        summary.import_rows(self, |r| {
            matches!(r.value("file"), Some(CellValue::Str(f)) if f == "<all>")
        });
        let arena = Arc::clone(&self.arena);
        for row in &mut summary.rows {
            let Some(id) = row.accum else { continue };
            for col in &summary.columns {
                if let ColumnKind::Aggregator { slot } = &col.kind {
                    if let Some(f) = arena.formula(id, slot) {
                        if f.freezes_in_summary() {
                            row.frozen
                                .insert(col.name.clone(), Cell::Formula(f).frozen(&arena));
                        }
                    }
                }
            }
        }
        summary
    }

    /// Cells of one row, hidden columns included.
    fn row_cells(&self, row: &TableRow) -> Vec<Cell> {
        let mut cells: Vec<Cell> = Vec::with_capacity(self.columns.len());
        for col in &self.columns {
            let cell = match &col.kind {
                ColumnKind::Literal | ColumnKind::Fake => row
                    .values
                    .get(&col.key)
                    .cloned()
                    .map_or(Cell::Empty, Cell::Literal),
                ColumnKind::Computed { inputs, compute } => {
                    let values: Vec<Option<CellValue>> = inputs
                        .iter()
                        .map(|name| {
                            self.column_index(name)
                                .and_then(|i| cells.get(i))
                                .and_then(|c| c.value(&self.arena))
                        })
                        .collect();
                    let refs: Vec<Option<&CellValue>> = values.iter().map(Option::as_ref).collect();
                    compute(&refs).map_or(Cell::Empty, Cell::Literal)
                }
                ColumnKind::Aggregator { slot } => match row.frozen.get(&col.name) {
                    Some(frozen) => frozen.clone(),
                    None => row
                        .accum
                        .map_or(Cell::Empty, |id| self.arena.cell(id, slot)),
                },
            };
            cells.push(cell);
        }
        cells
    }

    /// Where each accumulator slot lands among the rendered cells.
    #[must_use]
    pub fn locations(&self) -> Locations {
        let mut out = Locations::new();
        let rendered: Vec<&Column> = self.columns.iter().filter(|c| c.is_rendered()).collect();
        for (r, row) in self.rows.iter().enumerate() {
            let Some(id) = row.accum else { continue };
            for (c, col) in rendered.iter().enumerate() {
                if let ColumnKind::Aggregator { slot } = &col.kind {
                    out.insert((id, slot.clone()), (r, c));
                }
            }
        }
        out
    }

    /// Header and cell texts for a CSV flavor.
    #[must_use]
    pub fn render_rows(&self, flavor: Flavor) -> (Vec<String>, Vec<Vec<String>>) {
        let locations = self.locations();
        let ctx = RenderContext {
            sep: flavor.separator(),
            locations: &locations,
            arena: &self.arena,
        };
        let header = self.rendered_header();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(self.row_cells(row))
                    .filter(|(col, _)| col.is_rendered())
                    .map(|(col, cell)| match (&cell, flavor) {
                        (Cell::Formula(f), Flavor::Excel | Flavor::Oo) => f.render(&ctx),
                        _ => self.show(&cell, col.format, false),
                    })
                    .collect()
            })
            .collect();
        (header, rows)
    }

    fn rendered_header(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_rendered())
            .map(|c| c.name.clone())
            .collect()
    }

    fn show(&self, cell: &Cell, format: CellFormat, text: bool) -> String {
        let Some(value) = cell.value(&self.arena) else {
            return String::new();
        };
        match (format, &value) {
            (CellFormat::Quoted, v) => format!("\"{}\"", v),
            (_, CellValue::Float(x)) if text => format!("{:.3}", x),
            (_, v) => v.to_string(),
        }
    }

    /// Text rendering with right-aligned columns.
    #[must_use]
    pub fn format(&self) -> String {
        let header = self.rendered_header();
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(self.row_cells(row))
                    .filter(|(col, _)| col.is_rendered())
                    .map(|(col, cell)| self.show(&cell, col.format, true))
                    .collect()
            })
            .collect();
        layout(&header, &rows)
    }

    /// Write one CSV file.
    pub fn write_csv(&self, path: impl AsRef<Path>, flavor: Flavor) -> Result<()> {
        let (header, rows) = self.render_rows(flavor);
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record(&header)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        log::debug!("wrote {} rows to {}", rows.len(), path.as_ref().display());
        Ok(())
    }

    /// Write `<basename>_<flavor>.csv` in `dir` for every flavor.
    pub fn write_csv_by_format(
        &self,
        dir: impl AsRef<Path>,
        basename: &str,
        format: &ScoreFormat,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for &flavor in format.flavors() {
            let path = dir.as_ref().join(format!("{}_{}.csv", basename, flavor));
            self.write_csv(&path, flavor)?;
            written.push(path);
        }
        Ok(written)
    }
}
