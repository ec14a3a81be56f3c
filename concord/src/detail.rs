//! Per-pair detail table.
//!
//! One row per phrase-level pair. The hidden `ref` and `hyp` columns carry
//! a record of each side; every visible column after `type` is computed
//! from them.

use crate::error::Result;
use crate::record::{DocPair, PairRecord, PairSide, Side};
use crate::rows::RowArena;
use crate::table::cell::CellValue;
use crate::table::{CellFormat, Column, ScoreTable};
use std::collections::BTreeMap;
use std::sync::Arc;

fn field(name: &'static str) -> impl Fn(&[Option<&CellValue>]) -> Option<CellValue> + Send + Sync {
    move |inputs| inputs.first().copied().flatten().and_then(|r| r.field(name)).cloned()
}

/// Detail table with its fixed columns plus a `ref <dim>`/`hyp <dim>` pair
/// for each listed dimension, in order.
pub fn detail_table(dimensions: &[String]) -> Result<ScoreTable> {
    let mut columns = vec![
        Column::literal("file"),
        Column::literal("type"),
        Column::fake("ref"),
        Column::fake("hyp"),
    ];
    for (side, key) in [
        (Side::Ref, "id"),
        (Side::Hyp, "id"),
        (Side::Ref, "description"),
        (Side::Hyp, "description"),
        (Side::Ref, "label"),
        (Side::Hyp, "label"),
        (Side::Ref, "start"),
        (Side::Ref, "end"),
        (Side::Hyp, "start"),
        (Side::Hyp, "end"),
    ] {
        let p = side.prefix();
        columns.push(Column::computed(format!("{}{}", p, key), &[p], field(key)));
    }
    let mut table = ScoreTable::new(columns, Arc::new(RowArena::default()));
    let mut after = "hypend".to_string();
    for dim in dimensions {
        for side in [Side::Ref, Side::Hyp] {
            let p = side.prefix();
            let name = format!("{} {}", p, dim);
            let dim = dim.clone();
            let col = Column::computed(name.clone(), &[p], move |inputs| {
                inputs
                    .first()
                    .copied()
                    .flatten()
                    .and_then(|r| r.field("attrs"))
                    .and_then(|a| a.field(&dim))
                    .cloned()
            });
            table.add_column(col, Some(&after))?;
            after = name;
        }
    }
    for side in [Side::Ref, Side::Hyp] {
        let p = side.prefix();
        let col = Column::computed(format!("{}content", p), &[p], field("content"))
            .with_format(CellFormat::Quoted);
        table.add_column(col, None)?;
    }
    Ok(table)
}

fn side_record(docs: DocPair<'_>, side: Side, ps: &PairSide) -> Option<CellValue> {
    let ann = docs.doc(side).get(ps.ann)?;
    let mut fields = BTreeMap::new();
    fields.insert(
        "id".to_string(),
        CellValue::from(ann.external_id.clone().unwrap_or_default()),
    );
    fields.insert("description".to_string(), CellValue::from(ann.describe()));
    fields.insert("label".to_string(), CellValue::from(ps.label.as_str()));
    if let Some(span) = ann.span {
        fields.insert("start".to_string(), CellValue::Int(span.start as i64));
        fields.insert("end".to_string(), CellValue::Int(span.end as i64));
        fields.insert(
            "content".to_string(),
            CellValue::from(docs.doc(side).slice(span)),
        );
    }
    let attrs = ann
        .attrs
        .iter()
        .map(|(k, v)| (k.clone(), CellValue::from(v.to_string())))
        .collect();
    fields.insert("attrs".to_string(), CellValue::Record(attrs));
    Some(CellValue::Record(fields))
}

/// Append one row per pair record of a document pair.
pub fn add_pairs(
    table: &mut ScoreTable,
    file: &str,
    docs: DocPair<'_>,
    pairs: &[PairRecord],
) -> Result<()> {
    for pair in pairs {
        let mut values = BTreeMap::new();
        values.insert("file".to_string(), CellValue::from(file));
        values.insert("type".to_string(), CellValue::from(pair.type_name()));
        for (side, ps) in [(Side::Ref, &pair.reference), (Side::Hyp, &pair.hypothesis)] {
            if let Some(record) = ps.as_ref().and_then(|ps| side_record(docs, side, ps)) {
                values.insert(side.prefix().to_string(), record);
            }
        }
        table.add_row(values, None)?;
    }
    Ok(())
}
