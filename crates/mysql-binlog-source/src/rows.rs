//! Row image decoding against a schema snapshot.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use mysql_async::binlog::row::BinlogRow;
use mysql_async::binlog::value::BinlogValue;
use mysql_async::Value;

use mysql_schema::{Column, ColumnType, Table};
use sync_core::RowValue;

/// Decode one full row image into a column-name map.
///
/// A column-count mismatch against the tracked schema means the in-memory
/// model has desynchronized from the stream and decoding must stop.
pub fn row_to_values(row: &BinlogRow, table: &Table) -> Result<HashMap<String, RowValue>> {
    if row.len() != table.columns.len() {
        bail!(
            "row for {} carries {} columns but schema version {} tracks {}",
            table.id,
            row.len(),
            table.version,
            table.columns.len()
        );
    }
    let mut values = HashMap::with_capacity(table.columns.len());
    for (i, col) in table.columns.iter().enumerate() {
        let value = row.as_ref(i).with_context(|| {
            format!(
                "row for {} lacks an image for column {} (partial row images are not supported)",
                table.id, col.name
            )
        })?;
        values.insert(col.name.clone(), decode_value(value, col)?);
    }
    Ok(values)
}

/// Decode one wire value per the column's logical type.
pub fn decode_value(value: &BinlogValue<'_>, col: &Column) -> Result<RowValue> {
    match value {
        BinlogValue::Value(v) => from_wire(v, col),
        BinlogValue::Jsonb(jsonb) => {
            let json = serde_json::Value::try_from(jsonb.clone())
                .with_context(|| format!("decoding json column {}", col.name))?;
            Ok(RowValue::Text(json.to_string()))
        }
        BinlogValue::JsonDiff(_) => bail!(
            "column {} carries a partial json update; set binlog_row_value_options='' on the source",
            col.name
        ),
    }
}

/// Plain wire values. Text-like byte buffers (char/text/blob carrying text,
/// json, decimal) become text; binary and bit stay raw bytes.
fn from_wire(value: &Value, col: &Column) -> Result<RowValue> {
    Ok(match value {
        Value::NULL => RowValue::Null,
        Value::Int(n) => RowValue::Int(*n),
        Value::UInt(n) => RowValue::UInt(*n),
        Value::Float(f) => RowValue::Float(f64::from(*f)),
        Value::Double(f) => RowValue::Float(*f),
        Value::Bytes(bytes) => {
            if col.col_type.is_textual() {
                RowValue::Text(String::from_utf8_lossy(bytes).into_owned())
            } else {
                RowValue::Bytes(bytes.clone())
            }
        }
        Value::Date(y, mo, d, h, mi, s, us) => RowValue::Text(format_date(
            col.col_type,
            *y,
            *mo,
            *d,
            *h,
            *mi,
            *s,
            *us,
        )),
        Value::Time(neg, d, h, mi, s, us) => {
            let sign = if *neg { "-" } else { "" };
            let hours = u32::from(*h) + u32::from(*d) * 24;
            let mut out = format!("{sign}{hours:02}:{mi:02}:{s:02}");
            if *us > 0 {
                out.push_str(&format!(".{us:06}"));
            }
            RowValue::Text(out)
        }
    })
}

#[allow(clippy::too_many_arguments)]
fn format_date(col_type: ColumnType, y: u16, mo: u8, d: u8, h: u8, mi: u8, s: u8, us: u32) -> String {
    let mut out = format!("{y:04}-{mo:02}-{d:02}");
    if col_type == ColumnType::Date {
        return out;
    }
    out.push_str(&format!(" {h:02}:{mi:02}:{s:02}"));
    if us > 0 {
        out.push_str(&format!(".{us:06}"));
    }
    out
}
