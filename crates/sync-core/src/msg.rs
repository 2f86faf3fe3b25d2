//! Messages flowing through the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use mysql_schema::{DdlDelta, Table, TableId};

/// One decoded column value.
///
/// Text-like wire buffers (char/text/blob-as-text/json/decimal) are decoded
/// to [`RowValue::Text`] at the source; everything downstream handles typed
/// values only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl RowValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RowValue::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DmlAction {
    Insert,
    Update,
    Delete,
    Replace,
}

/// One row-level change.
#[derive(Debug, Clone)]
pub struct DmlMsg {
    pub table: TableId,
    pub action: DmlAction,
    /// Column name to value, per the schema snapshot at `schema_version`.
    pub data: HashMap<String, RowValue>,
    /// Pre-image of the row, present for updates only.
    pub old: Option<HashMap<String, RowValue>>,
    /// Table version in effect when the row was decoded. Batches are keyed
    /// by it so late flushes still see the schema the row was decoded with.
    pub schema_version: u64,
    pub timestamp: DateTime<Utc>,
}

/// A structural schema change, with the snapshot that resulted from it.
/// `table` is None when the statement dropped the table.
#[derive(Debug, Clone)]
pub struct DdlMsg {
    pub delta: DdlDelta,
    pub table: Option<Arc<Table>>,
}

/// Pipeline message.
#[derive(Debug, Clone)]
pub enum Msg {
    Dml(DmlMsg),
    Ddl(DdlMsg),
    /// Transaction boundary: `position` is the durable offset that may be
    /// checkpointed once every earlier message has been flushed.
    Ctl { position: String },
}

impl Msg {
    pub fn is_dml(&self) -> bool {
        matches!(self, Msg::Dml(_))
    }
}
