//! Column and table model for tracked MySQL schemas.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ddl::{DdlDelta, DdlKind};
use crate::error::DdlError;

/// Logical column type, derived once from the raw MySQL type at parse time
/// and never re-derived per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// tinyint, smallint, mediumint, int, bigint, year
    Number,
    /// float, double, real
    Float,
    Enum,
    Set,
    /// char, varchar, text variants
    String,
    Datetime,
    Timestamp,
    Date,
    Time,
    Bit,
    Json,
    /// decimal, numeric
    Decimal,
    /// binary, varbinary, blob variants
    Binary,
}

impl ColumnType {
    /// Derive the logical type from a raw MySQL type string such as
    /// `int(11) unsigned` or `enum('a','b')`. Unknown base types fall back
    /// to [`ColumnType::String`], matching how unrecognized text-like types
    /// are safest to carry.
    pub fn from_raw(raw: &str) -> ColumnType {
        let base = raw
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        match base.as_str() {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "year"
            | "bool" | "boolean" | "serial" => ColumnType::Number,
            "float" | "double" | "real" => ColumnType::Float,
            "enum" => ColumnType::Enum,
            "set" => ColumnType::Set,
            "datetime" => ColumnType::Datetime,
            "timestamp" => ColumnType::Timestamp,
            "date" => ColumnType::Date,
            "time" => ColumnType::Time,
            "bit" => ColumnType::Bit,
            "json" => ColumnType::Json,
            "decimal" | "numeric" => ColumnType::Decimal,
            "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
                ColumnType::Binary
            }
            _ => ColumnType::String,
        }
    }

    /// Whether row values of this type arrive from the binlog as raw byte
    /// buffers that must be converted to text before leaving the pipeline.
    pub fn is_textual(self) -> bool {
        !matches!(self, ColumnType::Binary | ColumnType::Bit)
    }
}

/// Table identity: (schema, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId {
    pub schema: String,
    pub name: String,
}

impl TableId {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> TableId {
        TableId {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// One column of a tracked table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub col_type: ColumnType,
    /// Raw source type string, e.g. `varchar(64)`.
    pub raw_type: String,
    pub comment: String,
    pub is_primary_key: bool,
}

/// A tracked table: ordered columns plus a version that increases by one on
/// every structural mutation and is never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    pub comment: String,
    pub columns: Vec<Column>,
    pub version: u64,
}

impl Table {
    pub fn new(id: TableId) -> Table {
        Table {
            id,
            comment: String::new(),
            columns: Vec::new(),
            version: 1,
        }
    }

    /// Build a version-1 table from a parsed CREATE TABLE delta. Used when
    /// seeding the registry from an authoritative table definition.
    pub fn from_create(delta: &DdlDelta) -> Result<Table, DdlError> {
        match &delta.kind {
            DdlKind::Create {
                columns,
                comment,
                like: None,
                as_select: false,
            } => Ok(Table {
                id: delta.table.clone(),
                comment: comment.clone(),
                columns: columns.iter().map(|d| d.to_column()).collect(),
                version: 1,
            }),
            _ => Err(DdlError::UnsupportedStatement {
                keyword: "CREATE TABLE without explicit column list".to_string(),
                sql: delta.sql.clone(),
            }),
        }
    }

    /// Ordered names of the primary-key columns.
    pub fn primary_key_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Ordered column names.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Explicit structural clone. The registry publishes these as frozen
    /// per-version snapshots; mutation always happens on a fresh copy.
    pub fn snapshot(&self) -> Table {
        self.clone()
    }
}
