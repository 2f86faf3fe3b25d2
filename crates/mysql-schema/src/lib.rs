//! MySQL schema tracking for binlog-sync.
//!
//! This crate owns the in-memory model of every replicated table and keeps it
//! synchronized with live DDL activity:
//!
//! - [`table`] - the `Table`/`Column` model with logical column types
//! - [`ddl`] - a lexer and recursive-descent parser for the DDL subset that
//!   affects replication (CREATE/ALTER/RENAME/DROP/TRUNCATE TABLE), producing
//!   [`ddl::DdlDelta`] values with canonical, schema-qualified statement text
//! - [`registry`] - the versioned snapshot registry that applies deltas,
//!   answers point-in-time lookups, and folds online-DDL shadow tables
//!   (gh-ost and DMS naming patterns) into the tracked table they stand for
//!
//! The parser is intentionally not a general SQL engine: it extracts exactly
//! the structural information replication needs and rejects everything else
//! with a typed error, because a schema-affecting statement the pipeline
//! cannot account for makes continued row decoding unsafe.

pub mod ddl;
mod error;
pub mod registry;
pub mod table;

pub use ddl::{AlterSpec, ColumnDef, ColumnPosition, DdlDelta, DdlKind, DdlStatement};
pub use error::{DdlError, SchemaError};
pub use registry::{Applied, Resolution, SchemaRegistry};
pub use table::{Column, ColumnType, Table, TableId};
