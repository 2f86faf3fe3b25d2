//! Typed errors for DDL parsing and registry application.
//!
//! Parsing and registry errors never attempt automatic repair: an
//! inconsistent schema model is worse than a stopped pipeline, so callers
//! are expected to treat most of these as fatal.

use thiserror::Error;

use crate::table::TableId;

/// Errors produced by the DDL parser.
#[derive(Debug, Error)]
pub enum DdlError {
    /// The statement is syntactically malformed or uses a construct the
    /// parser does not understand inside a supported statement kind.
    #[error("DDL parse error at position {pos}: {message} in statement: {sql}")]
    ParseError {
        pos: usize,
        message: String,
        sql: String,
    },

    /// The statement kind is outside the supported set
    /// (CREATE/ALTER/RENAME/DROP/TRUNCATE TABLE).
    #[error("unsupported statement kind '{keyword}' in statement: {sql}")]
    UnsupportedStatement { keyword: String, sql: String },

    /// The statement names a table whose identity disagrees with the table
    /// it is being applied to.
    #[error("statement targets {actual} but was applied to {expected}")]
    IdentityMismatch { expected: TableId, actual: TableId },
}

/// Errors produced by the schema registry.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// No tracked table under the given identity.
    #[error("table {0} is not tracked")]
    TableNotFound(TableId),

    /// A delta targets a tracked entry whose recorded identity disagrees
    /// with the delta's target.
    #[error("delta targets {target} but tracked entry is {tracked}")]
    IdentityMismatch { target: TableId, tracked: TableId },

    /// A requested version has no retained snapshot.
    #[error("table {id} has no snapshot for version {version}")]
    VersionNotFound { id: TableId, version: u64 },
}
