//! DDL parsing: one statement in, structured schema deltas out.
//!
//! The parser covers the five statement kinds that can change tracked row
//! layout (CREATE/ALTER/RENAME/DROP/TRUNCATE TABLE). Everything else is
//! rejected with [`DdlError::UnsupportedStatement`] so the caller decides
//! whether the statement matters. ALTER and RENAME deltas are re-serialized
//! with a fully qualified table name, since the original statement may rely
//! on the session's default schema and must stay replayable out of context.

mod lexer;
mod parser;

use crate::error::DdlError;
use crate::table::{Column, ColumnType, TableId};

/// Possibly schema-qualified table reference as written in the statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    pub schema: Option<String>,
    pub name: String,
}

impl ObjectName {
    fn resolve(&self, default_schema: &str, sql: &str) -> Result<TableId, DdlError> {
        let schema = match &self.schema {
            Some(s) => s.clone(),
            None if !default_schema.is_empty() => default_schema.to_string(),
            None => {
                return Err(DdlError::ParseError {
                    pos: 0,
                    message: format!(
                        "table `{}` has no schema qualifier and no default schema is set",
                        self.name
                    ),
                    sql: sql.to_string(),
                })
            }
        };
        Ok(TableId::new(schema, self.name.clone()))
    }
}

/// Column definition as it appears in CREATE TABLE or an ALTER clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    /// Source type text, e.g. `varchar(64)` or `bigint unsigned`.
    pub raw_type: String,
    pub col_type: ColumnType,
    pub comment: String,
    pub primary_key: bool,
    /// Trailing column options verbatim (NOT NULL, DEFAULT, ...), without
    /// any FIRST/AFTER clause.
    pub options_sql: String,
}

impl ColumnDef {
    pub fn to_column(&self) -> Column {
        Column {
            name: self.name.clone(),
            col_type: self.col_type,
            raw_type: self.raw_type.clone(),
            comment: self.comment.clone(),
            is_primary_key: self.primary_key,
        }
    }
}

/// Placement of a column added or relocated by ALTER.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPosition {
    None,
    First,
    After(String),
}

/// One clause of an ALTER TABLE statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterSpec {
    AddColumn {
        def: ColumnDef,
        position: ColumnPosition,
    },
    DropColumn {
        name: String,
    },
    ModifyColumn {
        def: ColumnDef,
        position: ColumnPosition,
    },
    ChangeColumn {
        old_name: String,
        def: ColumnDef,
        position: ColumnPosition,
    },
    RenameColumn {
        old_name: String,
        new_name: String,
    },
    RenameTable {
        to: ObjectName,
    },
    /// A clause that does not affect row layout (indexes, engine, charset,
    /// partitioning, ...). Carried through so the canonical statement stays
    /// complete, but a no-op for the registry.
    Ignored,
}

impl AlterSpec {
    /// True when applying this spec changes the column list.
    pub fn is_structural(&self) -> bool {
        !matches!(self, AlterSpec::Ignored | AlterSpec::RenameTable { .. })
    }
}

/// Parsed statement before schema resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlStatement {
    CreateTable {
        table: ObjectName,
        if_not_exists: bool,
        columns: Vec<ColumnDef>,
        comment: String,
        like: Option<ObjectName>,
        as_select: bool,
    },
    AlterTable {
        table: ObjectName,
        specs: Vec<AlterSpec>,
        /// The clause list verbatim, used for canonical re-serialization.
        body: String,
    },
    RenameTable {
        pairs: Vec<(ObjectName, ObjectName)>,
    },
    DropTable {
        tables: Vec<ObjectName>,
        if_exists: bool,
    },
    TruncateTable {
        table: ObjectName,
    },
}

/// What a statement does to one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlKind {
    Create {
        columns: Vec<ColumnDef>,
        comment: String,
        /// CREATE TABLE ... LIKE source, resolved. Columns are empty.
        like: Option<TableId>,
        /// CREATE TABLE ... AS SELECT. Flagged, not structurally expanded.
        as_select: bool,
    },
    Alter {
        specs: Vec<AlterSpec>,
    },
    Rename {
        to: TableId,
    },
    Drop,
    Truncate,
}

/// One schema delta: target table, what happens to it, and statement text
/// safe to replay without a session default schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlDelta {
    pub table: TableId,
    pub kind: DdlKind,
    pub sql: String,
}

/// Quote an identifier for MySQL, doubling embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn qualify(id: &TableId) -> String {
    format!("{}.{}", quote_ident(&id.schema), quote_ident(&id.name))
}

/// True for statements that only mark transaction boundaries and carry no
/// schema information.
pub fn is_transaction_marker(sql: &str) -> bool {
    let first = sql
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == ';')
        .next()
        .unwrap_or("");
    ["BEGIN", "COMMIT", "ROLLBACK", "SAVEPOINT", "XA"]
        .iter()
        .any(|kw| first.eq_ignore_ascii_case(kw))
}

/// Parse one statement and resolve it into per-table deltas.
///
/// `default_schema` is the schema the statement executed under; it fills in
/// unqualified table references. A RENAME TABLE with several pairs yields
/// one delta per pair.
pub fn parse(sql: &str, default_schema: &str) -> Result<Vec<DdlDelta>, DdlError> {
    let stmt = parser::parse_statement(sql)?;
    let trimmed = sql.trim().trim_end_matches(';').trim().to_string();

    match stmt {
        DdlStatement::CreateTable {
            table,
            columns,
            comment,
            like,
            as_select,
            ..
        } => {
            let id = table.resolve(default_schema, sql)?;
            let like = like
                .map(|o| o.resolve(default_schema, sql))
                .transpose()?;
            Ok(vec![DdlDelta {
                table: id,
                kind: DdlKind::Create {
                    columns,
                    comment,
                    like,
                    as_select,
                },
                sql: trimmed,
            }])
        }
        DdlStatement::AlterTable { table, specs, body } => {
            let id = table.resolve(default_schema, sql)?;
            let canonical = format!("ALTER TABLE {} {}", qualify(&id), body);
            Ok(vec![DdlDelta {
                table: id,
                kind: DdlKind::Alter { specs },
                sql: canonical,
            }])
        }
        DdlStatement::RenameTable { pairs } => {
            let mut deltas = Vec::with_capacity(pairs.len());
            for (from, to) in pairs {
                let from = from.resolve(default_schema, sql)?;
                let to = to.resolve(default_schema, sql)?;
                let canonical =
                    format!("RENAME TABLE {} TO {}", qualify(&from), qualify(&to));
                deltas.push(DdlDelta {
                    table: from,
                    kind: DdlKind::Rename { to },
                    sql: canonical,
                });
            }
            Ok(deltas)
        }
        DdlStatement::DropTable { tables, .. } => {
            let mut deltas = Vec::with_capacity(tables.len());
            for table in tables {
                let id = table.resolve(default_schema, sql)?;
                let canonical = format!("DROP TABLE IF EXISTS {}", qualify(&id));
                deltas.push(DdlDelta {
                    table: id,
                    kind: DdlKind::Drop,
                    sql: canonical,
                });
            }
            Ok(deltas)
        }
        DdlStatement::TruncateTable { table } => {
            let id = table.resolve(default_schema, sql)?;
            let canonical = format!("TRUNCATE TABLE {}", qualify(&id));
            Ok(vec![DdlDelta {
                table: id,
                kind: DdlKind::Truncate,
                sql: canonical,
            }])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_markers() {
        assert!(is_transaction_marker("BEGIN"));
        assert!(is_transaction_marker("commit"));
        assert!(is_transaction_marker("SAVEPOINT sp1"));
        assert!(!is_transaction_marker("CREATE TABLE t (id int)"));
    }

    #[test]
    fn test_parse_create_resolves_default_schema() {
        let deltas = parse("CREATE TABLE t1 (id int primary key, name varchar(16))", "shop")
            .unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].table, TableId::new("shop", "t1"));
        match &deltas[0].kind {
            DdlKind::Create { columns, .. } => {
                assert_eq!(columns.len(), 2);
                assert!(columns[0].primary_key);
                assert_eq!(columns[1].col_type, ColumnType::String);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_parse_alter_canonical_is_qualified() {
        let deltas = parse("alter table t1 add column c3 int after c1", "shop").unwrap();
        assert_eq!(
            deltas[0].sql,
            "ALTER TABLE `shop`.`t1` add column c3 int after c1"
        );
    }

    #[test]
    fn test_parse_multibyte_names_and_comments_survive() {
        let deltas = parse(
            "CREATE TABLE t (id int primary key COMMENT '订单编号')",
            "db",
        )
        .unwrap();
        match &deltas[0].kind {
            DdlKind::Create { columns, .. } => assert_eq!(columns[0].comment, "订单编号"),
            other => panic!("unexpected kind: {other:?}"),
        }

        let deltas = parse("ALTER TABLE `表一` ADD COLUMN c int", "db").unwrap();
        assert_eq!(deltas[0].table, TableId::new("db", "表一"));
        assert_eq!(deltas[0].sql, "ALTER TABLE `db`.`表一` ADD COLUMN c int");
    }

    #[test]
    fn test_parse_rename_yields_delta_per_pair() {
        let deltas = parse("RENAME TABLE a TO b, db2.c TO db2.d", "db1").unwrap();
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].table, TableId::new("db1", "a"));
        assert_eq!(deltas[0].kind, DdlKind::Rename { to: TableId::new("db1", "b") });
        assert_eq!(deltas[0].sql, "RENAME TABLE `db1`.`a` TO `db1`.`b`");
        assert_eq!(deltas[1].table, TableId::new("db2", "c"));
    }

    #[test]
    fn test_parse_drop_multiple_tables() {
        let deltas = parse("DROP TABLE IF EXISTS t1, other.t2", "db1").unwrap();
        assert_eq!(deltas.len(), 2);
        assert!(matches!(deltas[0].kind, DdlKind::Drop));
        assert_eq!(deltas[1].table, TableId::new("other", "t2"));
    }

    #[test]
    fn test_parse_rejects_non_table_statement() {
        let err = parse("GRANT ALL ON *.* TO 'u'@'%'", "db1").unwrap_err();
        assert!(matches!(err, DdlError::UnsupportedStatement { .. }));
        let err = parse("CREATE INDEX idx ON t (c)", "db1").unwrap_err();
        assert!(matches!(err, DdlError::UnsupportedStatement { .. }));
    }

    #[test]
    fn test_parse_unqualified_without_schema_context_fails() {
        let err = parse("DROP TABLE t1", "").unwrap_err();
        assert!(matches!(err, DdlError::ParseError { .. }));
    }
}
