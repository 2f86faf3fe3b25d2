//! Authoritative schema and position queries against a live source.

use anyhow::{anyhow, bail, Context, Result};
use mysql_async::prelude::*;
use mysql_async::Conn;

use mysql_schema::{ddl, DdlError, Table, TableId};

/// Load a table's current structure by parsing its authoritative
/// definition. Used at startup to seed the schema registry.
pub async fn load_table(conn: &mut Conn, id: &TableId) -> Result<Table> {
    let sql = format!(
        "SHOW CREATE TABLE {}.{}",
        ddl::quote_ident(&id.schema),
        ddl::quote_ident(&id.name)
    );
    let row: Option<(String, String)> = conn
        .query_first(sql)
        .await
        .with_context(|| format!("introspecting table {id}"))?;
    let (_, create_sql) = row.ok_or_else(|| anyhow!("table {id} does not exist on the source"))?;

    let deltas = ddl::parse(&create_sql, &id.schema)
        .with_context(|| format!("parsing definition of {id}"))?;
    let delta = deltas
        .first()
        .ok_or_else(|| anyhow!("definition of {id} yielded no schema delta"))?;
    let table = Table::from_create(delta)?;
    if table.id != *id {
        return Err(DdlError::IdentityMismatch {
            expected: id.clone(),
            actual: table.id,
        }
        .into());
    }
    Ok(table)
}

/// The source's current executed-transaction set, used as the starting
/// position when neither a stored nor a configured position exists.
pub async fn current_position(conn: &mut Conn) -> Result<String> {
    let mode: Option<String> = conn
        .query_first("SELECT @@GLOBAL.gtid_mode")
        .await
        .context("querying gtid_mode")?;
    let mode = mode.unwrap_or_default();
    if !mode.eq_ignore_ascii_case("ON") {
        bail!("source gtid_mode is {mode}, but GTID-based replication requires ON");
    }

    let executed: Option<String> = conn
        .query_first("SELECT @@GLOBAL.gtid_executed")
        .await
        .context("querying gtid_executed")?;
    // the server wraps long sets in newlines
    Ok(executed.unwrap_or_default().replace(['\n', ' '], ""))
}
