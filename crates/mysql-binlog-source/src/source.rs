//! Replication stream state machine.
//!
//! # Architecture
//!
//! One sequential pass over the binlog event stream, no backtracking:
//!
//! - GTID event: remember the active transaction id
//! - rows event: decode against the registry's current snapshot and emit
//!   one DML message per row (per pair for updates)
//! - XID event / COMMIT statement: fold the active transaction into the
//!   executed set and emit a control message carrying its textual form
//! - query event: parse as DDL, apply to the registry, and emit a DDL
//!   message when the tracked schema structurally changed
//!
//! The source is the only writer of schema state. A closed downstream
//! channel means the pipeline is shutting down and stops the stream
//! without error.

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use mysql_async::binlog::events::{EventData, RowsEventData, TableMapEvent};
use mysql_async::{BinlogStreamRequest, Conn, Opts, Sid};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mysql_schema::{ddl, Applied, DdlError, SchemaRegistry, Table, TableId};
use sync_core::{DdlMsg, DmlAction, DmlMsg, Msg};

use crate::gtid::GtidSet;
use crate::rows::row_to_values;

/// Current file/offset coordinate of the stream. Checkpointing is GTID
/// based; the coordinate contextualizes stream errors and rotate logging.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BinlogCoordinate {
    file: String,
    offset: u64,
}

impl BinlogCoordinate {
    fn rotate(&mut self, file: &str, offset: u64) {
        self.file = file.to_string();
        self.offset = offset;
    }

    /// Track the end position from an event header. Artificial events
    /// carry 0 and leave the coordinate untouched.
    fn advance(&mut self, log_pos: u32) {
        if log_pos > 0 {
            self.offset = u64::from(log_pos);
        }
    }
}

impl fmt::Display for BinlogCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            write!(f, "(before first rotate)")
        } else {
            write!(f, "{}:{}", self.file, self.offset)
        }
    }
}

pub struct BinlogSource {
    opts: Opts,
    server_id: u32,
    start: GtidSet,
    registry: Arc<SchemaRegistry>,
}

impl BinlogSource {
    pub fn new(opts: Opts, server_id: u32, start: GtidSet, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            opts,
            server_id,
            start,
            registry,
        }
    }

    /// Tail the stream until it ends or the downstream channel closes.
    pub async fn run(self, tx: mpsc::Sender<Msg>) -> Result<()> {
        let conn = Conn::new(self.opts.clone())
            .await
            .context("connecting to replication source")?;

        let sids = self
            .start
            .sid_strings()
            .iter()
            .map(|s| s.parse::<Sid>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("handing gtid set to the server: {e}"))?;

        info!(server_id = self.server_id, position = %self.start, "starting replication stream");
        let mut stream = conn
            .get_binlog_stream(
                BinlogStreamRequest::new(self.server_id)
                    .with_gtid()
                    .with_gtid_set(sids),
            )
            .await
            .context("requesting binlog stream")?;

        let mut executed = self.start.clone();
        let mut active_gtid: Option<(String, u64)> = None;
        let mut coordinate = BinlogCoordinate::default();

        while let Some(event) = stream.next().await {
            let event =
                event.with_context(|| format!("reading binlog event after {coordinate}"))?;
            let timestamp = DateTime::from_timestamp(i64::from(event.header().timestamp()), 0)
                .unwrap_or_else(Utc::now);
            coordinate.advance(event.header().log_pos());
            let Some(data) = event
                .read_data()
                .with_context(|| format!("decoding binlog event at {coordinate}"))?
            else {
                continue;
            };

            match data {
                EventData::RotateEvent(rotate) => {
                    coordinate.rotate(&rotate.name(), rotate.position());
                    debug!(coordinate = %coordinate, "binlog rotate");
                }
                EventData::GtidEvent(gtid) => {
                    let uuid = Uuid::from_bytes(gtid.sid()).hyphenated().to_string();
                    active_gtid = Some((uuid, gtid.gno()));
                }
                EventData::XidEvent(_) => {
                    if !commit(&mut executed, &mut active_gtid, &tx).await {
                        return Ok(());
                    }
                }
                EventData::QueryEvent(query) => {
                    let schema = query.schema().to_string();
                    let statement = query.query().to_string();
                    if ddl::is_transaction_marker(&statement) {
                        if statement.trim().eq_ignore_ascii_case("COMMIT")
                            && !commit(&mut executed, &mut active_gtid, &tx).await
                        {
                            return Ok(());
                        }
                        continue;
                    }
                    if !self
                        .handle_statement(&schema, &statement, &mut executed, &mut active_gtid, &tx)
                        .await?
                    {
                        return Ok(());
                    }
                }
                EventData::RowsEvent(rows) => {
                    let action = match &rows {
                        RowsEventData::WriteRowsEvent(_) | RowsEventData::WriteRowsEventV1(_) => {
                            DmlAction::Insert
                        }
                        RowsEventData::UpdateRowsEvent(_) | RowsEventData::UpdateRowsEventV1(_) => {
                            DmlAction::Update
                        }
                        RowsEventData::DeleteRowsEvent(_) | RowsEventData::DeleteRowsEventV1(_) => {
                            DmlAction::Delete
                        }
                        other => {
                            warn!(event = ?other, "unsupported rows event kind skipped");
                            continue;
                        }
                    };
                    let tme = stream.get_tme(rows.table_id()).ok_or_else(|| {
                        anyhow!("no table map for binlog table id {}", rows.table_id())
                    })?;
                    if !self.emit_rows(&rows, tme, action, timestamp, &tx).await? {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }

        info!("replication stream ended");
        Ok(())
    }

    /// Decode and forward one rows event. Returns false when downstream
    /// has gone away.
    async fn emit_rows(
        &self,
        rows: &RowsEventData<'_>,
        tme: &TableMapEvent<'_>,
        action: DmlAction,
        timestamp: DateTime<Utc>,
        tx: &mpsc::Sender<Msg>,
    ) -> Result<bool> {
        let source_id = TableId::new(
            tme.database_name().to_string(),
            tme.table_name().to_string(),
        );
        let Some(table) = self.registry.get(&source_id) else {
            // row traffic on untracked tables is routine
            return Ok(true);
        };

        for row in rows.rows(tme) {
            let (before, after) = row
                .with_context(|| format!("decoding row image for {source_id}"))?;
            let msg = match action {
                DmlAction::Update => {
                    let before = before
                        .ok_or_else(|| anyhow!("update for {source_id} lacks a before image"))?;
                    let after = after
                        .ok_or_else(|| anyhow!("update for {source_id} lacks an after image"))?;
                    self.dml(&table, action, &after, Some(&before), timestamp)?
                }
                DmlAction::Delete => {
                    let before = before
                        .ok_or_else(|| anyhow!("delete for {source_id} lacks a row image"))?;
                    self.dml(&table, action, &before, None, timestamp)?
                }
                _ => {
                    let after = after
                        .ok_or_else(|| anyhow!("insert for {source_id} lacks a row image"))?;
                    self.dml(&table, action, &after, None, timestamp)?
                }
            };
            if tx.send(Msg::Dml(msg)).await.is_err() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn dml(
        &self,
        table: &Table,
        action: DmlAction,
        data: &mysql_async::binlog::row::BinlogRow,
        old: Option<&mysql_async::binlog::row::BinlogRow>,
        timestamp: DateTime<Utc>,
    ) -> Result<DmlMsg> {
        Ok(DmlMsg {
            table: table.id.clone(),
            action,
            data: row_to_values(data, table)?,
            old: old.map(|row| row_to_values(row, table)).transpose()?,
            schema_version: table.version,
            timestamp,
        })
    }

    /// Apply one statement to the registry. Returns false when downstream
    /// has gone away; statements the parser cannot account for as DDL are
    /// skipped, registry failures and malformed DDL are fatal.
    async fn handle_statement(
        &self,
        schema: &str,
        statement: &str,
        executed: &mut GtidSet,
        active_gtid: &mut Option<(String, u64)>,
        tx: &mpsc::Sender<Msg>,
    ) -> Result<bool> {
        let deltas = match ddl::parse(statement, schema) {
            Ok(deltas) => deltas,
            Err(DdlError::UnsupportedStatement { keyword, .. }) => {
                debug!(keyword, "statement kind does not affect schema, skipped");
                return Ok(true);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("parsing statement: {statement}"));
            }
        };

        for delta in deltas {
            let applied = self
                .registry
                .apply_ddl(&delta)
                .with_context(|| format!("applying schema change: {}", delta.sql))?;
            match applied {
                Applied::Changed(table) => {
                    info!(table = %delta.table, version = table.version, sql = %delta.sql, "schema changed");
                    let msg = Msg::Ddl(DdlMsg {
                        delta,
                        table: Some(table),
                    });
                    if tx.send(msg).await.is_err() {
                        return Ok(false);
                    }
                }
                Applied::Dropped => {
                    warn!(table = %delta.table, "tracked table dropped, tracking removed");
                    let msg = Msg::Ddl(DdlMsg { delta, table: None });
                    if tx.send(msg).await.is_err() {
                        return Ok(false);
                    }
                }
                Applied::Shadow => {
                    debug!(table = %delta.table, "online schema-change staging activity recorded");
                }
                Applied::Noop | Applied::Skipped => {}
            }
        }

        // a DDL statement implicitly commits its transaction
        Ok(commit(executed, active_gtid, tx).await)
    }
}

/// Fold the active transaction into the executed set and emit the control
/// message. Returns false when downstream has gone away.
async fn commit(
    executed: &mut GtidSet,
    active_gtid: &mut Option<(String, u64)>,
    tx: &mpsc::Sender<Msg>,
) -> bool {
    if let Some((uuid, gno)) = active_gtid.take() {
        executed.add(&uuid, gno);
    }
    tx.send(Msg::Ctl {
        position: executed.to_string(),
    })
    .await
    .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_tracks_rotate_and_event_positions() {
        let mut coordinate = BinlogCoordinate::default();
        assert_eq!(coordinate.to_string(), "(before first rotate)");

        coordinate.rotate("binlog.000007", 4);
        assert_eq!(coordinate.to_string(), "binlog.000007:4");

        coordinate.advance(1534);
        assert_eq!(coordinate.to_string(), "binlog.000007:1534");

        // artificial events carry no position
        coordinate.advance(0);
        assert_eq!(coordinate.to_string(), "binlog.000007:1534");

        coordinate.rotate("binlog.000008", 4);
        assert_eq!(coordinate.to_string(), "binlog.000008:4");
    }
}
