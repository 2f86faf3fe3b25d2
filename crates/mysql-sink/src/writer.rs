//! MySQL implementation of the sink writer contract.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Opts, Params, Pool};
use tracing::debug;

use mysql_schema::TableId;
use sync_core::{SinkBatch, SinkWriter};

use crate::sql;

pub struct MysqlSink {
    pool: Pool,
}

impl MysqlSink {
    pub fn new(opts: Opts) -> MysqlSink {
        MysqlSink {
            pool: Pool::new(opts),
        }
    }

    /// Ordered column names of a target table, for mapping construction.
    pub async fn target_columns(&self, id: &TableId) -> Result<Vec<String>> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .context("connecting to target database")?;
        let columns: Vec<String> = conn
            .exec(
                "SELECT column_name FROM information_schema.columns \
                 WHERE table_schema = ? AND table_name = ? \
                 ORDER BY ordinal_position",
                (&id.schema, &id.name),
            )
            .await
            .with_context(|| format!("introspecting target table {id}"))?;
        if columns.is_empty() {
            bail!("target table {id} does not exist");
        }
        Ok(columns)
    }
}

#[async_trait]
impl SinkWriter for MysqlSink {
    async fn write_batch(&self, batch: SinkBatch<'_>) -> Result<()> {
        let mapper = &batch.router.mapper;
        let target = &batch.router.target;
        let mut conn = self
            .pool
            .get_conn()
            .await
            .context("connecting to target database")?;

        for run in sql::split_runs(batch.messages) {
            if sql::is_delete(&run[0]) {
                for (stmt, params) in sql::build_deletes(target, mapper, run)? {
                    conn.exec_drop(&stmt, Params::Positional(params))
                        .await
                        .with_context(|| format!("deleting from {target}"))?;
                }
            } else {
                let (stmt, params) = sql::build_upsert(target, mapper, run)?;
                conn.exec_drop(&stmt, Params::Positional(params))
                    .await
                    .with_context(|| format!("upserting into {target}"))?;
            }
            debug!(table = %target, rows = run.len(), "run written");
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool
            .clone()
            .disconnect()
            .await
            .context("closing target connection pool")
    }
}
