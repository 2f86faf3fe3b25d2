//! Row transforms applied between source and sink.
//!
//! Transforms mutate row messages in flight and, at startup, rewrite the
//! router column lists so the write-time mapping matches the transformed
//! row shape. DDL and control messages pass through untouched.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{ensure, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use mysql_schema::TableId;
use sync_core::{DmlMsg, MetricsSink, Msg, Router, Routers, RowValue};

use crate::config::{parse_table_id, TransformConfig};

pub trait Transform: Send + Sync {
    fn table(&self) -> &TableId;

    /// Mutate one row message. Returning false drops the message.
    fn apply(&self, msg: &mut DmlMsg) -> bool;

    /// Rewrite the router's source-column view before mapping is built.
    fn rewrite_router(&self, router: &mut Router);
}

pub struct RenameColumnTransform {
    table: TableId,
    from: String,
    to: String,
}

impl Transform for RenameColumnTransform {
    fn table(&self) -> &TableId {
        &self.table
    }

    fn apply(&self, msg: &mut DmlMsg) -> bool {
        rename_in(&mut msg.data, &self.from, &self.to);
        if let Some(old) = msg.old.as_mut() {
            rename_in(old, &self.from, &self.to);
        }
        true
    }

    fn rewrite_router(&self, router: &mut Router) {
        router.rename_source_column(&self.from, &self.to);
    }
}

pub struct DeleteColumnTransform {
    table: TableId,
    column: String,
}

impl Transform for DeleteColumnTransform {
    fn table(&self) -> &TableId {
        &self.table
    }

    fn apply(&self, msg: &mut DmlMsg) -> bool {
        msg.data.remove(&self.column);
        if let Some(old) = msg.old.as_mut() {
            old.remove(&self.column);
        }
        true
    }

    fn rewrite_router(&self, router: &mut Router) {
        router.remove_source_column(&self.column);
    }
}

fn rename_in(values: &mut HashMap<String, RowValue>, from: &str, to: &str) {
    if let Some(value) = values.remove(from) {
        values.insert(to.to_string(), value);
    }
}

pub struct TransformChain {
    transforms: Vec<Box<dyn Transform>>,
    metrics: Arc<dyn MetricsSink>,
}

impl TransformChain {
    /// Expand the configured column lists into one transform per column,
    /// keeping declaration order.
    pub fn from_config(
        configs: &[TransformConfig],
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<TransformChain> {
        let mut transforms: Vec<Box<dyn Transform>> = Vec::new();
        for config in configs {
            match config {
                TransformConfig::RenameColumn {
                    table,
                    columns,
                    rename_as,
                } => {
                    ensure!(
                        columns.len() == rename_as.len(),
                        "rename-column for {table}: columns and rename-as must have equal \
                         length ({} vs {})",
                        columns.len(),
                        rename_as.len()
                    );
                    let table = parse_table_id(table)?;
                    for (from, to) in columns.iter().zip(rename_as) {
                        transforms.push(Box::new(RenameColumnTransform {
                            table: table.clone(),
                            from: from.clone(),
                            to: to.clone(),
                        }));
                    }
                }
                TransformConfig::DeleteColumn { table, columns } => {
                    let table = parse_table_id(table)?;
                    for column in columns {
                        transforms.push(Box::new(DeleteColumnTransform {
                            table: table.clone(),
                            column: column.clone(),
                        }));
                    }
                }
            }
        }
        Ok(TransformChain {
            transforms,
            metrics,
        })
    }

    /// Apply every transform's column rewrite to its router. Must run
    /// after source columns are loaded and before mappings are built.
    pub fn rewrite_routers(&self, routers: &mut Routers) {
        for transform in &self.transforms {
            if let Some(router) = routers.get_mut(transform.table()) {
                transform.rewrite_router(router);
            }
        }
    }

    /// Forward messages from `rx` to `tx`, transforming row messages in
    /// declaration order. Returns when either side closes.
    pub async fn run(self, mut rx: mpsc::Receiver<Msg>, tx: mpsc::Sender<Msg>) -> Result<()> {
        while let Some(msg) = rx.recv().await {
            let msg = match msg {
                Msg::Dml(mut dml) => {
                    let table = dml.table.clone();
                    let keep = self
                        .transforms
                        .iter()
                        .filter(|t| *t.table() == table)
                        .all(|t| t.apply(&mut dml));
                    if !keep {
                        debug!(table = %dml.table, "row message dropped by transform");
                        continue;
                    }
                    // dropped messages never count as processed
                    self.metrics.incr_read(1);
                    Msg::Dml(dml)
                }
                other => other,
            };
            if tx.send(msg).await.is_err() {
                info!("downstream closed, transform stage stopping");
                return Ok(());
            }
        }
        Ok(())
    }
}
