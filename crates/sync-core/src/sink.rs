//! Output sink contract and the shared batching engine.
//!
//! # Architecture
//!
//! Every downstream target implements [`SinkWriter`]: write one batch of
//! row changes for one (table, schema version), retryably. Everything the
//! targets must share exactly lives in [`SinkEngine`]:
//!
//! - buffering keyed by (table identity, schema version)
//! - flush on batch size, on a periodic timer, and on shutdown
//! - per-bucket ordering as produced upstream
//! - retries with linearly increasing backoff, escalating to fatal
//! - checkpoint advancement only after every bucket of a flush succeeded

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use checkpoint::PositionTracker;
use mysql_schema::TableId;

use crate::metrics::MetricsSink;
use crate::msg::{DmlMsg, Msg};
use crate::router::{Router, Routers};

/// One flush unit: in-order messages for one table at one schema version,
/// with the column mapping resolved for that table.
#[derive(Clone, Copy)]
pub struct SinkBatch<'a> {
    pub table: &'a TableId,
    pub schema_version: u64,
    pub router: &'a Router,
    pub messages: &'a [DmlMsg],
}

/// Write half of a downstream target. `write_batch` must be safely
/// retryable; the engine re-submits the identical batch on failure.
#[async_trait]
pub trait SinkWriter: Send + Sync {
    async fn write_batch(&self, batch: SinkBatch<'_>) -> Result<()>;

    /// Release the downstream connection. Called once after the final flush.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Batching and retry parameters shared by every sink, composed into each
/// sink's own configuration.
#[derive(Debug, Clone)]
pub struct SinkBuffering {
    /// Buffered-message count that triggers a flush.
    pub batch_size: usize,
    /// Upper bound on how long a message sits buffered.
    pub flush_interval: Duration,
    /// Write attempts per bucket before the failure becomes fatal.
    pub retry_count: u32,
    /// Delay before attempt n is `retry_base_delay * n`.
    pub retry_base_delay: Duration,
}

impl Default for SinkBuffering {
    fn default() -> Self {
        Self {
            batch_size: 10240,
            flush_interval: Duration::from_millis(100),
            retry_count: 3,
            retry_base_delay: Duration::from_secs(5),
        }
    }
}

pub struct SinkEngine {
    writer: Arc<dyn SinkWriter>,
    routers: Arc<Routers>,
    tracker: Arc<PositionTracker>,
    metrics: Arc<dyn MetricsSink>,
    buffering: SinkBuffering,
}

impl SinkEngine {
    pub fn new(
        writer: Arc<dyn SinkWriter>,
        routers: Arc<Routers>,
        tracker: Arc<PositionTracker>,
        metrics: Arc<dyn MetricsSink>,
        buffering: SinkBuffering,
    ) -> SinkEngine {
        SinkEngine {
            writer,
            routers,
            tracker,
            metrics,
            buffering,
        }
    }

    /// Consume messages until the channel closes, then perform a final
    /// flush, release the writer, and save the position once more.
    pub async fn run(self, mut rx: mpsc::Receiver<Msg>) -> Result<()> {
        let mut buckets: HashMap<(TableId, u64), Vec<DmlMsg>> = HashMap::new();
        let mut pending = 0usize;
        let mut position = String::new();

        let mut ticker = tokio::time::interval(self.buffering.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(Msg::Dml(msg)) => {
                        buckets
                            .entry((msg.table.clone(), msg.schema_version))
                            .or_default()
                            .push(msg);
                        pending += 1;
                        if pending >= self.buffering.batch_size {
                            self.flush(&mut buckets, &mut pending, &position).await?;
                        }
                    }
                    Some(Msg::Ctl { position: p }) => position = p,
                    Some(Msg::Ddl(ddl)) => {
                        info!(table = %ddl.delta.table, sql = %ddl.delta.sql, "schema change observed downstream");
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    self.flush(&mut buckets, &mut pending, &position).await?;
                }
            }
        }

        self.flush(&mut buckets, &mut pending, &position).await?;
        self.writer.close().await?;
        self.tracker.save().await?;
        Ok(())
    }

    /// Write out every bucket, then advance the position. Buckets flush in
    /// arbitrary relative order; messages within a bucket keep their order.
    async fn flush(
        &self,
        buckets: &mut HashMap<(TableId, u64), Vec<DmlMsg>>,
        pending: &mut usize,
        position: &str,
    ) -> Result<()> {
        if *pending > 0 {
            debug!(messages = *pending, buckets = buckets.len(), "flushing");
        }
        for ((table, version), messages) in buckets.drain() {
            let router = self
                .routers
                .get(&table)
                .ok_or_else(|| anyhow!("no router configured for table {table}"))?;
            self.write_with_retry(SinkBatch {
                table: &table,
                schema_version: version,
                router,
                messages: &messages,
            })
            .await?;
            self.metrics.incr_written(messages.len() as u64);
        }
        *pending = 0;
        // the position advances on every flush, including an empty one:
        // a quiet table must not pin the restart point in the past
        if !position.is_empty() {
            self.tracker.update(position);
        }
        Ok(())
    }

    async fn write_with_retry(&self, batch: SinkBatch<'_>) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.writer.write_batch(batch).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.buffering.retry_count.max(1) => {
                    return Err(e.context(format!(
                        "sink write for {} failed after {attempt} attempts",
                        batch.table
                    )));
                }
                Err(e) => {
                    let delay = self.buffering.retry_base_delay * attempt;
                    warn!(
                        table = %batch.table,
                        attempt,
                        error = %e,
                        "sink write failed, retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NoopMetrics;
    use crate::msg::{DmlAction, RowValue};
    use crate::router::RouterSpec;
    use chrono::Utc;
    use checkpoint::{MemoryStore, PositionStore};
    use mysql_schema::{Column, ColumnType, Table};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockWriter {
        batches: Mutex<Vec<(TableId, u64, Vec<String>)>>,
        fail_remaining: AtomicUsize,
        attempts: AtomicUsize,
    }

    impl MockWriter {
        fn failing(times: usize) -> MockWriter {
            MockWriter {
                fail_remaining: AtomicUsize::new(times),
                ..MockWriter::default()
            }
        }

        fn recorded(&self) -> Vec<(TableId, u64, Vec<String>)> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SinkWriter for MockWriter {
        async fn write_batch(&self, batch: SinkBatch<'_>) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self
                .fail_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                anyhow::bail!("injected write failure");
            }
            let ids = batch
                .messages
                .iter()
                .map(|m| match &m.data["id"] {
                    RowValue::Int(v) => v.to_string(),
                    other => format!("{other:?}"),
                })
                .collect();
            self.batches.lock().unwrap().push((
                batch.table.clone(),
                batch.schema_version,
                ids,
            ));
            Ok(())
        }
    }

    fn routers() -> Arc<Routers> {
        let id = TableId::new("db", "t");
        let mut routers = Routers::new(vec![RouterSpec {
            source: id.clone(),
            target: TableId::new("db", "t_out"),
            source_columns: vec![],
            target_columns: vec![],
        }])
        .unwrap();
        let mut table = Table::new(id.clone());
        table.columns = vec![Column {
            name: "id".to_string(),
            col_type: ColumnType::Number,
            raw_type: "bigint".to_string(),
            comment: String::new(),
            is_primary_key: true,
        }];
        let router = routers.get_mut(&id).unwrap();
        router.load_source(&table);
        router.load_target_columns(None);
        router.build_mapping();
        Arc::new(routers)
    }

    fn dml(version: u64, id: i64) -> Msg {
        Msg::Dml(DmlMsg {
            table: TableId::new("db", "t"),
            action: DmlAction::Insert,
            data: [("id".to_string(), RowValue::Int(id))].into(),
            old: None,
            schema_version: version,
            timestamp: Utc::now(),
        })
    }

    fn engine(writer: Arc<MockWriter>, buffering: SinkBuffering) -> (SinkEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let tracker = Arc::new(PositionTracker::new(store.clone(), "test", String::new()));
        (
            SinkEngine::new(writer, routers(), tracker, Arc::new(NoopMetrics), buffering),
            store,
        )
    }

    fn buffering(batch_size: usize) -> SinkBuffering {
        SinkBuffering {
            batch_size,
            flush_interval: Duration::from_secs(3600),
            retry_count: 3,
            retry_base_delay: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_on_batch_size_checkpoints_after_write() {
        let writer = Arc::new(MockWriter::default());
        let (engine, store) = engine(writer.clone(), buffering(2));
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(engine.run(rx));

        tx.send(Msg::Ctl {
            position: "uuid:1-5".to_string(),
        })
        .await
        .unwrap();
        tx.send(dml(1, 1)).await.unwrap();
        tx.send(dml(1, 2)).await.unwrap();
        drop(tx);
        handle.await.unwrap().unwrap();

        let recorded = writer.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].2, vec!["1", "2"]);
        let saved = store.load("test").await.unwrap().unwrap();
        assert_eq!(saved.position, "uuid:1-5");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flush_bounds_latency() {
        let writer = Arc::new(MockWriter::default());
        let (engine, _store) = engine(
            writer.clone(),
            SinkBuffering {
                batch_size: 10_000,
                flush_interval: Duration::from_millis(100),
                ..SinkBuffering::default()
            },
        );
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(engine.run(rx));

        tx.send(dml(1, 7)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(writer.recorded().len(), 1);
        drop(tx);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_buckets_keyed_by_schema_version() {
        let writer = Arc::new(MockWriter::default());
        let (engine, _store) = engine(writer.clone(), buffering(100));
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(engine.run(rx));

        tx.send(dml(1, 1)).await.unwrap();
        tx.send(dml(2, 2)).await.unwrap();
        tx.send(dml(1, 3)).await.unwrap();
        drop(tx);
        handle.await.unwrap().unwrap();

        let mut recorded = writer.recorded();
        recorded.sort_by_key(|(_, v, _)| *v);
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].1, 1);
        assert_eq!(recorded[0].2, vec!["1", "3"]);
        assert_eq!(recorded[1].1, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_retries_then_succeeds() {
        let writer = Arc::new(MockWriter::failing(1));
        let (engine, store) = engine(writer.clone(), buffering(1));
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(engine.run(rx));

        tx.send(Msg::Ctl {
            position: "uuid:1-9".to_string(),
        })
        .await
        .unwrap();
        tx.send(dml(1, 1)).await.unwrap();
        drop(tx);
        handle.await.unwrap().unwrap();

        assert_eq!(writer.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(writer.recorded().len(), 1);
        let saved = store.load("test").await.unwrap().unwrap();
        assert_eq!(saved.position, "uuid:1-9");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_is_fatal_and_leaves_position_behind() {
        let writer = Arc::new(MockWriter::failing(100));
        let (engine, store) = engine(writer.clone(), buffering(1));
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(engine.run(rx));

        tx.send(Msg::Ctl {
            position: "uuid:1-9".to_string(),
        })
        .await
        .unwrap();
        tx.send(dml(1, 1)).await.unwrap();
        drop(tx);
        let result = handle.await.unwrap();

        assert!(result.is_err());
        assert_eq!(writer.attempts.load(Ordering::SeqCst), 3);
        // the failed flush never advanced the position, so restart
        // redelivers instead of losing the batch
        assert!(store.load("test").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_control_only_stream_still_advances_position() {
        let writer = Arc::new(MockWriter::default());
        let (engine, store) = engine(writer.clone(), buffering(100));
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(engine.run(rx));

        tx.send(Msg::Ctl {
            position: "uuid:1-42".to_string(),
        })
        .await
        .unwrap();
        drop(tx);
        handle.await.unwrap().unwrap();

        assert!(writer.recorded().is_empty());
        let saved = store.load("test").await.unwrap().unwrap();
        assert_eq!(saved.position, "uuid:1-42");
    }
}
