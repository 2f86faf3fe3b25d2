//! Pipeline assembly and lifecycle.
//!
//! # Architecture
//!
//! Three tasks connected by two bounded queues, plus a periodic position
//! saver:
//!
//! ```text
//! BinlogSource --10240--> TransformChain --10240--> SinkEngine
//!                                                       |
//!                               PositionTracker <-------+
//! ```
//!
//! Shutdown is a drain: stopping the source closes the first queue, the
//! transform stage forwards what is in flight and closes the second, and
//! the sink flushes its buffers and saves the position once more. The
//! same cascade runs when the sink fails fatally, except the position
//! stops at the last fully written batch.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use mysql_async::{Conn, Opts};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

use checkpoint::{FilesystemStore, PositionStore, PositionTracker};
use mysql_binlog_source::{current_position, load_table, BinlogSource, GtidSet};
use mysql_schema::SchemaRegistry;
use mysql_sink::MysqlSink;
use sync_core::{Routers, SinkEngine};

use crate::config::{Config, OutputConfig};
use crate::metrics::PipelineMetrics;
use crate::transform::TransformChain;

/// Bound of each inter-stage queue, in messages.
const CHANNEL_CAPACITY: usize = 10_240;

/// How often the current position is persisted outside of flushes.
const SAVE_INTERVAL: Duration = Duration::from_secs(3);

pub async fn run(config: Config) -> Result<()> {
    let source_opts = Opts::from_url(&config.input.url).context("parsing input url")?;
    let OutputConfig::Mysql {
        url: output_url,
        buffering,
    } = &config.output;
    let sink_opts = Opts::from_url(output_url).context("parsing output url")?;

    let metrics = Arc::new(PipelineMetrics::new());
    let mut routers = Routers::new(config.router_specs()?)?;
    let chain = TransformChain::from_config(&config.transforms, metrics.clone())?;

    // one setup connection seeds the registry and resolves the start position
    let mut conn = Conn::new(source_opts.clone())
        .await
        .context("connecting to source database")?;
    let registry = Arc::new(SchemaRegistry::new());
    for id in routers.source_ids() {
        let table = load_table(&mut conn, &id)
            .await
            .with_context(|| format!("loading source table {id}"))?;
        if let Some(router) = routers.get_mut(&id) {
            router.load_source(&table);
        }
        registry.load(table);
    }
    // transforms see the source columns, targets see the transformed ones
    chain.rewrite_routers(&mut routers);

    let sink = Arc::new(MysqlSink::new(sink_opts));
    for router in routers.iter_mut() {
        let columns = sink.target_columns(&router.target).await?;
        router.load_target_columns(Some(columns));
        router.build_mapping();
    }

    let store = Arc::new(FilesystemStore::new(config.checkpoint_dir.as_str()));
    let position = match store.load(&config.name).await? {
        Some(stored) => {
            info!(position = %stored.position, saved_at = %stored.updated_at, "resuming from checkpoint");
            stored.position
        }
        None => match &config.start_gtid {
            Some(gtid) => {
                info!(position = %gtid, "no checkpoint, starting from configured position");
                gtid.clone()
            }
            None => {
                let live = current_position(&mut conn).await?;
                info!(position = %live, "no checkpoint, starting from the server's current position");
                live
            }
        },
    };
    let start = GtidSet::parse(&position)
        .with_context(|| format!("parsing start position {position:?}"))?;
    let tracker = Arc::new(PositionTracker::new(store, config.name.clone(), position));
    conn.disconnect().await.context("closing setup connection")?;

    let (tx_raw, rx_raw) = mpsc::channel(CHANNEL_CAPACITY);
    let (tx_ready, rx_ready) = mpsc::channel(CHANNEL_CAPACITY);

    let server_id = config.input.server_id.unwrap_or_else(|| {
        let id = rand::rng().random_range(1001..=2000);
        info!(server_id = id, "no server-id configured, using a random one");
        id
    });
    let source = BinlogSource::new(source_opts, server_id, start, registry.clone());
    let engine = SinkEngine::new(
        sink,
        Arc::new(routers),
        tracker.clone(),
        metrics.clone(),
        buffering.to_buffering(),
    );

    let source_task = tokio::spawn(source.run(tx_raw));
    let transform_task = tokio::spawn(chain.run(rx_raw, tx_ready));
    let sink_task = tokio::spawn(engine.run(rx_ready));
    let saver = tokio::spawn({
        let tracker = tracker.clone();
        async move { tracker.run_periodic_save(SAVE_INTERVAL).await }
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "shutdown signal listener failed");
            std::future::pending::<()>().await;
        }
    };
    run_stages(source_task, transform_task, sink_task, saver, shutdown).await?;

    metrics.report();
    info!(position = %tracker.current(), "pipeline stopped");
    Ok(())
}

/// Supervise the stage tasks until the stream ends, a stage fails, or
/// `shutdown` resolves.
///
/// The source only notices closed channels when traffic arrives, so a sink
/// or saver failure (or a signal) must cancel it explicitly to start the
/// drain. A periodic-save failure is fatal on the spot: streaming on with
/// an unwritable restart point would silently widen the replay window.
async fn run_stages(
    mut source_task: JoinHandle<Result<()>>,
    transform_task: JoinHandle<Result<()>>,
    mut sink_task: JoinHandle<Result<()>>,
    mut saver: JoinHandle<Result<()>>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let mut early_sink_result = None;
    let mut early_saver_result = None;
    let source_result = tokio::select! {
        () = shutdown => {
            info!("shutdown signal received, draining in-flight messages");
            cancel(source_task).await
        }
        result = &mut source_task => flatten(result),
        result = &mut sink_task => {
            early_sink_result = Some(flatten(result));
            cancel(source_task).await
        }
        result = &mut saver => {
            early_saver_result = Some(flatten(result));
            cancel(source_task).await
        }
    };

    let transform_result = flatten(transform_task.await);
    let sink_result = match early_sink_result {
        Some(result) => result,
        None => flatten(sink_task.await),
    };
    let saver_result = match early_saver_result {
        Some(result) => result,
        None => cancel(saver).await,
    };

    source_result.context("replication source failed")?;
    transform_result.context("transform stage failed")?;
    sink_result.context("sink stage failed")?;
    saver_result.context("periodic position save failed")?;
    Ok(())
}

async fn cancel(task: JoinHandle<Result<()>>) -> Result<()> {
    task.abort();
    match task.await {
        Err(e) if e.is_cancelled() => Ok(()),
        other => flatten(other),
    }
}

fn flatten(result: Result<Result<()>, JoinError>) -> Result<()> {
    match result {
        Ok(inner) => inner,
        Err(e) => Err(anyhow!(e).context("pipeline task panicked")),
    }
}
