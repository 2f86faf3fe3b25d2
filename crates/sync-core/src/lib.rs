//! Core pipeline types for binlog-sync.
//!
//! This crate provides the pieces shared by every source and sink:
//!
//! - [`Msg`] - the discriminated message type flowing through the pipeline
//! - [`Router`] / [`ColumnsMapper`] - source-to-target table and column mapping
//! - [`SinkWriter`] / [`SinkEngine`] - the batching, retry, and
//!   checkpoint-after-success contract every downstream target shares
//! - [`MetricsSink`] - injected counters for messages read and written
//!
//! # Architecture
//!
//! ```text
//! mysql-binlog-source ──queue──> transform chain ──queue──> SinkEngine
//!        (produces Msg)             (mutates Msg)          (SinkWriter impl)
//! ```
//!
//! The engine buffers DML messages per (table, schema version) so a batch is
//! always written against the exact schema snapshot its rows were decoded
//! with, and advances the checkpoint only after every bucket of a flush has
//! been written.

pub mod metrics;
pub mod msg;
pub mod router;
pub mod sink;

pub use metrics::{MetricsSink, NoopMetrics};
pub use msg::{DdlMsg, DmlAction, DmlMsg, Msg, RowValue};
pub use router::{ColumnsMapper, Router, RouterSpec, Routers};
pub use sink::{SinkBatch, SinkBuffering, SinkEngine, SinkWriter};
