//! binlog-sync wires a MySQL replication source, a transform chain, and a
//! batching sink into one checkpointed pipeline. The library surface
//! exists so integration tests can assemble the same pieces the binary
//! does.

pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod transform;

pub use config::Config;
pub use metrics::PipelineMetrics;
pub use transform::{DeleteColumnTransform, RenameColumnTransform, Transform, TransformChain};
