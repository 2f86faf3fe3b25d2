//! MySQL target for the sync pipeline.
//!
//! Writes each flushed batch with bulk upserts and keyed deletes, in the
//! order the batch arrived. Statements are idempotent so a retried batch
//! converges to the same target state.

pub mod sql;
pub mod writer;

pub use writer::MysqlSink;
