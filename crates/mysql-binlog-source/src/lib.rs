//! MySQL change-data capture over the replication protocol.
//!
//! Connects as a replica, decodes row and statement events against the
//! shared schema registry, and forwards typed messages downstream. GTID
//! mode is required; positions travel as `gtid_executed` set strings.

pub mod gtid;
pub mod introspect;
pub mod rows;
pub mod source;

pub use gtid::GtidSet;
pub use introspect::{current_position, load_table};
pub use source::BinlogSource;
