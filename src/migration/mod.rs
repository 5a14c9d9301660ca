//! Schema migration engine.
//!
//! Versioned `.up.sql`/`.down.sql` pairs are discovered on disk, checksum
//! validated against the tracking table, and executed forward or backward
//! inside per-migration transactions. Scripts are split into statements by
//! a splitter that understands quoting and comments.

pub mod files;
pub mod runner;
pub mod splitter;
pub mod types;

pub use runner::{MigrationError, Runner};
pub use splitter::{count_statements, split_statements};
pub use types::{
    ChecksumAlgorithm, Direction, HealthStatus, Migration, MigrationConfig, MigrationResult,
    MigrationStatus,
};
