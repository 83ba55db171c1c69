//! redb table definitions for the KeepWarm target store.
//!
//! A single table holds all targets, keyed by their numeric id with
//! JSON-serialized values. Keeping the key numeric makes id allocation a
//! `last()` lookup inside the create transaction.

use redb::TableDefinition;

/// Monitored targets keyed by `TargetId`.
pub const TARGETS: TableDefinition<u64, &[u8]> = TableDefinition::new("targets");
