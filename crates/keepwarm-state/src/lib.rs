//! keepwarm-state — embedded target store for KeepWarm.
//!
//! Backed by [redb](https://docs.rs/redb), holds the persisted state of
//! every monitored target: its URL, probe configuration, failure counter,
//! and scheduling timestamps.
//!
//! # Architecture
//!
//! Targets are JSON-serialized into redb's `&[u8]` value column, keyed by
//! their numeric id. Ids are allocated monotonically inside the create
//! transaction, so they are unique and immutable for the life of the store.
//!
//! The `TargetStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::TargetStore;
pub use types::*;
