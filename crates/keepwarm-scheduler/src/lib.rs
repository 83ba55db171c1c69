//! keepwarm-scheduler — the ping scheduling engine.
//!
//! Maintains one armed timer per active target and drives the
//! probe → reschedule cycle. Each target runs as an independent background
//! task, so a slow probe against one endpoint never delays another's
//! schedule.
//!
//! # Architecture
//!
//! ```text
//! SchedulerCore
//!   ├── TargetStore (persisted target records)
//!   ├── Prober (one-shot HTTP probes)
//!   ├── DelaySource (uniform random draw over [interval_min, interval_max])
//!   └── Per-target slot
//!       ├── background task: sleep → probe → apply outcome → re-arm
//!       ├── cancel channel (pause/delete)
//!       └── probing flag (in-flight probes are drained, never aborted)
//! ```
//!
//! # Auto-pause
//!
//! Five consecutive probe failures flip a target to inactive and drop its
//! timer. A single success resets the counter. Probe failures are absorbed
//! into this state machine and never surfaced to callers; the only
//! externally visible errors are bad add-time configuration and unknown
//! target ids.

pub mod error;
pub mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{AUTO_PAUSE_THRESHOLD, DelaySource, SchedulerCore, uniform_delay};
