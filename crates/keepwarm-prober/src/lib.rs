//! keepwarm-prober — one-shot HTTP probes for KeepWarm targets.
//!
//! A probe is a single outbound request against a target's URL, bounded by
//! a fixed timeout. The prober classifies the transport outcome and nothing
//! else: any response, even a 404, proves the endpoint is reachable and
//! counts as success, while connect errors, DNS failures, and timeouts
//! count as failure.
//!
//! The prober never touches the target record; the scheduler applies the
//! outcome to persisted state.

pub mod prober;

pub use prober::{DEFAULT_TIMEOUT, Outcome, Prober, USER_AGENT};
