//! SchedulerCore — one armed timer per active target.
//!
//! The `SchedulerCore` is the control loop that:
//! - Arms a background task per active target (sleep → probe → re-arm)
//! - Applies probe outcomes to the persisted record (counter reset or
//!   increment, auto-pause at the failure threshold)
//! - Exposes the control surface: add, pause, resume, delete, stats
//!
//! Mutations for a single target id are serialized through the slot-map
//! write lock; the probe itself runs outside any lock so one slow endpoint
//! never stalls the rest.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Mutex as AsyncMutex, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use keepwarm_prober::{Outcome, Prober};
use keepwarm_state::{NewTarget, Target, TargetId, TargetStats, TargetStore, epoch_secs};

use crate::error::{SchedulerError, SchedulerResult};

/// Consecutive failures before a target is auto-paused.
pub const AUTO_PAUSE_THRESHOLD: u32 = 5;

/// Smallest allowed interval bound, in seconds.
pub const INTERVAL_FLOOR_SECS: u64 = 5;

/// Largest allowed interval bound, in seconds.
pub const INTERVAL_CEIL_SECS: u64 = 600;

/// Draws the delay before the next probe from `[interval_min, interval_max]`.
///
/// Injectable so tests can pin the draw to a known (and fast) value.
pub type DelaySource = Arc<dyn Fn(u64, u64) -> Duration + Send + Sync>;

/// The default delay source: uniform random seconds over the closed range.
pub fn uniform_delay() -> DelaySource {
    Arc::new(|min, max| Duration::from_secs(rand::rng().random_range(min..=max)))
}

/// Per-target scheduling state held in memory.
struct TargetSlot {
    /// Handle to the background probe task.
    handle: JoinHandle<()>,
    /// Cancellation signal for this slot.
    cancel_tx: watch::Sender<bool>,
    /// Set while a probe is in flight; in-flight probes are drained rather
    /// than aborted, and the completion handler re-checks desired state.
    probing: Arc<AtomicBool>,
}

type SlotMap = Arc<RwLock<HashMap<TargetId, TargetSlot>>>;

/// Serializes probe execution per target id.
///
/// A probe left to drain after its slot was replaced (pause → resume while
/// in flight) holds the gate until it completes, so the fresh slot's timer
/// cannot start an overlapping probe for the same id.
type ProbeGate = Arc<AsyncMutex<()>>;

type ProbeGates = Arc<Mutex<HashMap<TargetId, Weak<AsyncMutex<()>>>>>;

/// Fetch (or create) the probe gate for a target id.
///
/// Gates are held weakly; entries whose tasks have all exited are dropped
/// on the way through.
fn probe_gate(gates: &ProbeGates, id: TargetId) -> ProbeGate {
    let mut map = gates.lock().unwrap();
    map.retain(|_, gate| gate.strong_count() > 0);
    if let Some(gate) = map.get(&id).and_then(Weak::upgrade) {
        return gate;
    }
    let gate = Arc::new(AsyncMutex::new(()));
    map.insert(id, Arc::downgrade(&gate));
    gate
}

/// The scheduling engine: owns the timer set and drives probes.
pub struct SchedulerCore {
    store: TargetStore,
    prober: Arc<Prober>,
    /// Armed targets: target id → slot.
    slots: SlotMap,
    /// Per-id probe gates, shared with draining probes of replaced slots.
    gates: ProbeGates,
    delay: DelaySource,
}

impl SchedulerCore {
    /// Create a scheduler with the default uniform-random delay source.
    pub fn new(store: TargetStore, prober: Prober) -> Self {
        Self {
            store,
            prober: Arc::new(prober),
            slots: Arc::new(RwLock::new(HashMap::new())),
            gates: Arc::new(Mutex::new(HashMap::new())),
            delay: uniform_delay(),
        }
    }

    /// Replace the delay source (for deterministic tests).
    pub fn with_delay_source(mut self, delay: DelaySource) -> Self {
        self.delay = delay;
        self
    }

    /// Arm every persisted target with `active == true`.
    ///
    /// Called once at process start. Each target gets a freshly drawn
    /// delay; `next_probe_at` from a previous run is not trusted.
    pub async fn start(&self) -> SchedulerResult<()> {
        let targets = self.store.list_active_targets()?;
        let count = targets.len();
        let mut slots = self.slots.write().await;
        for target in targets {
            self.arm_locked(&mut slots, target)?;
        }
        info!(count, "scheduler started, active targets armed");
        Ok(())
    }

    /// Disarm every slot (for graceful shutdown).
    pub async fn stop_all(&self) {
        let mut slots = self.slots.write().await;
        for (id, slot) in slots.drain() {
            let _ = slot.cancel_tx.send(true);
            slot.handle.abort();
            debug!(target_id = id, "target disarmed");
        }
        info!("scheduler stopped, all targets disarmed");
    }

    /// Validate, persist, and (if active) arm a new target.
    pub async fn add(&self, new: NewTarget) -> SchedulerResult<Target> {
        let new = validate(new)?;
        let target = self.store.create_target(&new)?;
        info!(target_id = target.id, url = %target.url, active = target.active, "target added");

        if !target.active {
            return Ok(target);
        }
        let mut slots = self.slots.write().await;
        self.arm_locked(&mut slots, target)
    }

    /// Stop probing a target without forgetting it.
    ///
    /// A pending timer is cancelled synchronously; an in-flight probe is
    /// left to drain and its outcome is discarded. The failure counter is
    /// left untouched — only `resume` resets it.
    pub async fn pause(&self, id: TargetId) -> SchedulerResult<()> {
        let mut slots = self.slots.write().await;
        let mut target = self.store.get_target(id)?.ok_or(SchedulerError::NotFound(id))?;
        target.active = false;
        target.next_probe_at = None;
        self.store.update_target(&target)?;
        if let Some(slot) = slots.remove(&id) {
            disarm_slot(slot);
        }
        info!(target_id = id, url = %target.url, "target paused");
        Ok(())
    }

    /// Reactivate a target: reset its failure counter and arm it with a
    /// freshly drawn delay.
    pub async fn resume(&self, id: TargetId) -> SchedulerResult<Target> {
        let mut slots = self.slots.write().await;
        let mut target = self.store.get_target(id)?.ok_or(SchedulerError::NotFound(id))?;
        target.active = true;
        target.consecutive_failures = 0;
        info!(target_id = id, url = %target.url, "target resumed");
        self.arm_locked(&mut slots, target)
    }

    /// Disarm and remove a target entirely.
    pub async fn delete(&self, id: TargetId) -> SchedulerResult<()> {
        let mut slots = self.slots.write().await;
        if !self.store.delete_target(id)? {
            return Err(SchedulerError::NotFound(id));
        }
        if let Some(slot) = slots.remove(&id) {
            disarm_slot(slot);
        }
        info!(target_id = id, "target deleted");
        Ok(())
    }

    /// Fetch a single target.
    pub fn get(&self, id: TargetId) -> SchedulerResult<Target> {
        self.store.get_target(id)?.ok_or(SchedulerError::NotFound(id))
    }

    /// List all targets.
    pub fn list(&self) -> SchedulerResult<Vec<Target>> {
        Ok(self.store.list_targets()?)
    }

    /// Aggregate counts: total / active / failing.
    pub fn stats(&self) -> SchedulerResult<TargetStats> {
        Ok(self.store.stats()?)
    }

    /// Target ids with an armed timer or in-flight probe.
    pub async fn armed_targets(&self) -> Vec<TargetId> {
        let slots = self.slots.read().await;
        slots.keys().copied().collect()
    }

    /// Whether a target currently has a slot.
    pub async fn is_armed(&self, id: TargetId) -> bool {
        let slots = self.slots.read().await;
        slots.contains_key(&id)
    }

    /// Draw a delay, persist `next_probe_at`, and spawn the probe task.
    ///
    /// Replace semantics: an existing slot for the id is cancelled before
    /// the new one is inserted. Caller holds the slot-map write lock.
    fn arm_locked(
        &self,
        slots: &mut HashMap<TargetId, TargetSlot>,
        mut target: Target,
    ) -> SchedulerResult<Target> {
        let delay = (self.delay)(target.interval_min, target.interval_max);
        target.next_probe_at = Some(epoch_secs() + delay.as_secs());
        self.store.update_target(&target)?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let probing = Arc::new(AtomicBool::new(false));
        let gate = probe_gate(&self.gates, target.id);
        let handle = tokio::spawn(run_target_loop(
            target.id,
            delay,
            self.store.clone(),
            self.prober.clone(),
            self.slots.clone(),
            self.delay.clone(),
            gate,
            probing.clone(),
            cancel_rx,
        ));

        if let Some(old) = slots.insert(
            target.id,
            TargetSlot {
                handle,
                cancel_tx,
                probing,
            },
        ) {
            // Replace an existing timer for this id.
            disarm_slot(old);
        }

        debug!(target_id = target.id, delay_secs = delay.as_secs(), "target armed");
        Ok(target)
    }
}

/// Cancel a slot. Pending timers are aborted outright; in-flight probes
/// are only flagged and drain on their own.
fn disarm_slot(slot: TargetSlot) {
    let _ = slot.cancel_tx.send(true);
    if !slot.probing.load(Ordering::SeqCst) {
        slot.handle.abort();
    }
}

/// Whether the slot this receiver belongs to has been cancelled or replaced.
fn cancelled(cancel: &watch::Receiver<bool>) -> bool {
    cancel.has_changed().unwrap_or(true) || *cancel.borrow()
}

/// The probe loop for a single target: sleep, probe, apply, re-arm.
#[allow(clippy::too_many_arguments)]
async fn run_target_loop(
    id: TargetId,
    mut delay: Duration,
    store: TargetStore,
    prober: Arc<Prober>,
    slots: SlotMap,
    delay_src: DelaySource,
    gate: ProbeGate,
    probing: Arc<AtomicBool>,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.changed() => {
                debug!(target_id = id, "timer cancelled before fire");
                return;
            }
        }

        // Snapshot for the probe itself; the outcome is applied against a
        // re-fetched record, never this copy.
        let snapshot = match store.get_target(id) {
            Ok(Some(t)) if t.active => t,
            Ok(_) => {
                // Deleted or paused between fire and fetch.
                let mut slots = slots.write().await;
                if !cancelled(&cancel) {
                    slots.remove(&id);
                }
                return;
            }
            Err(e) => {
                error!(target_id = id, error = %e, "failed to load target before probe, disarming");
                let mut slots = slots.write().await;
                if !cancelled(&cancel) {
                    slots.remove(&id);
                }
                return;
            }
        };

        let outcome = {
            // Waits here if a probe from a replaced slot is still draining;
            // at most one probe per id is ever in flight.
            let _inflight = gate.lock().await;
            probing.store(true, Ordering::SeqCst);
            let outcome = prober.probe(&snapshot).await;
            probing.store(false, Ordering::SeqCst);
            outcome
        };

        // Completion: serialize with control surface ops, then re-check
        // desired state — the target may have been paused or deleted while
        // the probe was in flight.
        let mut slots_guard = slots.write().await;
        if cancelled(&cancel) {
            debug!(target_id = id, "slot cancelled mid-probe, outcome discarded");
            return;
        }

        let mut target = match store.get_target(id) {
            Ok(Some(t)) => t,
            Ok(None) => {
                slots_guard.remove(&id);
                return;
            }
            Err(e) => {
                error!(target_id = id, error = %e, "failed to reload target after probe");
                slots_guard.remove(&id);
                return;
            }
        };
        if !target.active {
            slots_guard.remove(&id);
            return;
        }

        let now = epoch_secs();
        target.last_probe_at = Some(now);
        match &outcome {
            Outcome::Success { status, latency_ms } => {
                target.consecutive_failures = 0;
                target.last_status = Some(*status);
                debug!(target_id = id, url = %target.url, status, latency_ms, "probe succeeded");
            }
            Outcome::Failure { reason } => {
                target.consecutive_failures += 1;
                warn!(
                    target_id = id,
                    url = %target.url,
                    failures = target.consecutive_failures,
                    %reason,
                    "probe failed"
                );
            }
        }

        if target.consecutive_failures >= AUTO_PAUSE_THRESHOLD {
            target.active = false;
            target.next_probe_at = None;
            if let Err(e) = store.update_target(&target) {
                error!(target_id = id, error = %e, "failed to persist auto-pause");
            }
            slots_guard.remove(&id);
            warn!(
                target_id = id,
                url = %target.url,
                threshold = AUTO_PAUSE_THRESHOLD,
                "target auto-paused"
            );
            return;
        }

        delay = (delay_src)(target.interval_min, target.interval_max);
        target.next_probe_at = Some(now + delay.as_secs());
        if let Err(e) = store.update_target(&target) {
            error!(target_id = id, error = %e, "failed to persist probe outcome");
        }
    }
}

/// Normalize and validate creation parameters.
///
/// The URL is trimmed and loses any trailing slash; interval bounds must
/// sit inside `[INTERVAL_FLOOR_SECS, INTERVAL_CEIL_SECS]` with min <= max.
fn validate(new: NewTarget) -> SchedulerResult<NewTarget> {
    let url = new.url.trim().trim_end_matches('/').to_string();
    if url.is_empty() {
        return Err(SchedulerError::InvalidConfig("url must not be empty".into()));
    }
    let parsed =
        Url::parse(&url).map_err(|e| SchedulerError::InvalidConfig(format!("invalid url: {e}")))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(SchedulerError::InvalidConfig(format!(
            "unsupported scheme: {}",
            parsed.scheme()
        )));
    }

    for bound in [new.interval_min, new.interval_max] {
        if !(INTERVAL_FLOOR_SECS..=INTERVAL_CEIL_SECS).contains(&bound) {
            return Err(SchedulerError::InvalidConfig(format!(
                "interval bound {bound}s outside [{INTERVAL_FLOOR_SECS}, {INTERVAL_CEIL_SECS}]"
            )));
        }
    }
    if new.interval_min > new.interval_max {
        return Err(SchedulerError::InvalidConfig(format!(
            "interval_min {} > interval_max {}",
            new.interval_min, new.interval_max
        )));
    }

    Ok(NewTarget { url, ..new })
}
