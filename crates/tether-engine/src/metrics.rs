//! Per-tick metrics and cumulative counters for the bridge.
//!
//! [`TickMetrics`] captures timing and volume data for a single tick;
//! [`BridgeCounters`] accumulates faults and commit totals for the
//! bridge's lifetime.

use tether_core::{RealmId, TickId};

/// Timing and volume metrics collected during a single tick.
///
/// All durations are in microseconds.
#[derive(Clone, Debug, Default)]
pub struct TickMetrics {
    /// The tick these metrics describe.
    pub tick: TickId,
    /// Seconds handed to every realm's step (after clamping).
    pub elapsed_secs: f32,
    /// Wall-clock time for the entire tick, in microseconds.
    pub total_us: u64,
    /// Realms whose context was stepped.
    pub realms_stepped: usize,
    /// Realms skipped (enumeration fault, faulted, or unregistered).
    pub realms_skipped: usize,
    /// Objects seen across all enumerations.
    pub objects_visited: usize,
    /// Batch hooks invoked.
    pub types_updated: usize,
    /// Additions staged by batch hooks this tick.
    pub staged_additions: usize,
    /// Removals staged by batch hooks this tick.
    pub staged_removals: usize,
    /// Per-realm step times: `(realm, microseconds)`.
    pub step_us: Vec<(RealmId, u64)>,
    /// Time spent in the end-of-tick commit, in microseconds.
    pub commit_us: u64,
}

/// Cumulative counters over the bridge's lifetime.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BridgeCounters {
    /// Realm enumerations that failed and were retried next tick.
    pub enumeration_faults: u64,
    /// Realms that became faulted during a step.
    pub realm_faults: u64,
    /// Realms reported by the scene graph but never registered.
    pub unregistered_realm_skips: u64,
    /// Commits that applied at least one mutation.
    pub commits: u64,
    /// Objects newly registered by commits.
    pub committed_additions: u64,
    /// Objects removed by commits.
    pub committed_removals: u64,
    /// Staged mutations dropped because their realm was unknown.
    pub dropped_mutations: u64,
    /// Staged removals ignored because the object was never registered.
    pub unregistered_removals: u64,
}
