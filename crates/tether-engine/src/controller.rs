//! Single-threaded simulation loop controller.
//!
//! [`PhysicsBridge`] owns one [`RealmContext`] per registered realm and
//! drives the tick cycle. Each [`tick()`](PhysicsBridge::tick):
//!
//! 1. measures wall-clock time since the previous tick;
//! 2. for every realm the scene graph reports, enumerates its live
//!    objects, groups them by type, runs each type's batch hook (staging
//!    whatever structural changes it returns) and steps the context;
//! 3. under [`CommitPolicy::EveryTick`], drains the staging queue.
//!
//! # Ownership model
//!
//! `PhysicsBridge` is [`Send`] and all mutating methods take `&mut self`.
//! Other threads interact only through the cloneable [`StagingQueue`]
//! returned by [`staging()`](PhysicsBridge::staging) and the shared
//! [`EventNotifier`]; the background loop in
//! [`RealtimeBridge`](crate::RealtimeBridge) adds a control channel.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use tether_core::{
    LifecycleEvent, ObjectId, RealmId, SceneError, SceneGraph, SceneObject, SceneRealm,
    SceneType, StepError, TickId, TypeKey,
};

use crate::config::{BridgeConfig, CommitPolicy, ConfigError};
use crate::context::{AddReport, RealmContext};
use crate::metrics::{BridgeCounters, TickMetrics};
use crate::notifier::EventNotifier;
use crate::staging::StagingQueue;

// Compile-time assertion: PhysicsBridge can move onto the loop thread.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<PhysicsBridge>();
    }
};

// ── BridgeError ─────────────────────────────────────────────────

/// Errors from realm and object lifecycle operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The realm was never registered, or has been removed.
    #[error("{realm} is not registered")]
    UnknownRealm {
        /// The realm named by the caller.
        realm: RealmId,
    },
    /// The realm's objects could not be enumerated during registration.
    #[error("{realm} could not be registered: {source}")]
    Scene {
        /// The realm being registered.
        realm: RealmId,
        /// The scene graph's error.
        #[source]
        source: SceneError,
    },
}

// ── Reports ─────────────────────────────────────────────────────

/// Outcome of one [`PhysicsBridge::commit()`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Realms with at least one staged mutation applied.
    pub realms: usize,
    /// Objects newly registered (and forwarded, and announced).
    pub additions: usize,
    /// Objects removed (and forwarded, and announced).
    pub removals: usize,
    /// Mutations dropped because their realm is not registered.
    pub dropped: usize,
    /// Staged removals of objects the realm's context never registered.
    /// They are neither forwarded nor announced.
    pub unregistered_removals: usize,
}

impl CommitReport {
    /// Whether the commit changed nothing.
    pub fn is_empty(&self) -> bool {
        self.additions == 0 && self.removals == 0
    }
}

/// Outcome of one tick.
#[derive(Clone, Debug, Default)]
pub struct TickReport {
    /// Timing and volume for this tick.
    pub metrics: TickMetrics,
    /// Realms that faulted during this tick. They are skipped from now
    /// on until re-registered with [`PhysicsBridge::add_realm`].
    pub faults: Vec<(RealmId, StepError)>,
    /// The end-of-tick commit, under [`CommitPolicy::EveryTick`].
    pub commit: Option<CommitReport>,
}

// ── PhysicsBridge ───────────────────────────────────────────────

struct RealmSlot {
    realm: Arc<dyn SceneRealm>,
    context: RealmContext,
}

type TypeGroups = IndexMap<TypeKey, (Arc<dyn SceneType>, SmallVec<[Arc<dyn SceneObject>; 8]>)>;

/// Keeps one physics world per realm in step with the scene graph.
///
/// # Example
///
/// ```ignore
/// let mut bridge = PhysicsBridge::new(scene, BridgeConfig::default())?;
/// bridge.load_world();
/// loop {
///     let report = bridge.tick();
///     for (realm, fault) in &report.faults {
///         eprintln!("{realm}: {fault}");
///     }
/// }
/// ```
pub struct PhysicsBridge {
    scene: Arc<dyn SceneGraph>,
    config: BridgeConfig,
    realms: IndexMap<RealmId, RealmSlot>,
    staging: StagingQueue,
    notifier: Arc<EventNotifier>,
    last_tick: Option<Instant>,
    current_tick: TickId,
    counters: BridgeCounters,
    last_metrics: TickMetrics,
}

impl PhysicsBridge {
    /// Validate `config` and create a bridge with no realms registered.
    pub fn new(scene: Arc<dyn SceneGraph>, config: BridgeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            scene,
            config,
            realms: IndexMap::new(),
            staging: StagingQueue::new(),
            notifier: Arc::new(EventNotifier::new()),
            last_tick: None,
            current_tick: TickId(0),
            counters: BridgeCounters::default(),
            last_metrics: TickMetrics::default(),
        })
    }

    // ── Realm lifecycle ─────────────────────────────────────────

    /// Register every realm the scene graph currently reports.
    ///
    /// Realms already registered are left alone. Realms whose objects
    /// cannot be enumerated are logged and skipped. Returns how many
    /// realms were registered.
    pub fn load_world(&mut self) -> usize {
        let mut loaded = 0;
        for realm in self.scene.realms() {
            if self.realms.contains_key(&realm.id()) {
                continue;
            }
            match self.add_realm(realm) {
                Ok(_) => loaded += 1,
                Err(e) => warn!(error = %e, "realm skipped during world load"),
            }
        }
        info!(realms = loaded, "world loaded");
        loaded
    }

    /// Register a realm: build a fresh context holding its current objects.
    ///
    /// Registering an already-registered realm discards the old context
    /// and builds a new one; this is how a faulted realm is recovered.
    /// Fires [`LifecycleEvent::RealmAdded`].
    pub fn add_realm(&mut self, realm: Arc<dyn SceneRealm>) -> Result<AddReport, BridgeError> {
        let id = realm.id();
        let objects = realm
            .objects()
            .map_err(|source| BridgeError::Scene { realm: id, source })?;

        let mut context = RealmContext::new(id, &self.config);
        let report = context.add_objects(&objects);
        let recreated = self
            .realms
            .insert(id, RealmSlot { realm, context })
            .is_some();
        info!(
            realm = %id,
            objects = report.registered.len(),
            bodies = report.bodies,
            recreated,
            "realm registered"
        );
        self.notifier.notify(&LifecycleEvent::RealmAdded(id));
        Ok(report)
    }

    /// Unregister a realm, discarding its context and anything staged
    /// for it. Fires [`LifecycleEvent::RealmRemoved`].
    pub fn remove_realm(&mut self, id: RealmId) -> Result<(), BridgeError> {
        let _guard = self.staging.lock();
        if self.realms.shift_remove(&id).is_none() {
            return Err(BridgeError::UnknownRealm { realm: id });
        }
        let discarded = self.staging.discard_realm(id);
        info!(realm = %id, discarded, "realm removed");
        self.notifier.notify(&LifecycleEvent::RealmRemoved(id));
        Ok(())
    }

    // ── External object lifecycle ───────────────────────────────

    /// Objects the host already inserted into a realm.
    ///
    /// Applied to the context immediately, without staging, and not
    /// forwarded back to the scene graph. Fires
    /// [`LifecycleEvent::ObjectAdded`] for each newly registered object.
    pub fn objects_added(
        &mut self,
        realm: RealmId,
        objects: &[Arc<dyn SceneObject>],
    ) -> Result<AddReport, BridgeError> {
        let slot = self
            .realms
            .get_mut(&realm)
            .ok_or(BridgeError::UnknownRealm { realm })?;
        let report = slot.context.add_objects(objects);
        for &object in &report.registered {
            self.notifier
                .notify(&LifecycleEvent::ObjectAdded { object, realm });
        }
        Ok(report)
    }

    /// Objects the host already removed from a realm.
    ///
    /// Counterpart of [`objects_added`](Self::objects_added). Returns the
    /// ids that were actually registered.
    pub fn objects_removed(
        &mut self,
        realm: RealmId,
        objects: &[Arc<dyn SceneObject>],
    ) -> Result<Vec<ObjectId>, BridgeError> {
        let slot = self
            .realms
            .get_mut(&realm)
            .ok_or(BridgeError::UnknownRealm { realm })?;
        let removed = slot.context.remove_objects(objects);
        for &object in &removed {
            self.notifier
                .notify(&LifecycleEvent::ObjectRemoved { object, realm });
        }
        Ok(removed)
    }

    // ── Tick ────────────────────────────────────────────────────

    /// Run one tick using the wall-clock time since the previous tick.
    ///
    /// The first tick steps by zero.
    pub fn tick(&mut self) -> TickReport {
        let now = Instant::now();
        let elapsed = self
            .last_tick
            .map_or(Duration::ZERO, |prev| now.saturating_duration_since(prev));
        self.last_tick = Some(now);
        self.tick_with(elapsed)
    }

    /// Run one tick with an explicit elapsed time.
    pub fn tick_with(&mut self, elapsed: Duration) -> TickReport {
        let tick_start = Instant::now();
        let tick = self.current_tick.next();
        let mut metrics = TickMetrics {
            tick,
            elapsed_secs: self.config.clamp_step(elapsed.as_secs_f32()),
            ..TickMetrics::default()
        };
        let mut faults = Vec::new();

        for realm in self.scene.realms() {
            let id = realm.id();
            let Some(slot) = self.realms.get_mut(&id) else {
                self.counters.unregistered_realm_skips += 1;
                metrics.realms_skipped += 1;
                debug!(realm = %id, "unregistered realm skipped");
                continue;
            };
            if slot.context.fault().is_some() {
                metrics.realms_skipped += 1;
                continue;
            }

            let objects = match realm.objects() {
                Ok(objects) => objects,
                Err(e) => {
                    warn!(realm = %id, error = %e, "object enumeration failed, retrying next tick");
                    self.counters.enumeration_faults += 1;
                    metrics.realms_skipped += 1;
                    continue;
                }
            };
            metrics.objects_visited += objects.len();

            for (ty, instances) in group_by_type(objects).values() {
                metrics.types_updated += 1;
                let Some(changes) = ty.batch_update(instances) else {
                    continue;
                };
                if !changes.is_empty() {
                    let (added, removed) = self.staging.stage_changes(id, changes);
                    metrics.staged_additions += added;
                    metrics.staged_removals += removed;
                }
            }

            let step_start = Instant::now();
            match slot.context.step(metrics.elapsed_secs) {
                Ok(()) => {
                    metrics.realms_stepped += 1;
                    metrics
                        .step_us
                        .push((id, step_start.elapsed().as_micros() as u64));
                }
                Err(fault) => {
                    self.counters.realm_faults += 1;
                    faults.push((id, fault));
                }
            }
        }

        let commit = match self.config.commit_policy {
            CommitPolicy::EveryTick => {
                let commit_start = Instant::now();
                let report = self.commit();
                metrics.commit_us = commit_start.elapsed().as_micros() as u64;
                Some(report)
            }
            CommitPolicy::OnRequest => None,
        };

        metrics.total_us = tick_start.elapsed().as_micros() as u64;
        trace!(
            tick = %tick,
            elapsed_secs = metrics.elapsed_secs,
            stepped = metrics.realms_stepped,
            skipped = metrics.realms_skipped,
            total_us = metrics.total_us,
            "tick complete"
        );
        self.current_tick = tick;
        self.last_metrics = metrics.clone();
        TickReport {
            metrics,
            faults,
            commit,
        }
    }

    // ── Commit ──────────────────────────────────────────────────

    /// Apply everything staged so far.
    ///
    /// Holds the staging lock throughout. Per realm: additions are
    /// applied to the context, forwarded to the scene graph and announced;
    /// then removals likewise. Only objects whose registration actually
    /// changed are forwarded and announced. A no-op when nothing is staged.
    pub fn commit(&mut self) -> CommitReport {
        let guard = self.staging.lock();
        let pending = guard.take();
        let mut report = CommitReport::default();

        for (realm_id, queues) in pending {
            let Some(slot) = self.realms.get_mut(&realm_id) else {
                let dropped = queues.additions.len() + queues.removals.len();
                warn!(realm = %realm_id, dropped, "mutations staged for unknown realm dropped");
                self.counters.dropped_mutations += dropped as u64;
                report.dropped += dropped;
                continue;
            };
            report.realms += 1;

            let additions = dedup_by_id(queues.additions);
            if !additions.is_empty() {
                let added: HashSet<ObjectId> = slot
                    .context
                    .add_objects(&additions)
                    .registered
                    .into_iter()
                    .collect();
                let fresh: Vec<_> = additions
                    .into_iter()
                    .filter(|o| added.contains(&o.id()))
                    .collect();
                if !fresh.is_empty() {
                    slot.realm.add_objects(&fresh);
                    for obj in &fresh {
                        self.notifier.notify(&LifecycleEvent::ObjectAdded {
                            object: obj.id(),
                            realm: realm_id,
                        });
                    }
                    report.additions += fresh.len();
                }
            }

            let removals = dedup_by_id(queues.removals);
            if !removals.is_empty() {
                let removed: HashSet<ObjectId> =
                    slot.context.remove_objects(&removals).into_iter().collect();
                let unregistered = removals.len() - removed.len();
                if unregistered > 0 {
                    warn!(
                        realm = %realm_id,
                        count = unregistered,
                        "staged removals of unregistered objects ignored"
                    );
                    self.counters.unregistered_removals += unregistered as u64;
                    report.unregistered_removals += unregistered;
                }
                let gone: Vec<_> = removals
                    .into_iter()
                    .filter(|o| removed.contains(&o.id()))
                    .collect();
                if !gone.is_empty() {
                    slot.realm.remove_objects(&gone);
                    for obj in &gone {
                        self.notifier.notify(&LifecycleEvent::ObjectRemoved {
                            object: obj.id(),
                            realm: realm_id,
                        });
                    }
                    report.removals += gone.len();
                }
            }
        }
        drop(guard);

        if !report.is_empty() {
            self.counters.commits += 1;
            self.counters.committed_additions += report.additions as u64;
            self.counters.committed_removals += report.removals as u64;
            debug!(
                realms = report.realms,
                additions = report.additions,
                removals = report.removals,
                "committed staged mutations"
            );
        }
        report
    }

    // ── Accessors ───────────────────────────────────────────────

    /// Cloneable handle to the staging queues, usable from any thread.
    pub fn staging(&self) -> &StagingQueue {
        &self.staging
    }

    /// The lifecycle event notifier.
    pub fn notifier(&self) -> &Arc<EventNotifier> {
        &self.notifier
    }

    /// A registered realm's context.
    pub fn context(&self, realm: RealmId) -> Option<&RealmContext> {
        self.realms.get(&realm).map(|slot| &slot.context)
    }

    /// Whether a realm is registered.
    pub fn is_registered(&self, realm: RealmId) -> bool {
        self.realms.contains_key(&realm)
    }

    /// Registered realm ids, in registration order.
    pub fn realm_ids(&self) -> impl Iterator<Item = RealmId> + '_ {
        self.realms.keys().copied()
    }

    /// The fault that stopped a realm, if any.
    pub fn realm_fault(&self, realm: RealmId) -> Option<&StepError> {
        self.realms.get(&realm)?.context.fault()
    }

    /// The most recently completed tick.
    pub fn current_tick(&self) -> TickId {
        self.current_tick
    }

    /// Metrics from the most recently completed tick.
    pub fn last_metrics(&self) -> &TickMetrics {
        &self.last_metrics
    }

    /// Cumulative counters.
    pub fn counters(&self) -> &BridgeCounters {
        &self.counters
    }

    /// The validated configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

fn group_by_type(objects: Vec<Arc<dyn SceneObject>>) -> TypeGroups {
    let mut groups = TypeGroups::new();
    for obj in objects {
        // Untyped objects have no batch hook.
        let Some(ty) = obj.scene_type() else {
            continue;
        };
        groups
            .entry(ty.key())
            .or_insert_with(|| (ty, SmallVec::new()))
            .1
            .push(obj);
    }
    groups
}

fn dedup_by_id(objects: Vec<Arc<dyn SceneObject>>) -> Vec<Arc<dyn SceneObject>> {
    let mut seen = HashSet::with_capacity(objects.len());
    objects.into_iter().filter(|o| seen.insert(o.id())).collect()
}
