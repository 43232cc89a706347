//! Simulation loop thread: control-channel draining, ticking, pacing.
//!
//! The loop thread owns [`PhysicsBridge`] exclusively (moved in via
//! `thread::spawn`). Host requests arrive on a bounded crossbeam
//! channel and are applied between ticks; realm faults go back out on
//! an unbounded channel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracing::{info, warn};

use tether_core::{RealmId, SceneObject, SceneRealm, StepError};

use crate::controller::PhysicsBridge;

/// A host request, applied on the loop thread between ticks.
pub(crate) enum ControlMessage {
    AddRealm(Arc<dyn SceneRealm>),
    RemoveRealm(RealmId),
    ObjectsAdded {
        realm: RealmId,
        objects: Vec<Arc<dyn SceneObject>>,
    },
    ObjectsRemoved {
        realm: RealmId,
        objects: Vec<Arc<dyn SceneObject>>,
    },
    Commit,
}

/// State held by the loop thread's main loop.
pub(crate) struct LoopThreadState {
    bridge: PhysicsBridge,
    control_rx: Receiver<ControlMessage>,
    fault_tx: Sender<(RealmId, StepError)>,
    shutdown_flag: Arc<AtomicBool>,
    loop_stopped: Arc<AtomicBool>,
    tick_count: Arc<AtomicU64>,
    tick_budget: Option<Duration>,
}

impl LoopThreadState {
    pub fn new(
        bridge: PhysicsBridge,
        control_rx: Receiver<ControlMessage>,
        fault_tx: Sender<(RealmId, StepError)>,
        shutdown_flag: Arc<AtomicBool>,
        loop_stopped: Arc<AtomicBool>,
        tick_count: Arc<AtomicU64>,
    ) -> Self {
        // tick_rate_hz was validated: finite, positive, finite reciprocal.
        let tick_budget = bridge
            .config()
            .tick_rate_hz
            .map(|hz| Duration::from_secs_f64(1.0 / hz));
        Self {
            bridge,
            control_rx,
            fault_tx,
            shutdown_flag,
            loop_stopped,
            tick_count,
            tick_budget,
        }
    }

    /// Main loop. Runs until `shutdown_flag` is set.
    ///
    /// Consumes self and returns the bridge so the caller can recover it
    /// via `JoinHandle<PhysicsBridge>`. Requests still queued at shutdown
    /// are applied before returning.
    pub fn run(mut self) -> PhysicsBridge {
        info!(tick_budget = ?self.tick_budget, "loop thread started");
        loop {
            if self.shutdown_flag.load(Ordering::Acquire) {
                break;
            }
            let tick_start = Instant::now();

            self.drain_control_channel();

            let report = self.bridge.tick();
            for fault in report.faults {
                // Best-effort: the host may have dropped its receiver.
                let _ = self.fault_tx.send(fault);
            }
            self.tick_count.fetch_add(1, Ordering::Release);

            // park_timeout rather than sleep so stop() can unpark us.
            if let Some(remaining) = self
                .tick_budget
                .and_then(|budget| budget.checked_sub(tick_start.elapsed()))
            {
                thread::park_timeout(remaining);
            }
        }

        self.drain_control_channel();
        self.loop_stopped.store(true, Ordering::Release);
        info!(
            ticks = self.tick_count.load(Ordering::Acquire),
            "loop thread stopped"
        );
        self.bridge
    }

    fn drain_control_channel(&mut self) {
        while let Ok(msg) = self.control_rx.try_recv() {
            self.apply(msg);
        }
    }

    fn apply(&mut self, msg: ControlMessage) {
        let result = match msg {
            ControlMessage::AddRealm(realm) => self.bridge.add_realm(realm).map(drop),
            ControlMessage::RemoveRealm(realm) => self.bridge.remove_realm(realm),
            ControlMessage::ObjectsAdded { realm, objects } => {
                self.bridge.objects_added(realm, &objects).map(drop)
            }
            ControlMessage::ObjectsRemoved { realm, objects } => {
                self.bridge.objects_removed(realm, &objects).map(drop)
            }
            ControlMessage::Commit => {
                self.bridge.commit();
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "control request rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use tether_test_utils::fixtures::single_realm_world;

    fn state(
        config: BridgeConfig,
    ) -> (
        LoopThreadState,
        Sender<ControlMessage>,
        Arc<AtomicBool>,
        Arc<tether_test_utils::MockRealm>,
    ) {
        let (scene, realm) = single_realm_world();
        let bridge = PhysicsBridge::new(scene, config).unwrap();
        let (tx, rx) = crossbeam_channel::bounded(16);
        let (fault_tx, _) = crossbeam_channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let s = LoopThreadState::new(
            bridge,
            rx,
            fault_tx,
            Arc::clone(&shutdown),
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicU64::new(0)),
        );
        (s, tx, shutdown, realm)
    }

    #[test]
    fn tick_budget_follows_rate() {
        let (s, ..) = state(BridgeConfig {
            tick_rate_hz: Some(50.0),
            ..BridgeConfig::default()
        });
        assert_eq!(s.tick_budget, Some(Duration::from_millis(20)));
        let (s, ..) = state(BridgeConfig::default());
        assert_eq!(s.tick_budget, None);
    }

    #[test]
    fn queued_requests_applied_even_when_already_shut_down() {
        let (s, tx, shutdown, realm) = state(BridgeConfig::default());
        tx.send(ControlMessage::AddRealm(realm.clone())).unwrap();
        shutdown.store(true, Ordering::Release);
        let bridge = s.run();
        assert!(bridge.is_registered(realm.id()));
        assert_eq!(bridge.current_tick().0, 0);
    }

    #[test]
    fn rejected_request_does_not_stop_the_drain() {
        let (mut s, tx, _, realm) = state(BridgeConfig::default());
        tx.send(ControlMessage::RemoveRealm(RealmId(u64::MAX)))
            .unwrap();
        tx.send(ControlMessage::AddRealm(realm.clone())).unwrap();
        s.drain_control_channel();
        assert!(s.bridge.is_registered(realm.id()));
    }
}
